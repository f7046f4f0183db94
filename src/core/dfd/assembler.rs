// src/core/dfd/assembler.rs
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::config::DiagramConfig;
use crate::core::model::{DataFlow, EntityId, ThreatModel};
use crate::error::Result;
use super::graph::{DfdEdge, DfdGraph, EdgeDirection, GraphMode};

/// Builds boundary-nested diagrams from scenes
#[derive(Debug, Clone)]
pub struct DfdAssembler {
    style: DiagramConfig,
}

impl DfdAssembler {
    pub fn new(style: &DiagramConfig) -> Self {
        Self { style: style.clone() }
    }

    pub fn style(&self) -> &DiagramConfig {
        &self.style
    }

    /// Diagram of one scene with numbered edges
    pub fn scene_graph(&self, model: &ThreatModel, title: &str, labels: bool) -> Result<DfdGraph> {
        let scene = model.scene(title)?;
        self.flows_graph(model, title, &scene.flows, GraphMode::Numbered { labels })
    }

    /// Simplified diagram spanning every scene, in scene order
    pub fn aggregate_graph(&self, model: &ThreatModel, name: &str) -> Result<DfdGraph> {
        let flows: Vec<DataFlow> = model
            .scenes()
            .iter()
            .flat_map(|scene| scene.flows.iter().cloned())
            .collect();
        self.flows_graph(model, name, &flows, GraphMode::Simplified)
    }

    pub fn flows_graph(
        &self,
        model: &ThreatModel,
        name: &str,
        flows: &[DataFlow],
        mode: GraphMode,
    ) -> Result<DfdGraph> {
        let mut graph = DfdGraph::new(name, &self.style);

        self.place_nodes(model, flows, &mut graph)?;

        match mode {
            GraphMode::Numbered { labels } => self.numbered_edges(model, flows, labels, &mut graph),
            GraphMode::Simplified => self.simplified_edges(model, flows, &mut graph),
        }

        debug!(
            "Assembled '{}': {} clusters, {} edges",
            name,
            graph.clusters().len(),
            graph.edges().len()
        );
        Ok(graph)
    }

    /// Put each participant in its innermost boundary cluster exactly once,
    /// creating and nesting clusters in first-seen order.
    fn place_nodes(&self, model: &ThreatModel, flows: &[DataFlow], graph: &mut DfdGraph) -> Result<()> {
        let registry = model.registry();
        let mut placed: HashSet<EntityId> = HashSet::new();
        let mut clusters: HashMap<EntityId, usize> = HashMap::new();

        for flow in flows {
            for participant in [flow.pitcher, flow.catcher] {
                if !placed.insert(participant) {
                    continue;
                }

                let chain = registry.ancestors(participant)?;
                let Some(innermost) = chain.first().copied() else {
                    graph.add_node(registry.name(participant), None);
                    continue;
                };

                let mut child: Option<usize> = None;
                let mut attached = false;
                for boundary in &chain {
                    if let Some(&existing) = clusters.get(boundary) {
                        // Everything above an existing cluster is already wired up
                        if let Some(child) = child {
                            graph.nest(child, Some(existing));
                        }
                        attached = true;
                        break;
                    }

                    let idx = graph.add_cluster(registry.name(*boundary));
                    clusters.insert(*boundary, idx);
                    if let Some(child) = child {
                        graph.nest(child, Some(idx));
                    }
                    child = Some(idx);
                }

                if !attached {
                    if let Some(outermost) = child {
                        graph.nest(outermost, None);
                    }
                }

                graph.add_node(registry.name(participant), Some(clusters[&innermost]));
            }
        }

        Ok(())
    }

    fn numbered_edges(&self, model: &ThreatModel, flows: &[DataFlow], labels: bool, graph: &mut DfdGraph) {
        for (i, flow) in flows.iter().enumerate() {
            let label = if labels {
                format!("({}) {}", i + 1, flow.label)
            } else {
                format!("({})", i + 1)
            };

            graph.add_edge(DfdEdge {
                from: model.name(flow.pitcher).to_string(),
                to: model.name(flow.catcher).to_string(),
                label: Some(label),
                direction: None,
            });
        }
    }

    fn simplified_edges(&self, model: &ThreatModel, flows: &[DataFlow], graph: &mut DfdGraph) {
        let mut pairs: Vec<(EntityId, EntityId, EdgeDirection)> = Vec::new();
        let mut seen: HashMap<(EntityId, EntityId), usize> = HashMap::new();

        for flow in flows {
            let forward = (flow.pitcher, flow.catcher);
            let reverse = (flow.catcher, flow.pitcher);

            if seen.contains_key(&forward) {
                continue;
            }
            if let Some(&idx) = seen.get(&reverse) {
                pairs[idx].2 = EdgeDirection::Both;
                continue;
            }

            seen.insert(forward, pairs.len());
            pairs.push((flow.pitcher, flow.catcher, EdgeDirection::Forward));
        }

        for (from, to, direction) in pairs {
            graph.add_edge(DfdEdge {
                from: model.name(from).to_string(),
                to: model.name(to).to_string(),
                label: None,
                direction: Some(direction),
            });
        }
    }
}

impl Default for DfdAssembler {
    fn default() -> Self {
        Self::new(&DiagramConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_placed_once_across_flows() {
        let mut model = ThreatModel::new();
        let a = model.process("A").in_boundary("Zone").unwrap().id();
        let b = model.process("B").id();
        let flows = vec![
            model.flow(a, b, "one").unwrap(),
            model.flow(b, a, "two").unwrap(),
            model.flow(a, b, "three").unwrap(),
        ];

        let graph = DfdAssembler::default()
            .flows_graph(&model, "g", &flows, GraphMode::Numbered { labels: true })
            .unwrap();

        assert_eq!(graph.top_level_nodes(), &["B".to_string()]);
        assert_eq!(graph.find_cluster("Zone").unwrap().nodes, vec!["A".to_string()]);
        assert_eq!(graph.edges().len(), 3);
    }

    #[test]
    fn test_shared_outer_boundary_reuses_cluster() {
        let mut model = ThreatModel::new();
        model.boundary("Front End").in_boundary("BookStore Co").unwrap();
        model.boundary("Databases").in_boundary("BookStore Co").unwrap();
        let web = model.process("Web Server").in_boundary("Front End").unwrap().id();
        let db = model.process("Content DB").in_boundary("Databases").unwrap().id();
        let flows = vec![model.flow(web, db, "Fetch").unwrap()];

        let graph = DfdAssembler::default()
            .flows_graph(&model, "g", &flows, GraphMode::Numbered { labels: true })
            .unwrap();

        let top: Vec<_> = graph.top_level_clusters().map(|c| c.label.clone()).collect();
        assert_eq!(top, vec!["BookStore Co"]);

        let outer = graph.find_cluster("BookStore Co").unwrap();
        let children: Vec<_> = outer
            .children
            .iter()
            .map(|idx| graph.cluster(*idx).label.clone())
            .collect();
        assert_eq!(children, vec!["Front End", "Databases"]);
    }

    #[test]
    fn test_labels_can_be_suppressed() {
        let mut model = ThreatModel::new();
        let a = model.process("A").id();
        let b = model.process("B").id();
        let flows = vec![model.flow(a, b, "secret label").unwrap()];

        let graph = DfdAssembler::default()
            .flows_graph(&model, "g", &flows, GraphMode::Numbered { labels: false })
            .unwrap();
        assert_eq!(graph.edges()[0].label.as_deref(), Some("(1)"));
    }
}
