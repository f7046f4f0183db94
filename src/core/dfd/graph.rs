// src/core/dfd/graph.rs
use std::fmt::Write as _;
use std::sync::OnceLock;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::DiagramConfig;

/// How flows become edges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphMode {
    /// One edge per flow, numbered in scene order, optionally with the flow label
    Numbered { labels: bool },
    /// One edge per participant pair, bidirectional when both directions occur
    Simplified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeDirection {
    Forward,
    Both,
}

impl EdgeDirection {
    fn as_dot(&self) -> &'static str {
        match self {
            EdgeDirection::Forward => "forward",
            EdgeDirection::Both => "both",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DfdEdge {
    pub from: String,
    pub to: String,
    pub label: Option<String>,
    pub direction: Option<EdgeDirection>,
}

/// A boundary cluster; children index into the owning graph's cluster list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DfdCluster {
    pub label: String,
    pub nodes: Vec<String>,
    pub children: Vec<usize>,
}

/// Hierarchical data-flow diagram ready for serialization to DOT
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DfdGraph {
    pub name: String,
    nodes: Vec<String>,
    clusters: Vec<DfdCluster>,
    top_clusters: Vec<usize>,
    edges: Vec<DfdEdge>,
    #[serde(skip)]
    style: DiagramConfig,
}

impl DfdGraph {
    pub fn new(name: impl Into<String>, style: &DiagramConfig) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            clusters: Vec::new(),
            top_clusters: Vec::new(),
            edges: Vec::new(),
            style: style.clone(),
        }
    }

    /// Create an unattached cluster and return its index
    pub fn add_cluster(&mut self, label: impl Into<String>) -> usize {
        self.clusters.push(DfdCluster {
            label: label.into(),
            nodes: Vec::new(),
            children: Vec::new(),
        });
        self.clusters.len() - 1
    }

    /// Attach a cluster under `parent`, or at the top level when `None`
    pub fn nest(&mut self, child: usize, parent: Option<usize>) {
        match parent {
            Some(parent) => self.clusters[parent].children.push(child),
            None => self.top_clusters.push(child),
        }
    }

    pub fn add_node(&mut self, name: impl Into<String>, cluster: Option<usize>) {
        match cluster {
            Some(idx) => self.clusters[idx].nodes.push(name.into()),
            None => self.nodes.push(name.into()),
        }
    }

    pub fn add_edge(&mut self, edge: DfdEdge) {
        self.edges.push(edge);
    }

    pub fn top_level_nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn top_level_clusters(&self) -> impl Iterator<Item = &DfdCluster> {
        self.top_clusters.iter().map(move |idx| &self.clusters[*idx])
    }

    pub fn cluster(&self, idx: usize) -> &DfdCluster {
        &self.clusters[idx]
    }

    pub fn find_cluster(&self, label: &str) -> Option<&DfdCluster> {
        self.clusters.iter().find(|c| c.label == label)
    }

    pub fn clusters(&self) -> &[DfdCluster] {
        &self.clusters
    }

    pub fn edges(&self) -> &[DfdEdge] {
        &self.edges
    }

    /// Serialize to Graphviz DOT text.
    ///
    /// Output depends only on insertion order, so identical input always
    /// yields byte-identical text.
    pub fn to_dot(&self) -> String {
        let style = &self.style;
        let mut out = String::new();

        let _ = writeln!(out, "digraph {} {{", quote_id(&self.name));
        let _ = writeln!(
            out,
            "\tgraph {}",
            attr_list(&[
                ("color", style.graph_color.as_str()),
                ("fontname", style.font_name.as_str()),
                ("rankdir", style.rankdir.as_str()),
            ])
        );
        let font_size = style.font_size.to_string();
        let _ = writeln!(
            out,
            "\tnode {}",
            attr_list(&[
                ("fontname", style.font_name.as_str()),
                ("fontsize", font_size.as_str()),
                ("shape", style.node_shape.as_str()),
                ("style", style.node_style.as_str()),
            ])
        );
        let _ = writeln!(
            out,
            "\tedge {}",
            attr_list(&[
                ("fontname", style.font_name.as_str()),
                ("fontsize", font_size.as_str()),
            ])
        );

        for node in &self.nodes {
            let _ = writeln!(out, "\t{}", quote_id(node));
        }

        for idx in &self.top_clusters {
            self.write_cluster(&mut out, *idx, 1);
        }

        for edge in &self.edges {
            let mut attrs = Vec::new();
            if let Some(label) = &edge.label {
                attrs.push(("label", label.as_str()));
            }
            if let Some(direction) = &edge.direction {
                attrs.push(("dir", direction.as_dot()));
            }

            let _ = write!(out, "\t{} -> {}", quote_id(&edge.from), quote_id(&edge.to));
            if !attrs.is_empty() {
                let _ = write!(out, " {}", attr_list(&attrs));
            }
            out.push('\n');
        }

        out.push('}');
        out
    }

    fn write_cluster(&self, out: &mut String, idx: usize, depth: usize) {
        let cluster = &self.clusters[idx];
        let indent = "\t".repeat(depth);
        let font_size = self.style.font_size.to_string();

        let _ = writeln!(
            out,
            "{}subgraph {} {{",
            indent,
            quote_id(&format!("cluster_{}", cluster.label))
        );
        let _ = writeln!(
            out,
            "{}\tgraph {}",
            indent,
            attr_list(&[
                ("color", self.style.cluster_color.as_str()),
                ("fontname", self.style.font_name.as_str()),
                ("fontsize", font_size.as_str()),
                ("label", cluster.label.as_str()),
                ("style", self.style.cluster_style.as_str()),
            ])
        );

        for node in &cluster.nodes {
            let _ = writeln!(out, "{}\t{}", indent, quote_id(node));
        }
        for child in &cluster.children {
            self.write_cluster(out, *child, depth + 1);
        }

        let _ = writeln!(out, "{}}}", indent);
    }
}

/// DOT for a single record-shaped node, used for per-flow protocol diagrams
pub fn record_dot(name: &str, record_label: &str, style: &DiagramConfig) -> String {
    let font_size = style.font_size.to_string();
    let mut out = String::new();

    let _ = writeln!(out, "digraph {} {{", quote_id(name));
    let _ = writeln!(
        out,
        "\tgraph {}",
        attr_list(&[
            ("bgcolor", "transparent"),
            ("fontname", style.font_name.as_str()),
            ("fontsize", font_size.as_str()),
        ])
    );
    let _ = writeln!(
        out,
        "\tnode {}",
        attr_list(&[
            ("fontname", style.font_name.as_str()),
            ("fontsize", font_size.as_str()),
            ("shape", "plaintext"),
        ])
    );
    // Record labels arrive escaped already, so they bypass quote_id
    let _ = writeln!(out, "\tstruct [label=\"{}\" shape=record]", record_label);
    out.push('}');
    out
}

fn attr_list(attrs: &[(&str, &str)]) -> String {
    let parts: Vec<String> = attrs
        .iter()
        .map(|(key, value)| format!("{}={}", key, quote_id(value)))
        .collect();
    format!("[{}]", parts.join(" "))
}

const DOT_KEYWORDS: [&str; 6] = ["node", "edge", "graph", "digraph", "subgraph", "strict"];

/// Quote a DOT identifier unless it is a plain name or numeral
pub fn quote_id(id: &str) -> String {
    static PLAIN: OnceLock<Option<Regex>> = OnceLock::new();
    let plain = PLAIN.get_or_init(|| {
        Regex::new(r"^(?:[A-Za-z_][A-Za-z0-9_]*|-?(?:\.[0-9]+|[0-9]+(?:\.[0-9]*)?))$").ok()
    });

    let is_keyword = DOT_KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(id));
    let is_plain = plain.as_ref().map_or(false, |re| re.is_match(id));
    if is_plain && !is_keyword {
        return id.to_string();
    }

    let escaped = id
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n");
    format!("\"{}\"", escaped)
}
