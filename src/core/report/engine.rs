// src/core/report/engine.rs
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::{Config, ReportConfig};
use crate::core::dfd::{flow_record_dot, flow_table, DfdAssembler};
use crate::core::model::ThreatModel;
use crate::error::{Result, ThreatflowError};
use super::renderer::{create_renderer, safe_filename, DiagramRenderer};
use super::writer::{AggregateReport, ReportDocument, ReportWriter, SceneReport, TeraReportWriter};

/// Stem of the cross-scene diagram
pub const AGGREGATE_STEM: &str = "AggregatedDfd-dfd";

/// File name of the machine-readable flow export
pub const FLOWS_JSON: &str = "flows.json";

/// Outcome of a report run
#[derive(Debug, Clone)]
pub struct ReportSummary {
    pub report_path: PathBuf,
    pub document: ReportDocument,
    pub flow_images: usize,
}

/// Orchestrates diagram assembly, rendering and templating for a model
pub struct ReportEngine {
    assembler: DfdAssembler,
    renderer: Box<dyn DiagramRenderer>,
    writer: Box<dyn ReportWriter>,
    options: ReportConfig,
}

impl ReportEngine {
    pub fn new(
        assembler: DfdAssembler,
        renderer: Box<dyn DiagramRenderer>,
        writer: Box<dyn ReportWriter>,
        options: ReportConfig,
    ) -> Self {
        Self {
            assembler,
            renderer,
            writer,
            options,
        }
    }

    /// Wire up the Graphviz renderer and tera writer from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            DfdAssembler::new(&config.diagram),
            create_renderer(&config.render),
            Box::new(TeraReportWriter::new(&config.templates)?),
            config.report.clone(),
        ))
    }

    pub fn options(&self) -> &ReportConfig {
        &self.options
    }

    /// Generate diagrams, tables and the HTML report.
    ///
    /// `select` limits which scenes get their own section (all when empty);
    /// the aggregate diagram always spans every scene. Any failure aborts
    /// the run.
    pub async fn generate(
        &self,
        model: &mut ThreatModel,
        output_dir: &Path,
        select: &[String],
    ) -> Result<ReportSummary> {
        let selected: Vec<String> = if select.is_empty() {
            model.scenes().iter().map(|s| s.title.clone()).collect()
        } else {
            for title in select {
                model.scene(title)?;
            }
            select.to_vec()
        };

        let mut stems: HashMap<String, &str> = HashMap::with_capacity(selected.len());
        for title in &selected {
            if let Some(previous) = stems.insert(safe_filename(title), title) {
                if previous != title.as_str() {
                    return Err(ThreatflowError::DuplicateScene(format!(
                        "'{}' and '{}' map to the same file name '{}'",
                        previous,
                        title,
                        safe_filename(title)
                    )));
                }
            }
        }

        info!(
            "📝 Generating report for {} scene(s) into {} (renderer: {})",
            selected.len(),
            output_dir.display(),
            self.renderer.renderer_name()
        );
        std::fs::create_dir_all(output_dir)?;

        model.expand_all_responses()?;

        let mut scenes = Vec::with_capacity(selected.len());
        let mut flow_images = 0;

        for title in &selected {
            let graph = self.assembler.scene_graph(model, title, self.options.dfd_labels)?;
            let dot = graph.to_dot();
            let safe_title = safe_filename(title);
            let dfd_image = self
                .renderer
                .render(&dot, &format!("{}-dfd", safe_title), output_dir)
                .await?;

            let mut flows = flow_table(model, title)?;
            if self.options.flow_images {
                let scene = model.scene(title)?;
                for (row, flow) in flows.iter_mut().zip(scene.flows.iter()) {
                    let stem = format!("flow-{}-{}", safe_title, row.flow_id);
                    let record = flow_record_dot(model, flow, &stem, self.assembler.style())?;
                    row.image = Some(self.renderer.render(&record, &stem, output_dir).await?);
                    flow_images += 1;
                }
            }

            debug!("Scene '{}': {} flows, diagram {}", title, flows.len(), dfd_image);
            scenes.push(SceneReport {
                title: title.clone(),
                dfd_image,
                dot,
                flows,
            });
        }

        let aggregate = self.assembler.aggregate_graph(model, "AggregatedDfd")?;
        let aggregate_dot = aggregate.to_dot();
        let aggregate_image = self
            .renderer
            .render(&aggregate_dot, AGGREGATE_STEM, output_dir)
            .await?;

        let document = ReportDocument {
            title: self.options.title.clone(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            scenes,
            aggregated: AggregateReport {
                dfd_image: aggregate_image,
                dot: aggregate_dot,
            },
        };

        if self.options.export_json {
            let json_path = output_dir.join(FLOWS_JSON);
            std::fs::write(&json_path, serde_json::to_string_pretty(&document)?)?;
            debug!("Exported flow tables to {}", json_path.display());
        }

        let report_path = self.writer.write(&document, output_dir)?;
        info!("✅ Report complete: {}", report_path.display());

        Ok(ReportSummary {
            report_path,
            document,
            flow_images,
        })
    }
}
