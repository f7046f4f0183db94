// src/core/report/writer.rs
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use tera::{Context, Tera};
use tracing::{debug, info};

use crate::config::TemplateConfig;
use crate::core::dfd::FlowRow;
use crate::error::Result;

const REPORT_TEMPLATE: &str = "report.html";
const DEFAULT_TEMPLATE: &str = include_str!("../../../templates/report.html");

/// File name of the generated HTML document
pub const REPORT_FILE: &str = "ThreatModel.html";

/// Everything the templating step needs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportDocument {
    pub title: String,
    pub generated_at: String,
    pub scenes: Vec<SceneReport>,
    pub aggregated: AggregateReport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneReport {
    pub title: String,
    pub dfd_image: String,
    pub dot: String,
    pub flows: Vec<FlowRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateReport {
    pub dfd_image: String,
    pub dot: String,
}

/// Writes the final report document
pub trait ReportWriter: Send + Sync {
    /// Write the document into `output_dir`, returning the file written
    fn write(&self, report: &ReportDocument, output_dir: &Path) -> Result<PathBuf>;
}

/// HTML report rendered through tera
pub struct TeraReportWriter {
    tera: Tera,
}

impl TeraReportWriter {
    /// Use `template_dir/report.html` when present, else the built-in template
    pub fn new(config: &TemplateConfig) -> Result<Self> {
        let mut tera = Tera::default();

        let custom = config
            .template_dir
            .as_ref()
            .map(|dir| dir.join(REPORT_TEMPLATE))
            .filter(|path| path.exists());

        match custom {
            Some(path) => {
                debug!("Using report template {}", path.display());
                tera.add_template_file(&path, Some(REPORT_TEMPLATE))?;
            }
            None => tera.add_raw_template(REPORT_TEMPLATE, DEFAULT_TEMPLATE)?,
        }

        Ok(Self { tera })
    }

    pub fn render_to_string(&self, report: &ReportDocument) -> Result<String> {
        let context = Context::from_serialize(report)?;
        Ok(self.tera.render(REPORT_TEMPLATE, &context)?)
    }
}

impl ReportWriter for TeraReportWriter {
    fn write(&self, report: &ReportDocument, output_dir: &Path) -> Result<PathBuf> {
        let html = self.render_to_string(report)?;
        let path = output_dir.join(REPORT_FILE);
        std::fs::write(&path, html)?;
        info!("Wrote report {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ReportDocument {
        ReportDocument {
            title: "Threat Models".to_string(),
            generated_at: "2024-01-01T00:00:00Z".to_string(),
            scenes: vec![SceneReport {
                title: "Customer <Login>".to_string(),
                dfd_image: "Customer Login-dfd.png".to_string(),
                dot: "digraph {}".to_string(),
                flows: vec![FlowRow {
                    flow_id: 1,
                    pitcher: "Customer".to_string(),
                    catcher: "Nginx".to_string(),
                    transport_chain: vec!["TLS".to_string(), "HTTP".to_string()],
                    chain_description: "TLS( HTTP( GET /login ) )".to_string(),
                    data: "GET /login".to_string(),
                    classification: None,
                    label: "GET /login".to_string(),
                    image: Some("flow-Customer Login-1.png".to_string()),
                }],
            }],
            aggregated: AggregateReport {
                dfd_image: "AggregatedDfd-dfd.png".to_string(),
                dot: "digraph {}".to_string(),
            },
        }
    }

    #[test]
    fn test_default_template_renders_scenes_and_flows() {
        let writer = TeraReportWriter::new(&TemplateConfig::default()).unwrap();
        let html = writer.render_to_string(&sample()).unwrap();

        assert!(html.contains("Threat Models"));
        assert!(html.contains("Customer &lt;Login&gt;"));
        assert!(html.contains("Customer Login-dfd.png"));
        assert!(html.contains("TLS( HTTP( GET &#x2F;login ) )"));
        assert!(html.contains("AggregatedDfd-dfd.png"));
    }

    #[test]
    fn test_custom_template_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("report.html"),
            "{{ title }}:{% for scene in scenes %}{{ scene.title }}{% endfor %}",
        )
        .unwrap();

        let writer = TeraReportWriter::new(&TemplateConfig {
            template_dir: Some(dir.path().to_path_buf()),
        })
        .unwrap();

        let html = writer.render_to_string(&sample()).unwrap();
        assert_eq!(html, "Threat Models:Customer &lt;Login&gt;");
    }
}
