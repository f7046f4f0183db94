use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, ThreatflowError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Report generation settings
    pub report: ReportConfig,

    /// Diagram styling
    pub diagram: DiagramConfig,

    /// Graphviz invocation
    pub render: RenderConfig,

    /// Template customization
    pub templates: TemplateConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Title shown at the top of the HTML report
    pub title: String,

    /// Default output directory for rendered artifacts
    pub output_dir: PathBuf,

    /// Include flow labels on edges (numbers only when false)
    pub dfd_labels: bool,

    /// Render one protocol diagram per flow
    pub flow_images: bool,

    /// Also write the flow tables as flows.json
    pub export_json: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagramConfig {
    pub font_name: String,
    pub font_size: u32,
    /// Graphviz rank direction (LR, TB, ...)
    pub rankdir: String,
    pub graph_color: String,
    pub cluster_color: String,
    pub cluster_style: String,
    pub node_shape: String,
    pub node_style: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Path or name of the Graphviz `dot` executable
    pub dot_binary: String,

    /// Output format passed to `dot -T`
    pub format: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// Directory holding a `report.html` that replaces the built-in template
    pub template_dir: Option<PathBuf>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            title: "Threat Models".to_string(),
            output_dir: PathBuf::from("threat-model"),
            dfd_labels: true,
            flow_images: true,
            export_json: true,
        }
    }
}

impl Default for DiagramConfig {
    fn default() -> Self {
        Self {
            font_name: "Arial".to_string(),
            font_size: 11,
            rankdir: "LR".to_string(),
            graph_color: "blue".to_string(),
            cluster_color: "red".to_string(),
            cluster_style: "dashed".to_string(),
            node_shape: "box".to_string(),
            node_style: "rounded".to_string(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            dot_binary: "dot".to_string(),
            format: "png".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ThreatflowError::Config(e.to_string()))
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ThreatflowError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration with fallback to default
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(p) => {
                if p.as_ref().exists() {
                    Self::load(p)
                } else {
                    Ok(Self::default())
                }
            }
            None => {
                // Try common config file locations
                let candidates = [
                    "Threatflow.toml",
                    "threatflow.toml",
                    ".threatflow.toml",
                ];

                for candidate in &candidates {
                    if Path::new(candidate).exists() {
                        return Self::load(candidate);
                    }
                }

                Ok(Self::default())
            }
        }
    }
}
