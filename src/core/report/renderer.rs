// src/core/report/renderer.rs
use std::path::Path;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::config::RenderConfig;
use crate::error::{Result, ThreatflowError};

/// Turns DOT text into an artifact on disk
#[async_trait]
pub trait DiagramRenderer: Send + Sync {
    /// Render `dot` into `output_dir` under `stem`, returning the produced file name
    async fn render(&self, dot: &str, stem: &str, output_dir: &Path) -> Result<String>;

    /// Get renderer name for logging
    fn renderer_name(&self) -> &str;
}

/// Factory picking a renderer from configuration
pub fn create_renderer(config: &RenderConfig) -> Box<dyn DiagramRenderer> {
    match config.format.as_str() {
        "dot" | "gv" => Box::new(DotSourceRenderer),
        _ => Box::new(GraphvizRenderer::new(config)),
    }
}

/// Runs the Graphviz `dot` executable
pub struct GraphvizRenderer {
    config: RenderConfig,
}

impl GraphvizRenderer {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

#[async_trait]
impl DiagramRenderer for GraphvizRenderer {
    async fn render(&self, dot: &str, stem: &str, output_dir: &Path) -> Result<String> {
        let source_path = output_dir.join(format!("{}.dot", stem));
        let image_name = format!("{}.{}", stem, self.config.format);
        let image_path = output_dir.join(&image_name);

        tokio::fs::write(&source_path, dot).await?;

        let output = Command::new(&self.config.dot_binary)
            .arg(format!("-T{}", self.config.format))
            .arg("-o")
            .arg(&image_path)
            .arg(&source_path)
            .output()
            .await
            .map_err(|e| {
                ThreatflowError::Render(format!(
                    "failed to run '{}': {}",
                    self.config.dot_binary, e
                ))
            })?;

        if !output.status.success() {
            return Err(ThreatflowError::Render(format!(
                "'{}' exited with {} for {}: {}",
                self.config.dot_binary,
                output.status,
                source_path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        debug!("Rendered {}", image_path.display());
        Ok(image_name)
    }

    fn renderer_name(&self) -> &str {
        "graphviz"
    }
}

/// Writes the DOT source only, for environments without Graphviz
pub struct DotSourceRenderer;

#[async_trait]
impl DiagramRenderer for DotSourceRenderer {
    async fn render(&self, dot: &str, stem: &str, output_dir: &Path) -> Result<String> {
        let file_name = format!("{}.dot", stem);
        tokio::fs::write(output_dir.join(&file_name), dot).await?;
        Ok(file_name)
    }

    fn renderer_name(&self) -> &str {
        "dot-source"
    }
}

/// Keep only letters, digits and spaces, trimming trailing spaces
pub fn safe_filename(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ')
        .collect::<String>()
        .trim_end()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_filename() {
        assert_eq!(safe_filename("Customer Login"), "Customer Login");
        assert_eq!(safe_filename("Buy book (v2)/checkout! "), "Buy book v2checkout");
        assert_eq!(safe_filename("../../etc/passwd"), "etcpasswd");
    }

    #[test]
    fn test_create_renderer_by_format() {
        let mut config = RenderConfig::default();
        assert_eq!(create_renderer(&config).renderer_name(), "graphviz");

        config.format = "dot".to_string();
        assert_eq!(create_renderer(&config).renderer_name(), "dot-source");
    }

    #[tokio::test]
    async fn test_dot_source_renderer_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let name = DotSourceRenderer
            .render("digraph g {\n}", "scene-dfd", dir.path())
            .await
            .unwrap();

        assert_eq!(name, "scene-dfd.dot");
        let written = std::fs::read_to_string(dir.path().join(name)).unwrap();
        assert_eq!(written, "digraph g {\n}");
    }

    #[tokio::test]
    async fn test_missing_graphviz_binary_is_a_render_error() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = GraphvizRenderer::new(&RenderConfig {
            dot_binary: "definitely-not-graphviz-dot".to_string(),
            format: "png".to_string(),
        });

        let err = renderer.render("digraph g {}", "x", dir.path()).await.unwrap_err();
        assert!(matches!(err, ThreatflowError::Render(_)));
    }
}
