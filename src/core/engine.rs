// src/core/engine.rs
use std::path::{Path, PathBuf};
use anyhow::Result;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::ThreatflowError;
use super::dfd::{DfdAssembler, GraphMode};
use super::loader::load_model;
use super::report::ReportEngine;
use super::validator::ModelValidator;

/// Default config file written by `init`
pub const CONFIG_FILE: &str = "Threatflow.toml";

/// Starter model written by `init`
pub const STARTER_MODEL_FILE: &str = "threat-model.toml";

const STARTER_MODEL: &str = include_str!("../../templates/starter-model.toml");

/// Report tweaks requested on the command line
#[derive(Debug, Clone, Default)]
pub struct ReportRequest {
    pub model: PathBuf,
    pub output: Option<PathBuf>,
    pub scenes: Vec<String>,
    pub no_labels: bool,
    pub no_flow_images: bool,
}

/// Main orchestration engine behind the CLI commands
pub struct Engine {
    config: Config,
    validator: ModelValidator,
}

impl Engine {
    pub async fn new(config_path: Option<&Path>) -> Result<Self> {
        let config = Config::load_or_default(config_path)?;

        debug!("Loaded configuration: {:?}", config);

        Ok(Self {
            config,
            validator: ModelValidator::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Write a default config and a starter model, leaving existing files alone
    pub async fn init(&self, path: Option<PathBuf>) -> Result<()> {
        let target_dir = match path {
            Some(path) => path,
            None => std::env::current_dir()?,
        };
        info!("Initializing threatflow in: {}", target_dir.display());
        tokio::fs::create_dir_all(&target_dir).await?;

        let config_path = target_dir.join(CONFIG_FILE);
        if config_path.exists() {
            warn!("⚠️ {} already exists, leaving it untouched", config_path.display());
        } else {
            self.config.save(&config_path)?;
            info!("📄 Wrote {}", config_path.display());
        }

        let model_path = target_dir.join(STARTER_MODEL_FILE);
        if model_path.exists() {
            warn!("⚠️ {} already exists, leaving it untouched", model_path.display());
        } else {
            tokio::fs::write(&model_path, STARTER_MODEL).await?;
            info!("📄 Wrote {}", model_path.display());
        }

        Ok(())
    }

    /// Build diagrams, flow tables and the HTML report for a model file
    pub async fn report(&self, request: ReportRequest) -> Result<()> {
        info!("🔍 Loading model {}", request.model.display());
        let mut model = load_model(&request.model)?;

        let mut config = self.config.clone();
        if request.no_labels {
            config.report.dfd_labels = false;
        }
        if request.no_flow_images {
            config.report.flow_images = false;
        }
        let output_dir = request
            .output
            .unwrap_or_else(|| config.report.output_dir.clone());

        let engine = ReportEngine::from_config(&config)?;
        let summary = engine.generate(&mut model, &output_dir, &request.scenes).await?;

        info!("📊 Report summary:");
        info!("  - {} scenes", summary.document.scenes.len());
        info!(
            "  - {} flows",
            summary.document.scenes.iter().map(|s| s.flows.len()).sum::<usize>()
        );
        info!("  - {} flow diagrams", summary.flow_images);
        info!("📝 {}", summary.report_path.display());

        Ok(())
    }

    /// Print the DOT source of one scene's diagram
    pub async fn dfd(&self, model_path: &Path, scene: &str, simplified: bool, no_labels: bool) -> Result<()> {
        let mut model = load_model(model_path)?;
        model.expand_responses(scene)?;

        let assembler = DfdAssembler::new(&self.config.diagram);
        let mode = if simplified {
            GraphMode::Simplified
        } else {
            GraphMode::Numbered {
                labels: self.config.report.dfd_labels && !no_labels,
            }
        };

        let flows = model.scene(scene)?.flows.clone();
        let graph = assembler.flows_graph(&model, scene, &flows, mode)?;
        println!("{}", graph.to_dot());
        Ok(())
    }

    /// Fails on structural errors; `strict` also fails on warnings
    pub async fn validate(&self, model_path: &Path, strict: bool) -> Result<()> {
        info!("✅ Validating model {}...", model_path.display());

        let model = load_model(model_path)?;
        let result = self.validator.validate(&model, strict);

        for warning in &result.warnings {
            warn!("⚠️ {}", warning);
        }

        if result.is_valid() {
            info!("✅ Model validation passed");
        } else {
            warn!("❌ Model validation failed:");
            for error in &result.errors {
                warn!("  - {}", error);
            }
            let mode = if strict { " in strict mode" } else { "" };
            return Err(ThreatflowError::Validation(format!(
                "{} problem(s) found{}",
                result.errors.len(),
                mode
            ))
            .into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_writes_config_and_starter_model() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::new(None).await.unwrap();

        engine.init(Some(dir.path().to_path_buf())).await.unwrap();

        let config = Config::load(dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config.report.title, "Threat Models");

        let model = load_model(dir.path().join(STARTER_MODEL_FILE)).unwrap();
        assert_eq!(model.scenes().len(), 1);
        assert_eq!(model.scene("Customer Login").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_init_keeps_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "[report]\ntitle = \"Mine\"\n").unwrap();

        let engine = Engine::new(None).await.unwrap();
        engine.init(Some(dir.path().to_path_buf())).await.unwrap();

        let config = Config::load(dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config.report.title, "Mine");
    }

    #[tokio::test]
    async fn test_strict_validation_fails_on_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("model.toml");
        std::fs::write(&model_path, "[[processes]]\nname = \"Idle\"\n").unwrap();

        let engine = Engine::new(None).await.unwrap();
        assert!(engine.validate(&model_path, false).await.is_ok());

        let err = engine.validate(&model_path, true).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ThreatflowError>(),
            Some(ThreatflowError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_boundary_cycle_fails_without_strict() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("model.toml");
        std::fs::write(
            &model_path,
            "[[boundaries]]\nname = \"A\"\nboundary = \"B\"\n\n[[boundaries]]\nname = \"B\"\nboundary = \"A\"\n",
        )
        .unwrap();

        let engine = Engine::new(None).await.unwrap();
        let err = engine.validate(&model_path, false).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ThreatflowError>(),
            Some(ThreatflowError::Validation(_))
        ));
    }
}
