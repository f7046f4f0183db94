use clap::{Parser, Subcommand};
use std::path::PathBuf;
use anyhow::Result;

use threatflow::core::{Engine, ReportRequest};

#[derive(Parser)]
#[command(name = "threatflow")]
#[command(about = "Data-flow diagrams and reports from declarative threat models")]
#[command(version)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default config and a starter model
    Init {
        /// Target directory (defaults to current directory)
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Render diagrams and the HTML report
    Report {
        /// Model file (TOML)
        #[arg(short, long)]
        model: PathBuf,

        /// Output directory for the report
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only report these scenes (repeatable)
        #[arg(short, long = "scene")]
        scenes: Vec<String>,

        /// Number edges without labels
        #[arg(long)]
        no_labels: bool,

        /// Skip the per-flow protocol diagrams
        #[arg(long)]
        no_flow_images: bool,
    },

    /// Print the DOT source of one scene
    Dfd {
        /// Model file (TOML)
        #[arg(short, long)]
        model: PathBuf,

        /// Scene title
        #[arg(short, long)]
        scene: String,

        /// One edge per participant pair, no numbering
        #[arg(long)]
        simplified: bool,

        /// Number edges without labels
        #[arg(long)]
        no_labels: bool,
    },

    /// Check a model for structural problems
    Validate {
        /// Model file (TOML)
        #[arg(short, long)]
        model: PathBuf,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,
    },
}

impl Cli {
    pub async fn execute(self, engine: Engine) -> Result<()> {
        match self.command {
            Commands::Init { path } => engine.init(path).await,
            Commands::Report { model, output, scenes, no_labels, no_flow_images } => {
                engine
                    .report(ReportRequest {
                        model,
                        output,
                        scenes,
                        no_labels,
                        no_flow_images,
                    })
                    .await
            }
            Commands::Dfd { model, scene, simplified, no_labels } => {
                engine.dfd(&model, &scene, simplified, no_labels).await
            }
            Commands::Validate { model, strict } => engine.validate(&model, strict).await,
        }
    }
}
