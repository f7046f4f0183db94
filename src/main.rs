use anyhow::Result;
use clap::Parser;
use tracing::{debug, Level};
use tracing::level_filters::LevelFilter;

mod cli;

use cli::Cli;
use threatflow::core::Engine;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(LevelFilter::from_level(level).into()))
        .with_writer(std::io::stderr)
        .init();

    debug!("Starting threatflow v{}", env!("CARGO_PKG_VERSION"));

    let engine = Engine::new(cli.config.as_deref()).await?;

    cli.execute(engine).await
}
