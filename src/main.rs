use anyhow::{Context, Result};
use clap::Parser;

use logstd::app;
use logstd::cli::Cli;
use logstd::config::Config;
use logstd::logging;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize diagnostics BEFORE any tracing calls
    logging::init_diagnostics()?;

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let settings = config.with_overrides(&cli).settings()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let result = runtime.block_on(app::run(settings));
    // A blocking stdin read cannot be cancelled, so don't wait for it
    runtime.shutdown_background();

    // Every way the loop ends is a normal exit
    result?;
    Ok(())
}
