//! Wiring for one logstd run
//!
//! Attaches stdin (and the secondary input when configured) to a
//! `LineLogger` and races it against Ctrl-C.

use anyhow::{Context, Result};

use crate::banner::StopReason;
use crate::config::Settings;
use crate::input::{InputStreams, StreamId};
use crate::logger::LineLogger;

/// Run a logging session with the process's standard input
pub async fn run(settings: Settings) -> Result<StopReason> {
    let mut inputs =
        InputStreams::new(settings.channel_buffer).with_max_record(settings.max_record_bytes);
    inputs.attach(StreamId::Primary, tokio::io::stdin());
    if let Some(secondary) = &settings.secondary {
        inputs.attach_file(StreamId::Secondary, secondary.clone());
    }

    let logger = LineLogger::start(&settings, inputs.into_receiver())
        .with_context(|| format!("Failed to start logging to '{}'", settings.path.display()))?;

    tracing::info!("Logging to: {}", settings.path.display());
    Ok(logger.run(interrupted()).await)
}

/// Resolves on Ctrl-C; never resolves if the handler cannot be installed
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
