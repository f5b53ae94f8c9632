pub mod http;
pub mod stdio;

use anyhow::{Context, Result};
use serde_json::json;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;

use crate::logging;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownSignal {
    None,
    Graceful,
    Immediate,
}

/// SIGTERM drains in-flight requests, SIGINT drops them.
pub(crate) async fn handle_signals(shutdown_tx: watch::Sender<ShutdownSignal>) -> Result<()> {
    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to register SIGTERM handler")?;
    let mut sigint =
        signal(SignalKind::interrupt()).context("failed to register SIGINT handler")?;

    tokio::select! {
        _ = sigterm.recv() => {
            logging::info(
                "signal.received",
                "SIGTERM received, initiating graceful shutdown",
                json!({ "signal": "SIGTERM" })
            );
            let _ = shutdown_tx.send(ShutdownSignal::Graceful);
        }
        _ = sigint.recv() => {
            logging::warn(
                "signal.received",
                "SIGINT received, forcing immediate shutdown",
                json!({ "signal": "SIGINT" })
            );
            let _ = shutdown_tx.send(ShutdownSignal::Immediate);
        }
    }

    // Keep the sender alive so receivers see the signal rather than a closed channel.
    std::future::pending::<()>().await;
    Ok(())
}
