use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::constants::{SERVER_NAME, SERVER_VERSION};
use crate::logging;
use crate::protocol::decode_request;
use crate::server::KrakenServer;

use super::{handle_signals, ShutdownSignal};

pub async fn run(server: Arc<KrakenServer>, addr: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind MCP http endpoint at {addr}"))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(ShutdownSignal::None);
    let signals_task = tokio::spawn(handle_signals(shutdown_tx));

    let result = serve(listener, server, shutdown_rx).await;

    signals_task.abort();
    let _ = signals_task.await;
    result
}

/// Serves on an already bound listener. `Graceful` lets in-flight requests
/// finish, `Immediate` drops them; a dropped sender counts as graceful.
pub async fn serve(
    listener: TcpListener,
    server: Arc<KrakenServer>,
    shutdown: watch::Receiver<ShutdownSignal>,
) -> Result<()> {
    let addr = listener
        .local_addr()
        .context("failed to read bound address")?;
    logging::info(
        "http.bind",
        "MCP http endpoint listening",
        json!({ "addr": addr.to_string(), "path": "/mcp" }),
    );

    let mut graceful = shutdown.clone();
    let shutdown_signal = async move {
        while graceful.changed().await.is_ok() {
            if !matches!(*graceful.borrow(), ShutdownSignal::None) {
                break;
            }
        }
    };

    let server_future = axum::serve(listener, router(server).into_make_service())
        .with_graceful_shutdown(shutdown_signal)
        .into_future();

    tokio::select! {
        result = server_future => {
            result.context("http server terminated with error")?;
        }
        _ = wait_for_immediate(shutdown) => {
            logging::warn_simple("http.abort", "Dropping in-flight requests on immediate shutdown");
        }
    }

    logging::info_simple("http.stop", "MCP http endpoint stopped");
    Ok(())
}

async fn wait_for_immediate(mut shutdown: watch::Receiver<ShutdownSignal>) {
    while shutdown.changed().await.is_ok() {
        if matches!(*shutdown.borrow(), ShutdownSignal::Immediate) {
            return;
        }
    }
    std::future::pending::<()>().await;
}

pub fn router(server: Arc<KrakenServer>) -> Router {
    Router::new()
        .route("/mcp", post(handle_rpc))
        .route("/health", get(health))
        .with_state(server)
}

async fn handle_rpc(State(server): State<Arc<KrakenServer>>, body: Bytes) -> Response {
    let request = match decode_request(&body) {
        Ok(request) => request,
        Err(response) => {
            logging::warn(
                "http.bad_frame",
                "Rejected malformed message",
                json!({ "code": response.error.as_ref().map(|e| e.code) }),
            );
            return Json(response).into_response();
        }
    };

    match server.handle(request).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "server": SERVER_NAME,
        "version": SERVER_VERSION,
    }))
}
