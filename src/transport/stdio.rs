use std::io::ErrorKind;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;

use crate::logging;
use crate::protocol::{decode_request, JsonRpcResponse};
use crate::server::KrakenServer;

use super::{handle_signals, ShutdownSignal};

const RESPONSE_QUEUE: usize = 64;

pub async fn run(server: Arc<KrakenServer>) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(ShutdownSignal::None);
    let signals_task = tokio::spawn(handle_signals(shutdown_tx));

    logging::info_simple("stdio.start", "Serving MCP over stdio");
    let result = serve(server, tokio::io::stdin(), tokio::io::stdout(), shutdown_rx).await;

    signals_task.abort();
    let _ = signals_task.await;
    logging::info_simple("stdio.stop", "Stdio transport stopped");
    result
}

/// Reads one JSON-RPC message per line from `reader` and writes one response
/// per line to `writer`. Returns once the reader hits EOF or a shutdown
/// signal arrives.
pub async fn serve<R, W>(
    server: Arc<KrakenServer>,
    reader: R,
    writer: W,
    mut shutdown: watch::Receiver<ShutdownSignal>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (response_tx, response_rx) = mpsc::channel::<JsonRpcResponse>(RESPONSE_QUEUE);
    let writer_task = tokio::spawn(write_responses(writer, response_rx));

    let mut lines = BufReader::new(reader).lines();
    let mut in_flight = JoinSet::new();
    let mut watching_signals = true;
    let mut immediate = false;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read request line")? else {
                    logging::info_simple("stdio.eof", "Input closed");
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                match decode_request(line.as_bytes()) {
                    Ok(request) => {
                        let server = Arc::clone(&server);
                        let response_tx = response_tx.clone();
                        in_flight.spawn(async move {
                            if let Some(response) = server.handle(request).await {
                                let _ = response_tx.send(response).await;
                            }
                        });
                    }
                    Err(response) => {
                        logging::warn(
                            "stdio.bad_frame",
                            "Rejected malformed message",
                            json!({ "code": response.error.as_ref().map(|e| e.code) }),
                        );
                        let _ = response_tx.send(response).await;
                    }
                }
            }
            Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
            changed = shutdown.changed(), if watching_signals => {
                match changed {
                    Err(_) => watching_signals = false,
                    Ok(()) => match *shutdown.borrow() {
                        ShutdownSignal::None => continue,
                        ShutdownSignal::Graceful => break,
                        ShutdownSignal::Immediate => {
                            immediate = true;
                            break;
                        }
                    },
                }
            }
        }
    }

    if immediate {
        in_flight.abort_all();
    }
    while in_flight.join_next().await.is_some() {}

    drop(response_tx);
    writer_task
        .await
        .context("response writer panicked")?
}

async fn write_responses<W>(mut writer: W, mut responses: mpsc::Receiver<JsonRpcResponse>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = responses.recv().await {
        let mut payload = serde_json::to_vec(&response).context("serialize response")?;
        payload.push(b'\n');

        let written = match writer.write_all(&payload).await {
            Ok(()) => writer.flush().await,
            Err(err) => Err(err),
        };
        if let Err(err) = written {
            if is_disconnect(&err) {
                logging::info(
                    "stdio.client_disconnect",
                    "Client went away while writing a response",
                    json!({ "reason": err.kind().to_string() }),
                );
                break;
            }
            return Err(err).context("failed to write response");
        }
    }
    Ok(())
}

fn is_disconnect(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted
    )
}
