use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use kraken_mcp::cli::{self, Cli, GlobalArgs};
use kraken_mcp::server::KrakenServer;
use kraken_mcp::{logging, lookup, transport};
use serde_json::json;

fn main() -> Result<()> {
    let (options, command) = Cli::parse().split();
    logging::init(&options.log_level)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    let result = runtime.block_on(run(options, command));
    // Stdin is read on a blocking thread that never returns while the client
    // keeps the pipe open; waiting for it here would hang after a signal.
    runtime.shutdown_background();

    if let Err(err) = &result {
        logging::error(
            "server.exit",
            "Exited with error",
            json!({ "error": format!("{err:#}") }),
        );
    }
    result
}

async fn run(options: GlobalArgs, command: cli::Command) -> Result<()> {
    let mut config = options.server_config();

    match command {
        cli::Command::Stdio => {
            let server = Arc::new(KrakenServer::from_config(&config)?);
            transport::stdio::run(server).await
        }
        cli::Command::Http(args) => {
            config.http_addr = args.bind;
            logging::info(
                "server.start",
                "Starting Kraken MCP server over http",
                json!({ "api_base": config.api_base, "addr": config.http_addr.to_string() }),
            );
            let server = Arc::new(KrakenServer::from_config(&config)?);
            transport::http::run(server, config.http_addr).await
        }
        cli::Command::Ticker(args) => lookup::run(&config, args).await,
    }
}
