use std::net::SocketAddr;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::constants::{HTTP_BIND_ADDR, KRAKEN_API_BASE, REQUEST_TIMEOUT_SECS};
use crate::kraken::ServerConfig;
use crate::lookup::TickerArgs;

#[derive(Debug, Parser)]
#[command(author, version, about = "Kraken ticker MCP server")]
pub struct Cli {
    #[command(flatten)]
    options: GlobalArgs,

    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    pub fn split(self) -> (GlobalArgs, Command) {
        (self.options, self.command.unwrap_or_default())
    }
}

#[derive(Debug, Args, Clone)]
pub struct GlobalArgs {
    /// Base URL of Kraken's public REST API
    #[arg(long, global = true, env = "KRAKEN_API_BASE", default_value = KRAKEN_API_BASE)]
    pub api_base: String,

    /// Timeout for each upstream request, in seconds
    #[arg(long, global = true, env = "KRAKEN_TIMEOUT_SECS", default_value_t = REQUEST_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Log filter written to stderr (e.g. info, debug, kraken_mcp=debug)
    #[arg(long, global = true, env = "KRAKEN_MCP_LOG", default_value = "info")]
    pub log_level: String,
}

impl GlobalArgs {
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            api_base: self.api_base.clone(),
            request_timeout: Duration::from_secs(self.timeout_secs),
            ..ServerConfig::default()
        }
    }
}

#[derive(Debug, Subcommand, Default)]
pub enum Command {
    /// Serve MCP over stdin/stdout
    #[default]
    Stdio,
    /// Serve MCP over HTTP POST at /mcp
    Http(HttpArgs),
    /// Fetch one ticker and print it
    Ticker(TickerArgs),
}

#[derive(Debug, Args, Clone)]
pub struct HttpArgs {
    /// Address to listen on
    #[arg(short, long, default_value = HTTP_BIND_ADDR)]
    pub bind: SocketAddr,
}
