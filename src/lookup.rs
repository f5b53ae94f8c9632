use anyhow::{Context, Result};
use clap::Args;

use crate::kraken::{KrakenClient, ServerConfig};

#[derive(Debug, Args, Clone)]
pub struct TickerArgs {
    /// Trading pair to look up (e.g. BTCUSD, ETH/EUR)
    pub pair: String,

    /// Print the structured snapshot as JSON instead of text
    #[arg(long)]
    pub json: bool,
}

pub async fn run(config: &ServerConfig, args: TickerArgs) -> Result<()> {
    let client = KrakenClient::new(config)?;
    let snapshot = client
        .fetch_ticker(&args.pair)
        .await
        .with_context(|| format!("failed to fetch ticker for {}", args.pair))?;

    if args.json {
        let payload =
            serde_json::to_string_pretty(&snapshot).context("serialize ticker snapshot")?;
        println!("{payload}");
    } else {
        println!("{snapshot}");
    }
    Ok(())
}
