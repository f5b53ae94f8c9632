use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::Client;
use serde_json::json;

use crate::constants::{HTTP_BIND_ADDR, KRAKEN_API_BASE, REQUEST_TIMEOUT_SECS, SERVER_VERSION};
use crate::error::{KrakenError, KrakenResult};
use crate::logging;
use crate::ticker::{parse_ticker_response, TickerSnapshot};

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub api_base: String,
    pub request_timeout: Duration,
    pub http_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_base: KRAKEN_API_BASE.to_string(),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            http_addr: HTTP_BIND_ADDR
                .parse()
                .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 8000))),
        }
    }
}

pub struct KrakenClient {
    client: Client,
    base_url: String,
}

impl KrakenClient {
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(format!("kraken-mcp/{SERVER_VERSION}"))
            .build()
            .context("failed to build HTTP client")?;

        let mut base_url = config.api_base.clone();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn fetch_ticker(&self, pair: &str) -> KrakenResult<TickerSnapshot> {
        let pair = pair.trim();
        let normalized = normalize_pair(pair);
        if normalized.is_empty() {
            return Err(KrakenError::InvalidPair(pair.to_string()));
        }

        logging::debug(
            "kraken.ticker.request",
            "Requesting ticker from Kraken",
            json!({ "pair": pair, "kraken_pair": normalized }),
        );

        let response = self
            .client
            .get(format!("{}Ticker", self.base_url))
            .query(&[("pair", normalized.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            logging::warn(
                "kraken.ticker.status",
                "Kraken answered with a non-success status",
                json!({ "pair": pair, "status": status.as_u16() }),
            );
            return Err(KrakenError::Status { status });
        }

        let body = response.bytes().await?;
        parse_ticker_response(pair, &body, Utc::now())
    }
}

/// Maps a user supplied pair onto Kraken's naming: separators dropped and
/// `BTC` spelled `XBT`.
pub fn normalize_pair(pair: &str) -> String {
    pair.trim()
        .chars()
        .filter(|c| !matches!(c, '/' | '-' | '_' | ' '))
        .collect::<String>()
        .to_ascii_uppercase()
        .replace("BTC", "XBT")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_common_spellings() {
        assert_eq!(normalize_pair("BTCUSD"), "XBTUSD");
        assert_eq!(normalize_pair("btc/usd"), "XBTUSD");
        assert_eq!(normalize_pair(" eth-eur "), "ETHEUR");
        assert_eq!(normalize_pair("XBTUSD"), "XBTUSD");
        assert_eq!(normalize_pair("ETHBTC"), "ETHXBT");
        assert_eq!(normalize_pair("  "), "");
    }

    #[test]
    fn base_url_gets_trailing_slash() {
        let config = ServerConfig {
            api_base: "http://127.0.0.1:9/0/public".to_string(),
            ..ServerConfig::default()
        };
        let client = KrakenClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:9/0/public/");
    }

    #[tokio::test]
    async fn blank_pair_fails_before_any_request() {
        let config = ServerConfig {
            api_base: "http://127.0.0.1:9/".to_string(),
            ..ServerConfig::default()
        };
        let client = KrakenClient::new(&config).unwrap();
        let err = client.fetch_ticker(" / ").await.unwrap_err();
        assert!(matches!(err, KrakenError::InvalidPair(_)));
    }
}
