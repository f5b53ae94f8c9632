use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::TICKER_SOURCE;
use crate::error::{KrakenError, KrakenResult};

/// Best ask or bid as Kraken reports it. Values stay as the decimal strings the
/// exchange sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: String,
    pub whole_lot_volume: String,
    pub lot_volume: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastTrade {
    pub price: String,
    pub volume: String,
}

/// A statistic reported for the current day and for the rolling 24 hours.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window<T> {
    pub today: T,
    pub last_24h: T,
}

impl<T> From<(T, T)> for Window<T> {
    fn from((today, last_24h): (T, T)) -> Self {
        Self { today, last_24h }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerSnapshot {
    pub pair: String,
    pub ask: BookLevel,
    pub bid: BookLevel,
    pub last_trade: LastTrade,
    pub volume: Window<String>,
    pub volume_weighted_avg_price: Window<String>,
    pub number_of_trades: Window<u64>,
    pub low: Window<String>,
    pub high: Window<String>,
    pub opening_price: String,
    pub timestamp: DateTime<Utc>,
    pub source: String,
}

impl TickerSnapshot {
    fn from_raw(pair: &str, raw: RawTicker, timestamp: DateTime<Utc>) -> Self {
        let (ask_price, ask_whole, ask_lot) = raw.ask;
        let (bid_price, bid_whole, bid_lot) = raw.bid;
        let (last_price, last_volume) = raw.last_trade;

        Self {
            pair: pair.to_string(),
            ask: BookLevel {
                price: ask_price,
                whole_lot_volume: ask_whole,
                lot_volume: ask_lot,
            },
            bid: BookLevel {
                price: bid_price,
                whole_lot_volume: bid_whole,
                lot_volume: bid_lot,
            },
            last_trade: LastTrade {
                price: last_price,
                volume: last_volume,
            },
            volume: raw.volume.into(),
            volume_weighted_avg_price: raw.vwap.into(),
            number_of_trades: raw.trades.into(),
            low: raw.low.into(),
            high: raw.high.into(),
            opening_price: raw.open,
            timestamp,
            source: TICKER_SOURCE.to_string(),
        }
    }

    pub fn description(&self) -> String {
        format!("Kraken Ticker Information for {}", self.pair)
    }

    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TickerSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.description())?;
        writeln!(f)?;
        writeln!(
            f,
            "Data retrieved from {} at {}",
            self.source,
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        writeln!(f)?;

        writeln!(f, "Current Prices:")?;
        writeln!(
            f,
            "- Ask: {} ({} volume, {} lot volume)",
            self.ask.price, self.ask.whole_lot_volume, self.ask.lot_volume
        )?;
        writeln!(
            f,
            "- Bid: {} ({} volume, {} lot volume)",
            self.bid.price, self.bid.whole_lot_volume, self.bid.lot_volume
        )?;
        writeln!(
            f,
            "- Last Trade: {} ({} volume)",
            self.last_trade.price, self.last_trade.volume
        )?;
        writeln!(f)?;

        writeln!(f, "Volume Statistics:")?;
        writeln!(f, "- Volume Today: {}", self.volume.today)?;
        writeln!(f, "- Volume Last 24h: {}", self.volume.last_24h)?;
        writeln!(
            f,
            "- Volume Weighted Avg Price Today: {}",
            self.volume_weighted_avg_price.today
        )?;
        writeln!(
            f,
            "- Volume Weighted Avg Price Last 24h: {}",
            self.volume_weighted_avg_price.last_24h
        )?;
        writeln!(f)?;

        writeln!(f, "Trading Activity:")?;
        writeln!(f, "- Number of Trades Today: {}", self.number_of_trades.today)?;
        writeln!(
            f,
            "- Number of Trades Last 24h: {}",
            self.number_of_trades.last_24h
        )?;
        writeln!(f)?;

        writeln!(f, "Price Range:")?;
        writeln!(f, "- Low Today: {}", self.low.today)?;
        writeln!(f, "- Low Last 24h: {}", self.low.last_24h)?;
        writeln!(f, "- High Today: {}", self.high.today)?;
        writeln!(f, "- High Last 24h: {}", self.high.last_24h)?;
        writeln!(f, "- Opening Price: {}", self.opening_price)?;
        writeln!(f)?;

        write!(
            f,
            "This data represents a snapshot of market conditions at the time of retrieval and may have changed since then."
        )
    }
}

/// One entry of the `result` map in Kraken's public `Ticker` response.
#[derive(Debug, Deserialize)]
struct RawTicker {
    #[serde(rename = "a")]
    ask: (String, String, String),
    #[serde(rename = "b")]
    bid: (String, String, String),
    #[serde(rename = "c")]
    last_trade: (String, String),
    #[serde(rename = "v")]
    volume: (String, String),
    #[serde(rename = "p")]
    vwap: (String, String),
    #[serde(rename = "t")]
    trades: (u64, u64),
    #[serde(rename = "l")]
    low: (String, String),
    #[serde(rename = "h")]
    high: (String, String),
    #[serde(rename = "o")]
    open: String,
}

#[derive(Debug, Deserialize)]
struct TickerEnvelope {
    #[serde(default)]
    error: Vec<String>,
    result: Option<Map<String, Value>>,
}

/// Turns a raw `Ticker` response body into a snapshot for `pair`.
///
/// Kraken keys the result by its own canonical pair name (`XXBTZUSD` for a
/// `BTCUSD` request), so the key is ignored and the first entry is taken.
pub fn parse_ticker_response(
    pair: &str,
    body: &[u8],
    timestamp: DateTime<Utc>,
) -> KrakenResult<TickerSnapshot> {
    let envelope: TickerEnvelope = serde_json::from_slice(body)?;

    if let Some(message) = envelope.error.into_iter().next() {
        return Err(KrakenError::Api(message));
    }

    let result = envelope.result.ok_or(KrakenError::MissingResult)?;
    let entry = result
        .into_iter()
        .next()
        .map(|(_, value)| value)
        .ok_or_else(|| KrakenError::EmptyResult(pair.to_string()))?;

    let raw: RawTicker = serde_json::from_value(entry)?;
    Ok(TickerSnapshot::from_raw(pair, raw, timestamp))
}
