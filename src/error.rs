use reqwest::StatusCode;
use thiserror::Error;

/// Failures while fetching or decoding a ticker from Kraken.
#[derive(Error, Debug)]
pub enum KrakenError {
    #[error("Invalid trading pair: {0:?}")]
    InvalidPair(String),

    #[error("Error fetching Kraken ticker info: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Error fetching Kraken ticker info: upstream returned {status}")]
    Status { status: StatusCode },

    #[error("Error parsing Kraken API response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Kraken API error: {0}")]
    Api(String),

    #[error("Invalid response from Kraken API: missing 'result' field")]
    MissingResult,

    #[error("Invalid response from Kraken API: no ticker data for {0}")]
    EmptyResult(String),
}

pub type KrakenResult<T> = Result<T, KrakenError>;
