pub const SERVER_NAME: &str = "kraken";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const KRAKEN_API_BASE: &str = "https://api.kraken.com/0/public/";
pub const TICKER_SOURCE: &str = "Kraken API";
pub const REQUEST_TIMEOUT_SECS: u64 = 10;
pub const HTTP_BIND_ADDR: &str = "127.0.0.1:8000";

pub const TOOL_GET_TICKER: &str = "get_ticker";
pub const PROMPT_KRAKEN_TICKER: &str = "kraken-ticker";

/// Oldest first; the last entry is what we answer with when a client asks for
/// something we do not know.
pub const SUPPORTED_PROTOCOL_VERSIONS: [&str; 3] = ["2024-11-05", "2025-03-26", "2025-06-18"];
pub const LATEST_PROTOCOL_VERSION: &str = "2025-06-18";
