#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{extract::Query, http::StatusCode, response::IntoResponse, routing::get, Router};
use kraken_mcp::kraken::ServerConfig;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const XBTUSD_BODY: &str = r#"{
    "error": [],
    "result": {
        "XXBTZUSD": {
            "a": ["67012.40000", "1", "1.000"],
            "b": ["67012.30000", "3", "3.000"],
            "c": ["67012.40000", "0.00150000"],
            "v": ["1532.48293012", "2381.99837112"],
            "p": ["66810.15432", "66540.90211"],
            "t": [21877, 33012],
            "l": ["65900.00000", "65500.10000"],
            "h": ["67390.00000", "67390.00000"],
            "o": "66231.60000"
        }
    }
}"#;

pub const ETHUSD_BODY: &str = r#"{
    "error": [],
    "result": {
        "XETHZUSD": {
            "a": ["3120.55000", "12", "12.000"],
            "b": ["3120.54000", "4", "4.000"],
            "c": ["3120.55000", "0.25000000"],
            "v": ["18211.40000000", "30554.01772630"],
            "p": ["3099.87011", "3087.66610"],
            "t": [9120, 15411],
            "l": ["3051.00000", "3033.91000"],
            "h": ["3140.00000", "3140.00000"],
            "o": "3075.12000"
        }
    }
}"#;

pub struct FakeKraken {
    pub addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl FakeKraken {
    pub fn api_base(&self) -> String {
        format!("http://{}/0/public/", self.addr)
    }

    pub fn config(&self) -> ServerConfig {
        ServerConfig {
            api_base: self.api_base(),
            ..ServerConfig::default()
        }
    }
}

impl Drop for FakeKraken {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Answers `/0/public/Ticker` the way Kraken does for a handful of pairs.
/// Only Kraken spellings are known: a `BTCUSD` lookup succeeds only if the
/// client rewrote it to `XBTUSD`. `SLOW` stalls for 30 seconds.
pub async fn spawn_fake_kraken() -> FakeKraken {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fake kraken");
    let addr = listener.local_addr().expect("fake kraken addr");

    let app = Router::new().route("/0/public/Ticker", get(ticker));
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    FakeKraken { addr, handle }
}

async fn ticker(Query(query): Query<HashMap<String, String>>) -> impl IntoResponse {
    let pair = query.get("pair").map(String::as_str).unwrap_or_default();
    if pair == "SLOW" {
        tokio::time::sleep(Duration::from_secs(30)).await;
    }
    match pair {
        "XBTUSD" => (StatusCode::OK, XBTUSD_BODY.to_string()),
        "ETHUSD" => (StatusCode::OK, ETHUSD_BODY.to_string()),
        "BROKEN" => (StatusCode::OK, "<html>maintenance</html>".to_string()),
        "DOWN" => (
            StatusCode::SERVICE_UNAVAILABLE,
            r#"{"error":["EService:Unavailable"]}"#.to_string(),
        ),
        "EMPTY" => (StatusCode::OK, r#"{"error":[],"result":{}}"#.to_string()),
        _ => (
            StatusCode::OK,
            r#"{"error":["EQuery:Unknown asset pair"]}"#.to_string(),
        ),
    }
}
