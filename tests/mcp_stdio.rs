mod common;

use std::sync::Arc;
use std::time::Duration;

use kraken_mcp::server::KrakenServer;
use kraken_mcp::transport::{stdio, ShutdownSignal};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::watch;

use common::spawn_fake_kraken;

async fn exchange(frames: &[String]) -> Vec<Value> {
    let kraken = spawn_fake_kraken().await;
    let server = Arc::new(KrakenServer::from_config(&kraken.config()).expect("server"));

    let (mut client_in, server_in) = tokio::io::duplex(64 * 1024);
    let (server_out, mut client_out) = tokio::io::duplex(1024 * 1024);
    let (_shutdown_tx, shutdown_rx) = watch::channel(ShutdownSignal::None);

    let serve_task = tokio::spawn(stdio::serve(server, server_in, server_out, shutdown_rx));

    for frame in frames {
        client_in
            .write_all(format!("{frame}\n").as_bytes())
            .await
            .expect("write frame");
    }
    drop(client_in);

    let mut output = String::new();
    tokio::time::timeout(Duration::from_secs(10), client_out.read_to_string(&mut output))
        .await
        .expect("stdio output timeout")
        .expect("read output");

    serve_task
        .await
        .expect("serve task")
        .expect("serve exits cleanly");

    output
        .lines()
        .map(|line| serde_json::from_str(line).expect("every output line is a JSON-RPC frame"))
        .collect()
}

fn by_id(replies: &[Value], id: u64) -> &Value {
    replies
        .iter()
        .find(|reply| reply["id"] == id)
        .unwrap_or_else(|| panic!("no reply with id {id}"))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn full_session_over_lines() {
    let frames = [
        json!({
            "jsonrpc": "2.0", "id": 1, "method": "initialize",
            "params": { "protocolVersion": "2024-11-05", "capabilities": {} }
        }),
        json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }),
        json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list" }),
        json!({
            "jsonrpc": "2.0", "id": 3, "method": "tools/call",
            "params": { "name": "get_ticker", "arguments": { "pair": "ETHUSD" } }
        }),
        json!({
            "jsonrpc": "2.0", "id": 4, "method": "tools/call",
            "params": { "name": "get_ticker", "arguments": { "pair": "NOPE" } }
        }),
    ]
    .iter()
    .map(Value::to_string)
    .collect::<Vec<_>>();

    let replies = exchange(&frames).await;
    assert_eq!(replies.len(), 4, "the notification must not be answered");

    assert_eq!(by_id(&replies, 1)["result"]["protocolVersion"], "2024-11-05");
    assert_eq!(by_id(&replies, 2)["result"]["tools"][0]["name"], "get_ticker");

    let ticker = &by_id(&replies, 3)["result"];
    assert_eq!(ticker["structuredContent"]["ask"]["price"], "3120.55000");
    assert!(ticker["content"][0]["text"]
        .as_str()
        .expect("text")
        .contains("Kraken Ticker Information for ETHUSD"));

    let failure = &by_id(&replies, 4)["error"];
    assert_eq!(failure["code"], -32603);
    assert_eq!(failure["message"], "Kraken API error: EQuery:Unknown asset pair");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn bad_frames_get_errors_and_blank_lines_are_skipped() {
    let frames = vec![
        String::new(),
        "this is not json".to_string(),
        json!({ "jsonrpc": "2.0", "id": 5 }).to_string(),
        "   ".to_string(),
        json!({ "jsonrpc": "2.0", "id": null, "method": "ping" }).to_string(),
        json!({ "jsonrpc": "2.0", "id": 6, "method": "ping" }).to_string(),
    ];

    let replies = exchange(&frames).await;
    assert_eq!(replies.len(), 4, "a null id is answered, not ignored");

    let mut null_id_codes: Vec<i64> = replies
        .iter()
        .filter(|reply| reply["id"].is_null())
        .map(|reply| reply["error"]["code"].as_i64().expect("error code"))
        .collect();
    null_id_codes.sort_unstable();
    assert_eq!(null_id_codes, vec![-32700, -32600]);

    assert_eq!(by_id(&replies, 5)["error"]["code"], -32600);
    assert_eq!(by_id(&replies, 6)["result"], json!({}));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_signal_stops_an_idle_session() {
    let kraken = spawn_fake_kraken().await;
    let server = Arc::new(KrakenServer::from_config(&kraken.config()).expect("server"));

    let (_client_in, server_in) = tokio::io::duplex(1024);
    let (server_out, _client_out) = tokio::io::duplex(1024);
    let (shutdown_tx, shutdown_rx) = watch::channel(ShutdownSignal::None);

    let serve_task = tokio::spawn(stdio::serve(server, server_in, server_out, shutdown_rx));
    shutdown_tx
        .send(ShutdownSignal::Graceful)
        .expect("serve loop is listening");

    tokio::time::timeout(Duration::from_secs(5), serve_task)
        .await
        .expect("serve loop stops on shutdown")
        .expect("serve task")
        .expect("serve exits cleanly");
}
