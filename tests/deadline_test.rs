//! A call whose deadline elapses before the server replies completes with
//! `Timeout`, and the connection survives to serve later calls (§8 S3/§7).

mod support;

use std::time::{Duration, Instant};

use mcp_core::config::ServerInfo;
use mcp_core::connection::CallOptions;
use mcp_core::manager::Manager;
use mcp_core::record::ConnectionStatus;
use mcp_core::McpError;
use support::{python_available, wait_for_status, FAKE_SERVER_SCRIPT};

#[tokio::test]
async fn slow_tool_call_times_out_within_bounds() {
    if !python_available() {
        return;
    }

    let mut info = ServerInfo::stdio("slow-tool", "python3");
    info.args = vec![
        "-c".into(),
        FAKE_SERVER_SCRIPT.into(),
        "--slow-tool-ms".into(),
        "400".into(),
    ];

    let manager = Manager::new();
    let conn = manager.connect(info).await.expect("connect");
    assert!(wait_for_status(&conn, ConnectionStatus::Connected, Duration::from_secs(5)).await);

    let opts = CallOptions {
        timeout: Duration::from_millis(100),
        ..CallOptions::default()
    };
    let started = Instant::now();
    let result = conn
        .request(
            "tools/call",
            Some(serde_json::json!({"name": "t", "arguments": {}})),
            opts,
        )
        .await;
    let elapsed = started.elapsed();

    assert!(matches!(result, Err(McpError::Timeout)));
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_secs(2), "timeout fired far too late: {elapsed:?}");

    // The connection itself is unaffected by a single call timing out.
    assert_eq!(conn.status(), ConnectionStatus::Connected);

    manager.dispose().await;
}
