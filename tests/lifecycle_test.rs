//! End-to-end connection lifecycle against a real stdio subprocess (§8 S1).

mod support;

use std::time::Duration;

use mcp_core::config::ServerInfo;
use mcp_core::manager::Manager;
use mcp_core::protocol_ops;
use mcp_core::record::ConnectionStatus;
use support::{python_available, wait_for_status, FAKE_SERVER_SCRIPT};

fn fake_server_info(name: &str, extra_args: &[&str]) -> ServerInfo {
    let mut info = ServerInfo::stdio(name, "python3");
    info.args = std::iter::once("-c".to_string())
        .chain(std::iter::once(FAKE_SERVER_SCRIPT.to_string()))
        .chain(extra_args.iter().map(|s| s.to_string()))
        .collect();
    info
}

#[tokio::test]
async fn connects_initializes_and_lists_one_tool() {
    if !python_available() {
        return;
    }

    let manager = Manager::new();
    let conn = manager
        .connect(fake_server_info("fake", &[]))
        .await
        .expect("connect");

    assert!(
        wait_for_status(&conn, ConnectionStatus::Connected, Duration::from_secs(5)).await,
        "connection never reached Connected, status = {:?}",
        conn.status()
    );

    let caps = conn.capabilities().expect("capabilities recorded after initialize");
    assert!(caps.has_tools());
    assert!(!caps.has_prompts());

    let listing = protocol_ops::tools_list(&conn, Duration::from_secs(5))
        .await
        .expect("tools/list");
    let tools = listing["tools"].as_array().expect("tools array");
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0]["name"], "t");

    manager.dispose().await;
}

#[tokio::test]
async fn tools_call_round_trips_arguments() {
    if !python_available() {
        return;
    }

    let manager = Manager::new();
    let conn = manager
        .connect(fake_server_info("fake", &[]))
        .await
        .expect("connect");
    assert!(wait_for_status(&conn, ConnectionStatus::Connected, Duration::from_secs(5)).await);

    let result = protocol_ops::tools_call(&conn, "t", serde_json::json!({}), Duration::from_secs(5))
        .await
        .expect("tools/call");
    let text = result["content"][0]["text"].as_str().unwrap_or_default();
    assert_eq!(text, "called t");

    manager.dispose().await;
}

#[tokio::test]
async fn manager_rejects_duplicate_server_name() {
    if !python_available() {
        return;
    }

    let manager = Manager::new();
    let _first = manager.connect(fake_server_info("dup", &[])).await.unwrap();
    let second = manager.connect(fake_server_info("dup", &[])).await;
    assert!(matches!(second, Err(mcp_core::McpError::AlreadyExists(_))));

    manager.dispose().await;
}
