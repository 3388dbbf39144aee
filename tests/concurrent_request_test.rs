//! Many concurrent calls on one connection get distinct ids and all resolve,
//! with no cross-talk between callers (§8 S3).

mod support;

use std::time::Duration;

use mcp_core::config::ServerInfo;
use mcp_core::manager::Manager;
use mcp_core::protocol_ops;
use mcp_core::record::ConnectionStatus;
use support::{python_available, wait_for_status, FAKE_SERVER_SCRIPT};

#[tokio::test]
async fn fifty_concurrent_pings_all_succeed() {
    if !python_available() {
        return;
    }

    let mut info = ServerInfo::stdio("fake", "python3");
    info.args = vec!["-c".into(), FAKE_SERVER_SCRIPT.into()];

    let manager = Manager::new();
    let conn = manager.connect(info).await.expect("connect");
    assert!(wait_for_status(&conn, ConnectionStatus::Connected, Duration::from_secs(5)).await);

    let mut handles = Vec::new();
    for _ in 0..50 {
        let conn = conn.clone();
        handles.push(tokio::spawn(async move {
            protocol_ops::ping(&conn, Duration::from_secs(5)).await
        }));
    }

    for h in handles {
        h.await.expect("task panicked").expect("ping failed");
    }

    manager.dispose().await;
}

#[tokio::test]
async fn concurrent_tools_calls_each_get_their_own_result() {
    if !python_available() {
        return;
    }

    let mut info = ServerInfo::stdio("fake", "python3");
    info.args = vec!["-c".into(), FAKE_SERVER_SCRIPT.into()];

    let manager = Manager::new();
    let conn = manager.connect(info).await.expect("connect");
    assert!(wait_for_status(&conn, ConnectionStatus::Connected, Duration::from_secs(5)).await);

    let mut handles = Vec::new();
    for i in 0..10 {
        let conn = conn.clone();
        let tool_name = format!("tool-{i}");
        handles.push(tokio::spawn(async move {
            let result = protocol_ops::tools_call(&conn, &tool_name, serde_json::json!({}), Duration::from_secs(5))
                .await
                .unwrap();
            (tool_name, result)
        }));
    }

    for h in handles {
        let (tool_name, result) = h.await.unwrap();
        let text = result["content"][0]["text"].as_str().unwrap();
        assert_eq!(text, format!("called {tool_name}"));
    }

    manager.dispose().await;
}
