//! A server-initiated `sampling/createMessage` request is dispatched to a
//! registered handler and the handler's result is sent back verbatim (§8 S6).

mod support;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mcp_core::config::ServerInfo;
use mcp_core::manager::Manager;
use mcp_core::record::ConnectionStatus;
use mcp_core::sampling::SamplingHandler;
use mcp_core::McpError;
use serde_json::{json, Value};
use support::{python_available, wait_for_status, FAKE_SERVER_SCRIPT};

struct EchoSampler;

#[async_trait]
impl SamplingHandler for EchoSampler {
    async fn create_message(&self, _params: Value) -> Result<Value, McpError> {
        Ok(json!({
            "role": "assistant",
            "content": {"type": "text", "text": "ok"},
            "model": "m",
            "stopReason": "end_turn",
        }))
    }
}

#[tokio::test]
async fn server_initiated_sampling_request_gets_handler_response() {
    if !python_available() {
        return;
    }

    let capture = tempfile::NamedTempFile::new().unwrap();
    let capture_path = capture.path().to_str().unwrap().to_string();

    let mut info = ServerInfo::stdio("fake", "python3");
    info.args = vec![
        "-c".into(),
        FAKE_SERVER_SCRIPT.into(),
        "--emit-sampling".into(),
        "--capture-file".into(),
        capture_path.clone(),
    ];

    let manager = Manager::with_handlers(Some(Arc::new(EchoSampler)), None);
    let conn = manager.connect(info).await.expect("connect");
    assert!(wait_for_status(&conn, ConnectionStatus::Connected, Duration::from_secs(5)).await);

    let mut captured = String::new();
    for _ in 0..100 {
        captured = std::fs::read_to_string(&capture_path).unwrap_or_default();
        if !captured.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(!captured.is_empty(), "server never received a response to its sampling request");

    let response: Value = serde_json::from_str(&captured).unwrap();
    assert_eq!(response["id"], "srv-1");
    assert_eq!(response["result"]["content"]["text"], "ok");
    assert!(response.get("error").is_none());

    manager.dispose().await;
}
