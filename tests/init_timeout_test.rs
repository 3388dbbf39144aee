//! A slow `initialize` response closes the connection outright and never
//! reconnects, independent of the `reconnect`/`max_retries` policy (§8 S2).

mod support;

use std::time::Duration;

use mcp_core::config::ServerInfo;
use mcp_core::manager::Manager;
use mcp_core::record::ConnectionStatus;
use support::{python_available, wait_for_status, FAKE_SERVER_SCRIPT};

#[tokio::test]
async fn slow_initialize_closes_without_reconnecting() {
    if !python_available() {
        return;
    }

    let mut info = ServerInfo::stdio("slow", "python3");
    info.args = vec![
        "-c".into(),
        FAKE_SERVER_SCRIPT.into(),
        "--slow-init-ms".into(),
        "300".into(),
    ];
    info.timeout_ms = 100;
    info.max_retries = Some(0);

    let manager = Manager::new();
    let conn = manager.connect(info).await.expect("connect");

    assert!(
        wait_for_status(&conn, ConnectionStatus::Closed, Duration::from_secs(5)).await,
        "expected Closed after a failed initialize, got {:?}",
        conn.status()
    );

    let snapshot = conn.snapshot();
    let err = snapshot.last_error.expect("last_error recorded");
    assert!(err.to_lowercase().contains("timed out"), "unexpected last_error: {err}");

    // Give any erroneous reconnect attempt a chance to kick in, then
    // confirm the connection really did stay closed.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(conn.status(), ConnectionStatus::Closed);

    manager.dispose().await;
}
