//! An unexpected transport close moves the FSM through Reconnecting and back
//! to Connected once a fresh subprocess re-initializes (§8 S4, narrowed to a
//! reconnect-succeeds case — `python3 -c <script>` is cheap to respawn).

mod support;

use std::time::Duration;

use mcp_core::config::ServerInfo;
use mcp_core::manager::Manager;
use mcp_core::protocol_ops;
use mcp_core::record::ConnectionStatus;
use support::{python_available, wait_for_status, FAKE_SERVER_SCRIPT};

#[tokio::test]
async fn reconnects_after_server_process_exits() {
    if !python_available() {
        return;
    }

    let mut info = ServerInfo::stdio("flaky", "python3");
    info.args = vec![
        "-c".into(),
        FAKE_SERVER_SCRIPT.into(),
        "--exit-after-tools-list".into(),
    ];
    info.reconnect_base_ms = 20;
    info.reconnect_cap_ms = 100;

    let manager = Manager::new();
    let conn = manager.connect(info).await.expect("connect");
    assert!(wait_for_status(&conn, ConnectionStatus::Connected, Duration::from_secs(5)).await);

    // Triggers the fake server to exit right after replying.
    let _ = protocol_ops::tools_list(&conn, Duration::from_secs(5)).await;

    assert!(
        wait_for_status(&conn, ConnectionStatus::Connected, Duration::from_secs(10)).await,
        "connection never recovered after the server process exited, status = {:?}",
        conn.status()
    );
    assert!(conn.capabilities().is_some());

    manager.dispose().await;
}
