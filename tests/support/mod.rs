//! Shared fixtures for the MCP integration core's end-to-end tests.
//!
//! The fake server is a tiny Python script driven over stdio — real
//! subprocess, real newline-delimited JSON framing, no mocked transport.
//! Tests that need it fall back to a pass if `python3` isn't on PATH, the
//! same accommodation `transport::stdio`'s own unit tests make for `cat`.

use std::time::Duration;

use mcp_core::connection::ConnectionHandle;
use mcp_core::record::ConnectionStatus;

pub const FAKE_SERVER_SCRIPT: &str = r#"
import json, sys, threading, time

def send(obj):
    sys.stdout.write(json.dumps(obj) + "\n")
    sys.stdout.flush()

def main():
    args = sys.argv[1:]
    slow_init_ms = 0
    emit_sampling = False
    capture_file = None
    exit_after_tools_list = False
    slow_tool_ms = 0
    i = 0
    while i < len(args):
        if args[i] == "--slow-init-ms":
            slow_init_ms = int(args[i + 1]); i += 2
        elif args[i] == "--emit-sampling":
            emit_sampling = True; i += 1
        elif args[i] == "--capture-file":
            capture_file = args[i + 1]; i += 2
        elif args[i] == "--exit-after-tools-list":
            exit_after_tools_list = True; i += 1
        elif args[i] == "--slow-tool-ms":
            slow_tool_ms = int(args[i + 1]); i += 2
        else:
            i += 1

    initialized = threading.Event()

    def sampling_thread():
        initialized.wait(timeout=5)
        send({"jsonrpc": "2.0", "id": "srv-1", "method": "sampling/createMessage",
              "params": {"messages": [], "maxTokens": 16}})

    if emit_sampling:
        threading.Thread(target=sampling_thread, daemon=True).start()

    for line in sys.stdin:
        line = line.strip()
        if not line:
            continue
        msg = json.loads(line)
        method = msg.get("method")
        mid = msg.get("id")

        if method is None:
            # A response to one of our own server-initiated requests.
            if mid == "srv-1" and capture_file:
                with open(capture_file, "w") as f:
                    f.write(json.dumps(msg))
            continue

        if method == "initialize":
            if slow_init_ms:
                time.sleep(slow_init_ms / 1000.0)
            send({
                "jsonrpc": "2.0", "id": mid,
                "result": {
                    "protocolVersion": "2024-11-05",
                    "serverInfo": {"name": "fake", "version": "0"},
                    "capabilities": {"tools": {}, "resources": {}},
                },
            })
        elif method == "notifications/initialized":
            initialized.set()
        elif method == "ping":
            send({"jsonrpc": "2.0", "id": mid, "result": {}})
        elif method == "tools/list":
            send({"jsonrpc": "2.0", "id": mid,
                  "result": {"tools": [{"name": "t", "description": "", "inputSchema": {}}]}})
            if exit_after_tools_list:
                sys.stdout.flush()
                return
        elif method == "tools/call":
            if slow_tool_ms:
                time.sleep(slow_tool_ms / 1000.0)
            name = (msg.get("params") or {}).get("name")
            send({"jsonrpc": "2.0", "id": mid,
                  "result": {"content": [{"type": "text", "text": f"called {name}"}]}})
        elif method == "resources/read":
            uri = (msg.get("params") or {}).get("uri", "")
            send({"jsonrpc": "2.0", "id": mid,
                  "result": {"contents": [{"uri": uri, "mimeType": "text/plain", "text": "data"}]}})
        elif mid is not None:
            send({"jsonrpc": "2.0", "id": mid, "error": {"code": -32601, "message": "method not found"}})

main()
"#;

/// True if `python3` is runnable in this environment.
pub fn python_available() -> bool {
    std::process::Command::new("python3")
        .arg("--version")
        .output()
        .is_ok()
}

pub async fn wait_for_status(
    conn: &ConnectionHandle,
    want: ConnectionStatus,
    timeout: Duration,
) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if conn.status() == want {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
