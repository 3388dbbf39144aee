//! Subprocess stdio transport: newline-delimited JSON over a child's
//! stdin/stdout. Stderr is drained and discarded, never interpreted as
//! protocol.

use std::process::Stdio as StdStdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use super::{new_event_channel, TransportEvent, TransportHandle, TransportSink};
use crate::codec::LineFramer;
use crate::config::ServerInfo;
use crate::error::{McpError, TransportErrorKind};
use crate::message::Message;

pub async fn open(server_info: &ServerInfo) -> Result<TransportHandle, McpError> {
    let command = server_info.command.as_deref().ok_or_else(|| {
        McpError::Transport {
            kind: TransportErrorKind::Handshake,
            detail: "stdio server missing 'command'".into(),
        }
    })?;

    let mut cmd = tokio::process::Command::new(command);
    cmd.args(&server_info.args)
        .envs(&server_info.env)
        .stdin(StdStdio::piped())
        .stdout(StdStdio::piped())
        .stderr(StdStdio::piped());

    let mut child = cmd.spawn().map_err(|e| McpError::Transport {
        kind: TransportErrorKind::Unreachable,
        detail: format!("failed to spawn '{command}': {e}"),
    })?;

    let stdin = child.stdin.take().expect("piped stdin");
    let stdout = child.stdout.take().expect("piped stdout");
    let stderr = child.stderr.take().expect("piped stderr");
    let child = Arc::new(Mutex::new(child));

    let (tx, rx) = new_event_channel();
    let _ = tx.send(TransportEvent::Connected).await;

    let max_frame_bytes = server_info.max_frame_bytes;
    let reader_tx = tx.clone();
    let reader_child = child.clone();
    tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        let mut framer = LineFramer::new(max_frame_bytes);
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let mut bytes = line.into_bytes();
                    bytes.push(b'\n');
                    match framer.feed(&bytes) {
                        Ok(messages) => {
                            for m in messages {
                                if reader_tx.send(TransportEvent::Frame(m)).await.is_err() {
                                    return;
                                }
                            }
                        }
                        Err(e) => {
                            let _ = reader_tx
                                .send(TransportEvent::Error {
                                    kind: TransportErrorKind::ProtocolViolation,
                                    detail: e.to_string(),
                                })
                                .await;
                        }
                    }
                }
                Ok(None) => {
                    let reason = match reader_child.lock().await.wait().await {
                        Ok(status) => describe_exit(status),
                        Err(e) => format!("child stdout closed; wait failed: {e}"),
                    };
                    let _ = reader_tx.send(TransportEvent::Closed { reason }).await;
                    return;
                }
                Err(e) => {
                    let _ = reader_tx
                        .send(TransportEvent::Error {
                            kind: TransportErrorKind::Io,
                            detail: e.to_string(),
                        })
                        .await;
                    return;
                }
            }
        }
    });

    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(stderr = %line, "stdio server stderr");
        }
    });

    let kill_grace = Duration::from_millis(server_info.kill_grace_ms);
    Ok(TransportHandle {
        sink: Box::new(StdioSink {
            stdin: Some(stdin),
            child: Some(child),
            kill_grace,
            closed: false,
        }),
        events: rx,
    })
}

/// Render an `ExitStatus` as the `{exitCode, signal}` shape §6 asks `closed`
/// events to carry, folded into a single human-readable string.
fn describe_exit(status: std::process::ExitStatus) -> String {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return format!("child terminated by signal {signal}");
        }
    }
    match status.code() {
        Some(code) => format!("child exited with code {code}"),
        None => "child exited with unknown status".into(),
    }
}

struct StdioSink {
    stdin: Option<ChildStdin>,
    child: Option<Arc<Mutex<Child>>>,
    kill_grace: Duration,
    closed: bool,
}

#[async_trait]
impl TransportSink for StdioSink {
    async fn send(&mut self, message: &Message) -> Result<(), McpError> {
        if self.closed {
            return Err(McpError::Transport {
                kind: TransportErrorKind::Closed,
                detail: "stdio transport closed".into(),
            });
        }
        let stdin = self.stdin.as_mut().ok_or_else(|| McpError::Transport {
            kind: TransportErrorKind::Closed,
            detail: "stdio transport closed".into(),
        })?;
        let mut bytes = message.encode()?;
        bytes.push(b'\n');
        stdin.write_all(&bytes).await.map_err(|e| McpError::Transport {
            kind: TransportErrorKind::Io,
            detail: e.to_string(),
        })
    }

    async fn close(&mut self, reason: &str) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.stdin = None; // drop stdin -> EOF to child

        if let Some(child_arc) = self.child.take() {
            let mut child = child_arc.lock().await;
            #[cfg(unix)]
            {
                if let Some(pid) = child.id() {
                    unsafe {
                        libc::kill(pid as i32, libc::SIGTERM);
                    }
                }
            }

            match tokio::time::timeout(self.kill_grace, child.wait()).await {
                Ok(_) => debug!(reason, "stdio child exited gracefully"),
                Err(_) => {
                    warn!(reason, "stdio child did not exit within grace period, killing");
                    let _ = child.kill().await;
                    let _ = child.wait().await;
                }
            }
        }
    }
}
