//! Manager event stream (§4.7): a broadcast channel carrying connection
//! lifecycle and traffic events, each tagged with a monotonic sequence
//! number so subscribers can detect drops on lag.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::record::ConnectionStatus;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ManagerEventKind {
    ConnectionEstablishing,
    ConnectionEstablished,
    ConnectionDegraded,
    ConnectionClosed,
    ConnectionFailed,
    CapabilityChanged,
    MessageSent,
    MessageReceived,
    Error,
    Warning,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ManagerEvent {
    pub seq: u64,
    pub kind: ManagerEventKind,
    pub server_name: String,
    pub status: Option<ConnectionStatus>,
    pub last_error: Option<String>,
    pub detail: Option<String>,
}

/// Fan-out broadcaster shared by the Manager and every driver task.
pub struct EventBus {
    sender: broadcast::Sender<ManagerEvent>,
    seq: AtomicU64,
}

impl EventBus {
    pub fn new() -> Arc<Self> {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            sender,
            seq: AtomicU64::new(0),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ManagerEvent> {
        self.sender.subscribe()
    }

    /// Emit an event, stamping it with the next sequence number.
    /// Silently drops if there are no subscribers.
    pub fn emit(
        &self,
        kind: ManagerEventKind,
        server_name: impl Into<String>,
        status: Option<ConnectionStatus>,
        last_error: Option<String>,
        detail: Option<String>,
    ) {
        let event = ManagerEvent {
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            kind,
            server_name: server_name.into(),
            status,
            last_error,
            detail,
        };
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            sender,
            seq: AtomicU64::new(0),
        }
    }
}
