//! Transport abstraction (§4.2): one of {Stdio, Http, Sse, WebSocket}, all
//! presenting the same `connect / send / close / events` contract.
//!
//! Each transport spawns exactly one reader task that runs the codec and
//! publishes frames on a bounded channel; `open()` performs `connect()` and
//! returns a `TransportHandle` once the first `Connected` event has been
//! observed (or a connect-time error).

pub mod http;
pub mod sse;
pub mod stdio;
pub mod websocket;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::config::{ServerInfo, TransportKind};
use crate::error::{McpError, TransportErrorKind};
use crate::message::Message;

const TRANSPORT_EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug)]
pub enum TransportEvent {
    Connected,
    Frame(Message),
    Error {
        kind: TransportErrorKind,
        detail: String,
    },
    Closed {
        reason: String,
    },
}

/// The send/close half of a transport. Implementations must make `close`
/// idempotent and must complete any pending `send` with `TransportError`
/// (kind `Closed`) once closed.
#[async_trait]
pub trait TransportSink: Send {
    async fn send(&mut self, message: &Message) -> Result<(), McpError>;
    async fn close(&mut self, reason: &str);
}

pub struct TransportHandle {
    pub sink: Box<dyn TransportSink>,
    pub events: mpsc::Receiver<TransportEvent>,
}

/// Open a transport for the given server, dispatching on `server_info.transport`.
pub async fn open(server_info: &ServerInfo) -> Result<TransportHandle, McpError> {
    match server_info.transport {
        TransportKind::Stdio => stdio::open(server_info).await,
        TransportKind::Http => http::open(server_info).await,
        TransportKind::Sse => sse::open(server_info).await,
        TransportKind::Ws => websocket::open(server_info).await,
    }
}

fn new_event_channel() -> (mpsc::Sender<TransportEvent>, mpsc::Receiver<TransportEvent>) {
    mpsc::channel(TRANSPORT_EVENT_CHANNEL_CAPACITY)
}
