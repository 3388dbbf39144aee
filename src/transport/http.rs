//! Plain HTTP request/response transport: one `POST` per `send`, matched
//! synchronously and published as a `frame` event. Sends are serialized per
//! connection by construction — `send` is `&mut self` and awaited to
//! completion before the next call can start.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::mpsc;
use tracing::debug;

use super::{new_event_channel, TransportEvent, TransportHandle, TransportSink};
use crate::config::ServerInfo;
use crate::error::{McpError, TransportErrorKind};
use crate::message::Message;

pub async fn open(server_info: &ServerInfo) -> Result<TransportHandle, McpError> {
    let url = server_info.url.clone().ok_or_else(|| McpError::Transport {
        kind: TransportErrorKind::Handshake,
        detail: "http server missing 'url'".into(),
    })?;

    let client = Client::builder()
        .timeout(Duration::from_millis(server_info.timeout_ms))
        .build()
        .map_err(|e| McpError::Other(e.into()))?;

    let mut health_req = client.get(format!("{}/health", url.trim_end_matches('/')));
    for (k, v) in &server_info.headers {
        health_req = health_req.header(k, v);
    }
    let health = health_req.send().await;
    match health {
        Ok(resp) if resp.status().is_success() => {}
        Ok(resp) => {
            return Err(McpError::Transport {
                kind: TransportErrorKind::Unreachable,
                detail: format!("health check returned {}", resp.status()),
            })
        }
        Err(e) => {
            return Err(McpError::Transport {
                kind: TransportErrorKind::Unreachable,
                detail: e.to_string(),
            })
        }
    }

    let (tx, rx) = new_event_channel();
    let _ = tx.send(TransportEvent::Connected).await;

    Ok(TransportHandle {
        sink: Box::new(HttpSink {
            client,
            url,
            headers: server_info.headers.clone(),
            events: tx,
            closed: false,
        }),
        events: rx,
    })
}

struct HttpSink {
    client: Client,
    url: String,
    headers: std::collections::HashMap<String, String>,
    events: mpsc::Sender<TransportEvent>,
    closed: bool,
}

#[async_trait]
impl TransportSink for HttpSink {
    async fn send(&mut self, message: &Message) -> Result<(), McpError> {
        if self.closed {
            return Err(McpError::Transport {
                kind: TransportErrorKind::Closed,
                detail: "http transport closed".into(),
            });
        }

        let body = message.encode()?;
        let mut req = self
            .client
            .post(&self.url)
            .header("content-type", "application/json")
            .body(body);
        for (k, v) in &self.headers {
            req = req.header(k, v);
        }

        let resp = req.send().await.map_err(|e| McpError::Transport {
            kind: TransportErrorKind::Io,
            detail: e.to_string(),
        })?;

        if !resp.status().is_success() {
            return Err(McpError::Transport {
                kind: TransportErrorKind::Io,
                detail: format!("http {}", resp.status()),
            });
        }

        // Notifications carry no response body worth decoding.
        if matches!(message, Message::Notification { .. }) {
            return Ok(());
        }

        let bytes = resp.bytes().await.map_err(|e| McpError::Transport {
            kind: TransportErrorKind::Io,
            detail: e.to_string(),
        })?;
        let frame = Message::decode(&bytes)?;
        let _ = self.events.send(TransportEvent::Frame(frame)).await;
        Ok(())
    }

    async fn close(&mut self, reason: &str) {
        if self.closed {
            return;
        }
        self.closed = true;
        debug!(reason, "http transport closed");
        let _ = self
            .events
            .send(TransportEvent::Closed {
                reason: reason.to_string(),
            })
            .await;
    }
}
