//! Server-Sent Events transport: a long-lived `GET` carries server→client
//! frames; client→server sends go to a companion `POST` URL the server
//! advertises in an initial `endpoint` event (SSE §6).

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, Url};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use super::{new_event_channel, TransportEvent, TransportHandle, TransportSink};
use crate::codec::SseFramer;
use crate::config::ServerInfo;
use crate::error::{McpError, TransportErrorKind};
use crate::message::Message;

type SharedEndpoint = Arc<Mutex<Option<String>>>;

pub async fn open(server_info: &ServerInfo) -> Result<TransportHandle, McpError> {
    let url = server_info.url.clone().ok_or_else(|| McpError::Transport {
        kind: TransportErrorKind::Handshake,
        detail: "sse server missing 'url'".into(),
    })?;

    let client = Client::builder()
        .build()
        .map_err(|e| McpError::Other(e.into()))?;

    let mut req = client.get(&url).header("accept", "text/event-stream");
    for (k, v) in &server_info.headers {
        req = req.header(k, v);
    }

    let resp = req.send().await.map_err(|e| McpError::Transport {
        kind: TransportErrorKind::Unreachable,
        detail: e.to_string(),
    })?;
    if !resp.status().is_success() {
        return Err(McpError::Transport {
            kind: TransportErrorKind::Unreachable,
            detail: format!("http {}", resp.status()),
        });
    }

    let (tx, rx) = new_event_channel();
    let _ = tx.send(TransportEvent::Connected).await;

    let endpoint: SharedEndpoint = Arc::new(Mutex::new(None));
    let reader_endpoint = endpoint.clone();
    let reader_tx = tx.clone();
    let max_frame_bytes = server_info.max_frame_bytes;

    tokio::spawn(async move {
        let mut framer = SseFramer::new(max_frame_bytes);
        let mut stream = resp.bytes_stream();
        loop {
            match stream.next().await {
                Some(Ok(chunk)) => match framer.feed(&chunk) {
                    Ok(events) => {
                        for event in events {
                            match event {
                                crate::codec::SseEvent::Frame(m) => {
                                    if reader_tx.send(TransportEvent::Frame(m)).await.is_err() {
                                        return;
                                    }
                                }
                                crate::codec::SseEvent::Endpoint(url) => {
                                    debug!(endpoint = %url, "sse: received companion send endpoint");
                                    *reader_endpoint.lock().await = Some(url);
                                }
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
                },
                Some(Err(e)) => {
                    let _ = reader_tx
                        .send(TransportEvent::Error {
                            kind: TransportErrorKind::Io,
                            detail: e.to_string(),
                        })
                        .await;
                    return;
                }
                None => {
                    let _ = reader_tx
                        .send(TransportEvent::Closed {
                            reason: "sse stream ended".into(),
                        })
                        .await;
                    return;
                }
            }
        }
    });

    Ok(TransportHandle {
        sink: Box::new(SseSink {
            client,
            opening_url: url,
            headers: server_info.headers.clone(),
            endpoint,
            fallback_to_get_url: server_info.sse_fallback_to_get_url,
            events: tx,
            closed: false,
        }),
        events: rx,
    })
}

struct SseSink {
    client: Client,
    opening_url: String,
    headers: std::collections::HashMap<String, String>,
    endpoint: SharedEndpoint,
    fallback_to_get_url: bool,
    events: mpsc::Sender<TransportEvent>,
    closed: bool,
}

impl SseSink {
    /// The `endpoint` event (or the opening URL, as a fallback) is often a
    /// bare path like `/messages?sessionId=abc` per the legacy SSE
    /// convention — resolve it against the opening URL before posting.
    fn resolve_endpoint(&self, target: &str) -> Result<Url, McpError> {
        let base = Url::parse(&self.opening_url).map_err(|e| McpError::Transport {
            kind: TransportErrorKind::Handshake,
            detail: format!("invalid sse url '{}': {e}", self.opening_url),
        })?;
        base.join(target).map_err(|e| McpError::Transport {
            kind: TransportErrorKind::Io,
            detail: format!("invalid sse endpoint '{target}': {e}"),
        })
    }
}

#[async_trait]
impl TransportSink for SseSink {
    async fn send(&mut self, message: &Message) -> Result<(), McpError> {
        if self.closed {
            return Err(McpError::Transport {
                kind: TransportErrorKind::Closed,
                detail: "sse transport closed".into(),
            });
        }

        let target = {
            let guard = self.endpoint.lock().await;
            match guard.clone() {
                Some(url) => url,
                None if self.fallback_to_get_url => self.opening_url.clone(),
                None => return Err(McpError::TransportUnidirectional),
            }
        };
        let target = self.resolve_endpoint(&target)?;

        let body = message.encode()?;
        let mut req = self
            .client
            .post(target)
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
        Ok(())
    }

    async fn close(&mut self, reason: &str) {
        if self.closed {
            return;
        }
        self.closed = true;
        warn!(reason, "sse transport closed");
        let _ = self
            .events
            .send(TransportEvent::Closed {
                reason: reason.to_string(),
            })
            .await;
    }
}
