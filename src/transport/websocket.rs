//! WebSocket transport: one JSON-RPC frame per text message. Binary frames
//! are a protocol violation (§4.1).

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::debug;

use super::{new_event_channel, TransportEvent, TransportHandle, TransportSink};
use crate::config::ServerInfo;
use crate::error::{McpError, TransportErrorKind};
use crate::message::Message;

pub async fn open(server_info: &ServerInfo) -> Result<TransportHandle, McpError> {
    let url = server_info.url.clone().ok_or_else(|| McpError::Transport {
        kind: TransportErrorKind::Handshake,
        detail: "ws server missing 'url'".into(),
    })?;

    let mut request = url
        .as_str()
        .into_client_request()
        .map_err(|e| McpError::Transport {
            kind: TransportErrorKind::Handshake,
            detail: e.to_string(),
        })?;

    for (k, v) in &server_info.headers {
        if let (Ok(name), Ok(value)) = (
            tokio_tungstenite::tungstenite::http::HeaderName::from_bytes(k.as_bytes()),
            tokio_tungstenite::tungstenite::http::HeaderValue::from_str(v),
        ) {
            request.headers_mut().insert(name, value);
        }
    }
    if let Some(proto) = &server_info.ws_subprotocol {
        if let Ok(value) = tokio_tungstenite::tungstenite::http::HeaderValue::from_str(proto) {
            request
                .headers_mut()
                .insert("sec-websocket-protocol", value);
        }
    }

    let (ws_stream, _response) = connect_async(request).await.map_err(|e| McpError::Transport {
        kind: TransportErrorKind::Handshake,
        detail: e.to_string(),
    })?;

    let (mut sink, mut stream) = ws_stream.split();
    let (tx, rx) = new_event_channel();
    let _ = tx.send(TransportEvent::Connected).await;

    let reader_tx = tx.clone();
    tokio::spawn(async move {
        while let Some(msg) = stream.next().await {
            match msg {
                Ok(WsMessage::Text(text)) => match Message::decode(text.as_bytes()) {
                    Ok(frame) => {
                        if reader_tx.send(TransportEvent::Frame(frame)).await.is_err() {
                            return;
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
                Ok(WsMessage::Binary(_)) => {
                    let _ = reader_tx
                        .send(TransportEvent::Error {
                            kind: TransportErrorKind::ProtocolViolation,
                            detail: "binary WS frame rejected".into(),
                        })
                        .await;
                }
                Ok(WsMessage::Ping(_)) | Ok(WsMessage::Pong(_)) => {}
                Ok(WsMessage::Close(_)) | Err(_) => {
                    let _ = reader_tx
                        .send(TransportEvent::Closed {
                            reason: "websocket closed".into(),
                        })
                        .await;
                    return;
                }
                Ok(WsMessage::Frame(_)) => {}
            }
        }
        let _ = reader_tx
            .send(TransportEvent::Closed {
                reason: "websocket stream ended".into(),
            })
            .await;
    });

    Ok(TransportHandle {
        sink: Box::new(WebSocketSink {
            sink: Box::new(sink),
            events: tx,
            closed: false,
        }),
        events: rx,
    })
}

type WsSink = dyn futures_util::Sink<WsMessage, Error = tokio_tungstenite::tungstenite::Error>
    + Send
    + Unpin;

struct WebSocketSink {
    sink: Box<WsSink>,
    events: mpsc::Sender<TransportEvent>,
    closed: bool,
}

#[async_trait]
impl TransportSink for WebSocketSink {
    async fn send(&mut self, message: &Message) -> Result<(), McpError> {
        if self.closed {
            return Err(McpError::Transport {
                kind: TransportErrorKind::Closed,
                detail: "websocket transport closed".into(),
            });
        }
        let bytes = message.encode()?;
        let text = String::from_utf8(bytes).map_err(|e| McpError::Other(e.into()))?;
        self.sink
            .send(WsMessage::Text(text))
            .await
            .map_err(|e| McpError::Transport {
                kind: TransportErrorKind::Io,
                detail: e.to_string(),
            })
    }

    async fn close(&mut self, reason: &str) {
        if self.closed {
            return;
        }
        self.closed = true;
        debug!(reason, "websocket transport closed");
        let _ = self.sink.close().await;
        let _ = self
            .events
            .send(TransportEvent::Closed {
                reason: reason.to_string(),
            })
            .await;
    }
}
