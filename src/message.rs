//! JSON-RPC 2.0 message envelopes.
//!
//! Dynamic JSON shapes are kept as opaque `serde_json::Value`s here;
//! Protocol Ops deserialize `params`/`result` lazily once a method is known.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::McpError;

pub const JSONRPC_VERSION: &str = "2.0";
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// A request or notification id. The correlator always allocates integers,
/// but decode must accept whatever a server sends back.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<u64> for RequestId {
    fn from(n: u64) -> Self {
        Self::Number(n as i64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

/// One complete JSON-RPC 2.0 frame as seen on the wire.
///
/// Invariant enforced by construction and by `decode`: a `Response` carries
/// the same `id` as its request; a `Notification` never has one; a message
/// never carries both `result` and `error`.
#[derive(Debug, Clone)]
pub enum Message {
    Request {
        id: RequestId,
        method: String,
        params: Option<Value>,
    },
    Notification {
        method: String,
        params: Option<Value>,
    },
    Response {
        id: RequestId,
        result: Option<Value>,
        error: Option<RpcError>,
    },
}

impl Message {
    pub fn request(id: RequestId, method: impl Into<String>, params: Option<Value>) -> Self {
        Self::Request {
            id,
            method: method.into(),
            params,
        }
    }

    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self::Notification {
            method: method.into(),
            params,
        }
    }

    pub fn ok(id: RequestId, result: Value) -> Self {
        Self::Response {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(id: RequestId, error: RpcError) -> Self {
        Self::Response {
            id,
            result: None,
            error: Some(error),
        }
    }

    pub fn id(&self) -> Option<&RequestId> {
        match self {
            Self::Request { id, .. } | Self::Response { id, .. } => Some(id),
            Self::Notification { .. } => None,
        }
    }

    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Request { method, .. } | Self::Notification { method, .. } => Some(method),
            Self::Response { .. } => None,
        }
    }

    /// Serialize to the wire representation (one JSON object, no trailing newline).
    pub fn encode(&self) -> Result<Vec<u8>, McpError> {
        let value = self.to_json();
        serde_json::to_vec(&value).map_err(|e| McpError::Other(e.into()))
    }

    fn to_json(&self) -> Value {
        match self {
            Self::Request { id, method, params } => {
                let mut obj = serde_json::json!({
                    "jsonrpc": JSONRPC_VERSION,
                    "id": id,
                    "method": method,
                });
                if let Some(p) = params {
                    obj["params"] = p.clone();
                }
                obj
            }
            Self::Notification { method, params } => {
                let mut obj = serde_json::json!({
                    "jsonrpc": JSONRPC_VERSION,
                    "method": method,
                });
                if let Some(p) = params {
                    obj["params"] = p.clone();
                }
                obj
            }
            Self::Response { id, result, error } => {
                let mut obj = serde_json::json!({
                    "jsonrpc": JSONRPC_VERSION,
                    "id": id,
                });
                if let Some(r) = result {
                    obj["result"] = r.clone();
                } else if let Some(e) = error {
                    obj["error"] = serde_json::to_value(e).unwrap_or(Value::Null);
                }
                obj
            }
        }
    }

    /// Parse one complete JSON-RPC frame. Rejects anything missing
    /// `jsonrpc = "2.0"` or that mixes `result` and `error`.
    pub fn decode(bytes: &[u8]) -> Result<Self, McpError> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| McpError::ProtocolViolation(format!("invalid JSON: {e}")))?;
        Self::from_json(value)
    }

    pub fn from_json(value: Value) -> Result<Self, McpError> {
        let obj = value
            .as_object()
            .ok_or_else(|| McpError::ProtocolViolation("frame is not a JSON object".into()))?;

        match obj.get("jsonrpc").and_then(Value::as_str) {
            Some(JSONRPC_VERSION) => {}
            _ => {
                return Err(McpError::ProtocolViolation(
                    "missing or invalid 'jsonrpc' field".into(),
                ))
            }
        }

        let id = obj.get("id").cloned();
        let has_result = obj.contains_key("result");
        let has_error = obj.contains_key("error");

        if has_result && has_error {
            return Err(McpError::ProtocolViolation(
                "frame carries both 'result' and 'error'".into(),
            ));
        }

        if has_result || has_error {
            let id = id
                .ok_or_else(|| McpError::ProtocolViolation("response missing 'id'".into()))
                .and_then(|v| {
                    serde_json::from_value(v)
                        .map_err(|e| McpError::ProtocolViolation(format!("invalid id: {e}")))
                })?;
            let result = obj.get("result").cloned();
            let error = match obj.get("error") {
                Some(v) => Some(
                    serde_json::from_value(v.clone())
                        .map_err(|e| McpError::ProtocolViolation(format!("invalid error: {e}")))?,
                ),
                None => None,
            };
            return Ok(Self::Response { id, result, error });
        }

        let method = obj
            .get("method")
            .and_then(Value::as_str)
            .ok_or_else(|| McpError::ProtocolViolation("missing 'method'".into()))?
            .to_string();
        let params = obj.get("params").cloned();

        match id {
            Some(id_value) => {
                let id = serde_json::from_value(id_value)
                    .map_err(|e| McpError::ProtocolViolation(format!("invalid id: {e}")))?;
                Ok(Self::Request { id, method, params })
            }
            None => Ok(Self::Notification { method, params }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_request() {
        let msg = Message::request(RequestId::Number(1), "ping", None);
        let bytes = msg.encode().unwrap();
        let decoded = Message::decode(&bytes).unwrap();
        assert_eq!(decoded.id(), Some(&RequestId::Number(1)));
        assert_eq!(decoded.method(), Some("ping"));
    }

    #[test]
    fn notification_has_no_id() {
        let msg = Message::notification("notifications/initialized", None);
        assert!(msg.id().is_none());
        let bytes = msg.encode().unwrap();
        let v: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(!v.as_object().unwrap().contains_key("id"));
    }

    #[test]
    fn rejects_missing_jsonrpc_field() {
        let bad = serde_json::json!({"id": 1, "method": "ping"});
        let bytes = serde_json::to_vec(&bad).unwrap();
        let err = Message::decode(&bytes).unwrap_err();
        assert!(matches!(err, McpError::ProtocolViolation(_)));
    }

    #[test]
    fn rejects_response_with_both_result_and_error() {
        let bad = serde_json::json!({
            "jsonrpc": "2.0", "id": 1, "result": 1, "error": {"code": -1, "message": "x"}
        });
        let bytes = serde_json::to_vec(&bad).unwrap();
        let err = Message::decode(&bytes).unwrap_err();
        assert!(matches!(err, McpError::ProtocolViolation(_)));
    }

    #[test]
    fn accepts_string_request_ids() {
        let raw = serde_json::json!({"jsonrpc":"2.0","id":"abc","method":"ping"});
        let msg = Message::from_json(raw).unwrap();
        assert_eq!(msg.id(), Some(&RequestId::String("abc".into())));
    }
}
