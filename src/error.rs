//! Error taxonomy for the MCP integration core.
//!
//! `McpError` is the structured type returned by every public async method.
//! Internal setup code (reading config, parsing a URL, spawning a process)
//! uses `anyhow::Result` and is mapped into a variant here at the boundary
//! where the error becomes visible to a caller or driver loop.

use serde_json::Value;
use thiserror::Error;

/// Sub-kind of a transport-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Unreachable,
    Handshake,
    Io,
    Closed,
    /// Framing or decode failure: the peer sent bytes that do not parse as a
    /// well-formed frame under the transport's wire convention. Three in a
    /// row on one connection is treated as a server bug (§7).
    ProtocolViolation,
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unreachable => "unreachable",
            Self::Handshake => "handshake",
            Self::Io => "io",
            Self::Closed => "closed",
            Self::ProtocolViolation => "protocol_violation",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Error)]
pub enum McpError {
    #[error("transport error ({kind}): {detail}")]
    Transport {
        kind: TransportErrorKind,
        detail: String,
    },

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("frame exceeds maximum size of {limit} bytes")]
    FrameTooLarge { limit: usize },

    #[error("initialize failed: {0}")]
    InitFailed(String),

    #[error("connection is not ready")]
    NotReady,

    #[error("server does not advertise capability '{0}'")]
    CapabilityUnsupported(String),

    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("request timed out")]
    Timeout,

    #[error("request was cancelled")]
    Cancelled,

    #[error("connection is disconnected")]
    Disconnected,

    #[error("connection was lost while this call was in flight")]
    DisconnectedDuringCall,

    #[error("outbound queue overflowed")]
    QueueOverflow,

    #[error("the SSE server did not advertise a companion send endpoint")]
    TransportUnidirectional,

    #[error("server returned error {code}: {message}")]
    RemoteError {
        code: i64,
        message: String,
        data: Option<Value>,
    },

    #[error("a connection named '{0}' already exists")]
    AlreadyExists(String),

    #[error("no connection named '{0}'")]
    NotFound(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl McpError {
    /// Whether the connection should survive this error (vs. move to `Closed`).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            McpError::Transport {
                kind: TransportErrorKind::Io | TransportErrorKind::Closed,
                ..
            }
        )
    }
}

/// Standard JSON-RPC 2.0 error codes (§6).
pub mod code {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
    /// Start of the server-defined error range (`-32000..-32099`).
    pub const SERVER_ERROR_RANGE_START: i64 = -32099;
    pub const SERVER_ERROR_RANGE_END: i64 = -32000;
}
