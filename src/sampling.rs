//! Host-registered handlers for server-initiated requests (§4.5).
//!
//! `sampling/createMessage` is the one case where the server calls back
//! into the client; the FSM dispatches it to a registered `SamplingHandler`
//! and sends its response back verbatim. `roots/list` is handled the same
//! way via `RootsProvider` when the server mirrors client-provided roots.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::McpError;

/// Implemented by the host to answer `sampling/createMessage` requests.
#[async_trait]
pub trait SamplingHandler: Send + Sync {
    async fn create_message(&self, params: Value) -> Result<Value, McpError>;
}

/// Implemented by the host to answer server-initiated `roots/list` requests.
#[async_trait]
pub trait RootsProvider: Send + Sync {
    async fn list_roots(&self) -> Result<Value, McpError>;
}
