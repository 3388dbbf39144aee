//! Request correlator (§4.3): allocates ids, parks in-flight calls, and
//! routes responses back to their caller by id.
//!
//! Owned exclusively by one connection's driver task — never shared across
//! connections, never locked across a suspension point.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::warn;

use crate::error::McpError;
use crate::message::{RequestId, RpcError};

/// A read-only operation is safe to silently re-send with a fresh id after
/// reconnect; a non-idempotent one must fail the caller instead (§4.6).
pub fn is_idempotent_method(method: &str) -> bool {
    matches!(
        method,
        "ping"
            | "tools/list"
            | "resources/list"
            | "resources/read"
            | "prompts/list"
            | "prompts/get"
            | "roots/list"
    )
}

pub struct PendingCall {
    pub method: String,
    pub params: Option<Value>,
    resolver: oneshot::Sender<Result<serde_json::Value, McpError>>,
}

/// Tracks in-flight requests for one connection.
pub struct Correlator {
    next_id: AtomicU64,
    pending: HashMap<u64, PendingCall>,
}

impl Correlator {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            pending: HashMap::new(),
        }
    }

    pub fn alloc_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Register a pending call, returning the receiver half that the caller
    /// awaits for resolution.
    pub fn register(
        &mut self,
        id: u64,
        method: impl Into<String>,
        params: Option<Value>,
    ) -> oneshot::Receiver<Result<serde_json::Value, McpError>> {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(
            id,
            PendingCall {
                method: method.into(),
                params,
                resolver: tx,
            },
        );
        rx
    }

    /// Re-register a `PendingCall` taken from `drain_for_disconnect` under a
    /// freshly allocated id, after the underlying message has been re-sent.
    pub fn reinsert(&mut self, id: u64, call: PendingCall) {
        self.pending.insert(id, call);
    }

    pub fn take(&mut self, id: u64) -> Option<PendingCall> {
        self.pending.remove(&id)
    }

    pub fn contains(&self, id: u64) -> bool {
        self.pending.contains_key(&id)
    }

    /// Resolve (or fail) a pending call by numeric id directly — used for
    /// deadline/cancellation outcomes that don't arrive as wire frames.
    /// Returns whether a call was actually pending (false if it already
    /// resolved via a normal response).
    pub fn complete(&mut self, id: u64, result: Result<Value, McpError>) -> bool {
        match self.pending.remove(&id) {
            Some(call) => {
                let _ = call.resolver.send(result);
                true
            }
            None => false,
        }
    }

    /// Resolve a pending call with a successful result. Returns `false` if
    /// `id` matched no pending call — a duplicate-id response, which the
    /// driver treats as a protocol violation (§4.3).
    pub fn resolve(&mut self, id: &RequestId, result: serde_json::Value) -> bool {
        if let Some(numeric) = numeric_id(id) {
            if let Some(call) = self.pending.remove(&numeric) {
                let _ = call.resolver.send(Ok(result));
                return true;
            }
        }
        warn!(id = %id, "response id does not match any pending call — dropped");
        false
    }

    /// Resolve a pending call with a server-reported error. Returns `false`
    /// on the same orphaned-id condition `resolve` does.
    pub fn reject(&mut self, id: &RequestId, error: RpcError) -> bool {
        if let Some(numeric) = numeric_id(id) {
            if let Some(call) = self.pending.remove(&numeric) {
                let _ = call.resolver.send(Err(McpError::RemoteError {
                    code: error.code,
                    message: error.message,
                    data: error.data,
                }));
                return true;
            }
        }
        warn!(id = %id, "error response id does not match any pending call — dropped");
        false
    }

    /// Fail every pending call with the same error (connection closed/reset).
    pub fn fail_all(&mut self, make_err: impl Fn() -> McpError) {
        for (_, call) in self.pending.drain() {
            let _ = call.resolver.send(Err(make_err()));
        }
    }

    /// Drain all pending calls whose method is idempotent, for requeueing
    /// under a fresh id; non-idempotent ones are failed immediately with
    /// `DisconnectedDuringCall`.
    pub fn drain_for_disconnect(&mut self) -> Vec<(u64, PendingCall)> {
        let mut requeue = Vec::new();
        let ids: Vec<u64> = self.pending.keys().copied().collect();
        for id in ids {
            let method_is_idempotent = self
                .pending
                .get(&id)
                .map(|c| is_idempotent_method(&c.method))
                .unwrap_or(false);
            if method_is_idempotent {
                if let Some(call) = self.pending.remove(&id) {
                    requeue.push((id, call));
                }
            } else if let Some(call) = self.pending.remove(&id) {
                let _ = call.resolver.send(Err(McpError::DisconnectedDuringCall));
            }
        }
        requeue
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

fn numeric_id(id: &RequestId) -> Option<u64> {
    match id {
        RequestId::Number(n) if *n >= 0 => Some(*n as u64),
        RequestId::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_matching_id_only() {
        let mut correlator = Correlator::new();
        let id_a = correlator.alloc_id();
        let rx_a = correlator.register(id_a, "tools/list", None);
        let id_b = correlator.alloc_id();
        let rx_b = correlator.register(id_b, "ping", None);

        correlator.resolve(&RequestId::Number(id_a as i64), serde_json::json!({"ok": true}));

        let result_a = rx_a.await.unwrap();
        assert!(result_a.unwrap()["ok"].as_bool().unwrap());
        assert!(correlator.contains(id_b));
    }

    #[tokio::test]
    async fn non_idempotent_calls_fail_immediately_on_disconnect() {
        let mut correlator = Correlator::new();
        let id = correlator.alloc_id();
        let rx = correlator.register(id, "tools/call", None);

        let requeue = correlator.drain_for_disconnect();
        assert!(requeue.is_empty());
        let err = rx.await.unwrap().unwrap_err();
        assert!(matches!(err, McpError::DisconnectedDuringCall));
    }

    #[tokio::test]
    async fn idempotent_calls_are_returned_for_requeue() {
        let mut correlator = Correlator::new();
        let id = correlator.alloc_id();
        let _rx = correlator.register(id, "resources/read", None);

        let requeue = correlator.drain_for_disconnect();
        assert_eq!(requeue.len(), 1);
        assert_eq!(requeue[0].1.method, "resources/read");
    }
}
