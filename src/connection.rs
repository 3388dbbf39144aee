//! The per-connection state machine (§4.4) and its driver task.
//!
//! One driver task owns exactly one [`Transport`], one [`Correlator`], and
//! one [`OutboundQueue`]; the host only ever talks to it through a
//! [`ConnectionHandle`] and a bounded command channel, matching the "no
//! business logic holds a lock across a suspension point" rule in §5.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::backoff::{backoff_sleep, BackoffConfig};
use crate::cancel::CancelSignal;
use crate::capabilities::{Capabilities, ClientCapabilities};
use crate::config::ServerInfo;
use crate::correlator::Correlator;
use crate::error::{code, McpError, TransportErrorKind};
use crate::events::{EventBus, ManagerEventKind};
use crate::message::{Message, RequestId, RpcError};
use crate::queue::{OutboundQueue, Priority};
use crate::record::{ConnectionRecord, ConnectionStatus};
use crate::sampling::{RootsProvider, SamplingHandler};
use crate::transport::{self, TransportEvent, TransportHandle};

const COMMAND_CHANNEL_CAPACITY: usize = 256;

fn is_control_method(method: &str) -> bool {
    matches!(
        method,
        "initialize" | "ping" | "notifications/initialized" | "notifications/cancelled"
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FsmState {
    Idle,
    Connecting,
    Initializing,
    Ready,
    Degraded,
    Reconnecting,
    Closed,
}

impl From<FsmState> for ConnectionStatus {
    fn from(s: FsmState) -> Self {
        match s {
            FsmState::Idle | FsmState::Connecting => ConnectionStatus::Connecting,
            FsmState::Initializing => ConnectionStatus::Initializing,
            FsmState::Ready => ConnectionStatus::Connected,
            FsmState::Degraded => ConnectionStatus::Degraded,
            FsmState::Reconnecting => ConnectionStatus::Reconnecting,
            FsmState::Closed => ConnectionStatus::Closed,
        }
    }
}

/// Options governing one `request()` call.
#[derive(Clone)]
pub struct CallOptions {
    pub timeout: Duration,
    pub cancel: CancelSignal,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            cancel: CancelSignal::new(),
        }
    }
}

enum DriverCommand {
    Request {
        method: String,
        params: Option<Value>,
        timeout: Duration,
        cancel: CancelSignal,
        resp_tx: oneshot::Sender<Result<Value, McpError>>,
    },
    Notify {
        method: String,
        params: Option<Value>,
    },
    CallTimedOut {
        id: u64,
    },
    CallCancelled {
        id: u64,
    },
    HeartbeatResult {
        ok: bool,
    },
    Shutdown,
}

/// The host-facing side of one connection. Cheap to clone; every clone
/// shares the same driver task.
#[derive(Clone)]
pub struct ConnectionHandle {
    cmd_tx: mpsc::Sender<DriverCommand>,
    record: Arc<RwLock<ConnectionRecord>>,
}

impl ConnectionHandle {
    pub async fn request(
        &self,
        method: &str,
        params: Option<Value>,
        opts: CallOptions,
    ) -> Result<Value, McpError> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.cmd_tx
            .send(DriverCommand::Request {
                method: method.to_string(),
                params,
                timeout: opts.timeout,
                cancel: opts.cancel,
                resp_tx,
            })
            .await
            .map_err(|_| McpError::Disconnected)?;
        resp_rx.await.map_err(|_| McpError::Disconnected)?
    }

    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), McpError> {
        self.cmd_tx
            .send(DriverCommand::Notify {
                method: method.to_string(),
                params,
            })
            .await
            .map_err(|_| McpError::Disconnected)
    }

    pub fn status(&self) -> ConnectionStatus {
        self.record.read().unwrap().status
    }

    pub fn capabilities(&self) -> Option<Capabilities> {
        self.record.read().unwrap().capabilities.clone()
    }

    pub fn snapshot(&self) -> ConnectionRecord {
        self.record.read().unwrap().clone()
    }

    /// Tear the connection down for good; the driver task exits afterward.
    pub async fn close(&self) {
        let _ = self.cmd_tx.send(DriverCommand::Shutdown).await;
    }
}

/// Spawn a connection's driver task and return the handle the host keeps.
pub fn spawn(
    id: String,
    server_info: ServerInfo,
    events: Arc<EventBus>,
    sampling_handler: Option<Arc<dyn SamplingHandler>>,
    roots_provider: Option<Arc<dyn RootsProvider>>,
) -> ConnectionHandle {
    let record = Arc::new(RwLock::new(ConnectionRecord::new(id.clone(), server_info.clone())));
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
    let queue = OutboundQueue::new(server_info.queue_max_size);

    let driver = Driver {
        id,
        server_info,
        state: FsmState::Idle,
        correlator: Correlator::new(),
        queue,
        transport: None,
        attempt: 0,
        consecutive_heartbeat_failures: 0,
        consecutive_protocol_violations: 0,
        cmd_rx,
        self_cmd_tx: cmd_tx.clone(),
        record: record.clone(),
        events,
        sampling_handler,
        roots_provider,
    };

    tokio::spawn(driver.run());

    ConnectionHandle { cmd_tx, record }
}

struct Driver {
    id: String,
    server_info: ServerInfo,
    state: FsmState,
    correlator: Correlator,
    queue: OutboundQueue,
    transport: Option<TransportHandle>,
    attempt: u32,
    consecutive_heartbeat_failures: u32,
    consecutive_protocol_violations: u32,
    cmd_rx: mpsc::Receiver<DriverCommand>,
    self_cmd_tx: mpsc::Sender<DriverCommand>,
    record: Arc<RwLock<ConnectionRecord>>,
    events: Arc<EventBus>,
    sampling_handler: Option<Arc<dyn SamplingHandler>>,
    roots_provider: Option<Arc<dyn RootsProvider>>,
}

impl Driver {
    async fn run(mut self) {
        loop {
            match self.state {
                FsmState::Idle => self.transition(FsmState::Connecting),
                FsmState::Connecting => self.phase_connecting().await,
                FsmState::Initializing => self.phase_initializing().await,
                FsmState::Ready | FsmState::Degraded => self.phase_ready().await,
                FsmState::Reconnecting => self.phase_reconnecting().await,
                FsmState::Closed => break,
            }
        }

        self.correlator.fail_all(|| McpError::Disconnected);
        if let Some(mut handle) = self.transport.take() {
            handle.sink.close("connection disposed").await;
        }
        debug!(server = %self.server_info.name, id = %self.id, "connection driver task exiting");
    }

    fn transition(&mut self, next: FsmState) {
        debug!(server = %self.server_info.name, from = ?self.state, to = ?next, "connection state transition");
        self.state = next;
        let mut record = self.record.write().unwrap();
        record.status = next.into();
        record.touch();
    }

    fn emit(&self, kind: ManagerEventKind, last_error: Option<String>, detail: Option<String>) {
        self.events.emit(
            kind,
            self.server_info.name.clone(),
            Some(self.record.read().unwrap().status),
            last_error,
            detail,
        );
    }

    fn set_last_error(&self, message: impl Into<String>) {
        self.record.write().unwrap().last_error = Some(message.into());
    }

    /// Drain any commands already queued without blocking, so host calls made
    /// while we're connecting/reconnecting still land in the outbound queue.
    async fn drain_pending_cmds_nonblocking(&mut self) {
        while let Ok(cmd) = self.cmd_rx.try_recv() {
            self.handle_cmd(cmd).await;
        }
    }

    // ---- Connecting -------------------------------------------------

    async fn phase_connecting(&mut self) {
        self.drain_pending_cmds_nonblocking().await;
        self.emit(ManagerEventKind::ConnectionEstablishing, None, None);

        match transport::open(&self.server_info).await {
            Ok(handle) => {
                self.transport = Some(handle);
                self.transition(FsmState::Initializing);
            }
            Err(e) => {
                warn!(server = %self.server_info.name, error = %e, "connect failed");
                self.set_last_error(e.to_string());
                self.after_disconnect(Some(e.to_string())).await;
            }
        }
    }

    // ---- Initializing -------------------------------------------------

    async fn phase_initializing(&mut self) {
        self.drain_pending_cmds_nonblocking().await;

        let client_caps = ClientCapabilities {
            roots: self.roots_provider.as_ref().map(|_| Default::default()),
            sampling: self.sampling_handler.as_ref().map(|_| Default::default()),
        };
        let params = json!({
            "protocolVersion": crate::message::MCP_PROTOCOL_VERSION,
            "capabilities": client_caps,
            "clientInfo": { "name": "mcp_core", "version": env!("CARGO_PKG_VERSION") },
        });

        let deadline = Duration::from_millis(self.server_info.timeout_ms);
        let result = self
            .call_and_wait("initialize".to_string(), Some(params), deadline)
            .await;

        match result {
            Ok(value) => {
                let capabilities = value
                    .get("capabilities")
                    .map(Capabilities::from_value)
                    .unwrap_or_default();
                {
                    let mut record = self.record.write().unwrap();
                    record.capabilities = Some(capabilities);
                    record.last_error = None;
                }
                // Best-effort; the server doesn't reply to this one.
                let _ = self
                    .send_now(Message::notification("notifications/initialized", None))
                    .await;

                self.attempt = 0;
                self.consecutive_heartbeat_failures = 0;
                info!(server = %self.server_info.name, "mcp connection initialized");
                self.transition(FsmState::Ready);
                self.emit(ManagerEventKind::ConnectionEstablished, None, None);
            }
            Err(e) => {
                warn!(server = %self.server_info.name, error = %e, "initialize failed");
                self.set_last_error(e.to_string());
                self.emit(
                    ManagerEventKind::ConnectionFailed,
                    Some(e.to_string()),
                    Some("initialize failed".into()),
                );
                // §4.4: an initialize failure always closes the connection,
                // independent of the reconnect policy.
                self.correlator.fail_all(|| McpError::InitFailed(e.to_string()));
                self.transition(FsmState::Closed);
            }
        }
    }

    /// Send `method` and block this phase (while still draining `cmd_rx` so
    /// concurrent host calls get queued) until it resolves or times out.
    async fn call_and_wait(
        &mut self,
        method: String,
        params: Option<Value>,
        deadline: Duration,
    ) -> Result<Value, McpError> {
        let id = self.correlator.alloc_id();
        let rx = self.correlator.register(id, method.clone(), params.clone());
        let msg = Message::request(id.into(), method, params);
        self.enqueue_and_maybe_flush(msg, Priority::Control).await;

        let deadline_at = Instant::now() + deadline;
        tokio::pin!(rx);
        loop {
            tokio::select! {
                result = &mut rx => {
                    return result.unwrap_or(Err(McpError::Disconnected));
                }
                _ = tokio::time::sleep_until(deadline_at) => {
                    self.correlator.complete(id, Err(McpError::Timeout));
                    return Err(McpError::Timeout);
                }
                maybe_cmd = self.cmd_rx.recv() => {
                    match maybe_cmd {
                        Some(cmd) => self.handle_cmd(cmd).await,
                        None => return Err(McpError::Disconnected),
                    }
                }
                maybe_event = recv_transport_event(&mut self.transport) => {
                    match maybe_event {
                        Some(event) => self.handle_transport_event(event).await,
                        None => return Err(McpError::Disconnected),
                    }
                }
            }
        }
    }

    // ---- Ready / Degraded -------------------------------------------------

    async fn phase_ready(&mut self) {
        self.flush_queue().await;

        let heartbeat_period = Duration::from_millis(self.server_info.heartbeat_ms);
        let mut ticker = tokio::time::interval(heartbeat_period);
        ticker.tick().await; // consume the immediate first tick

        loop {
            if !matches!(self.state, FsmState::Ready | FsmState::Degraded) {
                return;
            }

            tokio::select! {
                maybe_cmd = self.cmd_rx.recv() => {
                    match maybe_cmd {
                        Some(cmd) => {
                            self.handle_cmd(cmd).await;
                            self.flush_queue().await;
                        }
                        None => { self.transition(FsmState::Closed); return; }
                    }
                }
                maybe_event = recv_transport_event(&mut self.transport) => {
                    match maybe_event {
                        Some(event) => self.handle_transport_event(event).await,
                        None => {
                            self.after_disconnect(Some("transport closed".into())).await;
                            return;
                        }
                    }
                }
                _ = ticker.tick() => {
                    self.send_heartbeat().await;
                }
            }
        }
    }

    async fn send_heartbeat(&mut self) {
        let id = self.correlator.alloc_id();
        let rx = self.correlator.register(id, "ping", None);
        let msg = Message::request(id.into(), "ping", None);
        self.enqueue_and_maybe_flush(msg, Priority::Control).await;

        let self_tx = self.self_cmd_tx.clone();
        let timeout = Duration::from_millis(self.server_info.heartbeat_timeout_ms);
        tokio::spawn(async move {
            let ok = matches!(tokio::time::timeout(timeout, rx).await, Ok(Ok(Ok(_))));
            let _ = self_tx.send(DriverCommand::HeartbeatResult { ok }).await;
        });
    }

    async fn handle_heartbeat_result(&mut self, ok: bool) {
        if ok {
            self.consecutive_heartbeat_failures = 0;
            if self.state == FsmState::Degraded {
                self.transition(FsmState::Ready);
                self.emit(ManagerEventKind::ConnectionEstablished, None, Some("heartbeat recovered".into()));
            }
            return;
        }

        self.consecutive_heartbeat_failures += 1;
        warn!(
            server = %self.server_info.name,
            failures = self.consecutive_heartbeat_failures,
            "heartbeat ping failed"
        );

        if self.consecutive_heartbeat_failures >= 3 {
            self.set_last_error("heartbeat failed 3 times consecutively");
            self.after_disconnect(Some("heartbeat timeout".into())).await;
        } else if self.consecutive_heartbeat_failures >= 2 && self.state == FsmState::Ready {
            self.transition(FsmState::Degraded);
            self.emit(
                ManagerEventKind::ConnectionDegraded,
                Some("heartbeat degraded".into()),
                None,
            );
        }
    }

    /// Count one protocol violation toward the consecutive-failure threshold,
    /// closing the connection once it hits 3 (§7). Resets to 0 on any clean
    /// frame; see `handle_transport_event`'s `Frame` arm.
    async fn register_protocol_violation(&mut self, detail: String) {
        self.consecutive_protocol_violations += 1;
        if self.consecutive_protocol_violations >= 3 {
            warn!(
                server = %self.server_info.name,
                count = self.consecutive_protocol_violations,
                "three consecutive protocol violations, closing connection"
            );
            self.force_close_on_protocol_violation(detail).await;
        }
    }

    /// Three consecutive protocol violations on one connection are a server
    /// bug (§7), not a transient transport hiccup: close unconditionally,
    /// independent of reconnect policy.
    async fn force_close_on_protocol_violation(&mut self, detail: String) {
        if let Some(mut handle) = self.transport.take() {
            handle.sink.close("protocol violation").await;
        }
        self.correlator.fail_all(|| {
            McpError::ProtocolViolation("connection closed after repeated protocol violations".into())
        });
        self.emit(
            ManagerEventKind::ConnectionFailed,
            Some(detail),
            Some("repeated protocol violations".into()),
        );
        self.transition(FsmState::Closed);
    }

    // ---- Reconnecting -------------------------------------------------

    async fn after_disconnect(&mut self, reason: Option<String>) {
        if let Some(mut handle) = self.transport.take() {
            handle.sink.close(reason.as_deref().unwrap_or("disconnected")).await;
        }

        let requeue = self.correlator.drain_for_disconnect();
        for (_old_id, call) in requeue {
            let new_id = self.correlator.alloc_id();
            let msg = Message::request(new_id.into(), call.method.clone(), call.params.clone());
            self.correlator.reinsert(new_id, call);
            self.queue.push_front_control(msg);
        }

        let max_retries = self.server_info.max_retries;
        let exhausted = max_retries.map(|max| self.attempt >= max).unwrap_or(false);

        if !self.server_info.reconnect || exhausted {
            self.correlator.fail_all(|| McpError::Disconnected);
            self.emit(ManagerEventKind::ConnectionFailed, reason, Some("giving up".into()));
            self.transition(FsmState::Closed);
        } else {
            self.emit(ManagerEventKind::ConnectionFailed, reason, Some("will retry".into()));
            self.transition(FsmState::Reconnecting);
        }
    }

    async fn phase_reconnecting(&mut self) {
        let config = BackoffConfig {
            base_ms: self.server_info.reconnect_base_ms,
            cap_ms: self.server_info.reconnect_cap_ms,
            ..BackoffConfig::default()
        };

        tokio::select! {
            _ = backoff_sleep(self.attempt, &config) => {}
            _ = self.drain_cmds_forever() => {}
        }

        self.attempt += 1;
        self.transition(FsmState::Connecting);
    }

    /// Keeps draining (and queueing) host commands indefinitely; used as the
    /// "other" branch of a `select!` so backoff sleeps don't block queueing.
    /// Never returns on its own — only cancelled by the sibling branch.
    async fn drain_cmds_forever(&mut self) -> std::convert::Infallible {
        loop {
            if let Some(cmd) = self.cmd_rx.recv().await {
                self.handle_cmd(cmd).await;
            } else {
                std::future::pending::<()>().await;
            }
        }
    }

    // ---- Shared plumbing -------------------------------------------------

    async fn handle_cmd(&mut self, cmd: DriverCommand) {
        match cmd {
            DriverCommand::Request {
                method,
                params,
                timeout,
                cancel,
                resp_tx,
            } => self.handle_request_cmd(method, params, timeout, cancel, resp_tx),
            DriverCommand::Notify { method, params } => {
                let priority = if is_control_method(&method) {
                    Priority::Control
                } else {
                    Priority::User
                };
                let msg = Message::notification(method, params);
                self.queue.push(msg, priority);
            }
            DriverCommand::CallTimedOut { id } => {
                if self.correlator.complete(id, Err(McpError::Timeout)) {
                    self.best_effort_cancel_notice(id);
                }
            }
            DriverCommand::CallCancelled { id } => {
                if self.correlator.complete(id, Err(McpError::Cancelled)) {
                    self.best_effort_cancel_notice(id);
                }
            }
            DriverCommand::HeartbeatResult { ok } => self.handle_heartbeat_result(ok).await,
            DriverCommand::Shutdown => {
                self.correlator.fail_all(|| McpError::Disconnected);
                self.transition(FsmState::Closed);
            }
        }
    }

    fn best_effort_cancel_notice(&mut self, id: u64) {
        let notice = Message::notification(
            "notifications/cancelled",
            Some(json!({ "requestId": id })),
        );
        self.queue.push(notice, Priority::Control);
    }

    fn handle_request_cmd(
        &mut self,
        method: String,
        params: Option<Value>,
        timeout: Duration,
        cancel: CancelSignal,
        resp_tx: oneshot::Sender<Result<Value, McpError>>,
    ) {
        if matches!(self.state, FsmState::Closed)
            || (matches!(self.state, FsmState::Initializing) && method != "initialize")
        {
            let _ = resp_tx.send(Err(McpError::NotReady));
            return;
        }

        let id = self.correlator.alloc_id();
        let rx = self.correlator.register(id, method.clone(), params.clone());
        let msg = Message::request(id.into(), method.clone(), params);
        let priority = if is_control_method(&method) {
            Priority::Control
        } else {
            Priority::User
        };
        if let Some(overflowed) = self.queue.push(msg, priority) {
            if let Some(RequestId::Number(n)) = overflowed.id {
                self.correlator.complete(n as u64, Err(McpError::QueueOverflow));
            }
        }

        let driver_tx = self.self_cmd_tx.clone();
        tokio::spawn(async move {
            let outcome = tokio::select! {
                result = rx => result.unwrap_or(Err(McpError::Disconnected)),
                _ = tokio::time::sleep(timeout) => {
                    let _ = driver_tx.send(DriverCommand::CallTimedOut { id }).await;
                    Err(McpError::Timeout)
                }
                _ = cancel.cancelled() => {
                    let _ = driver_tx.send(DriverCommand::CallCancelled { id }).await;
                    Err(McpError::Cancelled)
                }
            };
            let _ = resp_tx.send(outcome);
        });
    }

    async fn enqueue_and_maybe_flush(&mut self, message: Message, priority: Priority) {
        self.queue.push(message, priority);
        if matches!(self.state, FsmState::Ready | FsmState::Degraded) {
            self.flush_queue().await;
        }
    }

    async fn flush_queue(&mut self) {
        if self.transport.is_none() {
            return;
        }
        for queued in self.queue.drain() {
            if let Err(e) = self.send_now(queued.message).await {
                warn!(server = %self.server_info.name, error = %e, "send failed during flush");
                break;
            }
        }
    }

    async fn send_now(&mut self, message: Message) -> Result<(), McpError> {
        match &mut self.transport {
            Some(handle) => handle.sink.send(&message).await,
            None => Err(McpError::Disconnected),
        }
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {}
            TransportEvent::Frame(message) => {
                self.consecutive_protocol_violations = 0;
                self.handle_frame(message).await;
            }
            TransportEvent::Error { kind, detail } => {
                warn!(server = %self.server_info.name, ?kind, detail, "transport error");
                self.set_last_error(detail.clone());
                if matches!(kind, TransportErrorKind::ProtocolViolation) {
                    self.register_protocol_violation(detail).await;
                } else {
                    self.consecutive_protocol_violations = 0;
                    if matches!(kind, TransportErrorKind::Closed) {
                        self.after_disconnect(Some(detail)).await;
                    }
                }
            }
            TransportEvent::Closed { reason } => {
                self.after_disconnect(Some(reason)).await;
            }
        }
        self.record.write().unwrap().touch();
    }

    async fn handle_frame(&mut self, message: Message) {
        match message {
            Message::Response { id, result, error } => {
                let matched = if let Some(result) = result {
                    let mut result = result;
                    if self.server_info.trust == crate::config::TrustLevel::Untrusted {
                        crate::sanitize::sanitize_value(&mut result, &self.server_info.name);
                    }
                    self.correlator.resolve(&id, result)
                } else if let Some(error) = error {
                    self.correlator.reject(&id, error)
                } else {
                    self.correlator.resolve(&id, Value::Null)
                };
                if !matched {
                    // A response to an id we have no record of — most often a
                    // duplicate id a buggy server sent twice on the wire,
                    // since the first response already consumed the slot.
                    self.register_protocol_violation(format!("unmatched response id {id}")).await;
                }
            }
            Message::Request { id, method, params } => {
                self.handle_server_request(id, method, params).await;
            }
            Message::Notification { method, params } => {
                if is_capability_changed_notification(&method) {
                    debug!(server = %self.server_info.name, method, "capability-change notification, invalidating catalog");
                    self.emit(ManagerEventKind::CapabilityChanged, None, Some(method));
                } else {
                    debug!(server = %self.server_info.name, method, ?params, "server notification (no registered handler)");
                }
            }
        }
    }

    async fn handle_server_request(&mut self, id: RequestId, method: String, params: Option<Value>) {
        let result = match method.as_str() {
            "sampling/createMessage" => match &self.sampling_handler {
                Some(handler) => handler.create_message(params.unwrap_or(Value::Null)).await,
                None => Err(McpError::CapabilityUnsupported("sampling".into())),
            },
            "roots/list" => {
                if self.server_info.strict_roots {
                    Err(McpError::MethodNotFound(
                        "roots/list rejected: strict_roots enabled".into(),
                    ))
                } else {
                    match &self.roots_provider {
                        Some(provider) => provider.list_roots().await,
                        None => Err(McpError::CapabilityUnsupported("roots".into())),
                    }
                }
            }
            "ping" => Ok(Value::Null),
            other => Err(McpError::MethodNotFound(other.to_string())),
        };

        let reply = match result {
            Ok(value) => Message::ok(id, value),
            Err(e) => Message::err(id, rpc_error_from(&e)),
        };
        let _ = self.send_now(reply).await;
    }
}

/// True for the standard MCP `notifications/{tools,resources,prompts}/list_changed`
/// family — a server telling us its capability list changed underneath us.
fn is_capability_changed_notification(method: &str) -> bool {
    matches!(
        method,
        "notifications/tools/list_changed"
            | "notifications/resources/list_changed"
            | "notifications/prompts/list_changed"
    )
}

fn rpc_error_from(e: &McpError) -> RpcError {
    match e {
        McpError::CapabilityUnsupported(_) | McpError::MethodNotFound(_) => {
            RpcError::new(code::METHOD_NOT_FOUND, e.to_string())
        }
        McpError::ProtocolViolation(_) => RpcError::new(code::INVALID_REQUEST, e.to_string()),
        _ => RpcError::new(code::INTERNAL_ERROR, e.to_string()),
    }
}

async fn recv_transport_event(transport: &mut Option<TransportHandle>) -> Option<TransportEvent> {
    match transport {
        Some(handle) => handle.events.recv().await,
        None => std::future::pending().await,
    }
}
