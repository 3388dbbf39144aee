//! The connection registry (§4.7): one `Manager` per host process, owning a
//! name-keyed table of connections and the shared event bus they publish to.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::config::ServerInfo;
use crate::connection::{self, ConnectionHandle};
use crate::error::McpError;
use crate::events::{EventBus, ManagerEvent};
use crate::record::ConnectionRecord;
use crate::sampling::{RootsProvider, SamplingHandler};

const DEFAULT_DISPOSE_GRACE: Duration = Duration::from_secs(5);

struct ManagerInner {
    connections: RwLock<HashMap<String, ConnectionHandle>>,
    events: Arc<EventBus>,
    next_conn_id: AtomicU64,
    sampling_handler: Option<Arc<dyn SamplingHandler>>,
    roots_provider: Option<Arc<dyn RootsProvider>>,
}

/// Owns every active MCP server connection for one host process.
#[derive(Clone)]
pub struct Manager {
    inner: Arc<ManagerInner>,
}

impl Manager {
    pub fn new() -> Self {
        Self::with_handlers(None, None)
    }

    pub fn with_handlers(
        sampling_handler: Option<Arc<dyn SamplingHandler>>,
        roots_provider: Option<Arc<dyn RootsProvider>>,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                connections: RwLock::new(HashMap::new()),
                events: EventBus::new(),
                next_conn_id: AtomicU64::new(1),
                sampling_handler,
                roots_provider,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ManagerEvent> {
        self.inner.events.subscribe()
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        self.inner.events.clone()
    }

    /// Start a new connection under `server_info.name`. Fails if a
    /// connection with that name is already registered.
    pub async fn connect(&self, server_info: ServerInfo) -> Result<ConnectionHandle, McpError> {
        let name = server_info.name.clone();
        {
            let connections = self.inner.connections.read().unwrap();
            if connections.contains_key(&name) {
                return Err(McpError::AlreadyExists(name));
            }
        }

        let seq = self.inner.next_conn_id.fetch_add(1, Ordering::Relaxed);
        let id = format!("{name}-{seq}");
        let handle = connection::spawn(
            id,
            server_info,
            self.inner.events.clone(),
            self.inner.sampling_handler.clone(),
            self.inner.roots_provider.clone(),
        );

        self.inner
            .connections
            .write()
            .unwrap()
            .insert(name.clone(), handle.clone());
        info!(server = %name, "mcp connection registered");
        Ok(handle)
    }

    /// Tear down and forget the named connection.
    pub async fn disconnect(&self, name: &str) -> Result<(), McpError> {
        let handle = self
            .inner
            .connections
            .write()
            .unwrap()
            .remove(name)
            .ok_or_else(|| McpError::NotFound(name.to_string()))?;
        handle.close().await;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<ConnectionHandle> {
        self.inner.connections.read().unwrap().get(name).cloned()
    }

    pub fn list(&self) -> Vec<ConnectionRecord> {
        self.inner
            .connections
            .read()
            .unwrap()
            .values()
            .map(|h| h.snapshot())
            .collect()
    }

    /// Close every connection, giving each up to `grace` to finish in-flight
    /// sends before moving on. Defaults to 5 seconds.
    pub async fn dispose(&self) {
        self.dispose_with_grace(DEFAULT_DISPOSE_GRACE).await
    }

    pub async fn dispose_with_grace(&self, grace: Duration) {
        let handles: Vec<ConnectionHandle> = {
            let mut connections = self.inner.connections.write().unwrap();
            connections.drain().map(|(_, h)| h).collect()
        };

        let closes = handles.iter().map(|h| h.close());
        if timeout(grace, futures_util::future::join_all(closes)).await.is_err() {
            warn!(grace_ms = grace.as_millis(), "manager dispose exceeded grace period");
        }
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}
