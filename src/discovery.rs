//! Tool/resource/prompt discovery aggregator (§4.8).
//!
//! Subscribes to the Manager's event bus: on `connection:established` it
//! lists whatever the server's negotiated capabilities allow and namespaces
//! each entry as `{serverName}::{name}`; on `connection:closed` or
//! `connection:failed` it drops that server's entries; on
//! `capability:changed` (the server's own `list_changed` notification) it
//! re-lists that server, replacing its entries in place.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde_json::Value;
use tracing::warn;

use crate::events::ManagerEventKind;
use crate::manager::Manager;
use crate::protocol_ops;

const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Default)]
struct Catalog {
    tools: HashMap<String, Value>,
    resources: HashMap<String, Value>,
    prompts: HashMap<String, Value>,
}

/// A live index of every tool/resource/prompt across all connected servers.
pub struct DiscoveryAggregator {
    manager: Manager,
    catalog: RwLock<Catalog>,
}

impl DiscoveryAggregator {
    pub fn new(manager: Manager) -> Arc<Self> {
        Arc::new(Self {
            manager,
            catalog: RwLock::new(Catalog::default()),
        })
    }

    /// Spawn the background task that keeps the catalog current. The
    /// returned handle is not awaited by callers; the task runs for the
    /// lifetime of the process (or until the event bus sender is dropped).
    pub fn spawn(self: Arc<Self>) {
        let mut rx = self.manager.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => self.handle_event(event).await,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "discovery aggregator missed events, catalog may be stale");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
                }
            }
        });
    }

    async fn handle_event(&self, event: crate::events::ManagerEvent) {
        match event.kind {
            ManagerEventKind::ConnectionEstablished | ManagerEventKind::CapabilityChanged => {
                self.refresh(&event.server_name).await
            }
            ManagerEventKind::ConnectionClosed | ManagerEventKind::ConnectionFailed => {
                self.drop_server(&event.server_name);
            }
            _ => {}
        }
    }

    async fn refresh(&self, server_name: &str) {
        let Some(conn) = self.manager.get(server_name) else {
            return;
        };
        let caps = conn.capabilities().unwrap_or_default();

        if caps.has_tools() {
            match protocol_ops::tools_list(&conn, DISCOVERY_TIMEOUT).await {
                Ok(value) => self.index(server_name, "tools", value, &mut self.catalog.write().unwrap().tools),
                Err(e) => warn!(server = server_name, error = %e, "tools/list discovery failed"),
            }
        }
        if caps.has_resources() {
            match protocol_ops::resources_list(&conn, DISCOVERY_TIMEOUT).await {
                Ok(value) => {
                    self.index(server_name, "resources", value, &mut self.catalog.write().unwrap().resources)
                }
                Err(e) => warn!(server = server_name, error = %e, "resources/list discovery failed"),
            }
        }
        if caps.has_prompts() {
            match protocol_ops::prompts_list(&conn, DISCOVERY_TIMEOUT).await {
                Ok(value) => self.index(server_name, "prompts", value, &mut self.catalog.write().unwrap().prompts),
                Err(e) => warn!(server = server_name, error = %e, "prompts/list discovery failed"),
            }
        }
    }

    fn index(&self, server_name: &str, list_key: &str, value: Value, into: &mut HashMap<String, Value>) {
        let Some(items) = value.get(list_key).and_then(Value::as_array) else {
            return;
        };

        into.retain(|k, _| !k.starts_with(&format!("{server_name}::")));

        let mut seen_names = std::collections::HashSet::new();
        for item in items {
            let Some(name) = item.get("name").and_then(Value::as_str) else {
                continue;
            };
            if !seen_names.insert(name.to_string()) {
                self.manager.event_bus().emit(
                    ManagerEventKind::Warning,
                    server_name.to_string(),
                    None,
                    None,
                    Some(format!("duplicate {list_key} entry named '{name}'")),
                );
                continue;
            }
            let external_id = format!("{server_name}::{name}");
            into.insert(external_id, item.clone());
        }
    }

    fn drop_server(&self, server_name: &str) {
        let prefix = format!("{server_name}::");
        let mut catalog = self.catalog.write().unwrap();
        catalog.tools.retain(|k, _| !k.starts_with(&prefix));
        catalog.resources.retain(|k, _| !k.starts_with(&prefix));
        catalog.prompts.retain(|k, _| !k.starts_with(&prefix));
    }

    pub fn tools(&self) -> HashMap<String, Value> {
        self.catalog.read().unwrap().tools.clone()
    }

    pub fn resources(&self) -> HashMap<String, Value> {
        self.catalog.read().unwrap().resources.clone()
    }

    pub fn prompts(&self) -> HashMap<String, Value> {
        self.catalog.read().unwrap().prompts.clone()
    }
}
