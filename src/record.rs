//! `ConnectionRecord` — the Manager's view of one connection (§3).
//!
//! Mutated only by the connection's driver task; every other reader gets an
//! immutable clone (`status()`/`capabilities()`/`Manager::get`).

use chrono::{DateTime, Utc};

use crate::capabilities::Capabilities;
use crate::config::{ServerInfo, TransportKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connecting,
    Initializing,
    Connected,
    Degraded,
    Reconnecting,
    Closed,
    Error,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ConnectionRecord {
    pub id: String,
    pub name: String,
    pub transport: TransportKind,
    pub status: ConnectionStatus,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub capabilities: Option<Capabilities>,
    #[serde(skip)]
    pub server_info: ServerInfo,
    pub last_error: Option<String>,
}

impl ConnectionRecord {
    pub fn new(id: String, server_info: ServerInfo) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: server_info.name.clone(),
            transport: server_info.transport,
            status: ConnectionStatus::Connecting,
            created_at: now,
            last_activity_at: now,
            capabilities: None,
            server_info,
            last_error: None,
        }
    }

    pub fn touch(&mut self) {
        self.last_activity_at = Utc::now();
    }
}
