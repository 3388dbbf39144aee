//! Server configuration: `ServerInfo` and the `mcp-servers.json` loader.
//!
//! Schema mirrors the host's `.claw/mcp-servers.json` (one JSON object per
//! server, defaults per-field, missing file means no servers) widened to
//! the full transport surface instead of stdio-only.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::codec::DEFAULT_MAX_FRAME_BYTES;

/// Trust level of an upstream server. Untrusted servers have their tool and
/// resource content sanitized for prompt-injection markers (§10.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustLevel {
    Trusted,
    Untrusted,
}

impl Default for TrustLevel {
    fn default() -> Self {
        Self::Untrusted
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Stdio,
    Http,
    Sse,
    Ws,
}

fn default_timeout_ms() -> u64 {
    30_000
}
fn default_heartbeat_ms() -> u64 {
    30_000
}
fn default_heartbeat_timeout_ms() -> u64 {
    10_000
}
fn default_queue_max_size() -> usize {
    100
}
fn default_max_frame_bytes() -> usize {
    DEFAULT_MAX_FRAME_BYTES
}
fn default_kill_grace_ms() -> u64 {
    2_000
}
fn default_reconnect_base_ms() -> u64 {
    500
}
fn default_reconnect_cap_ms() -> u64 {
    30_000
}
fn default_reconnect() -> bool {
    true
}

/// Identifies how to reach one MCP server and the policy knobs governing
/// its connection (§6 Configuration).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub transport: TransportKind,

    // stdio only
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,

    // http/sse/ws only
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// `None` means unbounded reconnect attempts; `Some(0)` means one-shot.
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default = "default_reconnect")]
    pub reconnect: bool,
    #[serde(default = "default_reconnect_base_ms")]
    pub reconnect_base_ms: u64,
    #[serde(default = "default_reconnect_cap_ms")]
    pub reconnect_cap_ms: u64,
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_ms: u64,
    #[serde(default = "default_heartbeat_timeout_ms")]
    pub heartbeat_timeout_ms: u64,
    #[serde(default = "default_queue_max_size")]
    pub queue_max_size: usize,
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
    #[serde(default = "default_kill_grace_ms")]
    pub kill_grace_ms: u64,

    #[serde(default)]
    pub trust: TrustLevel,

    /// §9 open question: reject inbound `roots/list` requests instead of
    /// dispatching to the roots provider.
    #[serde(default)]
    pub strict_roots: bool,
    /// §9 open question: if the SSE server never advertises an `endpoint`
    /// event, fall back to POSTing the original GET URL instead of failing
    /// sends with `TransportUnidirectional`.
    #[serde(default)]
    pub sse_fallback_to_get_url: bool,
    /// §9 open question: `Sec-WebSocket-Protocol` value to request, if any.
    #[serde(default)]
    pub ws_subprotocol: Option<String>,
}

impl ServerInfo {
    pub fn stdio(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transport: TransportKind::Stdio,
            command: Some(command.into()),
            args: Vec::new(),
            env: HashMap::new(),
            url: None,
            headers: HashMap::new(),
            timeout_ms: default_timeout_ms(),
            max_retries: None,
            reconnect: default_reconnect(),
            reconnect_base_ms: default_reconnect_base_ms(),
            reconnect_cap_ms: default_reconnect_cap_ms(),
            heartbeat_ms: default_heartbeat_ms(),
            heartbeat_timeout_ms: default_heartbeat_timeout_ms(),
            queue_max_size: default_queue_max_size(),
            max_frame_bytes: default_max_frame_bytes(),
            kill_grace_ms: default_kill_grace_ms(),
            trust: TrustLevel::default(),
            strict_roots: false,
            sse_fallback_to_get_url: false,
            ws_subprotocol: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ServersFile {
    #[serde(default)]
    servers: Vec<ServerInfo>,
}

/// Parsed `mcp-servers.json` configuration.
#[derive(Debug, Clone, Default)]
pub struct McpServersConfig {
    pub servers: Vec<ServerInfo>,
}

impl McpServersConfig {
    /// Load `{data_dir}/.claw/mcp-servers.json`. Returns an empty config
    /// (no error) if the file does not exist.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(".claw").join("mcp-servers.json");

        if !path.exists() {
            debug!(path = %path.display(), "mcp-servers.json not found — no upstream MCP servers configured");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read mcp-servers.json at '{}'", path.display()))?;
        let parsed: ServersFile = serde_json::from_str(&raw)
            .with_context(|| format!("invalid mcp-servers.json at '{}'", path.display()))?;

        for server in &parsed.servers {
            if server.trust == TrustLevel::Untrusted {
                warn!(server = %server.name, "MCP server configured as untrusted — responses will be sanitized");
            }
        }

        debug!(count = parsed.servers.len(), "loaded MCP server configs");
        Ok(Self {
            servers: parsed.servers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_returns_empty_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = McpServersConfig::load(dir.path()).unwrap();
        assert!(cfg.servers.is_empty());
    }

    #[test]
    fn load_parses_server_entries_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".claw")).unwrap();
        std::fs::write(
            dir.path().join(".claw/mcp-servers.json"),
            r#"{"servers":[{"name":"fs","type":"stdio","command":"npx","args":["-y","server-fs"]}]}"#,
        )
        .unwrap();

        let cfg = McpServersConfig::load(dir.path()).unwrap();
        assert_eq!(cfg.servers.len(), 1);
        let s = &cfg.servers[0];
        assert_eq!(s.name, "fs");
        assert_eq!(s.timeout_ms, 30_000);
        assert_eq!(s.trust, TrustLevel::Untrusted);
    }
}
