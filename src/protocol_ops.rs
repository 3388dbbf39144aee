//! Typed, capability-gated wrappers over [`ConnectionHandle::request`] (§4.5).
//!
//! Each function here refuses locally — without putting anything on the
//! wire — when the server never advertised the matching capability in
//! `initialize`. Tool/resource/prompt content coming back from an untrusted
//! server has already been sanitized by the driver before it reaches here.

use std::time::Duration;

use serde_json::{json, Value};

use crate::capabilities::Capabilities;
use crate::connection::{CallOptions, ConnectionHandle};
use crate::error::McpError;

fn require(caps: &Option<Capabilities>, ok: impl Fn(&Capabilities) -> bool, name: &str) -> Result<(), McpError> {
    match caps {
        Some(c) if ok(c) => Ok(()),
        _ => Err(McpError::CapabilityUnsupported(name.to_string())),
    }
}

fn opts(timeout: Duration) -> CallOptions {
    CallOptions {
        timeout,
        ..CallOptions::default()
    }
}

pub async fn ping(conn: &ConnectionHandle, timeout: Duration) -> Result<(), McpError> {
    conn.request("ping", None, opts(timeout)).await?;
    Ok(())
}

pub async fn tools_list(conn: &ConnectionHandle, timeout: Duration) -> Result<Value, McpError> {
    require(&conn.capabilities(), Capabilities::has_tools, "tools")?;
    conn.request("tools/list", None, opts(timeout)).await
}

pub async fn tools_call(
    conn: &ConnectionHandle,
    name: &str,
    arguments: Value,
    timeout: Duration,
) -> Result<Value, McpError> {
    require(&conn.capabilities(), Capabilities::has_tools, "tools")?;
    let params = json!({ "name": name, "arguments": arguments });
    conn.request("tools/call", Some(params), opts(timeout)).await
}

pub async fn resources_list(conn: &ConnectionHandle, timeout: Duration) -> Result<Value, McpError> {
    require(&conn.capabilities(), Capabilities::has_resources, "resources")?;
    conn.request("resources/list", None, opts(timeout)).await
}

pub async fn resources_read(
    conn: &ConnectionHandle,
    uri: &str,
    timeout: Duration,
) -> Result<Value, McpError> {
    require(&conn.capabilities(), Capabilities::has_resources, "resources")?;
    let params = json!({ "uri": uri });
    conn.request("resources/read", Some(params), opts(timeout)).await
}

pub async fn prompts_list(conn: &ConnectionHandle, timeout: Duration) -> Result<Value, McpError> {
    require(&conn.capabilities(), Capabilities::has_prompts, "prompts")?;
    conn.request("prompts/list", None, opts(timeout)).await
}

pub async fn prompts_get(
    conn: &ConnectionHandle,
    name: &str,
    arguments: Option<Value>,
    timeout: Duration,
) -> Result<Value, McpError> {
    require(&conn.capabilities(), Capabilities::has_prompts, "prompts")?;
    let mut params = json!({ "name": name });
    if let Some(args) = arguments {
        params["arguments"] = args;
    }
    conn.request("prompts/get", Some(params), opts(timeout)).await
}

/// Client-initiated `roots/list`. The host rarely needs this — roots are
/// normally pushed by the client into the server via `roots/list` requests
/// going the *other* direction — but some servers expose it symmetrically.
pub async fn roots_list(conn: &ConnectionHandle, timeout: Duration) -> Result<Value, McpError> {
    require(&conn.capabilities(), Capabilities::has_roots, "roots")?;
    conn.request("roots/list", None, opts(timeout)).await
}
