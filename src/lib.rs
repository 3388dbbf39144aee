//! Concurrent JSON-RPC 2.0 client core for talking to Model Context
//! Protocol servers over stdio, HTTP, SSE, or WebSocket.
//!
//! A [`manager::Manager`] owns named [`connection::ConnectionHandle`]s, one
//! per upstream server; each connection runs its own driver task carrying a
//! [`transport`], a [`correlator::Correlator`], and an [`queue::OutboundQueue`],
//! and exposes typed calls through [`protocol_ops`]. Connection lifecycle and
//! traffic events fan out through [`events::EventBus`]; a
//! [`discovery::DiscoveryAggregator`] keeps a live tools/resources/prompts
//! catalog built from those events.

pub mod backoff;
pub mod cancel;
pub mod capabilities;
pub mod codec;
pub mod config;
pub mod connection;
pub mod correlator;
pub mod discovery;
pub mod error;
pub mod events;
pub mod manager;
pub mod message;
pub mod protocol_ops;
pub mod queue;
pub mod record;
pub mod sampling;
pub mod sanitize;
pub mod transport;

pub use config::{McpServersConfig, ServerInfo, TransportKind, TrustLevel};
pub use connection::{CallOptions, ConnectionHandle};
pub use error::McpError;
pub use manager::Manager;
