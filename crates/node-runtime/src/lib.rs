//! # Node Runtime Library
//!
//! The veilnet node: transports, the replicated data store, inventory
//! reconciliation and the authorized envelope layer wired into one process.
//! The main entry point is the `main.rs` binary; the library is exposed for
//! integration tests.
//!
//! ## Modules
//!
//! - `container/` - configuration and node identity
//! - `network/` - per-transport nodes, connections, handshake and dispatch
//! - `adapters/` - outbound port implementations backed by connections
//! - `handlers/` - confidential messaging and network load
//! - `runtime` - startup and shutdown of the whole node

#![allow(clippy::type_complexity)]

pub mod adapters;
pub mod container;
pub mod errors;
pub mod handlers;
pub mod network;
pub mod runtime;
pub mod telemetry;

pub use container::{load_or_create_identity, ConfigError, NodeConfig};
pub use errors::NodeError;
pub use handlers::{ConfidentialListener, ConfidentialMessageService, ReceivedMessage, SendOutcome};
pub use network::{Connection, MessageListener, Node, NodeServices, NodeSettings};
pub use runtime::NodeRuntime;
