//! Peer connections over one transport.
//!
//! A [`Node`] owns the server socket of its transport, the handshaken
//! [`Connection`]s, and the table of requests waiting for a response.

mod connection;
mod dispatch;
mod handshake;
mod metrics;
mod node;


pub use connection::{Connection, Direction};
pub use metrics::{TrafficMetrics, TrafficSample};
pub use node::{
    MessageListener, Node, NodeServices, NodeSettings, MAX_KNOWN_PEERS, MAX_PEERS_PER_EXCHANGE,
};
