//! # Node Container
//!
//! Configuration and identity, loaded before anything touches the network.

pub mod config;
pub mod identity;

pub use config::{AuthorizationConfig, ConfigError, NetworkConfig, NodeConfig, StoreSettings};
pub use identity::{identity_path, load_or_create_identity};
