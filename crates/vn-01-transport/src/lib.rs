//! # Transport Subsystem
//!
//! One addressing and connection contract over three network stacks:
//!
//! | Transport | Inbound | Outbound |
//! |-----------|---------|----------|
//! | `Clear` | plain TCP listener | plain TCP connect |
//! | `Tor` | `ADD_ONION` hidden service over the control port | SOCKS5 with unresolved hostname |
//! | `I2p` | SAM v3 `STREAM FORWARD` to a local listener | SAM v3 `STREAM CONNECT` |
//!
//! Every transport hands back ordinary `tokio::net` sockets, so the layers
//! above never see which stack carried a connection.
//!
//! ## Architecture
//!
//! - **Domain Layer:** configs, lifecycle state, errors, cancellation
//! - **Ports Layer:** the `TransportService` trait
//! - **Service Layer:** `TransportRegistry`, an owned map of transports
//! - **Adapters Layer:** clear, Tor and I2P implementations
//!
//! ## Lifecycle
//!
//! ```text
//! New -> Initializing -> Initialized -> Stopping -> Terminated
//!          │                                           ▲
//!          └────────── failure (back to New) ──────────┘ (shutdown)
//! ```
//!
//! `initialize` is idempotent; after `shutdown` every operation fails with
//! `TransportError::NotInitialized`.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vn_01_transport::{CancelToken, ClearTransport, ClearConfig, TransportService};
//!
//! # async fn run() -> Result<(), vn_01_transport::TransportError> {
//! let transport = Arc::new(ClearTransport::new(ClearConfig::default()));
//! transport.initialize().await?;
//!
//! let server = transport.get_server_socket(0, "default").await?;
//! let stream = transport
//!     .get_socket(&server.address, &CancelToken::never())
//!     .await?;
//! # drop(stream);
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::clear::ClearTransport;
pub use adapters::i2p::I2pTransport;
pub use adapters::keys::HiddenServiceKeyStore;
pub use adapters::tor::TorTransport;
pub use domain::cancel::{cancel_pair, run_cancellable, CancelHandle, CancelToken};
pub use domain::config::{ClearConfig, I2pConfig, TorConfig, TransportConfig};
pub use domain::errors::TransportError;
pub use domain::state::{ServerSocket, StateCell, TransportState};
pub use ports::inbound::TransportService;
pub use service::registry::TransportRegistry;
