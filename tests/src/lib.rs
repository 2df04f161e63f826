//! # Veilnet Test Suite
//!
//! Multi-node scenarios that need more than one crate.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── harness.rs         # Runtimes on loopback with temp data dirs
//!     ├── reconciliation.rs  # Anti-entropy and gossip between runtimes
//!     ├── confidential.rs    # Direct and mailbox delivery
//!     └── persistence.rs     # Store survives a restart
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p vn-tests
//! cargo test -p vn-tests integration::confidential::
//! ```

pub mod integration;
