//! Transport adapters.
//!
//! | Adapter | Backing stack |
//! |---------|---------------|
//! | `clear` | tokio TCP |
//! | `tor` | Tor control port + SOCKS5 proxy |
//! | `i2p` | I2P router SAM v3 bridge |

pub mod clear;
pub mod i2p;
pub mod keys;
pub mod tor;

pub(crate) mod line_io;
