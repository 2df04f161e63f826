//! Transport domain: configuration, lifecycle, errors and cancellation.

pub mod cancel;
pub mod config;
pub mod errors;
pub mod state;
