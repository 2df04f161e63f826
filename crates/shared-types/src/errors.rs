//! # Error Types
//!
//! Errors raised while constructing shared value types.

use thiserror::Error;

/// Errors from parsing an `Address` text form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// The input was empty or only whitespace.
    #[error("Address is empty")]
    Empty,

    /// No `:port` suffix was found.
    #[error("Address {0} has no port")]
    MissingPort(String),

    /// The port suffix is not a valid TCP port.
    #[error("Invalid port in address {0}")]
    InvalidPort(String),

    /// The host part is empty or malformed.
    #[error("Invalid host in address {0}")]
    InvalidHost(String),

    /// The text does not name a known transport.
    #[error("Unknown transport type: {0}")]
    UnknownTransport(String),
}

/// Errors from validating storage metadata.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetaDataError {
    /// TTL must be positive.
    #[error("TTL must be greater than zero")]
    ZeroTtl,

    /// Type tag must be non-empty.
    #[error("Type name must not be empty")]
    EmptyTypeName,

    /// A map that tolerates no entries cannot store anything.
    #[error("Max map size must be greater than zero")]
    ZeroMaxMapSize,
}
