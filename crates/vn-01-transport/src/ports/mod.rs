//! Ports exposed by the transport subsystem.

pub mod inbound;
