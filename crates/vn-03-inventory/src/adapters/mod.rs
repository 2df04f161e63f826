//! Adapters for the inventory ports.

pub mod store;
