//! Adapters for the store's outbound ports.

pub mod persistence;

pub use persistence::{FilePersistence, InMemoryPersistence};
