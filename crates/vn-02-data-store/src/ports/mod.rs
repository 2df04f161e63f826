//! Ports of the data store.

pub mod outbound;

pub use outbound::PersistencePort;
