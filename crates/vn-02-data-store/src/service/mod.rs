//! Store service: sharded maps, the write path, and the sweeper.

pub(crate) mod map;
pub mod store;
pub mod sweeper;

#[cfg(test)]
mod tests;

pub use store::{DataStore, StoreConfig};
pub use sweeper::spawn_sweeper;
