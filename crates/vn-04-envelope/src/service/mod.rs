//! Envelope services: codec, extension registry, hashcash.

pub mod codec;
pub mod extensions;
pub mod hashcash;

#[cfg(test)]
mod tests;

pub use codec::{decode, encode, payload_digest};
pub use extensions::ExtensionRegistry;
pub use hashcash::HashCashService;
