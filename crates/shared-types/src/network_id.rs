//! # Network Identity
//!
//! How a peer is reached and which key it answers to.

use crate::address::{Address, TransportType};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Reachable addresses of one node plus its public key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkId {
    addresses: BTreeMap<TransportType, Address>,
    public_key: [u8; 32],
}

impl NetworkId {
    /// Build from an address map and a 32-byte public key.
    pub fn new(addresses: BTreeMap<TransportType, Address>, public_key: [u8; 32]) -> Self {
        Self {
            addresses,
            public_key,
        }
    }

    /// Single-address identity.
    pub fn with_address(address: Address, public_key: [u8; 32]) -> Self {
        let mut addresses = BTreeMap::new();
        addresses.insert(address.transport_type(), address);
        Self::new(addresses, public_key)
    }

    /// Address for a transport, if the node is reachable over it.
    pub fn address(&self, transport: TransportType) -> Option<&Address> {
        self.addresses.get(&transport)
    }

    /// All addresses.
    pub fn addresses(&self) -> &BTreeMap<TransportType, Address> {
        &self.addresses
    }

    /// Public key bytes.
    pub fn public_key(&self) -> &[u8; 32] {
        &self.public_key
    }

    /// Hex id of the public key (first 20 bytes of its SHA-256).
    pub fn key_id(&self) -> String {
        key_id(&self.public_key)
    }
}

/// Hex id of a public key.
pub fn key_id(public_key: &[u8; 32]) -> String {
    let digest = Sha256::digest(public_key);
    hex::encode(&digest[..20])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_lookup_by_transport() {
        let clear = Address::localhost(8000);
        let id = NetworkId::with_address(clear.clone(), [7u8; 32]);

        assert_eq!(id.address(TransportType::Clear), Some(&clear));
        assert_eq!(id.address(TransportType::Tor), None);
    }

    #[test]
    fn test_key_id_is_stable_hex() {
        let id = NetworkId::with_address(Address::localhost(1), [1u8; 32]);
        assert_eq!(id.key_id().len(), 40);
        assert_eq!(id.key_id(), key_id(&[1u8; 32]));
        assert_ne!(id.key_id(), key_id(&[2u8; 32]));
    }
}
