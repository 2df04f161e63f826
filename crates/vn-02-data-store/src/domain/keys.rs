//! Storage keys and signed-message layouts.
//!
//! | Kind | Key |
//! |------|-----|
//! | Authenticated | `hash20(domain, type_name, 0, owner, id)` |
//! | Mailbox | `hash20(domain, type_name, 0, sender, receiver, message_id)` |
//! | AppendOnly | `hash20(domain, metadata, payload)`, carried as the content hash |
//!
//! Variable-length fields inside signed digests are length-prefixed so no
//! two distinct inputs share an encoding.

use shared_crypto::{hash20, sha256_many, Digest20, Ed25519PublicKey, Hash256};
use shared_types::MetaData;

/// 20-byte key under which an entry is stored and advertised in filters.
pub type StorageKey = Digest20;

const AUTHENTICATED_DOMAIN: &[u8] = b"vn/authenticated";
const MAILBOX_DOMAIN: &[u8] = b"vn/mailbox";
const APPEND_ONLY_DOMAIN: &[u8] = b"vn/append-only";
const ADD_DOMAIN: &[u8] = b"vn/add";
const REMOVE_DOMAIN: &[u8] = b"vn/remove";
const SEPARATOR: &[u8] = &[0u8];

pub fn authenticated_key(type_name: &str, owner: &Ed25519PublicKey, id: &str) -> StorageKey {
    hash20(&[
        AUTHENTICATED_DOMAIN,
        type_name.as_bytes(),
        SEPARATOR,
        &owner.as_bytes()[..],
        id.as_bytes(),
    ])
}

pub fn mailbox_key(
    type_name: &str,
    sender: &Ed25519PublicKey,
    receiver: &Ed25519PublicKey,
    message_id: &str,
) -> StorageKey {
    hash20(&[
        MAILBOX_DOMAIN,
        type_name.as_bytes(),
        SEPARATOR,
        &sender.as_bytes()[..],
        &receiver.as_bytes()[..],
        message_id.as_bytes(),
    ])
}

pub fn append_only_key(metadata: &MetaData, payload: &[u8]) -> StorageKey {
    hash20(&[APPEND_ONLY_DOMAIN, &metadata_bytes(metadata), payload])
}

/// Canonical encoding of metadata for digests.
pub(crate) fn metadata_bytes(metadata: &MetaData) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(32 + metadata.type_name.len());
    push_prefixed(&mut bytes, metadata.type_name.as_bytes());
    bytes.extend_from_slice(&metadata.ttl_ms.to_be_bytes());
    bytes.extend_from_slice(&metadata.priority.to_be_bytes());
    bytes.extend_from_slice(&(metadata.max_map_size as u64).to_be_bytes());
    bytes
}

/// Append `field` preceded by its length.
pub(crate) fn push_prefixed(bytes: &mut Vec<u8>, field: &[u8]) {
    bytes.extend_from_slice(&(field.len() as u64).to_be_bytes());
    bytes.extend_from_slice(field);
}

/// Bytes an author signs to add `content_digest` at `sequence_number`.
pub(crate) fn add_message(content_digest: &Hash256, sequence_number: i32, created_ms: u64) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(ADD_DOMAIN.len() + 32 + 12);
    bytes.extend_from_slice(ADD_DOMAIN);
    bytes.extend_from_slice(content_digest);
    bytes.extend_from_slice(&sequence_number.to_be_bytes());
    bytes.extend_from_slice(&created_ms.to_be_bytes());
    bytes
}

/// Bytes an author signs to remove `key` at `sequence_number`.
pub(crate) fn remove_message(kind_tag: u8, key: &StorageKey, sequence_number: i32, created_ms: u64) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(REMOVE_DOMAIN.len() + 1 + 20 + 12);
    bytes.extend_from_slice(REMOVE_DOMAIN);
    bytes.push(kind_tag);
    bytes.extend_from_slice(key.as_bytes());
    bytes.extend_from_slice(&sequence_number.to_be_bytes());
    bytes.extend_from_slice(&created_ms.to_be_bytes());
    bytes
}

/// Digest over length-prefixed parts.
pub(crate) fn content_digest(parts: &[&[u8]]) -> Hash256 {
    let mut encoded = Vec::new();
    for part in parts {
        push_prefixed(&mut encoded, part);
    }
    sha256_many(&[&encoded[..]])
}
