//! Request builders for tests.

use crate::domain::keys::StorageKey;
use crate::domain::requests::{
    AppendOnlyEntry, AuthenticatedData, AuthenticatedEntry, DataRequest, EntryKind, MailboxData,
    MailboxEntry, RemoveRequest,
};
use shared_crypto::{seal, Ed25519KeyPair};
use shared_types::{MetaData, Timestamp};
use std::time::Duration;

pub const TEST_TTL: Duration = Duration::from_secs(60);

pub fn offer_metadata() -> MetaData {
    MetaData::new(TEST_TTL, "Offer")
}

pub fn make_offer(
    owner: &Ed25519KeyPair,
    id: &str,
    seq: i32,
    created: Timestamp,
) -> AuthenticatedEntry {
    make_authenticated(offer_metadata(), owner, id, vec![seq as u8], seq, created)
}

pub fn make_authenticated(
    metadata: MetaData,
    owner: &Ed25519KeyPair,
    id: &str,
    payload: Vec<u8>,
    seq: i32,
    created: Timestamp,
) -> AuthenticatedEntry {
    AuthenticatedEntry::sign(AuthenticatedData::new(metadata, id, payload), owner, seq, created)
}

pub fn make_mailbox(
    sender: &Ed25519KeyPair,
    receiver: &Ed25519KeyPair,
    message_id: &str,
    seq: i32,
    created: Timestamp,
) -> MailboxEntry {
    let sealed = match seal(b"hello", &receiver.public_key(), sender) {
        Ok(sealed) => sealed,
        Err(err) => panic!("sealing test message: {err}"),
    };
    MailboxEntry::sign(
        MailboxData::new(MetaData::new(TEST_TTL, "PrivateMessage"), message_id, sealed),
        sender,
        seq,
        created,
    )
}

pub fn make_trade(payload: &[u8], created: Timestamp) -> AppendOnlyEntry {
    AppendOnlyEntry::new(MetaData::new(TEST_TTL, "Trade"), payload.to_vec(), created)
}

pub fn make_remove(
    kind: EntryKind,
    key: StorageKey,
    signer: &Ed25519KeyPair,
    seq: i32,
    created: Timestamp,
) -> RemoveRequest {
    RemoveRequest::sign(kind, key, offer_metadata(), signer, seq, created)
}

pub fn add(entry: AuthenticatedEntry) -> DataRequest {
    DataRequest::AddAuthenticated(entry)
}
