//! Entry kinds and the requests that add or remove them.

use crate::domain::keys::{
    add_message, append_only_key, authenticated_key, content_digest, mailbox_key, metadata_bytes,
    remove_message, StorageKey,
};
use serde::{Deserialize, Serialize};
use shared_crypto::{ConfidentialData, Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature, Hash256};
use shared_types::{MetaData, Timestamp};
use std::fmt;

// =============================================================================
// ENTRY KIND
// =============================================================================

/// Which map an entry lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntryKind {
    Authenticated,
    Mailbox,
    AppendOnly,
}

impl EntryKind {
    pub const ALL: [EntryKind; 3] = [EntryKind::Authenticated, EntryKind::Mailbox, EntryKind::AppendOnly];

    pub(crate) fn tag(self) -> u8 {
        match self {
            EntryKind::Authenticated => 1,
            EntryKind::Mailbox => 2,
            EntryKind::AppendOnly => 3,
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Authenticated => write!(f, "authenticated"),
            EntryKind::Mailbox => write!(f, "mailbox"),
            EntryKind::AppendOnly => write!(f, "append-only"),
        }
    }
}

// =============================================================================
// AUTHENTICATED
// =============================================================================

/// Owner-defined content of an authenticated entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedData {
    pub metadata: MetaData,
    /// Unique per owner and type; part of the key.
    pub id: String,
    pub payload: Vec<u8>,
}

impl AuthenticatedData {
    pub fn new(metadata: MetaData, id: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            metadata,
            id: id.into(),
            payload,
        }
    }

    fn digest(&self) -> Hash256 {
        content_digest(&[&metadata_bytes(&self.metadata), self.id.as_bytes(), &self.payload])
    }
}

/// A signed, sequence-numbered entry, mutable by its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedEntry {
    pub data: AuthenticatedData,
    pub owner: Ed25519PublicKey,
    pub sequence_number: i32,
    pub created: Timestamp,
    pub signature: Ed25519Signature,
}

impl AuthenticatedEntry {
    pub fn sign(
        data: AuthenticatedData,
        owner: &Ed25519KeyPair,
        sequence_number: i32,
        created: Timestamp,
    ) -> Self {
        let message = add_message(&data.digest(), sequence_number, created.as_millis());
        Self {
            signature: owner.sign(&message),
            owner: owner.public_key(),
            data,
            sequence_number,
            created,
        }
    }

    pub fn key(&self) -> StorageKey {
        authenticated_key(&self.data.metadata.type_name, &self.owner, &self.data.id)
    }

    pub(crate) fn signed_message(&self) -> Vec<u8> {
        add_message(&self.data.digest(), self.sequence_number, self.created.as_millis())
    }
}

// =============================================================================
// MAILBOX
// =============================================================================

/// A sealed message parked for an offline receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailboxData {
    pub metadata: MetaData,
    /// Unique per sender/receiver pair; part of the key.
    pub message_id: String,
    pub sealed: ConfidentialData,
}

impl MailboxData {
    pub fn new(metadata: MetaData, message_id: impl Into<String>, sealed: ConfidentialData) -> Self {
        Self {
            metadata,
            message_id: message_id.into(),
            sealed,
        }
    }

    fn digest(&self) -> Hash256 {
        let sealed = &self.sealed;
        content_digest(&[
            &metadata_bytes(&self.metadata),
            self.message_id.as_bytes(),
            &sealed.sender_public_key.as_bytes()[..],
            &sealed.receiver_public_key.as_bytes()[..],
            &sealed.ephemeral_public[..],
            &sealed.nonce[..],
            &sealed.ciphertext,
            &sealed.signature.as_bytes()[..],
        ])
    }
}

/// Mailbox entry, signed by the sender of the sealed message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailboxEntry {
    pub data: MailboxData,
    pub sequence_number: i32,
    pub created: Timestamp,
    pub signature: Ed25519Signature,
}

impl MailboxEntry {
    pub fn sign(
        data: MailboxData,
        sender: &Ed25519KeyPair,
        sequence_number: i32,
        created: Timestamp,
    ) -> Self {
        let message = add_message(&data.digest(), sequence_number, created.as_millis());
        Self {
            signature: sender.sign(&message),
            data,
            sequence_number,
            created,
        }
    }

    pub fn sender(&self) -> &Ed25519PublicKey {
        &self.data.sealed.sender_public_key
    }

    pub fn receiver(&self) -> &Ed25519PublicKey {
        &self.data.sealed.receiver_public_key
    }

    pub fn key(&self) -> StorageKey {
        mailbox_key(
            &self.data.metadata.type_name,
            self.sender(),
            self.receiver(),
            &self.data.message_id,
        )
    }

    pub(crate) fn signed_message(&self) -> Vec<u8> {
        add_message(&self.data.digest(), self.sequence_number, self.created.as_millis())
    }
}

// =============================================================================
// APPEND-ONLY
// =============================================================================

/// Immutable content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendOnlyData {
    pub metadata: MetaData,
    pub payload: Vec<u8>,
}

/// Append-only entry, identified by the hash of its content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendOnlyEntry {
    pub data: AppendOnlyData,
    /// Declared content hash; must match the content.
    pub content_hash: StorageKey,
    pub created: Timestamp,
}

impl AppendOnlyEntry {
    pub fn new(metadata: MetaData, payload: Vec<u8>, created: Timestamp) -> Self {
        let content_hash = append_only_key(&metadata, &payload);
        Self {
            data: AppendOnlyData { metadata, payload },
            content_hash,
            created,
        }
    }

    pub fn key(&self) -> StorageKey {
        self.content_hash
    }

    pub(crate) fn computed_hash(&self) -> StorageKey {
        append_only_key(&self.data.metadata, &self.data.payload)
    }
}

// =============================================================================
// REMOVE
// =============================================================================

/// Signed removal of an authenticated or mailbox entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveRequest {
    pub key: StorageKey,
    pub signer: Ed25519PublicKey,
    pub sequence_number: i32,
    pub created: Timestamp,
    /// Bounds the tombstone when the key is unknown locally.
    pub metadata: MetaData,
    pub signature: Ed25519Signature,
}

impl RemoveRequest {
    pub fn sign(
        kind: EntryKind,
        key: StorageKey,
        metadata: MetaData,
        signer: &Ed25519KeyPair,
        sequence_number: i32,
        created: Timestamp,
    ) -> Self {
        let message = remove_message(kind.tag(), &key, sequence_number, created.as_millis());
        Self {
            key,
            signer: signer.public_key(),
            sequence_number,
            created,
            metadata,
            signature: signer.sign(&message),
        }
    }

    pub(crate) fn signed_message(&self, kind: EntryKind) -> Vec<u8> {
        remove_message(kind.tag(), &self.key, self.sequence_number, self.created.as_millis())
    }
}

// =============================================================================
// DATA REQUEST
// =============================================================================

/// Everything that can be applied to the store, as carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataRequest {
    AddAuthenticated(AuthenticatedEntry),
    RemoveAuthenticated(RemoveRequest),
    AddMailbox(MailboxEntry),
    RemoveMailbox(RemoveRequest),
    AddAppendOnly(AppendOnlyEntry),
}

impl DataRequest {
    pub fn kind(&self) -> EntryKind {
        match self {
            Self::AddAuthenticated(_) | Self::RemoveAuthenticated(_) => EntryKind::Authenticated,
            Self::AddMailbox(_) | Self::RemoveMailbox(_) => EntryKind::Mailbox,
            Self::AddAppendOnly(_) => EntryKind::AppendOnly,
        }
    }

    pub fn key(&self) -> StorageKey {
        match self {
            Self::AddAuthenticated(entry) => entry.key(),
            Self::AddMailbox(entry) => entry.key(),
            Self::AddAppendOnly(entry) => entry.key(),
            Self::RemoveAuthenticated(remove) | Self::RemoveMailbox(remove) => remove.key,
        }
    }

    /// Zero for append-only entries.
    pub fn sequence_number(&self) -> i32 {
        match self {
            Self::AddAuthenticated(entry) => entry.sequence_number,
            Self::AddMailbox(entry) => entry.sequence_number,
            Self::AddAppendOnly(_) => 0,
            Self::RemoveAuthenticated(remove) | Self::RemoveMailbox(remove) => remove.sequence_number,
        }
    }

    pub fn created(&self) -> Timestamp {
        match self {
            Self::AddAuthenticated(entry) => entry.created,
            Self::AddMailbox(entry) => entry.created,
            Self::AddAppendOnly(entry) => entry.created,
            Self::RemoveAuthenticated(remove) | Self::RemoveMailbox(remove) => remove.created,
        }
    }

    pub fn metadata(&self) -> &MetaData {
        match self {
            Self::AddAuthenticated(entry) => &entry.data.metadata,
            Self::AddMailbox(entry) => &entry.data.metadata,
            Self::AddAppendOnly(entry) => &entry.data.metadata,
            Self::RemoveAuthenticated(remove) | Self::RemoveMailbox(remove) => &remove.metadata,
        }
    }

    pub fn is_remove(&self) -> bool {
        matches!(self, Self::RemoveAuthenticated(_) | Self::RemoveMailbox(_))
    }

    /// Encoded size, used to budget inventories.
    pub fn serialized_size(&self) -> usize {
        bincode::serialized_size(self)
            .map(|size| size as usize)
            .unwrap_or(usize::MAX)
    }
}
