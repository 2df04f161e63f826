//! Stateless checks run before a request touches the store.
//!
//! Order: structure, request expiry, content hash, signature.

use crate::domain::errors::StorageError;
use crate::domain::requests::{DataRequest, EntryKind};
use shared_types::Timestamp;

/// Size and clock bounds for structural validation.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_payload_bytes: usize,
    pub max_id_len: usize,
    /// How far in the future `created` may lie.
    pub max_clock_skew_ms: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_payload_bytes: 1024 * 1024,
            max_id_len: 256,
            max_clock_skew_ms: 2 * 60 * 60 * 1000,
        }
    }
}

pub(crate) fn validate(
    request: &DataRequest,
    now: Timestamp,
    limits: &Limits,
) -> Result<(), StorageError> {
    check_structure(request, now, limits)?;
    check_not_expired(request, now)?;
    check_content_hash(request)?;
    check_signature(request)
}

fn check_structure(request: &DataRequest, now: Timestamp, limits: &Limits) -> Result<(), StorageError> {
    let kind = request.kind();
    request.metadata().validate()?;

    if request.sequence_number() < 0 {
        return Err(StorageError::malformed(kind, "negative sequence number"));
    }
    if request.created() > now.saturating_add_millis(limits.max_clock_skew_ms) {
        return Err(StorageError::malformed(kind, "created in the future"));
    }

    match request {
        DataRequest::AddAuthenticated(entry) => {
            check_id(kind, &entry.data.id, limits)?;
            check_payload(kind, entry.data.payload.len(), limits)
        }
        DataRequest::AddMailbox(entry) => {
            check_id(kind, &entry.data.message_id, limits)?;
            if entry.data.sealed.ciphertext.is_empty() {
                return Err(StorageError::malformed(kind, "empty ciphertext"));
            }
            check_payload(kind, entry.data.sealed.ciphertext.len(), limits)
        }
        DataRequest::AddAppendOnly(entry) => check_payload(kind, entry.data.payload.len(), limits),
        DataRequest::RemoveAuthenticated(_) | DataRequest::RemoveMailbox(_) => Ok(()),
    }
}

fn check_id(kind: EntryKind, id: &str, limits: &Limits) -> Result<(), StorageError> {
    if id.is_empty() {
        return Err(StorageError::malformed(kind, "empty id"));
    }
    if id.len() > limits.max_id_len {
        return Err(StorageError::malformed(kind, format!("id longer than {}", limits.max_id_len)));
    }
    Ok(())
}

fn check_payload(kind: EntryKind, len: usize, limits: &Limits) -> Result<(), StorageError> {
    if len > limits.max_payload_bytes {
        return Err(StorageError::malformed(
            kind,
            format!("payload of {len} bytes exceeds {}", limits.max_payload_bytes),
        ));
    }
    Ok(())
}

fn check_not_expired(request: &DataRequest, now: Timestamp) -> Result<(), StorageError> {
    if request.metadata().is_expired(request.created(), now) {
        return Err(StorageError::RequestExpired {
            kind: request.kind(),
            created: request.created(),
        });
    }
    Ok(())
}

fn check_content_hash(request: &DataRequest) -> Result<(), StorageError> {
    if let DataRequest::AddAppendOnly(entry) = request {
        if entry.computed_hash() != entry.content_hash {
            return Err(StorageError::ContentHashMismatch {
                key: entry.content_hash,
            });
        }
    }
    Ok(())
}

fn check_signature(request: &DataRequest) -> Result<(), StorageError> {
    let kind = request.kind();
    let verified = match request {
        DataRequest::AddAuthenticated(entry) => entry
            .owner
            .is_valid_signature(&entry.signed_message(), &entry.signature),
        DataRequest::AddMailbox(entry) => {
            entry.data.sealed.verify_sender().is_ok()
                && entry
                    .sender()
                    .is_valid_signature(&entry.signed_message(), &entry.signature)
        }
        DataRequest::RemoveAuthenticated(remove) | DataRequest::RemoveMailbox(remove) => remove
            .signer
            .is_valid_signature(&remove.signed_message(kind), &remove.signature),
        DataRequest::AddAppendOnly(_) => true,
    };

    if verified {
        Ok(())
    } else {
        Err(StorageError::InvalidSignature {
            kind,
            key: request.key(),
        })
    }
}
