//! Codec, authorization and extension tests.

use super::*;
use crate::adapters::{read_envelope, write_envelope};
use crate::domain::*;
use crate::ports::{AuthorizationService, ExtensionDecoder};
use proptest::prelude::*;
use shared_crypto::{Digest20, Ed25519KeyPair};
use shared_types::Timestamp;
use std::any::Any;
use std::sync::Arc;
use vn_02_data_store::test_utils::{add, make_offer, make_trade};
use vn_02_data_store::DataRequest;
use vn_03_inventory::{DataFilter, FilterEntry, InventoryRequest, MAX_ENTRIES};

const ME: &str = "127.0.0.1:9000";

fn ping(nonce: u64) -> EnvelopePayloadMessage {
    EnvelopePayloadMessage::Ping { nonce }
}

fn trade() -> EnvelopePayloadMessage {
    EnvelopePayloadMessage::DataRequest(DataRequest::AddAppendOnly(make_trade(
        b"trade",
        Timestamp::from_millis(0),
    )))
}

fn envelope(payload: EnvelopePayloadMessage, counter: u32) -> NetworkEnvelope {
    let token = HashCashService::new(true)
        .create_token(&payload, &NetworkLoad::INITIAL, ME, counter)
        .unwrap();
    NetworkEnvelope::new(token, payload)
}

// =============================================================================
// CODEC
// =============================================================================

#[test]
fn test_decode_preserves_inventory_filter() {
    let filter = DataFilter::new(
        vec![
            FilterEntry::new(Digest20::from_bytes([9; 20]), 4),
            FilterEntry::new(Digest20::from_bytes([1; 20]), 0),
        ],
        MAX_ENTRIES,
    );
    let payload = EnvelopePayloadMessage::InventoryRequest(InventoryRequest { filter, nonce: 42 });
    let sent = envelope(payload, 1);

    let received = decode(&encode(&sent).unwrap()).unwrap();
    assert_eq!(received, sent);
    assert_eq!(received.version, PROTOCOL_VERSION);
}

#[test]
fn test_unknown_payload_tag_is_decode_error() {
    let mut bytes = encode(&envelope(ping(5), 1)).unwrap();
    // Ping is the last field: u32 tag then u64 nonce.
    let tag_at = bytes.len() - 12;
    bytes[tag_at..tag_at + 4].copy_from_slice(&u32::MAX.to_be_bytes());

    assert!(matches!(decode(&bytes), Err(EnvelopeError::Decode(_))));
}

#[test]
fn test_missing_fields_are_decode_error() {
    let bytes = encode(&envelope(ping(5), 1)).unwrap();
    assert!(matches!(
        decode(&bytes[..bytes.len() - 3]),
        Err(EnvelopeError::Decode(_))
    ));
    assert!(matches!(decode(&bytes[..2]), Err(EnvelopeError::Decode(_))));
}

#[test]
fn test_trailing_bytes_are_decode_error() {
    let mut bytes = encode(&envelope(ping(5), 1)).unwrap();
    bytes.push(0);
    assert!(matches!(decode(&bytes), Err(EnvelopeError::Decode(_))));
}

#[test]
fn test_unsupported_version_checked_first() {
    let mut bytes = encode(&envelope(ping(5), 1)).unwrap();
    bytes[..4].copy_from_slice(&99i32.to_be_bytes());
    // Corrupt the body too: version must be rejected before parsing it.
    let last = bytes.len() - 1;
    bytes.truncate(last);

    assert!(matches!(
        decode(&bytes),
        Err(EnvelopeError::UnsupportedVersion { version: 99, .. })
    ));
}

#[tokio::test]
async fn test_envelopes_over_stream() {
    let (mut client, mut server) = tokio::io::duplex(64 * 1024);
    let first = envelope(ping(1), 1);
    let second = envelope(EnvelopePayloadMessage::Pong { request_nonce: 1 }, 2);

    let written = write_envelope(&mut client, &first).await.unwrap();
    write_envelope(&mut client, &second).await.unwrap();
    drop(client);

    let (got, size) = read_envelope(&mut server).await.unwrap().unwrap();
    assert_eq!(got, first);
    assert_eq!(size, written);
    assert_eq!(read_envelope(&mut server).await.unwrap().unwrap().0, second);
    assert!(read_envelope(&mut server).await.unwrap().is_none());
}

proptest! {
    #[test]
    fn prop_decode_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
        let _ = decode(&bytes);
    }

    #[test]
    fn prop_decode_never_panics_with_valid_version(body in proptest::collection::vec(any::<u8>(), 0..512)) {
        let mut bytes = PROTOCOL_VERSION.to_be_bytes().to_vec();
        bytes.extend(body);
        let _ = decode(&bytes);
    }
}

// =============================================================================
// DIFFICULTY
// =============================================================================

#[test]
fn test_difficulty_bounds() {
    let auth = HashCashService::new(true);
    // 65536 * 0.01 * 0.01 is far below the floor.
    assert_eq!(auth.calculate_difficulty(&ping(0), &NetworkLoad::INITIAL), 128.0);
    assert_eq!(
        auth.calculate_difficulty(&trade(), &NetworkLoad::new(1.0, 1.0)),
        65_536.0
    );
    assert_eq!(
        auth.calculate_difficulty(&trade(), &NetworkLoad::new(1.0, 100.0)),
        1_048_576.0
    );
    assert_eq!(
        HashCashService::new(false).calculate_difficulty(&trade(), &NetworkLoad::new(1.0, 1.0)),
        0.0
    );
}

#[test]
fn test_difficulty_grows_with_cost_and_load() {
    let auth = HashCashService::new(true);
    let owner = Ed25519KeyPair::from_seed([3; 32]);
    let offer = EnvelopePayloadMessage::DataRequest(add(make_offer(
        &owner,
        "o",
        1,
        Timestamp::from_millis(0),
    )));
    let busy = NetworkLoad::new(0.8, 1.0);
    let quiet = NetworkLoad::new(0.2, 1.0);

    assert!(auth.calculate_difficulty(&offer, &busy) > auth.calculate_difficulty(&offer, &quiet));
    assert!(auth.calculate_difficulty(&trade(), &busy) > auth.calculate_difficulty(&offer, &busy));
}

// =============================================================================
// AUTHORIZATION
// =============================================================================

#[test]
fn test_minted_token_authorizes() {
    let auth = HashCashService::new(true);
    let sent = envelope(ping(1), 1);
    assert!(sent.authorization_token.proof_of_work.verify());
    assert!(auth
        .authorize(&sent.payload, &sent.authorization_token, &NetworkLoadSnapshot::default(), Some("c"), ME)
        .is_ok());
}

#[test]
fn test_counter_must_increase_per_connection() {
    let auth = HashCashService::new(true);
    let load = NetworkLoadSnapshot::default();
    let first = envelope(ping(1), 1);
    let zero = envelope(ping(0), 0);

    assert_eq!(
        auth.authorize(&zero.payload, &zero.authorization_token, &load, Some("c"), ME),
        Err(AuthorizationError::ReplayedCounter { counter: 0, last: 0 })
    );
    auth.authorize(&first.payload, &first.authorization_token, &load, Some("c"), ME)
        .unwrap();
    assert_eq!(
        auth.authorize(&first.payload, &first.authorization_token, &load, Some("c"), ME),
        Err(AuthorizationError::ReplayedCounter { counter: 1, last: 1 })
    );

    // Counters are independent per connection and reset when forgotten.
    auth.authorize(&first.payload, &first.authorization_token, &load, Some("d"), ME)
        .unwrap();
    auth.forget_connection("c");
    auth.authorize(&first.payload, &first.authorization_token, &load, Some("c"), ME)
        .unwrap();
}

#[test]
fn test_handshake_tokens_skip_counter_tracking() {
    let auth = HashCashService::new(true);
    let load = NetworkLoadSnapshot::default();
    let hello = envelope(ping(0), 0);
    for _ in 0..2 {
        auth.authorize(&hello.payload, &hello.authorization_token, &load, None, ME)
            .unwrap();
    }
}

#[test]
fn test_token_bound_to_payload() {
    let auth = HashCashService::new(true);
    let sent = envelope(ping(1), 1);
    assert_eq!(
        auth.authorize(&ping(2), &sent.authorization_token, &NetworkLoadSnapshot::default(), Some("c"), ME),
        Err(AuthorizationError::PayloadMismatch)
    );
}

#[test]
fn test_token_bound_to_receiver_address() {
    let auth = HashCashService::new(true);
    let sent = envelope(ping(1), 1);
    assert_eq!(
        auth.authorize(
            &sent.payload,
            &sent.authorization_token,
            &NetworkLoadSnapshot::default(),
            Some("c"),
            "127.0.0.1:9001"
        ),
        Err(AuthorizationError::ChallengeMismatch)
    );
}

#[test]
fn test_insufficient_difficulty_rejected() {
    let auth = HashCashService::new(true);
    // Minted for a quiet receiver: 65536 * 0.01 = 655.
    let sent = envelope(trade(), 1);
    let busy = NetworkLoadSnapshot::new(NetworkLoad::new(1.0, 1.0));

    let result = auth.authorize(&sent.payload, &sent.authorization_token, &busy, Some("c"), ME);
    assert!(matches!(
        result,
        Err(AuthorizationError::DifficultyTooLow { expected, .. }) if expected == 65_536.0
    ));
}

#[test]
fn test_previous_load_accepted() {
    let auth = HashCashService::new(true);
    let sent = envelope(trade(), 1);
    let load = NetworkLoadSnapshot::default();
    load.update(NetworkLoad::new(1.0, 1.0));

    assert!(auth
        .authorize(&sent.payload, &sent.authorization_token, &load, Some("c"), ME)
        .is_ok());
}

#[test]
fn test_shortfall_within_tolerance_accepted() {
    let auth = HashCashService::new(true);
    let sent = envelope(trade(), 1);
    // Expected 65536 * 0.5 = 32768; shortfall below tolerance.
    let load = NetworkLoadSnapshot::new(NetworkLoad::new(0.5, 1.0));
    assert!(auth
        .authorize(&sent.payload, &sent.authorization_token, &load, Some("c"), ME)
        .is_ok());
}

#[test]
fn test_overstated_difficulty_fails_proof() {
    let auth = HashCashService::new(true);
    let mut sent = envelope(ping(1), 1);
    sent.authorization_token.proof_of_work.difficulty = 1_048_576.0;

    assert_eq!(
        auth.authorize(&sent.payload, &sent.authorization_token, &NetworkLoadSnapshot::default(), Some("c"), ME),
        Err(AuthorizationError::InvalidProof)
    );
}

#[test]
fn test_disabled_service_checks_counter_only() {
    let auth = HashCashService::new(false);
    let token = auth
        .create_token(&trade(), &NetworkLoad::new(1.0, 1.0), "elsewhere:1", 3)
        .unwrap();
    assert_eq!(token.proof_of_work.difficulty, 0.0);

    let load = NetworkLoadSnapshot::default();
    auth.authorize(&trade(), &token, &load, Some("c"), ME).unwrap();
    assert!(matches!(
        auth.authorize(&trade(), &token, &load, Some("c"), ME),
        Err(AuthorizationError::ReplayedCounter { .. })
    ));
}

// =============================================================================
// EXTENSIONS
// =============================================================================

struct Greeting;

impl ExtensionDecoder for Greeting {
    fn payload_type(&self) -> &str {
        "test.Greeting"
    }

    fn decode(&self, bytes: &[u8]) -> Result<Box<dyn Any + Send>, EnvelopeError> {
        let text = String::from_utf8(bytes.to_vec()).map_err(|e| EnvelopeError::Decode(e.to_string()))?;
        Ok(Box::new(text))
    }
}

#[test]
fn test_registry_decodes_registered_extension() {
    let mut registry = ExtensionRegistry::new();
    registry.register(Arc::new(Greeting));
    assert!(registry.contains("test.Greeting"));

    let decoded = registry
        .decode(&ExternalPayload::new("test.Greeting", b"hello".to_vec()))
        .unwrap();
    assert_eq!(decoded.downcast_ref::<String>().map(String::as_str), Some("hello"));

    assert!(matches!(
        registry.decode(&ExternalPayload::new("test.Greeting", vec![0xff])),
        Err(EnvelopeError::Decode(_))
    ));
}

struct Farewell;

impl ExtensionDecoder for Farewell {
    fn payload_type(&self) -> &str {
        "test.Farewell"
    }

    fn decode(&self, bytes: &[u8]) -> Result<Box<dyn Any + Send>, EnvelopeError> {
        Ok(Box::new(bytes.len()))
    }
}

#[test]
fn test_registry_keyed_by_payload_type() {
    let mut registry = ExtensionRegistry::new();
    registry.register(Arc::new(Greeting));
    registry.register(Arc::new(Farewell));
    assert_eq!(registry.type_ids(), vec!["test.Farewell".to_string(), "test.Greeting".to_string()]);

    let decoded = registry
        .decode(&ExternalPayload::new("test.Farewell", vec![7; 4]))
        .unwrap();
    assert_eq!(decoded.downcast_ref::<usize>(), Some(&4));

    // Re-registering the same payload type replaces the decoder.
    registry.register(Arc::new(Greeting));
    assert_eq!(registry.type_ids().len(), 2);
}

#[test]
fn test_unknown_extension_still_travels() {
    let registry = ExtensionRegistry::new();
    let payload = ExternalPayload::new("trade.Unknown", vec![1, 2, 3]);
    assert!(matches!(
        registry.decode(&payload),
        Err(EnvelopeError::UnknownExtension(id)) if id == "trade.Unknown"
    ));

    // The codec itself does not need the decoder.
    let sent = envelope(EnvelopePayloadMessage::External(payload), 1);
    assert_eq!(decode(&encode(&sent).unwrap()).unwrap(), sent);
}
