//! # Confidential Delivery
//!
//! Direct delivery over a fresh connection, and the mailbox path for a
//! recipient that comes online later and pulls the entry from a relay.

use std::time::Duration;

use node_runtime::handlers::Delivery;
use node_runtime::SendOutcome;
use shared_crypto::Ed25519KeyPair;
use shared_types::{Address, MetaData, NetworkId};
use tokio_test::assert_ok;

use super::harness::{eventually, start, start_as};

fn mailbox_metadata() -> MetaData {
    MetaData::new(Duration::from_secs(600), "MailboxMessage")
}

// =============================================================================
// DIRECT
// =============================================================================

#[tokio::test]
async fn test_direct_message_reaches_online_recipient() {
    let alice = start(Vec::new()).await;
    let bob = start(Vec::new()).await;

    let outcome = assert_ok!(
        alice
            .runtime
            .confidential()
            .confidential_send(b"hello bob", &bob.runtime.network_id(), None)
            .await
    );
    assert_eq!(outcome, SendOutcome::Sent { address: bob.address() });

    eventually(|| bob.inbox.messages().len() == 1).await;
    let received = &bob.inbox.messages()[0];
    assert_eq!(received.payload, b"hello bob");
    assert_eq!(received.sender, alice.identity.public_key());
    assert_eq!(received.delivery, Delivery::Direct);
    assert!(alice.inbox.messages().is_empty());

    alice.runtime.shutdown().await;
    bob.runtime.shutdown().await;
}

#[tokio::test]
async fn test_direct_send_prefers_connection_over_mailbox() {
    let alice = start(Vec::new()).await;
    let bob = start(vec![alice.address()]).await;

    let outcome = assert_ok!(
        alice
            .runtime
            .confidential()
            .confidential_send(b"fast path", &bob.runtime.network_id(), Some(mailbox_metadata()))
            .await
    );
    assert!(matches!(outcome, SendOutcome::Sent { .. }));
    eventually(|| bob.inbox.messages().len() == 1).await;
    assert_eq!(alice.runtime.store().counts().mailbox, 0);

    alice.runtime.shutdown().await;
    bob.runtime.shutdown().await;
}

// =============================================================================
// MAILBOX
// =============================================================================

#[tokio::test]
async fn test_offline_recipient_collects_from_relay() {
    let relay = start(Vec::new()).await;
    let alice = start(vec![relay.address()]).await;

    // Nothing listens on port 1, so the direct attempt fails fast.
    let carol_identity = Ed25519KeyPair::generate();
    let carol_id = NetworkId::with_address(
        Address::localhost(1),
        *carol_identity.public_key().as_bytes(),
    );
    let outcome = assert_ok!(
        alice
            .runtime
            .confidential()
            .confidential_send(b"while you were out", &carol_id, Some(mailbox_metadata()))
            .await
    );
    assert!(matches!(outcome, SendOutcome::StoredInMailbox { .. }));
    eventually(|| relay.runtime.store().counts().mailbox == 1).await;

    let carol = start_as(carol_identity, vec![relay.address()]).await;
    eventually(|| carol.inbox.messages().len() == 1).await;
    let received = &carol.inbox.messages()[0];
    assert_eq!(received.payload, b"while you were out");
    assert_eq!(received.sender, alice.identity.public_key());
    assert_eq!(received.delivery, Delivery::Mailbox);

    // The consumed entry is removed everywhere.
    eventually(|| relay.runtime.store().counts().mailbox == 0).await;
    eventually(|| alice.runtime.store().counts().mailbox == 0).await;
    assert_eq!(carol.runtime.store().counts().mailbox, 0);

    for runtime in [&relay, &alice, &carol] {
        runtime.runtime.shutdown().await;
    }
}

#[tokio::test]
async fn test_relay_cannot_read_mailbox_entry() {
    let relay = start(Vec::new()).await;
    let alice = start(vec![relay.address()]).await;

    let dave = Ed25519KeyPair::generate();
    let dave_id = NetworkId::with_address(Address::localhost(1), *dave.public_key().as_bytes());
    assert_ok!(
        alice
            .runtime
            .confidential()
            .confidential_send(b"sealed", &dave_id, Some(mailbox_metadata()))
            .await
    );

    eventually(|| relay.runtime.store().counts().mailbox == 1).await;
    assert_eq!(relay.runtime.confidential().drain_mailbox().await, 0);
    assert!(relay.inbox.messages().is_empty());
    assert_eq!(relay.runtime.store().counts().mailbox, 1);

    relay.runtime.shutdown().await;
    alice.runtime.shutdown().await;
}
