//! # Restart
//!
//! The store is written on shutdown and restored by the next runtime built
//! over the same data directory.

use shared_crypto::Ed25519KeyPair;
use tempfile::TempDir;
use tokio_test::assert_ok;
use vn_02_data_store::test_utils::{add, make_offer, make_remove, make_trade};
use vn_02_data_store::{DataRequest, EntryKind, StorageOutcome};

use node_runtime::{load_or_create_identity, NodeRuntime};

use super::harness::config;

#[tokio::test]
async fn test_store_survives_restart() {
    let dir = assert_ok!(TempDir::new());
    let owner = Ed25519KeyPair::generate();
    let identity = assert_ok!(load_or_create_identity(dir.path()));

    let first = assert_ok!(NodeRuntime::new(config(dir.path(), Vec::new()), identity));
    assert_ok!(first.start().await);
    let now = first.store().now();
    let kept = make_offer(&owner, "kept", 1, now);
    let dropped = make_offer(&owner, "dropped", 1, now);
    let kept_key = kept.key();
    let dropped_key = dropped.key();
    assert_ok!(first.publish(add(kept)).await);
    assert_ok!(first.publish(add(dropped)).await);
    assert_ok!(
        first
            .publish(DataRequest::RemoveAuthenticated(make_remove(
                EntryKind::Authenticated,
                dropped_key,
                &owner,
                2,
                now,
            )))
            .await
    );
    assert_ok!(first.publish(DataRequest::AddAppendOnly(make_trade(b"trade-1", now))).await);
    let key_id = first.confidential().key_id().to_string();
    first.shutdown().await;

    let identity = assert_ok!(load_or_create_identity(dir.path()));
    let second = assert_ok!(NodeRuntime::new(config(dir.path(), Vec::new()), identity));
    assert_eq!(second.confidential().key_id(), key_id);

    let counts = second.store().counts();
    assert_eq!(counts.authenticated, 1);
    assert_eq!(counts.append_only, 1);
    assert_eq!(second.store().sequence_number(EntryKind::Authenticated, &kept_key), Some(1));

    // The tombstone came back too, so the old add cannot resurrect.
    let stale = make_offer(&owner, "dropped", 1, second.store().now());
    assert!(matches!(
        assert_ok!(second.store().apply(add(stale))),
        StorageOutcome::RejectedStale { .. }
    ));
}

#[tokio::test]
async fn test_no_snapshot_without_persist_on_shutdown() {
    let dir = assert_ok!(TempDir::new());
    let owner = Ed25519KeyPair::generate();
    let mut settings = config(dir.path(), Vec::new());
    settings.store.persist_on_shutdown = false;

    let first = assert_ok!(NodeRuntime::new(settings, Ed25519KeyPair::generate()));
    assert_ok!(first.start().await);
    assert_ok!(first.publish(add(make_offer(&owner, "gone", 1, first.store().now()))).await);
    first.shutdown().await;

    let second = assert_ok!(NodeRuntime::new(
        config(dir.path(), Vec::new()),
        Ed25519KeyPair::generate()
    ));
    assert_eq!(second.store().counts().total(), 0);
}
