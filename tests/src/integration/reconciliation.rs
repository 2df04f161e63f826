//! # Anti-Entropy Between Runtimes
//!
//! ```text
//! [A: k1 seq=5] ──filter──▶ [B: empty]
//!       │                        │
//!       └──── inventory {k1} ───▶│ ingest through the normal add path
//! ```

use std::sync::Arc;

use shared_crypto::Ed25519KeyPair;
use shared_types::TransportType;
use tokio_test::assert_ok;
use vn_01_transport::CancelToken;
use vn_02_data_store::test_utils::{add, make_offer, make_remove};
use vn_02_data_store::{DataRequest, DataStore, EntryKind, StorageOutcome};
use vn_03_inventory::{InventoryConfig, InventoryService};

use super::harness::{eventually, start, start_with};

fn inventory(store: &Arc<DataStore>) -> InventoryService<DataStore> {
    InventoryService::new(Arc::clone(store), InventoryConfig::for_testing())
}

// =============================================================================
// RECONCILIATION
// =============================================================================

#[tokio::test]
async fn test_late_joiner_pulls_missing_entry() {
    let owner = Ed25519KeyPair::generate();
    let a = start(Vec::new()).await;
    let entry = make_offer(&owner, "k1", 5, a.runtime.store().now());
    let key = entry.key();
    assert_eq!(
        assert_ok!(a.runtime.store().apply(add(entry))),
        StorageOutcome::Added
    );

    // Start reconciles with the seed before returning.
    let b = start(vec![a.address()]).await;
    assert_eq!(b.runtime.store().sequence_number(EntryKind::Authenticated, &key), Some(5));

    let a_view = inventory(a.runtime.store());
    let b_view = inventory(b.runtime.store());
    assert!(a_view.find_missing(&b_view.build_filter()).is_empty());
    assert!(b_view.find_missing(&a_view.build_filter()).is_empty());

    let reports = b.runtime.reconcile(&CancelToken::never()).await;
    assert_eq!(reports.len(), 1);
    let report = assert_ok!(reports.into_iter().next().unwrap());
    assert_eq!(report.ingest.stored, 0);
    assert!(report.complete);

    a.runtime.shutdown().await;
    b.runtime.shutdown().await;
}

#[tokio::test]
async fn test_newer_sequence_replaces_older_on_reconcile() {
    let owner = Ed25519KeyPair::generate();
    let a = start(Vec::new()).await;
    let b = start(Vec::new()).await;

    let now = a.runtime.store().now();
    assert_ok!(b.runtime.store().apply(add(make_offer(&owner, "k1", 2, now))));
    assert_ok!(a.runtime.store().apply(add(make_offer(&owner, "k1", 7, now))));

    let node = b.runtime.node(TransportType::Clear).unwrap();
    assert_ok!(node.connect(&a.address()).await);
    let reports = b.runtime.reconcile(&CancelToken::never()).await;
    let report = assert_ok!(reports.into_iter().next().unwrap());
    assert_eq!(report.ingest.stored, 1);

    let key = make_offer(&owner, "k1", 7, now).key();
    assert_eq!(b.runtime.store().sequence_number(EntryKind::Authenticated, &key), Some(7));

    a.runtime.shutdown().await;
    b.runtime.shutdown().await;
}

#[tokio::test]
async fn test_reconcile_with_proof_of_work_enabled() {
    let owner = Ed25519KeyPair::generate();
    let pow = |config: &mut node_runtime::NodeConfig| config.authorization.enabled = true;
    let a = start_with(Ed25519KeyPair::generate(), Vec::new(), pow).await;
    for id in ["p1", "p2", "p3"] {
        assert_ok!(a.runtime.store().apply(add(make_offer(&owner, id, 1, a.runtime.store().now()))));
    }

    let b = start_with(Ed25519KeyPair::generate(), vec![a.address()], pow).await;
    assert_eq!(b.runtime.store().counts().authenticated, 3);

    a.runtime.shutdown().await;
    b.runtime.shutdown().await;
}

// =============================================================================
// GOSSIP
// =============================================================================

#[tokio::test]
async fn test_published_entry_floods_along_chain() {
    let owner = Ed25519KeyPair::generate();
    let a = start(Vec::new()).await;
    let b = start(vec![a.address()]).await;
    let c = start(vec![b.address()]).await;

    let entry = make_offer(&owner, "flood", 1, a.runtime.store().now());
    let key = entry.key();
    assert_eq!(
        assert_ok!(a.runtime.publish(add(entry)).await),
        StorageOutcome::Added
    );

    eventually(|| c.runtime.store().sequence_number(EntryKind::Authenticated, &key) == Some(1)).await;
    assert_eq!(b.runtime.store().counts().authenticated, 1);

    // The tombstone follows the same path.
    let remove = make_remove(EntryKind::Authenticated, key, &owner, 2, a.runtime.store().now());
    assert_eq!(
        assert_ok!(a.runtime.publish(DataRequest::RemoveAuthenticated(remove)).await),
        StorageOutcome::Removed
    );
    eventually(|| c.runtime.store().counts().authenticated == 0).await;

    for runtime in [&a, &b, &c] {
        runtime.runtime.shutdown().await;
    }
}

#[tokio::test]
async fn test_stale_publish_is_not_forwarded() {
    let owner = Ed25519KeyPair::generate();
    let a = start(Vec::new()).await;
    let b = start(vec![a.address()]).await;

    let now = a.runtime.store().now();
    assert_ok!(a.runtime.publish(add(make_offer(&owner, "k", 3, now))).await);
    let key = make_offer(&owner, "k", 3, now).key();
    eventually(|| b.runtime.store().sequence_number(EntryKind::Authenticated, &key) == Some(3)).await;

    let outcome = assert_ok!(a.runtime.publish(add(make_offer(&owner, "k", 2, now))).await);
    assert_eq!(outcome, StorageOutcome::RejectedStale { stored: 3, incoming: 2 });
    assert_eq!(b.runtime.store().sequence_number(EntryKind::Authenticated, &key), Some(3));

    a.runtime.shutdown().await;
    b.runtime.shutdown().await;
}
