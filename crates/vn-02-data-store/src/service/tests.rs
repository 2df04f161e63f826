//! # Data Store Service Tests

use super::*;
use crate::adapters::{FilePersistence, InMemoryPersistence};
use crate::domain::{
    DataRequest, EntryKind, StorageError, StorageOutcome, StoreEvent, StoreSnapshot,
};
use crate::ports::PersistencePort;
use crate::test_utils::*;
use proptest::prelude::*;
use shared_crypto::Ed25519KeyPair;
use shared_types::{ManualTimeSource, MetaData, TimeSource, Timestamp};
use std::sync::Arc;
use std::time::Duration;

const T0: Timestamp = Timestamp::from_millis(10_000_000);

fn make_store() -> (DataStore, Arc<ManualTimeSource>) {
    let clock = Arc::new(ManualTimeSource::new(T0));
    (DataStore::new(StoreConfig::for_testing(), clock.clone()), clock)
}

fn owner() -> Ed25519KeyPair {
    Ed25519KeyPair::from_seed([1; 32])
}

// =============================================================================
// SEQUENCE NUMBERS
// =============================================================================

#[test]
fn test_add_then_newer_version_replaces() {
    let (store, _) = make_store();
    let keys = owner();

    assert_eq!(
        store.add_authenticated(make_offer(&keys, "o1", 1, T0)),
        Ok(StorageOutcome::Added)
    );
    let newer = make_offer(&keys, "o1", 2, T0);
    assert_eq!(store.add_authenticated(newer.clone()), Ok(StorageOutcome::Added));
    assert_eq!(
        store.get(EntryKind::Authenticated, &newer.key()),
        Some(DataRequest::AddAuthenticated(newer))
    );
    assert_eq!(store.counts().authenticated, 1);
}

#[test]
fn test_identical_resubmission_already_received() {
    let (store, _) = make_store();
    let entry = make_offer(&owner(), "o1", 3, T0);

    assert_eq!(store.add_authenticated(entry.clone()), Ok(StorageOutcome::Added));
    assert_eq!(
        store.add_authenticated(entry),
        Ok(StorageOutcome::AlreadyReceived)
    );
}

#[test]
fn test_equal_sequence_different_content_rejected_stale() {
    let (store, _) = make_store();
    let keys = owner();
    let first = make_authenticated(offer_metadata(), &keys, "o1", vec![1], 5, T0);
    let rival = make_authenticated(offer_metadata(), &keys, "o1", vec![2], 5, T0);

    store.add_authenticated(first.clone()).unwrap();
    assert_eq!(
        store.add_authenticated(rival),
        Ok(StorageOutcome::RejectedStale {
            stored: 5,
            incoming: 5
        })
    );
    assert_eq!(
        store.get(EntryKind::Authenticated, &first.key()),
        Some(DataRequest::AddAuthenticated(first))
    );
}

#[test]
fn test_lower_sequence_rejected_stale() {
    let (store, _) = make_store();
    let keys = owner();
    store.add_authenticated(make_offer(&keys, "o1", 7, T0)).unwrap();

    assert_eq!(
        store.add_authenticated(make_offer(&keys, "o1", 6, T0)),
        Ok(StorageOutcome::RejectedStale {
            stored: 7,
            incoming: 6
        })
    );
}

proptest! {
    #[test]
    fn prop_stored_sequence_is_running_max(seqs in proptest::collection::vec(0i32..50, 1..30)) {
        let (store, _) = make_store();
        let keys = owner();
        let mut max = None;

        for seq in seqs {
            let entry = make_offer(&keys, "o1", seq, T0);
            let key = entry.key();
            let outcome = store.add_authenticated(entry).unwrap();

            let expected_added = max.map_or(true, |m| seq > m);
            prop_assert_eq!(outcome == StorageOutcome::Added, expected_added);
            max = Some(max.map_or(seq, |m: i32| m.max(seq)));
            prop_assert_eq!(store.sequence_number(EntryKind::Authenticated, &key), max);
        }
    }
}

// =============================================================================
// VALIDATION
// =============================================================================

#[test]
fn test_invalid_signature_never_stored() {
    let (store, _) = make_store();
    let mut entry = make_offer(&owner(), "o1", 1, T0);
    entry.data.payload = vec![99];
    let key = entry.key();

    assert!(matches!(
        store.add_authenticated(entry),
        Err(StorageError::InvalidSignature { .. })
    ));
    assert!(store.get(EntryKind::Authenticated, &key).is_none());
    assert!(store.snapshot().is_empty());
}

#[test]
fn test_remove_of_append_only_refused() {
    let (store, _) = make_store();
    let trade = make_trade(b"t", T0);
    let remove = make_remove(EntryKind::Authenticated, trade.key(), &owner(), 1, T0);
    assert!(matches!(
        store.remove(EntryKind::AppendOnly, remove),
        Err(StorageError::Malformed { .. })
    ));
}

// =============================================================================
// TOMBSTONES
// =============================================================================

#[test]
fn test_remove_leaves_tombstone_blocking_older_add() {
    let (store, _) = make_store();
    let keys = owner();
    let entry = make_offer(&keys, "o1", 1, T0);
    let key = entry.key();
    store.add_authenticated(entry.clone()).unwrap();

    let remove = make_remove(EntryKind::Authenticated, key, &keys, 2, T0);
    assert_eq!(
        store.remove(EntryKind::Authenticated, remove.clone()),
        Ok(StorageOutcome::Removed)
    );
    assert!(store.get(EntryKind::Authenticated, &key).is_none());
    assert_eq!(
        store.request(EntryKind::Authenticated, &key),
        Some(DataRequest::RemoveAuthenticated(remove.clone()))
    );

    // The original add arriving late must not resurrect the entry.
    assert_eq!(
        store.add_authenticated(entry),
        Ok(StorageOutcome::RejectedStale {
            stored: 2,
            incoming: 1
        })
    );
    assert_eq!(
        store.remove(EntryKind::Authenticated, remove),
        Ok(StorageOutcome::AlreadyReceived)
    );

    let snapshot = store.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert!(snapshot[0].is_tombstone);
    assert_eq!(snapshot[0].sequence_number, Some(2));
}

#[test]
fn test_remove_before_add_preempts() {
    let (store, _) = make_store();
    let keys = owner();
    let entry = make_offer(&keys, "o1", 1, T0);
    let remove = make_remove(EntryKind::Authenticated, entry.key(), &keys, 2, T0);

    assert_eq!(
        store.remove(EntryKind::Authenticated, remove),
        Ok(StorageOutcome::Removed)
    );
    assert!(matches!(
        store.add_authenticated(entry),
        Ok(StorageOutcome::RejectedStale { .. })
    ));
}

#[test]
fn test_newer_add_after_tombstone_accepted() {
    let (store, _) = make_store();
    let keys = owner();
    let key = make_offer(&keys, "o1", 1, T0).key();
    store
        .remove(
            EntryKind::Authenticated,
            make_remove(EntryKind::Authenticated, key, &keys, 2, T0),
        )
        .unwrap();

    assert_eq!(
        store.add_authenticated(make_offer(&keys, "o1", 3, T0)),
        Ok(StorageOutcome::Added)
    );
}

#[test]
fn test_remove_by_stranger_not_authorized() {
    let (store, _) = make_store();
    let entry = make_offer(&owner(), "o1", 1, T0);
    let key = entry.key();
    store.add_authenticated(entry).unwrap();

    let stranger = Ed25519KeyPair::from_seed([7; 32]);
    let remove = make_remove(EntryKind::Authenticated, key, &stranger, 2, T0);
    assert!(matches!(
        store.remove(EntryKind::Authenticated, remove),
        Err(StorageError::NotAuthorized { .. })
    ));
    assert!(store.get(EntryKind::Authenticated, &key).is_some());
}

#[test]
fn test_mailbox_removable_by_receiver() {
    let (store, _) = make_store();
    let sender = Ed25519KeyPair::from_seed([2; 32]);
    let receiver = Ed25519KeyPair::from_seed([3; 32]);
    let message = make_mailbox(&sender, &receiver, "m1", 1, T0);
    let key = message.key();

    assert_eq!(store.add_mailbox(message), Ok(StorageOutcome::Added));
    let remove = make_remove(EntryKind::Mailbox, key, &receiver, 2, T0);
    assert_eq!(
        store.remove(EntryKind::Mailbox, remove),
        Ok(StorageOutcome::Removed)
    );
    assert!(store.get(EntryKind::Mailbox, &key).is_none());
}

#[test]
fn test_remove_signed_for_other_kind_rejected() {
    let (store, _) = make_store();
    let keys = owner();
    let entry = make_offer(&keys, "o1", 1, T0);
    store.add_authenticated(entry.clone()).unwrap();

    let remove = make_remove(EntryKind::Mailbox, entry.key(), &keys, 2, T0);
    assert!(matches!(
        store.remove(EntryKind::Authenticated, remove),
        Err(StorageError::InvalidSignature { .. })
    ));
}

// =============================================================================
// APPEND-ONLY
// =============================================================================

#[test]
fn test_append_only_dedup_by_content() {
    let (store, _) = make_store();
    let trade = make_trade(b"fill", T0);

    assert_eq!(store.add_append_only(trade.clone()), Ok(StorageOutcome::Added));
    assert_eq!(
        store.add_append_only(trade.clone()),
        Ok(StorageOutcome::AlreadyReceived)
    );
    let entries = store.snapshot_of(EntryKind::AppendOnly);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].key, trade.key());
    assert_eq!(entries[0].sequence_number, None);
}

// =============================================================================
// TTL
// =============================================================================

#[test]
fn test_ttl_boundary_is_exclusive() {
    let (store, clock) = make_store();
    let entry = make_offer(&owner(), "o1", 1, T0);
    let key = entry.key();
    store.add_authenticated(entry).unwrap();

    clock.set(T0.saturating_add(TEST_TTL - Duration::from_millis(1)));
    assert!(store.get(EntryKind::Authenticated, &key).is_some());

    clock.set(T0.saturating_add(TEST_TTL));
    assert!(store.get(EntryKind::Authenticated, &key).is_none());
    assert!(store.snapshot().is_empty());
    assert_eq!(store.counts().total(), 0);
}

#[test]
fn test_expired_request_refused() {
    let (store, clock) = make_store();
    let entry = make_offer(&owner(), "o1", 1, T0);
    clock.set(T0.saturating_add(TEST_TTL));

    assert!(matches!(
        store.add_authenticated(entry),
        Err(StorageError::RequestExpired { .. })
    ));
}

#[test]
fn test_sweep_keeps_marker_against_replay() {
    let (store, clock) = make_store();
    let keys = owner();
    let old = make_offer(&keys, "o1", 4, T0);
    let key = old.key();
    store.add_authenticated(old).unwrap();

    clock.set(T0.saturating_add(TEST_TTL));
    assert_eq!(store.sweep_expired(), vec![(EntryKind::Authenticated, key)]);
    assert_eq!(store.sequence_number(EntryKind::Authenticated, &key), Some(4));

    // A replay of an older version, freshly dated, stays out.
    let replay = make_offer(&keys, "o1", 3, clock.now());
    assert!(matches!(
        store.add_authenticated(replay),
        Ok(StorageOutcome::RejectedStale { stored: 4, .. })
    ));

    // The marker itself expires one TTL later.
    clock.advance(TEST_TTL);
    assert!(store.sweep_expired().is_empty());
    assert_eq!(store.sequence_number(EntryKind::Authenticated, &key), None);
}

#[test]
fn test_sweep_purges_tombstones() {
    let (store, clock) = make_store();
    let keys = owner();
    let key = make_offer(&keys, "o1", 1, T0).key();
    store
        .remove(
            EntryKind::Authenticated,
            make_remove(EntryKind::Authenticated, key, &keys, 2, T0),
        )
        .unwrap();

    clock.set(T0.saturating_add(TEST_TTL));
    store.sweep_expired();
    assert_eq!(store.sequence_number(EntryKind::Authenticated, &key), None);
}

// =============================================================================
// EVICTION
// =============================================================================

#[test]
fn test_map_bound_evicts_lowest_sequence() {
    let (store, _) = make_store();
    let metadata = MetaData::new(TEST_TTL, "Bounded").with_max_map_size(2);
    let mut events = store.subscribe();

    let entries: Vec<_> = (0..3u8)
        .map(|i| {
            let keys = Ed25519KeyPair::from_seed([10 + i; 32]);
            make_authenticated(metadata.clone(), &keys, "b", vec![i], i32::from(i) + 1, T0)
        })
        .collect();
    for entry in &entries {
        store.add_authenticated(entry.clone()).unwrap();
    }

    assert!(store.get(EntryKind::Authenticated, &entries[0].key()).is_none());
    assert!(store.get(EntryKind::Authenticated, &entries[1].key()).is_some());
    assert!(store.get(EntryKind::Authenticated, &entries[2].key()).is_some());

    let mut evicted = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let StoreEvent::Evicted { key, .. } = event {
            evicted.push(key);
        }
    }
    assert_eq!(evicted, vec![entries[0].key()]);
}

#[test]
fn test_map_bound_is_per_type() {
    let (store, _) = make_store();
    let bounded = MetaData::new(TEST_TTL, "Bounded").with_max_map_size(1);
    let keys = owner();

    store
        .add_authenticated(make_authenticated(bounded.clone(), &keys, "a", vec![], 1, T0))
        .unwrap();
    store.add_authenticated(make_offer(&keys, "o1", 1, T0)).unwrap();
    store.add_authenticated(make_offer(&keys, "o2", 1, T0)).unwrap();

    assert_eq!(store.counts().authenticated, 3);
}

// =============================================================================
// EVENTS
// =============================================================================

#[test]
fn test_events_follow_writes() {
    let (store, clock) = make_store();
    let mut events = store.subscribe();
    let keys = owner();
    let entry = make_offer(&keys, "o1", 1, T0);
    let key = entry.key();

    store.add_authenticated(entry.clone()).unwrap();
    store.add_authenticated(entry).unwrap();
    store
        .remove(
            EntryKind::Authenticated,
            make_remove(EntryKind::Authenticated, key, &keys, 2, T0),
        )
        .unwrap();
    store.add_append_only(make_trade(b"x", T0)).unwrap();
    clock.set(T0.saturating_add(TEST_TTL));
    store.sweep_expired();

    let received: Vec<StoreEvent> = std::iter::from_fn(|| events.try_recv().ok()).collect();
    assert!(matches!(received[0], StoreEvent::Added { kind: EntryKind::Authenticated, .. }));
    assert!(matches!(received[1], StoreEvent::Removed { .. }));
    assert!(matches!(received[2], StoreEvent::Added { kind: EntryKind::AppendOnly, .. }));
    assert!(matches!(received[3], StoreEvent::Expired { kind: EntryKind::AppendOnly, .. }));
    assert_eq!(received.len(), 4);
}

// =============================================================================
// CONCURRENCY
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_adds_same_key_single_winner() {
    let store = Arc::new(DataStore::default());
    let keys = Arc::new(owner());
    let created = Timestamp::now();

    let tasks: Vec<_> = (1..=32)
        .map(|seq| {
            let store = store.clone();
            let keys = keys.clone();
            tokio::spawn(async move {
                store.add_authenticated(make_offer(&keys, "hot", seq, created))
            })
        })
        .collect();
    for task in join_tasks(tasks).await {
        assert!(task.is_ok());
    }

    let key = make_offer(&keys, "hot", 1, created).key();
    assert_eq!(store.sequence_number(EntryKind::Authenticated, &key), Some(32));
    assert_eq!(store.counts().authenticated, 1);
}

async fn join_tasks(
    tasks: Vec<tokio::task::JoinHandle<Result<StorageOutcome, StorageError>>>,
) -> Vec<Result<StorageOutcome, StorageError>> {
    let mut results = Vec::with_capacity(tasks.len());
    for task in tasks {
        results.push(task.await.unwrap());
    }
    results
}

// =============================================================================
// PERSISTENCE
// =============================================================================

#[test]
fn test_export_import_keeps_tombstones() {
    let (store, _) = make_store();
    let keys = owner();
    let live = make_offer(&keys, "o1", 1, T0);
    let removed = make_offer(&keys, "o2", 1, T0);
    store.add_authenticated(live.clone()).unwrap();
    store.add_authenticated(removed.clone()).unwrap();
    store
        .remove(
            EntryKind::Authenticated,
            make_remove(EntryKind::Authenticated, removed.key(), &keys, 2, T0),
        )
        .unwrap();
    store.add_append_only(make_trade(b"t", T0)).unwrap();

    let persistence = InMemoryPersistence::new();
    store.save_to(&persistence).unwrap();

    let (restored, _) = make_store();
    assert_eq!(restored.load_from(&persistence), Ok(3));
    assert!(restored.get(EntryKind::Authenticated, &live.key()).is_some());
    assert!(matches!(
        restored.add_authenticated(removed),
        Ok(StorageOutcome::RejectedStale { stored: 2, .. })
    ));
    assert_eq!(restored.counts().append_only, 1);
}

#[test]
fn test_import_skips_expired() {
    let (store, _) = make_store();
    store.add_authenticated(make_offer(&owner(), "o1", 1, T0)).unwrap();
    let snapshot = store.export();

    let (restored, clock) = make_store();
    clock.set(T0.saturating_add(TEST_TTL));
    assert_eq!(restored.import(snapshot), 0);
}

#[test]
fn test_file_persistence_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let persistence = FilePersistence::in_dir(dir.path());
    let (store, _) = make_store();
    let sender = Ed25519KeyPair::from_seed([2; 32]);
    let receiver = Ed25519KeyPair::from_seed([3; 32]);
    let message = make_mailbox(&sender, &receiver, "m1", 1, T0);
    store.add_mailbox(message.clone()).unwrap();

    store.save_to(&persistence).unwrap();
    let loaded = persistence.load_snapshot().unwrap().unwrap();
    assert_eq!(loaded.version, StoreSnapshot::VERSION);

    let (restored, _) = make_store();
    restored.import(loaded);
    assert_eq!(
        restored.get(EntryKind::Mailbox, &message.key()),
        Some(DataRequest::AddMailbox(message))
    );
}

// =============================================================================
// SWEEPER
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_sweeper_runs_until_shutdown() {
    let clock = Arc::new(ManualTimeSource::new(T0));
    let store = Arc::new(DataStore::new(StoreConfig::for_testing(), clock.clone()));
    let mut events = store.subscribe();
    store.add_append_only(make_trade(b"t", T0)).unwrap();
    let _ = events.recv().await;

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let handle = spawn_sweeper(store.clone(), Duration::from_secs(1), shutdown_rx);

    clock.set(T0.saturating_add(TEST_TTL));
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert!(matches!(events.recv().await, Ok(StoreEvent::Expired { .. })));

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap();
}
