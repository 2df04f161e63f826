//! The data store service.
//!
//! ## Write path
//!
//! ```text
//! request ──> validate ──> lock shard ──> duplicate? ──> stale? ──> put ──> unlock
//!                                                                          │
//!                                     event <── evict over bound <─────────┘
//! ```
//!
//! Each write holds only its key's shard lock, so a compare-and-swap on a
//! key is atomic while unrelated keys proceed in parallel.

use crate::domain::errors::StorageError;
use crate::domain::events::StoreEvent;
use crate::domain::keys::StorageKey;
use crate::domain::outcome::StorageOutcome;
use crate::domain::record::{Authority, Record, Slot};
use crate::domain::requests::{
    AppendOnlyEntry, AuthenticatedEntry, DataRequest, EntryKind, MailboxEntry, RemoveRequest,
};
use crate::domain::snapshot::{SnapshotEntry, StoreCounts, StoreSnapshot};
use crate::domain::validation::{self, Limits};
use crate::ports::outbound::PersistencePort;
use crate::service::map::KindMap;
use shared_types::{SystemTimeSource, TimeSource, Timestamp};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Store tuning.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Lock shards per kind.
    pub shard_count: usize,
    pub limits: Limits,
    /// Broadcast buffer; slow subscribers see `Lagged`.
    pub event_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            shard_count: 16,
            limits: Limits::default(),
            event_capacity: 1024,
        }
    }
}

impl StoreConfig {
    #[cfg(any(test, feature = "test-utils"))]
    pub fn for_testing() -> Self {
        Self {
            shard_count: 4,
            limits: Limits::default(),
            event_capacity: 256,
        }
    }
}

pub struct DataStore {
    config: StoreConfig,
    authenticated: KindMap,
    mailbox: KindMap,
    append_only: KindMap,
    time: Arc<dyn TimeSource>,
    events: broadcast::Sender<StoreEvent>,
}

impl std::fmt::Debug for DataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataStore")
            .field("config", &self.config)
            .field("counts", &self.counts())
            .finish()
    }
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new(StoreConfig::default(), Arc::new(SystemTimeSource::new()))
    }
}

impl DataStore {
    pub fn new(config: StoreConfig, time: Arc<dyn TimeSource>) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            authenticated: KindMap::new(EntryKind::Authenticated, config.shard_count),
            mailbox: KindMap::new(EntryKind::Mailbox, config.shard_count),
            append_only: KindMap::new(EntryKind::AppendOnly, config.shard_count),
            config,
            time,
            events,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn now(&self) -> Timestamp {
        self.time.now()
    }

    /// Change notifications from this point on.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn map(&self, kind: EntryKind) -> &KindMap {
        match kind {
            EntryKind::Authenticated => &self.authenticated,
            EntryKind::Mailbox => &self.mailbox,
            EntryKind::AppendOnly => &self.append_only,
        }
    }

    fn publish(&self, event: StoreEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    // =========================================================================
    // WRITES
    // =========================================================================

    /// Validate and apply any request.
    pub fn apply(&self, request: DataRequest) -> Result<StorageOutcome, StorageError> {
        let now = self.time.now();
        if let Err(err) = validation::validate(&request, now, &self.config.limits) {
            debug!(kind = %request.kind(), key = %request.key(), error = %err, "[vn-02] Request rejected");
            return Err(err);
        }

        match request {
            DataRequest::AddAppendOnly(entry) => Ok(self.insert_append_only(entry, now)),
            DataRequest::AddAuthenticated(_) | DataRequest::AddMailbox(_) => {
                Ok(self.insert_versioned(request, now))
            }
            DataRequest::RemoveAuthenticated(remove) => {
                self.insert_tombstone(EntryKind::Authenticated, remove, now)
            }
            DataRequest::RemoveMailbox(remove) => {
                self.insert_tombstone(EntryKind::Mailbox, remove, now)
            }
        }
    }

    pub fn add_authenticated(
        &self,
        entry: AuthenticatedEntry,
    ) -> Result<StorageOutcome, StorageError> {
        self.apply(DataRequest::AddAuthenticated(entry))
    }

    pub fn add_mailbox(&self, entry: MailboxEntry) -> Result<StorageOutcome, StorageError> {
        self.apply(DataRequest::AddMailbox(entry))
    }

    pub fn add_append_only(&self, entry: AppendOnlyEntry) -> Result<StorageOutcome, StorageError> {
        self.apply(DataRequest::AddAppendOnly(entry))
    }

    /// Remove an authenticated or mailbox entry.
    pub fn remove(
        &self,
        kind: EntryKind,
        remove: RemoveRequest,
    ) -> Result<StorageOutcome, StorageError> {
        match kind {
            EntryKind::Authenticated => self.apply(DataRequest::RemoveAuthenticated(remove)),
            EntryKind::Mailbox => self.apply(DataRequest::RemoveMailbox(remove)),
            EntryKind::AppendOnly => Err(StorageError::malformed(
                kind,
                "append-only entries cannot be removed",
            )),
        }
    }

    fn insert_versioned(&self, request: DataRequest, now: Timestamp) -> StorageOutcome {
        let kind = request.kind();
        let key = request.key();
        let incoming = request.sequence_number();
        let type_name = request.metadata().type_name.clone();
        let map = self.map(kind);

        {
            let mut shard = map.shard(&key).write();
            if let Some(slot) = shard.get(&key) {
                if matches!(&slot.record, Record::Live(existing) if *existing == request) {
                    return StorageOutcome::AlreadyReceived;
                }
                let stored = slot.sequence_number();
                if incoming <= stored {
                    debug!(%kind, %key, stored, incoming, "[vn-02] Stale add ignored");
                    return StorageOutcome::RejectedStale { stored, incoming };
                }
            }
            map.put(&mut shard, key, Slot::new(Record::Live(request.clone()), now));
        }

        debug!(%kind, %key, seq = incoming, "[vn-02] Entry stored");
        self.publish(StoreEvent::Added { kind, key, request });
        self.enforce_bound(kind, &type_name);
        StorageOutcome::Added
    }

    fn insert_append_only(&self, entry: AppendOnlyEntry, now: Timestamp) -> StorageOutcome {
        let kind = EntryKind::AppendOnly;
        let key = entry.key();
        let type_name = entry.data.metadata.type_name.clone();
        let request = DataRequest::AddAppendOnly(entry);

        {
            let mut shard = self.append_only.shard(&key).write();
            if shard.contains_key(&key) {
                return StorageOutcome::AlreadyReceived;
            }
            self.append_only
                .put(&mut shard, key, Slot::new(Record::Live(request.clone()), now));
        }

        debug!(%kind, %key, "[vn-02] Entry stored");
        self.publish(StoreEvent::Added { kind, key, request });
        self.enforce_bound(kind, &type_name);
        StorageOutcome::Added
    }

    fn insert_tombstone(
        &self,
        kind: EntryKind,
        remove: RemoveRequest,
        now: Timestamp,
    ) -> Result<StorageOutcome, StorageError> {
        let key = remove.key;
        let map = self.map(kind);

        {
            let mut shard = map.shard(&key).write();
            let (authority, metadata) = match shard.get(&key) {
                // Remove raced ahead of its add: keep the tombstone so the add
                // is rejected when it arrives.
                None => (
                    Authority {
                        owner: remove.signer,
                        receiver: None,
                    },
                    remove.metadata.clone(),
                ),
                Some(slot) => {
                    if matches!(&slot.record, Record::Removed { request, .. } if *request == remove) {
                        return Ok(StorageOutcome::AlreadyReceived);
                    }
                    let stored = slot.sequence_number();
                    if remove.sequence_number <= stored {
                        debug!(%kind, %key, stored, incoming = remove.sequence_number, "[vn-02] Stale remove ignored");
                        return Ok(StorageOutcome::RejectedStale {
                            stored,
                            incoming: remove.sequence_number,
                        });
                    }
                    let authority = slot
                        .authority()
                        .ok_or_else(|| StorageError::malformed(kind, "entry has no owner"))?;
                    if !authority.permits(&remove.signer) {
                        warn!(%kind, %key, signer = %remove.signer, "[vn-02] Unauthorized remove");
                        return Err(StorageError::NotAuthorized {
                            key,
                            signer: remove.signer.to_string(),
                        });
                    }
                    (authority, slot.metadata().clone())
                }
            };
            map.put(
                &mut shard,
                key,
                Slot::new(
                    Record::Removed {
                        request: remove,
                        authority,
                        metadata,
                    },
                    now,
                ),
            );
        }

        debug!(%kind, %key, "[vn-02] Tombstone stored");
        self.publish(StoreEvent::Removed { kind, key });
        Ok(StorageOutcome::Removed)
    }

    fn enforce_bound(&self, kind: EntryKind, type_name: &str) {
        let map = self.map(kind);
        for (sequence_number, key) in map.over_bound(type_name) {
            if map.evict(key, sequence_number) {
                debug!(%kind, %key, type_name, "[vn-02] Evicted over map bound");
                self.publish(StoreEvent::Evicted { kind, key });
            }
        }
    }

    // =========================================================================
    // EXPIRY
    // =========================================================================

    /// Retire entries whose TTL has passed.
    pub fn sweep_expired(&self) -> Vec<(EntryKind, StorageKey)> {
        self.sweep_expired_at(self.time.now())
    }

    pub fn sweep_expired_at(&self, now: Timestamp) -> Vec<(EntryKind, StorageKey)> {
        let mut expired = Vec::new();
        for kind in EntryKind::ALL {
            for key in self.map(kind).sweep(now) {
                self.publish(StoreEvent::Expired { kind, key });
                expired.push((kind, key));
            }
        }
        if !expired.is_empty() {
            debug!(count = expired.len(), "[vn-02] Expired entries swept");
        }
        expired
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// The live add stored under `key`.
    pub fn get(&self, kind: EntryKind, key: &StorageKey) -> Option<DataRequest> {
        let now = self.time.now();
        let shard = self.map(kind).shard(key).read();
        shard.get(key)?.live_at(now).cloned()
    }

    /// What to send a peer missing `key`: the live add, or the remove for a
    /// tombstone.
    pub fn request(&self, kind: EntryKind, key: &StorageKey) -> Option<DataRequest> {
        let now = self.time.now();
        let shard = self.map(kind).shard(key).read();
        let slot = shard.get(key)?;
        if slot.is_expired_at(now) {
            return None;
        }
        slot.as_request(kind)
    }

    /// Sequence number last seen for `key`, markers included.
    pub fn sequence_number(&self, kind: EntryKind, key: &StorageKey) -> Option<i32> {
        let shard = self.map(kind).shard(key).read();
        shard.get(key).map(Slot::sequence_number)
    }

    /// Live adds and unexpired tombstones of every kind.
    pub fn snapshot(&self) -> Vec<SnapshotEntry> {
        let now = self.time.now();
        EntryKind::ALL
            .iter()
            .flat_map(|kind| self.map(*kind).snapshot(now))
            .collect()
    }

    pub fn snapshot_of(&self, kind: EntryKind) -> Vec<SnapshotEntry> {
        self.map(kind).snapshot(self.time.now())
    }

    pub fn counts(&self) -> StoreCounts {
        let now = self.time.now();
        StoreCounts {
            authenticated: self.authenticated.live_count(now),
            mailbox: self.mailbox.live_count(now),
            append_only: self.append_only.live_count(now),
        }
    }

    // =========================================================================
    // PERSISTENCE
    // =========================================================================

    /// Every unexpired slot, tombstones and expiry markers included.
    pub fn export(&self) -> StoreSnapshot {
        let now = self.time.now();
        StoreSnapshot {
            version: StoreSnapshot::VERSION,
            authenticated: self.authenticated.export(now),
            mailbox: self.mailbox.export(now),
            append_only: self.append_only.export(now),
        }
    }

    /// Merge a snapshot, keeping the higher sequence number per key.
    ///
    /// Expired slots are skipped. Returns how many slots were restored.
    pub fn import(&self, snapshot: StoreSnapshot) -> usize {
        let now = self.time.now();
        let mut restored = StoreCounts::default();
        let mut snapshot = snapshot;

        for kind in EntryKind::ALL {
            let map = self.map(kind);
            for (key, slot) in std::mem::take(snapshot.slots_mut(kind)) {
                if slot.is_expired_at(now) {
                    continue;
                }
                let mut shard = map.shard(&key).write();
                let newer = shard
                    .get(&key)
                    .map_or(true, |current| slot.sequence_number() > current.sequence_number());
                if newer {
                    map.put(&mut shard, key, slot);
                    restored.bump(kind);
                }
            }
            for type_name in map.indexed_types() {
                self.enforce_bound(kind, &type_name);
            }
        }

        info!(
            authenticated = restored.authenticated,
            mailbox = restored.mailbox,
            append_only = restored.append_only,
            "[vn-02] Store restored"
        );
        restored.total()
    }

    pub fn load_from(&self, port: &dyn PersistencePort) -> Result<usize, StorageError> {
        match port.load_snapshot()? {
            Some(snapshot) => Ok(self.import(snapshot)),
            None => Ok(0),
        }
    }

    pub fn save_to(&self, port: &dyn PersistencePort) -> Result<(), StorageError> {
        port.save_snapshot(&self.export())
    }
}
