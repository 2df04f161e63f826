//! One kind's map: key-sharded slots plus a per-type eviction index.
//!
//! Lock order is shard, then index. Eviction pops victims from the index
//! first, releases it, and only then locks the victim's shard.

use crate::domain::keys::StorageKey;
use crate::domain::record::{Record, Slot};
use crate::domain::requests::EntryKind;
use crate::domain::snapshot::SnapshotEntry;
use parking_lot::{Mutex, RwLock};
use shared_types::Timestamp;
use std::collections::{BTreeSet, HashMap};

pub(crate) type Shard = HashMap<StorageKey, Slot>;

/// Live entries of one type, oldest sequence number first.
#[derive(Debug, Default)]
struct TypeIndex {
    max_size: usize,
    live: BTreeSet<(i32, StorageKey)>,
}

#[derive(Debug)]
pub(crate) struct KindMap {
    kind: EntryKind,
    shards: Vec<RwLock<Shard>>,
    index: Mutex<HashMap<String, TypeIndex>>,
}

impl KindMap {
    pub fn new(kind: EntryKind, shard_count: usize) -> Self {
        let shard_count = shard_count.max(1);
        Self {
            kind,
            shards: (0..shard_count).map(|_| RwLock::new(HashMap::new())).collect(),
            index: Mutex::new(HashMap::new()),
        }
    }

    pub fn shard(&self, key: &StorageKey) -> &RwLock<Shard> {
        let slot = usize::from(key.as_bytes()[0]) % self.shards.len();
        &self.shards[slot]
    }

    /// Store `slot` under `key`. The caller holds `shard`'s write lock.
    pub fn put(&self, shard: &mut Shard, key: StorageKey, slot: Slot) -> Option<Slot> {
        let indexed = Self::index_entry(&slot);
        let old = shard.insert(key, slot);

        let mut index = self.index.lock();
        if let Some(old) = &old {
            Self::unindex(&mut index, key, old);
        }
        if let Some((type_name, max_size, sequence_number)) = indexed {
            let entry = index.entry(type_name).or_default();
            entry.max_size = max_size;
            entry.live.insert((sequence_number, key));
        }
        old
    }

    /// Drop the slot under `key`. The caller holds `shard`'s write lock.
    pub fn take(&self, shard: &mut Shard, key: StorageKey) -> Option<Slot> {
        let old = shard.remove(&key)?;
        Self::unindex(&mut self.index.lock(), key, &old);
        Some(old)
    }

    fn index_entry(slot: &Slot) -> Option<(String, usize, i32)> {
        match &slot.record {
            Record::Live(request) => Some((
                request.metadata().type_name.clone(),
                request.metadata().max_map_size,
                request.sequence_number(),
            )),
            _ => None,
        }
    }

    fn unindex(index: &mut HashMap<String, TypeIndex>, key: StorageKey, slot: &Slot) {
        if let Record::Live(request) = &slot.record {
            if let Some(entry) = index.get_mut(&request.metadata().type_name) {
                entry.live.remove(&(request.sequence_number(), key));
            }
        }
    }

    /// Pop the oldest live entries of `type_name` beyond its bound.
    ///
    /// Ties on sequence number fall back to key order.
    pub fn over_bound(&self, type_name: &str) -> Vec<(i32, StorageKey)> {
        let mut index = self.index.lock();
        let Some(entry) = index.get_mut(type_name) else {
            return Vec::new();
        };
        let mut victims = Vec::new();
        while entry.live.len() > entry.max_size {
            match entry.live.pop_first() {
                Some(victim) => victims.push(victim),
                None => break,
            }
        }
        victims
    }

    pub fn indexed_types(&self) -> Vec<String> {
        self.index.lock().keys().cloned().collect()
    }

    /// Remove `key` if it is still live at `sequence_number`.
    pub fn evict(&self, key: StorageKey, sequence_number: i32) -> bool {
        let mut shard = self.shard(&key).write();
        let still_victim = matches!(
            shard.get(&key).map(|slot| &slot.record),
            Some(Record::Live(request)) if request.sequence_number() == sequence_number
        );
        if still_victim {
            // Already popped from the index.
            shard.remove(&key);
        }
        still_victim
    }

    /// Retire everything whose TTL passed. Returns keys of live entries that expired.
    pub fn sweep(&self, now: Timestamp) -> Vec<StorageKey> {
        let mut expired = Vec::new();
        for shard in &self.shards {
            let mut shard = shard.write();
            let due: Vec<StorageKey> = shard
                .iter()
                .filter(|(_, slot)| slot.is_expired_at(now))
                .map(|(key, _)| *key)
                .collect();

            for key in due {
                let Some(slot) = self.take(&mut shard, key) else {
                    continue;
                };
                if matches!(slot.record, Record::Live(_)) {
                    expired.push(key);
                }
                if let Some(marker) = slot.into_expired() {
                    if !marker.is_expired_at(now) {
                        shard.insert(key, marker);
                    }
                }
            }
        }
        expired
    }

    /// Live adds and unexpired tombstones.
    pub fn snapshot(&self, now: Timestamp) -> Vec<SnapshotEntry> {
        let mut entries = Vec::new();
        for shard in &self.shards {
            let shard = shard.read();
            for (key, slot) in shard.iter() {
                let visible = match &slot.record {
                    Record::Live(_) => slot.live_at(now).is_some(),
                    Record::Removed { .. } => !slot.is_expired_at(now),
                    Record::Expired { .. } => false,
                };
                if visible {
                    entries.push(SnapshotEntry {
                        kind: self.kind,
                        key: *key,
                        sequence_number: (self.kind != EntryKind::AppendOnly)
                            .then(|| slot.sequence_number()),
                        is_tombstone: slot.is_tombstone(),
                        priority: slot.metadata().priority,
                    });
                }
            }
        }
        entries
    }

    pub fn live_count(&self, now: Timestamp) -> usize {
        self.shards
            .iter()
            .map(|shard| {
                shard
                    .read()
                    .values()
                    .filter(|slot| slot.live_at(now).is_some())
                    .count()
            })
            .sum()
    }

    /// Every unexpired slot, markers included.
    pub fn export(&self, now: Timestamp) -> Vec<(StorageKey, Slot)> {
        let mut slots = Vec::new();
        for shard in &self.shards {
            let shard = shard.read();
            slots.extend(
                shard
                    .iter()
                    .filter(|(_, slot)| !slot.is_expired_at(now))
                    .map(|(key, slot)| (*key, slot.clone())),
            );
        }
        slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::requests::{AppendOnlyEntry, DataRequest};
    use shared_types::MetaData;
    use std::time::Duration;

    fn slot(payload: u8, max: usize) -> (StorageKey, Slot) {
        let metadata = MetaData::new(Duration::from_secs(60), "Trade").with_max_map_size(max);
        let entry = AppendOnlyEntry::new(metadata, vec![payload], Timestamp::from_millis(0));
        (
            entry.key(),
            Slot::new(
                Record::Live(DataRequest::AddAppendOnly(entry)),
                Timestamp::from_millis(0),
            ),
        )
    }

    #[test]
    fn test_over_bound_pops_in_key_order_on_equal_sequence() {
        let map = KindMap::new(EntryKind::AppendOnly, 4);
        let mut keys = Vec::new();
        for payload in 0..4u8 {
            let (key, slot) = slot(payload, 2);
            keys.push(key);
            let mut shard = map.shard(&key).write();
            map.put(&mut shard, key, slot);
        }
        keys.sort();

        let victims: Vec<StorageKey> = map
            .over_bound("Trade")
            .into_iter()
            .map(|(_, key)| key)
            .collect();
        assert_eq!(victims, keys[..2].to_vec());
        assert!(map.over_bound("Trade").is_empty());
    }

    #[test]
    fn test_take_unindexes() {
        let map = KindMap::new(EntryKind::AppendOnly, 1);
        let (first, first_slot) = slot(1, 1);
        let (second, second_slot) = slot(2, 1);
        let mut shard = map.shard(&first).write();
        map.put(&mut shard, first, first_slot);
        map.take(&mut shard, first);
        map.put(&mut shard, second, second_slot);
        drop(shard);
        assert!(map.over_bound("Trade").is_empty());
    }

    #[test]
    fn test_sweep_drops_expired_append_only() {
        let map = KindMap::new(EntryKind::AppendOnly, 2);
        let (key, slot) = slot(1, 10);
        {
            let mut shard = map.shard(&key).write();
            map.put(&mut shard, key, slot);
        }
        assert!(map.sweep(Timestamp::from_millis(59_999)).is_empty());
        assert_eq!(map.sweep(Timestamp::from_millis(60_000)), vec![key]);
        assert!(map.export(Timestamp::from_millis(60_000)).is_empty());
    }
}
