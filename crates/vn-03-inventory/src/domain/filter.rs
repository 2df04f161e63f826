//! Compact digest of store contents.
//!
//! A filter is the list of `(hash, sequence number)` pairs for every
//! retained entry, sorted by hash bytes. Append-only entries carry
//! sequence number 0. Roughly 24 bytes per entry on the wire.

use serde::{Deserialize, Serialize};
use shared_crypto::Digest20;
use std::cmp::Ordering;
use tracing::warn;
use vn_02_data_store::SnapshotEntry;

/// Hard cap on filter entries.
pub const MAX_ENTRIES: usize = 200_000;

/// One store entry as seen by a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterEntry {
    pub hash: Digest20,
    pub sequence_number: i32,
}

impl FilterEntry {
    pub fn new(hash: Digest20, sequence_number: i32) -> Self {
        Self {
            hash,
            sequence_number,
        }
    }
}

impl From<&SnapshotEntry> for FilterEntry {
    fn from(entry: &SnapshotEntry) -> Self {
        Self::new(entry.key, entry.sequence_number.unwrap_or(0))
    }
}

impl Ord for FilterEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.hash
            .cmp(&other.hash)
            .then(self.sequence_number.cmp(&other.sequence_number))
    }
}

impl PartialOrd for FilterEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataFilter {
    entries: Vec<FilterEntry>,
    /// Set locally when entries were dropped to honour the cap.
    #[serde(skip)]
    truncated: bool,
}

impl DataFilter {
    /// Sort, deduplicate by hash (keeping the highest sequence number) and
    /// cap at `max_entries`, dropping the highest hashes.
    pub fn new(mut entries: Vec<FilterEntry>, max_entries: usize) -> Self {
        entries.sort_unstable();
        // Sorted ascending, so the last of each run holds the highest number.
        entries.reverse();
        entries.dedup_by_key(|entry| entry.hash);
        entries.reverse();

        let truncated = entries.len() > max_entries;
        if truncated {
            warn!(
                entries = entries.len(),
                max = max_entries,
                "[vn-03] Filter truncated"
            );
            entries.truncate(max_entries);
        }
        Self { entries, truncated }
    }

    pub fn from_snapshot(snapshot: &[SnapshotEntry], max_entries: usize) -> Self {
        Self::new(snapshot.iter().map(FilterEntry::from).collect(), max_entries)
    }

    pub fn entries(&self) -> &[FilterEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Re-establish hash order on a filter decoded from the wire.
    pub fn normalized(self) -> Self {
        if self.entries.windows(2).all(|pair| pair[0].hash < pair[1].hash) {
            return self;
        }
        Self::new(self.entries, usize::MAX)
    }

    /// Sequence number the peer holds for `hash`. Requires hash order.
    pub fn sequence_of(&self, hash: &Digest20) -> Option<i32> {
        self.entries
            .binary_search_by(|entry| entry.hash.cmp(hash))
            .ok()
            .map(|index| self.entries[index].sequence_number)
    }

    /// True if the peer lacks `entry` or holds an older version of it.
    pub fn is_missing(&self, entry: &SnapshotEntry) -> bool {
        match (self.sequence_of(&entry.key), entry.sequence_number) {
            (None, _) => true,
            (Some(theirs), Some(ours)) => theirs < ours,
            // Append-only: presence suffices.
            (Some(_), None) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use vn_02_data_store::EntryKind;

    fn digest(byte: u8) -> Digest20 {
        Digest20::from_bytes([byte; 20])
    }

    fn snapshot_entry(byte: u8, sequence_number: Option<i32>) -> SnapshotEntry {
        SnapshotEntry {
            kind: if sequence_number.is_some() {
                EntryKind::Authenticated
            } else {
                EntryKind::AppendOnly
            },
            key: digest(byte),
            sequence_number,
            is_tombstone: false,
            priority: 0,
        }
    }

    #[test]
    fn test_filter_sorted_by_hash() {
        let filter = DataFilter::new(
            vec![
                FilterEntry::new(digest(3), 1),
                FilterEntry::new(digest(1), 9),
                FilterEntry::new(digest(2), 0),
            ],
            MAX_ENTRIES,
        );
        let hashes: Vec<_> = filter.entries().iter().map(|e| e.hash).collect();
        assert_eq!(hashes, vec![digest(1), digest(2), digest(3)]);
        assert!(!filter.is_truncated());
    }

    #[test]
    fn test_duplicate_hash_keeps_highest_sequence() {
        let filter = DataFilter::new(
            vec![FilterEntry::new(digest(1), 2), FilterEntry::new(digest(1), 5)],
            MAX_ENTRIES,
        );
        assert_eq!(filter.entries(), &[FilterEntry::new(digest(1), 5)]);
    }

    #[test]
    fn test_append_only_maps_to_zero() {
        let filter = DataFilter::from_snapshot(&[snapshot_entry(7, None)], MAX_ENTRIES);
        assert_eq!(filter.sequence_of(&digest(7)), Some(0));
    }

    #[test]
    fn test_missing_predicate() {
        let peer = DataFilter::new(
            vec![FilterEntry::new(digest(1), 5), FilterEntry::new(digest(2), 0)],
            MAX_ENTRIES,
        );
        assert!(peer.is_missing(&snapshot_entry(1, Some(6))));
        assert!(!peer.is_missing(&snapshot_entry(1, Some(5))));
        assert!(!peer.is_missing(&snapshot_entry(1, Some(4))));
        assert!(!peer.is_missing(&snapshot_entry(2, None)));
        assert!(peer.is_missing(&snapshot_entry(3, None)));
    }

    #[test]
    fn test_normalized_sorts_wire_filter() {
        let wire = DataFilter {
            entries: vec![FilterEntry::new(digest(9), 1), FilterEntry::new(digest(4), 1)],
            truncated: false,
        };
        let filter = wire.normalized();
        assert_eq!(filter.sequence_of(&digest(4)), Some(1));
        assert_eq!(filter.sequence_of(&digest(9)), Some(1));
    }

    proptest! {
        #[test]
        fn prop_truncation_keeps_lowest_hashes(
            bytes in proptest::collection::hash_set(any::<[u8; 20]>(), 0..200),
            max in 1usize..100,
        ) {
            let entries: Vec<FilterEntry> = bytes
                .iter()
                .map(|b| FilterEntry::new(Digest20::from_bytes(*b), 1))
                .collect();
            let mut reversed = entries.clone();
            reversed.reverse();

            let filter = DataFilter::new(entries, max);
            prop_assert_eq!(filter.len(), bytes.len().min(max));
            prop_assert_eq!(filter.is_truncated(), bytes.len() > max);
            prop_assert!(filter.entries().windows(2).all(|w| w[0].hash < w[1].hash));

            // Same set in another order gives the same filter.
            let reordered = DataFilter::new(reversed, max);
            prop_assert_eq!(reordered.entries(), filter.entries());

            let mut sorted: Vec<[u8; 20]> = bytes.into_iter().collect();
            sorted.sort_unstable();
            if let Some(last_kept) = filter.entries().last() {
                prop_assert_eq!(last_kept.hash.as_bytes(), &sorted[filter.len() - 1]);
            }
        }
    }
}
