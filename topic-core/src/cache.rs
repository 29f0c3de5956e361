//! Ordered message cache for topicsync.
//!
//! This module keeps the local mirror of a topic's message history:
//! - Entries sorted ascending by [`Seq`] at all times
//! - At most one entry per identifier
//! - Identifier swap (provisional → confirmed) that re-sorts the entry
//!
//! Lookups are binary searches; inserts and removals shift the backing
//! vector. Client-side topic sizes keep that cheap enough.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use topicsync_types::{Seq, SeqRange, ServerMessage, Timestamp, UserId};

/// Error type for cache operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// An entry with this identifier is already cached.
    #[error("duplicate message seq {0}")]
    Duplicate(Seq),

    /// No entry with this identifier is cached.
    #[error("message seq {0} not found")]
    NotFound(Seq),
}

/// A single cached message with its local delivery flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEntry {
    /// Provisional or confirmed identifier.
    pub seq: Seq,
    /// Originating user.
    pub from: UserId,
    /// Opaque message payload.
    pub content: Value,
    /// Creation time (local for drafts, server time once confirmed).
    pub created_at: Timestamp,
    /// A publish request is in flight.
    pub sending: bool,
    /// The last publish attempt failed.
    pub failed: bool,
    /// The user asked to abort sending.
    pub cancelled: bool,
    /// Created by this client rather than received from the server.
    pub locally_originated: bool,
}

impl MessageEntry {
    /// A locally drafted message carrying a provisional identifier.
    pub fn draft(seq: Seq, from: UserId, content: Value, created_at: Timestamp) -> Self {
        Self {
            seq,
            from,
            content,
            created_at,
            sending: false,
            failed: false,
            cancelled: false,
            locally_originated: true,
        }
    }

    /// A confirmed message pushed by the server.
    pub fn from_server(msg: ServerMessage) -> Self {
        Self {
            seq: Seq::Confirmed(msg.seq),
            from: msg.from,
            content: msg.content,
            created_at: msg.ts,
            sending: false,
            failed: false,
            cancelled: false,
            locally_originated: false,
        }
    }

    /// Check if the server has not acknowledged this message yet.
    pub fn is_pending(&self) -> bool {
        self.seq.is_provisional()
    }
}

/// Sorted, seq-indexed collection of message entries.
#[derive(Debug, Clone, Default)]
pub struct MessageCache {
    entries: Vec<MessageEntry>,
}

impl MessageCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry at its sorted position.
    ///
    /// Returns the index it landed at. A duplicate identifier leaves the
    /// cache untouched.
    pub fn insert(&mut self, entry: MessageEntry) -> Result<usize, CacheError> {
        match self.search(entry.seq) {
            Ok(_) => Err(CacheError::Duplicate(entry.seq)),
            Err(idx) => {
                self.entries.insert(idx, entry);
                Ok(idx)
            }
        }
    }

    /// Find the index of the entry with the given identifier.
    pub fn find(&self, seq: Seq) -> Option<usize> {
        self.search(seq).ok()
    }

    /// Get the entry with the given identifier.
    pub fn get(&self, seq: Seq) -> Option<&MessageEntry> {
        self.find(seq).map(|idx| &self.entries[idx])
    }

    /// Mutable access to the entry with the given identifier.
    ///
    /// Callers must not change `seq` through this reference; use
    /// [`reposition`](Self::reposition) for that.
    pub fn get_mut(&mut self, seq: Seq) -> Option<&mut MessageEntry> {
        let idx = self.find(seq)?;
        self.entries.get_mut(idx)
    }

    /// Get the entry at a position.
    pub fn at(&self, idx: usize) -> Option<&MessageEntry> {
        self.entries.get(idx)
    }

    /// Remove and return the entry at a position.
    pub fn delete_at(&mut self, idx: usize) -> Option<MessageEntry> {
        if idx < self.entries.len() {
            Some(self.entries.remove(idx))
        } else {
            None
        }
    }

    /// Remove and return the entry with the given identifier.
    pub fn remove(&mut self, seq: Seq) -> Option<MessageEntry> {
        let idx = self.find(seq)?;
        self.delete_at(idx)
    }

    /// Remove every entry with `low <= seq < hi`.
    ///
    /// Returns the removed entries in order.
    pub fn delete_range(&mut self, range: &SeqRange) -> Vec<MessageEntry> {
        let (start, end) = self.bounds(range);
        self.entries.drain(start..end).collect()
    }

    /// Change an entry's identifier and move it to its new sorted position.
    ///
    /// The cache is left untouched if `old` is missing or `new` is taken.
    /// Returns the entry's new index.
    pub fn reposition(&mut self, old: Seq, new: Seq) -> Result<usize, CacheError> {
        let from = self.find(old).ok_or(CacheError::NotFound(old))?;
        if old == new {
            return Ok(from);
        }
        if self.find(new).is_some() {
            return Err(CacheError::Duplicate(new));
        }
        let mut entry = self.entries.remove(from);
        entry.seq = new;
        // `new` was checked free above, so this cannot fail.
        let to = match self.search(new) {
            Ok(idx) | Err(idx) => idx,
        };
        self.entries.insert(to, entry);
        Ok(to)
    }

    /// Entries with `low <= seq < hi`, in order.
    pub fn range(&self, range: &SeqRange) -> &[MessageEntry] {
        let (start, end) = self.bounds(range);
        &self.entries[start..end]
    }

    /// Iterate all entries in ascending order.
    pub fn iter(&self) -> std::slice::Iter<'_, MessageEntry> {
        self.entries.iter()
    }

    /// The entry with the highest identifier.
    pub fn latest(&self) -> Option<&MessageEntry> {
        self.entries.last()
    }

    /// Highest confirmed seq present in the cache (0 if none).
    pub fn max_confirmed(&self) -> u64 {
        self.entries
            .last()
            .and_then(|entry| entry.seq.confirmed())
            .unwrap_or(0)
    }

    /// Identifiers of all provisional entries.
    pub fn provisional_seqs(&self) -> Vec<Seq> {
        self.entries
            .iter()
            .take_while(|entry| entry.seq.is_provisional())
            .map(|entry| entry.seq)
            .collect()
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn search(&self, seq: Seq) -> Result<usize, usize> {
        self.entries.binary_search_by(|entry| entry.seq.cmp(&seq))
    }

    fn bounds(&self, range: &SeqRange) -> (usize, usize) {
        let start = self.entries.partition_point(|e| e.seq < range.low());
        let end = self.entries.partition_point(|e| e.seq < range.hi());
        (start, end.max(start))
    }
}

impl<'a> IntoIterator for &'a MessageCache {
    type Item = &'a MessageEntry;
    type IntoIter = std::slice::Iter<'a, MessageEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(seq: Seq) -> MessageEntry {
        MessageEntry::draft(
            seq,
            UserId::from("usrAlice"),
            json!("hi"),
            Timestamp::from_millis(1_705_000_000_000),
        )
    }

    fn raw_seqs(cache: &MessageCache) -> Vec<i64> {
        cache.iter().map(|e| e.seq.raw()).collect()
    }

    fn assert_sorted_unique(cache: &MessageCache) {
        let seqs: Vec<Seq> = cache.iter().map(|e| e.seq).collect();
        assert!(
            seqs.windows(2).all(|w| w[0] < w[1]),
            "cache not strictly ascending: {:?}",
            seqs
        );
    }

    #[test]
    fn insert_keeps_ascending_order() {
        let mut cache = MessageCache::new();
        for raw in [5, -1, 2, 9, -3, 1] {
            cache.insert(entry(Seq::from_raw(raw).unwrap())).unwrap();
        }

        assert_eq!(raw_seqs(&cache), vec![-3, -1, 1, 2, 5, 9]);
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut cache = MessageCache::new();
        cache.insert(entry(Seq::Confirmed(4))).unwrap();

        let mut dup = entry(Seq::Confirmed(4));
        dup.content = json!("other");
        let result = cache.insert(dup);

        assert_eq!(result, Err(CacheError::Duplicate(Seq::Confirmed(4))));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(Seq::Confirmed(4)).unwrap().content, json!("hi"));
    }

    #[test]
    fn find_and_delete_at() {
        let mut cache = MessageCache::new();
        cache.insert(entry(Seq::Confirmed(1))).unwrap();
        cache.insert(entry(Seq::Confirmed(3))).unwrap();

        assert_eq!(cache.find(Seq::Confirmed(3)), Some(1));
        assert_eq!(cache.find(Seq::Confirmed(2)), None);

        let removed = cache.delete_at(0).unwrap();
        assert_eq!(removed.seq, Seq::Confirmed(1));
        assert!(cache.delete_at(7).is_none());
        assert_eq!(raw_seqs(&cache), vec![3]);
    }

    #[test]
    fn delete_range_is_half_open() {
        let mut cache = MessageCache::new();
        for n in 1..=6 {
            cache.insert(entry(Seq::Confirmed(n))).unwrap();
        }

        let range = SeqRange::new(Seq::Confirmed(2), Seq::Confirmed(5)).unwrap();
        let removed = cache.delete_range(&range);

        assert_eq!(removed.len(), 3);
        assert_eq!(raw_seqs(&cache), vec![1, 5, 6]);
    }

    #[test]
    fn delete_range_across_provisional_boundary() {
        let mut cache = MessageCache::new();
        for raw in [-3, -2, -1, 1, 2] {
            cache.insert(entry(Seq::from_raw(raw).unwrap())).unwrap();
        }

        let range = SeqRange::new(Seq::Provisional(2), Seq::Confirmed(2)).unwrap();
        cache.delete_range(&range);

        assert_eq!(raw_seqs(&cache), vec![-3, 2]);
    }

    #[test]
    fn reposition_resorts_by_confirmed_seq() {
        let mut cache = MessageCache::new();
        cache.insert(entry(Seq::Provisional(1))).unwrap();
        cache.insert(entry(Seq::Provisional(2))).unwrap();

        cache
            .reposition(Seq::Provisional(1), Seq::Confirmed(5))
            .unwrap();
        cache
            .reposition(Seq::Provisional(2), Seq::Confirmed(6))
            .unwrap();

        assert_eq!(raw_seqs(&cache), vec![5, 6]);
        assert_eq!(cache.get(Seq::Confirmed(5)).unwrap().seq, Seq::Confirmed(5));
    }

    #[test]
    fn reposition_moves_past_existing_entries() {
        let mut cache = MessageCache::new();
        cache.insert(entry(Seq::Provisional(1))).unwrap();
        cache.insert(entry(Seq::Confirmed(3))).unwrap();
        cache.insert(entry(Seq::Confirmed(8))).unwrap();

        let idx = cache
            .reposition(Seq::Provisional(1), Seq::Confirmed(9))
            .unwrap();

        assert_eq!(idx, 2);
        assert_eq!(raw_seqs(&cache), vec![3, 8, 9]);
    }

    #[test]
    fn reposition_onto_taken_seq_changes_nothing() {
        let mut cache = MessageCache::new();
        cache.insert(entry(Seq::Provisional(1))).unwrap();
        cache.insert(entry(Seq::Confirmed(4))).unwrap();

        let result = cache.reposition(Seq::Provisional(1), Seq::Confirmed(4));

        assert_eq!(result, Err(CacheError::Duplicate(Seq::Confirmed(4))));
        assert_eq!(raw_seqs(&cache), vec![-1, 4]);
    }

    #[test]
    fn reposition_missing_entry_fails() {
        let mut cache = MessageCache::new();
        let result = cache.reposition(Seq::Provisional(1), Seq::Confirmed(2));
        assert_eq!(result, Err(CacheError::NotFound(Seq::Provisional(1))));
    }

    #[test]
    fn sort_invariant_holds_under_mixed_operations() {
        let mut cache = MessageCache::new();
        let mut next_confirmed = 1;

        // Deterministic pseudo-random walk over insert/reposition/delete_at.
        let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
        for step in 1..=300u32 {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            match state % 4 {
                0 => {
                    let _ = cache.insert(entry(Seq::Provisional(step)));
                }
                1 => {
                    let _ = cache.insert(entry(Seq::Confirmed(state % 50 + 1)));
                }
                2 => {
                    if let Some(seq) = cache.provisional_seqs().first().copied() {
                        let _ = cache.reposition(seq, Seq::Confirmed(100 + next_confirmed));
                        next_confirmed += 1;
                    }
                }
                _ => {
                    if !cache.is_empty() {
                        let idx = (state as usize) % cache.len();
                        cache.delete_at(idx);
                    }
                }
            }
            assert_sorted_unique(&cache);
        }
    }

    #[test]
    fn range_view_and_latest() {
        let mut cache = MessageCache::new();
        assert!(cache.latest().is_none());
        assert_eq!(cache.max_confirmed(), 0);

        for raw in [-1, 1, 2, 3] {
            cache.insert(entry(Seq::from_raw(raw).unwrap())).unwrap();
        }

        let view = cache.range(&SeqRange::new(Seq::Confirmed(2), Seq::Confirmed(10)).unwrap());
        assert_eq!(view.len(), 2);
        assert_eq!(cache.latest().unwrap().seq, Seq::Confirmed(3));
        assert_eq!(cache.max_confirmed(), 3);
        assert_eq!(cache.provisional_seqs(), vec![Seq::Provisional(1)]);
    }

    #[test]
    fn server_entry_is_not_local() {
        let entry = MessageEntry::from_server(ServerMessage {
            seq: 7,
            from: UserId::from("usrBob"),
            ts: Timestamp::from_millis(1),
            content: json!({"txt": "yo"}),
        });
        assert_eq!(entry.seq, Seq::Confirmed(7));
        assert!(!entry.locally_originated);
        assert!(!entry.is_pending());
    }
}
