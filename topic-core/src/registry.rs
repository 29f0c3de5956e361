//! Subscriber registry for topicsync.
//!
//! Tracks one [`SubscriberRecord`] per user, in the order users were first
//! seen, together with their receive/read watermarks. Watermarks only move
//! forward: a lower value from any source is ignored.

use std::collections::HashMap;
use thiserror::Error;
use topicsync_types::{SubscriberRecord, UserId, WatermarkKind};

/// Error type for registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No record for the user; the subscriber list is not populated yet.
    #[error("unknown subscriber {0}")]
    UnknownSubscriber(UserId),
}

/// Insertion-ordered map from user id to subscription record.
#[derive(Debug, Clone, Default)]
pub struct SubscriberRegistry {
    records: Vec<SubscriberRecord>,
    index: HashMap<UserId, usize>,
}

impl SubscriberRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record or replace the existing one for the same user.
    ///
    /// A replaced record keeps its position and never lowers a watermark.
    /// Returns the stored record.
    pub fn upsert(&mut self, record: SubscriberRecord) -> &SubscriberRecord {
        let existing = self.index.get(&record.user_id).copied();
        match existing {
            Some(idx) => {
                let existing = &mut self.records[idx];
                existing.access_mode = record.access_mode;
                existing.received = existing.received.max(record.received);
                existing.read = existing.read.max(record.read);
                &self.records[idx]
            }
            None => {
                let idx = self.records.len();
                self.index.insert(record.user_id.clone(), idx);
                self.records.push(record);
                &self.records[idx]
            }
        }
    }

    /// Advance a user's watermark.
    ///
    /// Returns `true` if `seq` was strictly greater than the stored value and
    /// the watermark moved.
    pub fn note_watermark(
        &mut self,
        user_id: &UserId,
        kind: WatermarkKind,
        seq: u64,
    ) -> Result<bool, RegistryError> {
        let idx = *self
            .index
            .get(user_id)
            .ok_or_else(|| RegistryError::UnknownSubscriber(user_id.clone()))?;
        let record = &mut self.records[idx];
        let slot = match kind {
            WatermarkKind::Received => &mut record.received,
            WatermarkKind::Read => &mut record.read,
        };
        if seq > *slot {
            *slot = seq;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Get a user's record.
    pub fn get(&self, user_id: &UserId) -> Option<&SubscriberRecord> {
        self.index.get(user_id).map(|&idx| &self.records[idx])
    }

    /// Remove a user's record, preserving the order of the rest.
    pub fn remove(&mut self, user_id: &UserId) -> Option<SubscriberRecord> {
        let idx = self.index.remove(user_id)?;
        let record = self.records.remove(idx);
        for slot in self.index.values_mut() {
            if *slot > idx {
                *slot -= 1;
            }
        }
        Some(record)
    }

    /// Number of users other than `me` whose watermark of `kind` covers `seq`.
    pub fn count_at_least(&self, kind: WatermarkKind, seq: u64, me: &UserId) -> usize {
        self.records
            .iter()
            .filter(|r| &r.user_id != me && r.watermark(kind) >= seq)
            .count()
    }

    /// Iterate records in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, SubscriberRecord> {
        self.records.iter()
    }

    /// Snapshot of all records in insertion order.
    pub fn to_vec(&self) -> Vec<SubscriberRecord> {
        self.records.clone()
    }

    /// Number of subscribers.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if there are no subscribers.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Remove all records.
    pub fn clear(&mut self) {
        self.records.clear();
        self.index.clear();
    }
}
