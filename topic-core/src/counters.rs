//! Per-topic counters.

use topicsync_types::Seq;

use crate::allocator::ProvisionalIdAllocator;

/// Process-lifetime counters owned by the topic controller.
#[derive(Debug, Clone, Default)]
pub struct TopicCounters {
    /// Highest confirmed seq seen (0 if none).
    pub max_seq: u64,
    /// Lowest confirmed seq seen (0 if none).
    pub min_seq: u64,
    /// Highest deletion transaction id seen.
    pub max_del_id: u64,
    /// Source of provisional identifiers.
    pub provisional: ProvisionalIdAllocator,
}

impl TopicCounters {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a confirmed seq, widening `[min_seq, max_seq]`.
    ///
    /// Provisional ids are ignored.
    pub fn note_seq(&mut self, seq: Seq) {
        if let Seq::Confirmed(n) = seq {
            self.max_seq = self.max_seq.max(n);
            if self.min_seq == 0 || n < self.min_seq {
                self.min_seq = n;
            }
        }
    }

    /// Record a deletion id; only ever grows.
    pub fn note_del_id(&mut self, del_id: u64) {
        self.max_del_id = self.max_del_id.max(del_id);
    }

    /// Zero the seq and deletion counters.
    ///
    /// The provisional allocator keeps counting so that ids issued before
    /// the reset stay unique.
    pub fn reset(&mut self) {
        self.max_seq = 0;
        self.min_seq = 0;
        self.max_del_id = 0;
    }
}
