//! Provisional identifier allocation.
//!
//! Drafts need an identifier before the server assigns one. Provisional ids
//! are drawn from their own space (`-1, -2, -3, ...` in raw form), so they can
//! never collide with a confirmed seq.

use topicsync_types::Seq;

/// Issues provisional identifiers for one topic instance.
///
/// Every id handed out is unique for the lifetime of the allocator, which
/// survives topic resets: a publish still in flight across a reset never
/// shares its id with a later draft.
#[derive(Debug, Clone)]
pub struct ProvisionalIdAllocator {
    next: u32,
}

impl ProvisionalIdAllocator {
    /// Create an allocator whose first id is `-1`.
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Issue a fresh provisional identifier.
    pub fn next(&mut self) -> Seq {
        let seq = Seq::Provisional(self.next);
        self.next = self.next.saturating_add(1);
        seq
    }

    /// The id the next call to [`next`](Self::next) will return.
    pub fn peek(&self) -> Seq {
        Seq::Provisional(self.next)
    }

    /// Number of ids issued so far.
    pub fn issued(&self) -> u64 {
        u64::from(self.next - 1)
    }
}

impl Default for ProvisionalIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn starts_at_minus_one() {
        let mut alloc = ProvisionalIdAllocator::new();
        assert_eq!(alloc.next().raw(), -1);
        assert_eq!(alloc.next().raw(), -2);
        assert_eq!(alloc.issued(), 2);
    }

    #[test]
    fn ids_are_unique_and_provisional() {
        let mut alloc = ProvisionalIdAllocator::new();
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            let seq = alloc.next();
            assert!(seq.is_provisional());
            assert!(seq < Seq::FIRST_CONFIRMED);
            assert!(seen.insert(seq), "duplicate provisional id {}", seq);
        }
    }

    #[test]
    fn peek_does_not_consume() {
        let mut alloc = ProvisionalIdAllocator::new();
        let peeked = alloc.peek();
        assert_eq!(alloc.next(), peeked);
        assert_ne!(alloc.peek(), peeked);
    }
}
