//! Deletion range planning for topicsync.
//!
//! A delete request arrives as a list of ranges that may overlap, may run
//! past the end of the known history, and may cover messages that only exist
//! locally. [`plan_deletion`] turns it into:
//! - the minimal set of confirmed-space ranges the server must be told about
//! - the provisional-space ranges that are flushed locally and never sent
//!
//! Ordering rule: ranges are processed by ascending `low`; on equal `low`
//! the wider range comes first (an open range is wider than any bounded one).
//! Overlapping or touching ranges are merged after the split, so the result
//! does not depend on the input order.

use thiserror::Error;
use topicsync_types::{RemoteRange, Seq, SeqRange};

/// Error type for deletion planning.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    /// A bounded range with `low >= hi`.
    #[error("empty deletion range [{low}, {hi})")]
    Empty {
        /// Inclusive low bound.
        low: Seq,
        /// Exclusive high bound.
        hi: Seq,
    },
}

/// A requested deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionRange {
    /// `[low, hi)`.
    Bounded {
        /// Inclusive low bound.
        low: Seq,
        /// Exclusive high bound.
        hi: Seq,
    },
    /// `[low, ..)` up to the end of the known history.
    Open {
        /// Inclusive low bound.
        low: Seq,
    },
    /// Every message, local and confirmed.
    All,
}

impl DeletionRange {
    /// A bounded range, rejecting empty intervals.
    pub fn bounded(low: Seq, hi: Seq) -> Result<Self, RangeError> {
        if low >= hi {
            return Err(RangeError::Empty { low, hi });
        }
        Ok(Self::Bounded { low, hi })
    }

    /// An open range starting at `low`.
    pub fn open(low: Seq) -> Self {
        Self::Open { low }
    }

    /// A range covering exactly one message.
    pub fn single(seq: Seq) -> Self {
        Self::Bounded {
            low: seq,
            hi: seq.next(),
        }
    }

    /// Inclusive low bound.
    pub fn low(&self) -> Seq {
        match *self {
            Self::Bounded { low, .. } | Self::Open { low } => low,
            Self::All => Seq::MIN,
        }
    }

    /// Exclusive high bound, `None` for open ranges.
    pub fn hi(&self) -> Option<Seq> {
        match *self {
            Self::Bounded { hi, .. } => Some(hi),
            Self::Open { .. } | Self::All => None,
        }
    }

    fn validate(&self) -> Result<(), RangeError> {
        match *self {
            Self::Bounded { low, hi } if low >= hi => Err(RangeError::Empty { low, hi }),
            _ => Ok(()),
        }
    }
}

/// Result of planning a delete request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionPlan {
    /// Confirmed-space ranges to send to the server, sorted and disjoint.
    pub remote: Vec<RemoteRange>,
    /// Provisional-space ranges to flush locally only, sorted and disjoint.
    pub local: Vec<SeqRange>,
}

impl DeletionPlan {
    /// Check if the server has to be involved.
    pub fn needs_server(&self) -> bool {
        !self.remote.is_empty()
    }

    /// Check if the plan deletes nothing at all.
    pub fn is_empty(&self) -> bool {
        self.remote.is_empty() && self.local.is_empty()
    }

    /// The server's ranges over the full identifier order, for flushing the
    /// cache once the server agrees.
    pub fn remote_seq_ranges(&self) -> Vec<SeqRange> {
        self.remote.iter().map(RemoteRange::to_seq_range).collect()
    }
}

/// Plan a delete request against a topic whose highest confirmed seq is
/// `max_seq`.
///
/// Confirmed parts are clipped to `max_seq + 1`; parts that end up empty are
/// dropped.
pub fn plan_deletion(ranges: &[DeletionRange], max_seq: u64) -> Result<DeletionPlan, RangeError> {
    for range in ranges {
        range.validate()?;
    }

    let mut sorted = ranges.to_vec();
    sorted.sort_by(|a, b| {
        a.low().cmp(&b.low()).then_with(|| match (a.hi(), b.hi()) {
            (None, None) => std::cmp::Ordering::Equal,
            (None, Some(_)) => std::cmp::Ordering::Less,
            (Some(_), None) => std::cmp::Ordering::Greater,
            (Some(x), Some(y)) => y.cmp(&x),
        })
    });

    let clip = max_seq.saturating_add(1);
    let mut local: Vec<(Seq, Seq)> = Vec::new();
    let mut remote: Vec<(u64, u64)> = Vec::new();

    for range in sorted {
        let low = range.low();
        let hi = range.hi();

        if low.is_provisional() {
            let local_hi = match hi {
                Some(h) if h < Seq::FIRST_CONFIRMED => h,
                _ => Seq::FIRST_CONFIRMED,
            };
            merge_into(&mut local, low, local_hi);
        }

        let remote_low = low.confirmed().unwrap_or(1);
        let remote_hi = match hi {
            None => clip,
            Some(Seq::Confirmed(h)) => h.min(clip),
            Some(Seq::Provisional(_)) => continue,
        };
        if remote_low < remote_hi {
            merge_into(&mut remote, remote_low, remote_hi);
        }
    }

    Ok(DeletionPlan {
        remote: remote
            .into_iter()
            .map(|(low, hi)| RemoteRange { low, hi })
            .collect(),
        local: local
            .into_iter()
            .filter_map(|(low, hi)| SeqRange::new(low, hi).ok())
            .collect(),
    })
}

/// Turn an explicit list of message ids into ranges of consecutive ids.
///
/// `[3, 4, 5, 9]` becomes `[3, 6)` and `[9, 10)`. Duplicates are ignored.
pub fn ranges_from_ids(ids: &[Seq]) -> Vec<DeletionRange> {
    let mut ids = ids.to_vec();
    ids.sort();
    ids.dedup();

    let mut out = Vec::new();
    let mut iter = ids.into_iter();
    let Some(first) = iter.next() else {
        return out;
    };

    let (mut low, mut hi) = (first, first.next());
    for id in iter {
        if id == hi {
            hi = id.next();
        } else {
            if low < hi {
                out.push(DeletionRange::Bounded { low, hi });
            }
            low = id;
            hi = id.next();
        }
    }
    if low < hi {
        out.push(DeletionRange::Bounded { low, hi });
    }
    out
}

/// Append `[low, hi)` to a list sorted by low, merging with the tail when
/// the two overlap or touch.
fn merge_into<T: Ord + Copy>(out: &mut Vec<(T, T)>, low: T, hi: T) {
    if let Some(last) = out.last_mut() {
        if low <= last.1 {
            if hi > last.1 {
                last.1 = hi;
            }
            return;
        }
    }
    out.push((low, hi));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(n: u64) -> Seq {
        Seq::Confirmed(n)
    }

    fn p(n: u32) -> Seq {
        Seq::Provisional(n)
    }

    fn remote(pairs: &[(u64, u64)]) -> Vec<RemoteRange> {
        pairs
            .iter()
            .map(|&(low, hi)| RemoteRange { low, hi })
            .collect()
    }

    #[test]
    fn overlapping_and_open_ranges_coalesce() {
        let ranges = [
            DeletionRange::bounded(c(1), c(5)).unwrap(),
            DeletionRange::bounded(c(3), c(8)).unwrap(),
            DeletionRange::open(c(10)),
        ];

        let plan = plan_deletion(&ranges, 20).unwrap();

        assert_eq!(plan.remote, remote(&[(1, 8), (10, 21)]));
        assert!(plan.local.is_empty());
    }

    #[test]
    fn input_order_does_not_matter() {
        let ranges = [
            DeletionRange::open(c(10)),
            DeletionRange::bounded(c(3), c(8)).unwrap(),
            DeletionRange::bounded(c(1), c(5)).unwrap(),
        ];

        let plan = plan_deletion(&ranges, 20).unwrap();
        assert_eq!(plan.remote, remote(&[(1, 8), (10, 21)]));
    }

    #[test]
    fn touching_ranges_merge() {
        let ranges = [
            DeletionRange::bounded(c(1), c(3)).unwrap(),
            DeletionRange::bounded(c(3), c(6)).unwrap(),
        ];
        let plan = plan_deletion(&ranges, 10).unwrap();
        assert_eq!(plan.remote, remote(&[(1, 6)]));
    }

    #[test]
    fn widest_range_wins_on_equal_low() {
        let ranges = [
            DeletionRange::bounded(c(2), c(4)).unwrap(),
            DeletionRange::open(c(2)),
            DeletionRange::bounded(c(2), c(9)).unwrap(),
        ];
        let plan = plan_deletion(&ranges, 12).unwrap();
        assert_eq!(plan.remote, remote(&[(2, 13)]));
    }

    #[test]
    fn nested_range_is_absorbed() {
        let ranges = [
            DeletionRange::bounded(c(1), c(10)).unwrap(),
            DeletionRange::bounded(c(4), c(6)).unwrap(),
        ];
        let plan = plan_deletion(&ranges, 20).unwrap();
        assert_eq!(plan.remote, remote(&[(1, 10)]));
    }

    #[test]
    fn wholly_provisional_range_stays_local() {
        let ranges = [DeletionRange::bounded(p(3), p(1)).unwrap()];

        let plan = plan_deletion(&ranges, 20).unwrap();

        assert!(plan.remote.is_empty());
        assert!(!plan.needs_server());
        assert_eq!(plan.local, vec![SeqRange::new(p(3), p(1)).unwrap()]);
    }

    #[test]
    fn range_spanning_boundary_is_split() {
        let ranges = [DeletionRange::bounded(p(2), c(4)).unwrap()];

        let plan = plan_deletion(&ranges, 20).unwrap();

        assert_eq!(plan.local, vec![SeqRange::new(p(2), Seq::FIRST_CONFIRMED).unwrap()]);
        assert_eq!(plan.remote, remote(&[(1, 4)]));
    }

    #[test]
    fn remote_part_is_clipped_to_max_seq() {
        let ranges = [DeletionRange::bounded(c(5), c(100)).unwrap()];
        let plan = plan_deletion(&ranges, 7).unwrap();
        assert_eq!(plan.remote, remote(&[(5, 8)]));
    }

    #[test]
    fn range_past_max_seq_is_dropped() {
        let ranges = [DeletionRange::open(c(30))];
        let plan = plan_deletion(&ranges, 20).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn empty_topic_sends_nothing_remote() {
        let plan = plan_deletion(&[DeletionRange::All], 0).unwrap();
        assert!(plan.remote.is_empty());
        assert_eq!(plan.local, vec![SeqRange::new(Seq::MIN, Seq::FIRST_CONFIRMED).unwrap()]);
    }

    #[test]
    fn all_covers_both_spaces() {
        let plan = plan_deletion(&[DeletionRange::All], 15).unwrap();
        assert_eq!(plan.remote, remote(&[(1, 16)]));
        assert_eq!(plan.local.len(), 1);
        assert_eq!(
            plan.remote_seq_ranges(),
            vec![SeqRange::new(c(1), c(16)).unwrap()]
        );
    }

    #[test]
    fn empty_bounded_range_is_rejected() {
        let bad = DeletionRange::Bounded { low: c(5), hi: c(5) };
        assert_eq!(
            plan_deletion(&[bad], 10),
            Err(RangeError::Empty { low: c(5), hi: c(5) })
        );
        assert!(DeletionRange::bounded(c(2), p(1)).is_err());
    }

    #[test]
    fn remote_ranges_never_overlap_and_cover_input_union() {
        let ranges = [
            DeletionRange::bounded(c(4), c(7)).unwrap(),
            DeletionRange::bounded(c(1), c(2)).unwrap(),
            DeletionRange::bounded(c(6), c(9)).unwrap(),
            DeletionRange::single(c(12)),
            DeletionRange::bounded(c(2), c(3)).unwrap(),
        ];
        let plan = plan_deletion(&ranges, 50).unwrap();

        assert!(plan.remote.windows(2).all(|w| w[0].hi < w[1].low));
        for n in 1..=50u64 {
            let requested = ranges.iter().any(|r| {
                let seq = c(n);
                seq >= r.low() && r.hi().map_or(true, |hi| seq < hi)
            });
            let planned = plan.remote.iter().any(|r| r.low <= n && n < r.hi);
            assert_eq!(requested, planned, "seq {} mismatch", n);
        }
    }

    #[test]
    fn ids_collapse_into_consecutive_ranges() {
        let ids = [c(9), c(3), c(5), c(4), c(4)];
        let ranges = ranges_from_ids(&ids);
        assert_eq!(
            ranges,
            vec![
                DeletionRange::Bounded { low: c(3), hi: c(6) },
                DeletionRange::Bounded { low: c(9), hi: c(10) },
            ]
        );
    }

    #[test]
    fn ids_across_boundary_stay_contiguous() {
        let ranges = ranges_from_ids(&[p(2), p(1), c(1), c(2)]);
        assert_eq!(ranges, vec![DeletionRange::Bounded { low: p(2), hi: c(3) }]);
    }

    #[test]
    fn no_ids_no_ranges() {
        assert!(ranges_from_ids(&[]).is_empty());
    }
}
