//! Half-open identifier intervals.

use serde::{Deserialize, Serialize};

use crate::{Seq, TypesError};

/// A non-empty half-open interval `[low, hi)` over the full identifier order.
///
/// May span provisional and confirmed space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRange<Seq>")]
pub struct SeqRange {
    low: Seq,
    hi: Seq,
}

impl SeqRange {
    /// Create a range, rejecting empty intervals.
    pub fn new(low: Seq, hi: Seq) -> Result<Self, TypesError> {
        if low >= hi {
            return Err(TypesError::EmptyRange {
                low: low.raw(),
                hi: hi.raw(),
            });
        }
        Ok(Self { low, hi })
    }

    /// A range covering exactly one identifier.
    pub fn single(seq: Seq) -> Self {
        Self {
            low: seq,
            hi: seq.next(),
        }
    }

    /// Inclusive low bound.
    pub fn low(&self) -> Seq {
        self.low
    }

    /// Exclusive high bound.
    pub fn hi(&self) -> Seq {
        self.hi
    }

    /// Check if the identifier falls inside the range.
    pub fn contains(&self, seq: Seq) -> bool {
        self.low <= seq && seq < self.hi
    }
}

/// A half-open interval `[low, hi)` of confirmed identifiers.
///
/// This is the only kind of range the server is ever told about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRange<u64>")]
pub struct RemoteRange {
    /// Inclusive low bound, >= 1.
    pub low: u64,
    /// Exclusive high bound, > low.
    pub hi: u64,
}

impl RemoteRange {
    /// Create a confirmed-space range, rejecting empty or zero-based intervals.
    pub fn new(low: u64, hi: u64) -> Result<Self, TypesError> {
        let raw = |v: u64| i64::try_from(v).unwrap_or(i64::MAX);
        if low == 0 {
            return Err(TypesError::NotConfirmed {
                low: 0,
                hi: raw(hi),
            });
        }
        if low >= hi {
            return Err(TypesError::EmptyRange {
                low: raw(low),
                hi: raw(hi),
            });
        }
        Ok(Self { low, hi })
    }

    /// Number of identifiers covered.
    pub fn len(&self) -> u64 {
        self.hi - self.low
    }

    /// Always false for a validly constructed range.
    pub fn is_empty(&self) -> bool {
        self.hi <= self.low
    }

    /// The same interval over the full identifier order.
    pub fn to_seq_range(&self) -> SeqRange {
        SeqRange {
            low: Seq::Confirmed(self.low),
            hi: Seq::Confirmed(self.hi),
        }
    }
}

/// Unvalidated wire form of a range.
#[derive(Deserialize)]
struct RawRange<T> {
    low: T,
    hi: T,
}

impl TryFrom<RawRange<Seq>> for SeqRange {
    type Error = TypesError;

    fn try_from(raw: RawRange<Seq>) -> Result<Self, Self::Error> {
        SeqRange::new(raw.low, raw.hi)
    }
}

impl TryFrom<RawRange<u64>> for RemoteRange {
    type Error = TypesError;

    fn try_from(raw: RawRange<u64>) -> Result<Self, Self::Error> {
        RemoteRange::new(raw.low, raw.hi)
    }
}
