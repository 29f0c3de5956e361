//! Identity and ordering types for topicsync.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::TypesError;

/// A message identifier within a topic.
///
/// Confirmed identifiers are assigned by the server, start at 1 and grow
/// monotonically. Provisional identifiers are assigned locally to messages
/// the server has not acknowledged yet. The two spaces never overlap.
///
/// In raw (signed) form a provisional id `n` is written `-n`, so the total
/// order is the raw numeric order: every provisional id sorts before every
/// confirmed id, and a later provisional id (larger `n`) sorts lower.
/// Provisional ids are 32-bit so every one of them has a distinct raw form.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Seq {
    /// Locally issued placeholder. `Provisional(0)` is never issued.
    Provisional(u32),
    /// Server-assigned sequence number, always >= 1.
    Confirmed(u64),
}

impl Seq {
    /// The lowest identifier in the total order.
    pub const MIN: Seq = Seq::Provisional(u32::MAX);

    /// The first confirmed identifier; the exclusive end of provisional space.
    pub const FIRST_CONFIRMED: Seq = Seq::Confirmed(1);

    /// Check if this is a locally issued identifier.
    pub fn is_provisional(&self) -> bool {
        matches!(self, Seq::Provisional(_))
    }

    /// Check if this is a server-assigned identifier.
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Seq::Confirmed(_))
    }

    /// The server sequence number, if confirmed.
    pub fn confirmed(&self) -> Option<u64> {
        match self {
            Seq::Confirmed(n) => Some(*n),
            Seq::Provisional(_) => None,
        }
    }

    /// The immediate successor in the total order.
    ///
    /// The successor of the highest provisional id is [`Seq::FIRST_CONFIRMED`].
    pub fn next(&self) -> Seq {
        match *self {
            Seq::Provisional(n) if n <= 1 => Seq::FIRST_CONFIRMED,
            Seq::Provisional(n) => Seq::Provisional(n - 1),
            Seq::Confirmed(n) => Seq::Confirmed(n.saturating_add(1)),
        }
    }

    /// Signed raw form: `-n` for provisional, `n` for confirmed.
    ///
    /// Confirmed ids above `i64::MAX` saturate.
    pub fn raw(&self) -> i64 {
        match *self {
            Seq::Provisional(n) => -i64::from(n),
            Seq::Confirmed(n) => i64::try_from(n).unwrap_or(i64::MAX),
        }
    }

    /// Build an identifier from its signed raw form.
    pub fn from_raw(raw: i64) -> Result<Self, TypesError> {
        match raw.cmp(&0) {
            Ordering::Less => u32::try_from(raw.unsigned_abs())
                .map(Seq::Provisional)
                .map_err(|_| TypesError::OutOfRange(raw)),
            Ordering::Equal => Err(TypesError::ZeroSeq),
            Ordering::Greater => Ok(Seq::Confirmed(raw.unsigned_abs())),
        }
    }
}

impl Ord for Seq {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Seq::Provisional(a), Seq::Provisional(b)) => b.cmp(a),
            (Seq::Provisional(_), Seq::Confirmed(_)) => Ordering::Less,
            (Seq::Confirmed(_), Seq::Provisional(_)) => Ordering::Greater,
            (Seq::Confirmed(a), Seq::Confirmed(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Seq {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl TryFrom<i64> for Seq {
    type Error = TypesError;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        Seq::from_raw(raw)
    }
}

impl From<Seq> for i64 {
    fn from(seq: Seq) -> Self {
        seq.raw()
    }
}

impl fmt::Display for Seq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Seq::Provisional(n) => write!(f, "-{}", n),
            Seq::Confirmed(n) => write!(f, "{}", n),
        }
    }
}

impl fmt::Debug for Seq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Seq::Provisional(n) => write!(f, "Provisional({})", n),
            Seq::Confirmed(n) => write!(f, "Confirmed({})", n),
        }
    }
}

/// A user identifier as issued by the server (e.g. `usrAbC123`).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Create a UserId from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", self.0)
    }
}

/// Milliseconds since the Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Create a timestamp from milliseconds since the epoch.
    pub fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    /// The current wall-clock time.
    pub fn now() -> Self {
        let ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or_default();
        Self(ms)
    }

    /// Milliseconds since the epoch.
    pub fn as_millis(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provisional_sorts_before_confirmed() {
        assert!(Seq::Provisional(1) < Seq::Confirmed(1));
        assert!(Seq::Provisional(500) < Seq::Confirmed(1));
        assert!(Seq::MIN < Seq::Provisional(1));
    }

    #[test]
    fn later_provisional_sorts_lower() {
        // -2 < -1
        assert!(Seq::Provisional(2) < Seq::Provisional(1));
        let mut seqs = vec![
            Seq::Confirmed(3),
            Seq::Provisional(1),
            Seq::Confirmed(1),
            Seq::Provisional(2),
        ];
        seqs.sort();
        let raw: Vec<i64> = seqs.iter().map(Seq::raw).collect();
        assert_eq!(raw, vec![-2, -1, 1, 3]);
    }

    #[test]
    fn raw_roundtrip() {
        assert_eq!(Seq::from_raw(-3).unwrap(), Seq::Provisional(3));
        assert_eq!(Seq::from_raw(7).unwrap(), Seq::Confirmed(7));
        assert!(matches!(Seq::from_raw(0), Err(TypesError::ZeroSeq)));
        assert_eq!(Seq::Provisional(3).raw(), -3);
    }

    #[test]
    fn every_provisional_id_has_its_own_raw_form() {
        assert_eq!(Seq::MIN.raw(), -i64::from(u32::MAX));
        assert_eq!(Seq::from_raw(Seq::MIN.raw()).unwrap(), Seq::MIN);
        assert_ne!(Seq::MIN.raw(), Seq::Provisional(u32::MAX - 1).raw());

        let too_low = -i64::from(u32::MAX) - 1;
        assert!(matches!(
            Seq::from_raw(too_low),
            Err(TypesError::OutOfRange(raw)) if raw == too_low
        ));
        assert!(serde_json::from_str::<Seq>(&too_low.to_string()).is_err());
    }

    #[test]
    fn next_crosses_into_confirmed_space() {
        assert_eq!(Seq::Provisional(3).next(), Seq::Provisional(2));
        assert_eq!(Seq::Provisional(1).next(), Seq::FIRST_CONFIRMED);
        assert_eq!(Seq::Confirmed(9).next(), Seq::Confirmed(10));
        assert_eq!(Seq::Confirmed(u64::MAX).next(), Seq::Confirmed(u64::MAX));
    }

    #[test]
    fn seq_serializes_as_signed_integer() {
        let json = serde_json::to_string(&vec![Seq::Provisional(4), Seq::Confirmed(12)]).unwrap();
        assert_eq!(json, "[-4,12]");

        let back: Vec<Seq> = serde_json::from_str("[-1,5]").unwrap();
        assert_eq!(back, vec![Seq::Provisional(1), Seq::Confirmed(5)]);

        assert!(serde_json::from_str::<Seq>("0").is_err());
    }

    #[test]
    fn seq_display() {
        assert_eq!(Seq::Provisional(2).to_string(), "-2");
        assert_eq!(Seq::Confirmed(42).to_string(), "42");
    }

    #[test]
    fn user_id_is_transparent_string() {
        let id = UserId::from("usrAlice");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"usrAlice\"");
        assert_eq!(id.as_str(), "usrAlice");
    }

    #[test]
    fn timestamp_now_is_after_epoch() {
        assert!(Timestamp::now() > Timestamp::from_millis(1_600_000_000_000));
    }
}
