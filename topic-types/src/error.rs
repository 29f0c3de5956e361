//! Error types for topicsync boundary types.

use thiserror::Error;

/// Errors raised when building identifiers or ranges from raw values.
#[derive(Debug, Error)]
pub enum TypesError {
    /// Zero is neither a provisional nor a confirmed identifier.
    #[error("zero is not a valid message identifier")]
    ZeroSeq,

    /// A half-open range whose low bound is not below its high bound.
    #[error("empty range: [{low}, {hi})")]
    EmptyRange {
        /// Inclusive low bound, as a raw value.
        low: i64,
        /// Exclusive high bound, as a raw value.
        hi: i64,
    },

    /// A range crossing into a space it may not reference.
    #[error("range [{low}, {hi}) is not in confirmed space")]
    NotConfirmed {
        /// Inclusive low bound, as a raw value.
        low: i64,
        /// Exclusive high bound, as a raw value.
        hi: i64,
    },

    /// A raw identifier outside the provisional id space.
    #[error("identifier {0} is out of range")]
    OutOfRange(i64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = TypesError::EmptyRange { low: 5, hi: 3 };
        assert_eq!(err.to_string(), "empty range: [5, 3)");
        assert_eq!(
            TypesError::ZeroSeq.to_string(),
            "zero is not a valid message identifier"
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TypesError>();
    }
}
