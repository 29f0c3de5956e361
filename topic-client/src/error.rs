//! Errors returned by topic operations.

use thiserror::Error;
use topicsync_core::{RangeError, RegistryError};
use topicsync_types::{Seq, TypesError};

use crate::session::SessionError;

/// Topic errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopicError {
    /// The operation needs an attached topic.
    #[error("topic is not active")]
    InactiveTopic,

    /// The server refused the request.
    #[error("rejected by server: {code} {text}")]
    RemoteRejected {
        /// Numeric status code.
        code: u16,
        /// Human-readable reason.
        text: String,
    },

    /// A referenced message or subscriber does not exist locally.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request was aborted before it was sent.
    #[error("request cancelled")]
    Cancelled,

    /// Malformed message range.
    #[error("invalid range: {0}")]
    InvalidRange(String),

    /// A caller-supplied precondition of a publish failed.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// The message was not an unsent draft.
    #[error("message {0} is not an unsent draft")]
    NotADraft(Seq),

    /// The session failed without a server verdict.
    #[error("session error: {0}")]
    Session(SessionError),
}

impl From<SessionError> for TopicError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Rejected { code, text } => TopicError::RemoteRejected { code, text },
            other => TopicError::Session(other),
        }
    }
}

impl From<RangeError> for TopicError {
    fn from(err: RangeError) -> Self {
        TopicError::InvalidRange(err.to_string())
    }
}

impl From<TypesError> for TopicError {
    fn from(err: TypesError) -> Self {
        TopicError::InvalidRange(err.to_string())
    }
}

impl From<RegistryError> for TopicError {
    fn from(err: RegistryError) -> Self {
        TopicError::NotFound(err.to_string())
    }
}
