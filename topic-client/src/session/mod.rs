//! Session abstraction for topicsync.
//!
//! The session is the authenticated connection to the messaging service.
//! Wire encoding, authentication and reconnects live behind this trait; the
//! topic controller only sees request/response records from
//! `topicsync-types`.
//!
//! # Design
//!
//! Every request that needs an answer is async and yields either the
//! server's acknowledgement or a [`SessionError`]. Watermark notes are
//! fire-and-forget: the controller never waits on them.
//!
//! # Example
//!
//! ```ignore
//! let session = MockSession::new();
//! let ack = session.publish(request).await?;
//! session.send_watermark("grpTest", WatermarkKind::Read, ack.seq);
//! ```

mod mock;

pub use mock::{DeleteCall, MockSession};

use async_trait::async_trait;
use thiserror::Error;
use topicsync_types::{
    CtrlResult, DeleteAck, MetaParams, MetaQuery, MetaResult, PublishAck, PublishRequest,
    RemoteRange, UserId, WatermarkKind,
};

/// Session errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The server answered with an error code.
    #[error("rejected: {code} {text}")]
    Rejected {
        /// Numeric status code.
        code: u16,
        /// Human-readable reason.
        text: String,
    },

    /// No live connection.
    #[error("not connected")]
    NotConnected,

    /// The server did not answer in time.
    #[error("request timeout")]
    Timeout,

    /// Lower-level transport failure.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Requests a topic sends to the messaging service.
///
/// Implementations handle framing, request ids and connection management.
#[async_trait]
pub trait Session: Send + Sync {
    /// Publish a message. The request carries no local bookkeeping.
    async fn publish(&self, request: PublishRequest) -> Result<PublishAck, SessionError>;

    /// Fetch topic metadata.
    async fn get_meta(&self, topic: &str, query: MetaQuery) -> Result<MetaResult, SessionError>;

    /// Update topic metadata.
    async fn set_meta(&self, topic: &str, params: MetaParams)
        -> Result<CtrlResult, SessionError>;

    /// Delete confirmed messages in the given half-open ranges.
    async fn delete_messages(
        &self,
        topic: &str,
        ranges: &[RemoteRange],
        hard: bool,
    ) -> Result<DeleteAck, SessionError>;

    /// Remove a user's subscription.
    async fn delete_subscription(
        &self,
        topic: &str,
        user_id: &UserId,
    ) -> Result<CtrlResult, SessionError>;

    /// Detach from the topic, optionally unsubscribing.
    async fn leave(&self, topic: &str, unsubscribe: bool) -> Result<CtrlResult, SessionError>;

    /// Delete the topic.
    async fn delete_topic(&self, topic: &str, hard: bool) -> Result<CtrlResult, SessionError>;

    /// Report a receive/read watermark. Fire-and-forget.
    fn send_watermark(&self, topic: &str, kind: WatermarkKind, seq: u64);
}
