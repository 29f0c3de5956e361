//! Records exchanged with the session collaborator.
//!
//! These are the typed payloads passed across the `Session` boundary. Wire
//! encoding is the session's concern; nothing here knows about bytes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{RemoteRange, Timestamp, UserId};

/// Which receipt watermark a notification refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatermarkKind {
    /// The user's client has received messages up to the seq.
    #[serde(rename = "recv")]
    Received,
    /// The user has read messages up to the seq.
    Read,
}

/// Outgoing publish, with local bookkeeping already stripped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishRequest {
    /// Target topic name.
    pub topic: String,
    /// Opaque message content.
    pub content: Value,
    /// Ask the server not to echo the message back to this session.
    #[serde(default)]
    pub no_echo: bool,
    /// Attachment references extracted from the content.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
}

/// Server acknowledgement of a publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishAck {
    /// Server-assigned sequence number.
    pub seq: u64,
    /// Server timestamp of the message.
    pub ts: Timestamp,
}

/// Server acknowledgement of a message deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteAck {
    /// Deletion transaction id assigned by the server.
    pub del_id: u64,
}

/// Generic control response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CtrlResult {
    /// HTTP-like status code.
    pub code: u16,
    /// Human-readable status text.
    pub text: String,
}

impl CtrlResult {
    /// A 200 OK result.
    pub fn ok() -> Self {
        Self {
            code: 200,
            text: "ok".into(),
        }
    }

    /// Check if the code is in the success range.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.code)
    }
}

/// Selects which parts of topic metadata to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MetaQuery {
    /// Fetch the topic description.
    pub desc: bool,
    /// Fetch subscriptions.
    pub sub: bool,
    /// Fetch tags.
    pub tags: bool,
    /// Fetch credentials.
    pub cred: bool,
}

impl MetaQuery {
    /// Query for every metadata section.
    pub fn all() -> Self {
        Self {
            desc: true,
            sub: true,
            tags: true,
            cred: true,
        }
    }
}

/// Metadata returned by the server.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetaResult {
    /// Topic description, if requested.
    pub desc: Option<TopicDescription>,
    /// Subscriptions, if requested.
    pub subs: Option<Vec<SubscriberRecord>>,
    /// Tags, if requested.
    pub tags: Option<Vec<String>>,
    /// Credentials, if requested.
    pub creds: Option<Vec<Credential>>,
}

/// Metadata update parameters.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetaParams {
    /// New public description payload.
    pub public: Option<Value>,
    /// Replacement tag set.
    pub tags: Option<Vec<String>>,
}

/// Topic description as known to the server.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TopicDescription {
    /// Highest message seq in the topic.
    #[serde(default)]
    pub seq: u64,
    /// Highest deletion transaction id.
    #[serde(default)]
    pub clear: u64,
    /// Public, application-defined payload.
    pub public: Option<Value>,
    /// Last update time.
    pub updated: Option<Timestamp>,
}

/// One user's subscription to the topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberRecord {
    /// Subscriber.
    pub user_id: UserId,
    /// Opaque access mode string (e.g. `JRWPS`).
    pub access_mode: String,
    /// Highest seq the user's client has received.
    #[serde(default)]
    pub received: u64,
    /// Highest seq the user has read.
    #[serde(default)]
    pub read: u64,
}

impl SubscriberRecord {
    /// A record with no watermarks set.
    pub fn new(user_id: impl Into<UserId>, access_mode: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            access_mode: access_mode.into(),
            received: 0,
            read: 0,
        }
    }

    /// The watermark of the given kind.
    pub fn watermark(&self, kind: WatermarkKind) -> u64 {
        match kind {
            WatermarkKind::Received => self.received,
            WatermarkKind::Read => self.read,
        }
    }
}

/// A validated credential attached to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Validation method (`email`, `tel`, ...).
    pub method: String,
    /// Credential value.
    pub value: String,
    /// Whether validation has completed.
    #[serde(default)]
    pub done: bool,
}

/// A message pushed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerMessage {
    /// Confirmed sequence number.
    pub seq: u64,
    /// Sender.
    pub from: UserId,
    /// Server timestamp.
    pub ts: Timestamp,
    /// Opaque content.
    pub content: Value,
}

/// Presence notification about the topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Presence {
    /// What happened.
    pub what: PresenceWhat,
    /// The user the notification is about.
    pub src: UserId,
}

/// Presence event kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "what", rename_all = "lowercase")]
pub enum PresenceWhat {
    /// User came online.
    On,
    /// User went offline.
    Off,
    /// User read messages up to `seq`.
    Read {
        /// Read watermark.
        seq: u64,
    },
    /// User received messages up to `seq`.
    Recv {
        /// Receive watermark.
        seq: u64,
    },
    /// Messages were deleted by someone else.
    Del {
        /// Deletion transaction id.
        del_id: u64,
        /// Deleted ranges.
        ranges: Vec<RemoteRange>,
    },
    /// Topic description was updated.
    Upd,
    /// Topic was deleted or access revoked.
    Gone,
}

/// Ephemeral notification forwarded from another subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Info {
    /// Originating user.
    pub from: UserId,
    /// Notification kind.
    pub what: InfoWhat,
    /// Seq the notification refers to (0 for key presses).
    #[serde(default)]
    pub seq: u64,
}

/// Info notification kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InfoWhat {
    /// Read receipt.
    Read,
    /// Delivery receipt.
    Recv,
    /// Typing notification.
    Kp,
}

impl InfoWhat {
    /// The watermark this notification advances, if any.
    pub fn watermark(&self) -> Option<WatermarkKind> {
        match self {
            InfoWhat::Read => Some(WatermarkKind::Read),
            InfoWhat::Recv => Some(WatermarkKind::Received),
            InfoWhat::Kp => None,
        }
    }
}
