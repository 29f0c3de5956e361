//! Delivery status of a cached message.

use serde::{Deserialize, Serialize};
use topicsync_types::{UserId, WatermarkKind};

use crate::cache::MessageEntry;
use crate::registry::SubscriberRegistry;

/// Where a message stands, as seen by the acting user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// Drafted locally, not yet sent.
    Queued,
    /// Publish request in flight.
    Sending,
    /// Last publish attempt failed.
    Failed,
    /// Sending was cancelled.
    Cancelled,
    /// Confirmed by the server, no receipts yet.
    Sent,
    /// At least one other subscriber received it.
    Received,
    /// At least one other subscriber read it.
    Read,
    /// Sent by someone else.
    ToMe,
}

impl MessageStatus {
    /// Check if the server has acknowledged the message.
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Sent | Self::Received | Self::Read | Self::ToMe)
    }
}

/// Derive the status of `entry` for user `me`.
///
/// Local flags decide the status of provisional entries. Confirmed entries
/// authored by `me` take the strongest receipt any other subscriber reports.
pub fn message_status(
    entry: &MessageEntry,
    registry: &SubscriberRegistry,
    me: &UserId,
) -> MessageStatus {
    let Some(seq) = entry.seq.confirmed() else {
        return if entry.cancelled {
            MessageStatus::Cancelled
        } else if entry.failed {
            MessageStatus::Failed
        } else if entry.sending {
            MessageStatus::Sending
        } else {
            MessageStatus::Queued
        };
    };

    if &entry.from != me {
        MessageStatus::ToMe
    } else if registry.count_at_least(WatermarkKind::Read, seq, me) > 0 {
        MessageStatus::Read
    } else if registry.count_at_least(WatermarkKind::Received, seq, me) > 0 {
        MessageStatus::Received
    } else {
        MessageStatus::Sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use topicsync_types::{Seq, SubscriberRecord, Timestamp};

    fn me() -> UserId {
        UserId::from("usrMe")
    }

    fn entry(seq: Seq, from: &str) -> MessageEntry {
        MessageEntry::draft(seq, UserId::from(from), json!("hi"), Timestamp::from_millis(0))
    }

    fn registry(peer_recv: u64, peer_read: u64) -> SubscriberRegistry {
        let mut reg = SubscriberRegistry::new();
        let mut own = SubscriberRecord::new("usrMe", "JRWP");
        own.read = 100;
        own.received = 100;
        reg.upsert(own);
        let mut peer = SubscriberRecord::new("usrPeer", "JRWP");
        peer.received = peer_recv;
        peer.read = peer_read;
        reg.upsert(peer);
        reg
    }

    #[test]
    fn provisional_flags() {
        let reg = SubscriberRegistry::new();
        let mut e = entry(Seq::Provisional(1), "usrMe");
        assert_eq!(message_status(&e, &reg, &me()), MessageStatus::Queued);

        e.sending = true;
        assert_eq!(message_status(&e, &reg, &me()), MessageStatus::Sending);

        e.sending = false;
        e.failed = true;
        assert_eq!(message_status(&e, &reg, &me()), MessageStatus::Failed);

        e.cancelled = true;
        assert_eq!(message_status(&e, &reg, &me()), MessageStatus::Cancelled);
    }

    #[test]
    fn own_confirmed_message_follows_peer_receipts() {
        let e = entry(Seq::Confirmed(5), "usrMe");

        assert_eq!(message_status(&e, &registry(4, 0), &me()), MessageStatus::Sent);
        assert_eq!(
            message_status(&e, &registry(5, 0), &me()),
            MessageStatus::Received
        );
        assert_eq!(message_status(&e, &registry(9, 5), &me()), MessageStatus::Read);
    }

    #[test]
    fn own_watermark_does_not_count() {
        let mut reg = SubscriberRegistry::new();
        let mut own = SubscriberRecord::new("usrMe", "JRWP");
        own.read = 50;
        reg.upsert(own);

        let e = entry(Seq::Confirmed(5), "usrMe");
        assert_eq!(message_status(&e, &reg, &me()), MessageStatus::Sent);
    }

    #[test]
    fn messages_from_others() {
        let e = entry(Seq::Confirmed(3), "usrPeer");
        let status = message_status(&e, &registry(10, 10), &me());
        assert_eq!(status, MessageStatus::ToMe);
        assert!(status.is_confirmed());
    }
}
