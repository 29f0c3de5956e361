//! Publish state machine for topicsync.
//!
//! This module provides a pure, side-effect-free state machine for one
//! outgoing message. The state machine takes events as input and produces
//! a new state plus a list of actions to execute.
//!
//! The actual work (cache mutation, notifications, the session round trip)
//! is performed by topic-client, which interprets the actions.
//!
//! ```text
//! Draft ──Enqueue──▶ Queued ──Dispatch──▶ Sending ──Accepted──▶ Confirmed
//!                      │  ╲                  │
//!                      │   ╲ (cancelled)     └──Rejected──▶ Failed ──Retry──▶ Queued
//!                      │    ╲──────────────▶ Cancelled
//!                      └──PreconditionFailed / Blocked──▶ Failed
//! ```

/// Lifecycle of one outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishState {
    /// Created but not yet visible in the cache.
    Draft,
    /// Visible in the cache, waiting to be sent.
    Queued,
    /// Publish request in flight.
    Sending,
    /// Acknowledged by the server.
    Confirmed {
        /// Server-assigned seq.
        seq: u64,
    },
    /// Could not be delivered.
    Failed {
        /// Why delivery failed.
        reason: String,
        /// Whether the entry is still cached and may be retried.
        retryable: bool,
    },
    /// Aborted by the user before sending.
    Cancelled,
}

impl PublishState {
    /// Create a new state machine in the Draft state.
    pub fn new() -> Self {
        Self::Draft
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller (topic-client)
    /// is responsible for executing the returned actions.
    pub fn on_event(self, event: PublishEvent) -> (Self, Vec<PublishAction>) {
        match (self, event) {
            // From Draft
            (Self::Draft, PublishEvent::Enqueue) => (
                Self::Queued,
                vec![PublishAction::InsertEntry, PublishAction::EmitDataChanged],
            ),

            // From Queued
            (Self::Queued, PublishEvent::Dispatch { cancelled: true }) => (
                Self::Cancelled,
                vec![
                    PublishAction::RemoveEntry,
                    PublishAction::EmitDataChanged,
                    PublishAction::ResolveAborted,
                ],
            ),
            (Self::Queued, PublishEvent::Dispatch { cancelled: false }) => (
                Self::Sending,
                vec![PublishAction::MarkSending, PublishAction::SendPublish],
            ),
            (Self::Queued, PublishEvent::PreconditionFailed { error }) => (
                Self::Failed {
                    reason: error,
                    retryable: false,
                },
                vec![PublishAction::RemoveEntry, PublishAction::EmitDataChanged],
            ),
            (Self::Queued, PublishEvent::Blocked { reason }) => (
                Self::Failed {
                    reason,
                    retryable: true,
                },
                vec![PublishAction::MarkFailed, PublishAction::EmitDataChanged],
            ),

            // From Sending
            (Self::Sending, PublishEvent::Accepted { seq }) => (
                Self::Confirmed { seq },
                vec![
                    PublishAction::Reposition { seq },
                    PublishAction::EmitDataChanged,
                ],
            ),
            (Self::Sending, PublishEvent::Rejected { error }) => (
                Self::Failed {
                    reason: error,
                    retryable: true,
                },
                vec![PublishAction::MarkFailed, PublishAction::EmitDataChanged],
            ),

            // From Failed
            (
                Self::Failed {
                    retryable: true, ..
                },
                PublishEvent::Retry,
            ) => (
                Self::Queued,
                vec![PublishAction::ClearFailed, PublishAction::EmitDataChanged],
            ),

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Check if no further transitions are expected.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Confirmed { .. } | Self::Failed { .. } | Self::Cancelled
        )
    }

    /// Check if the message may still be cancelled.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, Self::Draft | Self::Queued)
    }
}

impl Default for PublishState {
    fn default() -> Self {
        Self::new()
    }
}

/// Events that drive a publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishEvent {
    /// Caller handed the draft to the pipeline.
    Enqueue,
    /// Precondition resolved; `cancelled` reflects the entry's flag at that
    /// moment.
    Dispatch {
        /// The entry was cancelled while queued.
        cancelled: bool,
    },
    /// Caller-supplied precondition failed.
    PreconditionFailed {
        /// Error description.
        error: String,
    },
    /// Sending is not possible right now (e.g. topic inactive).
    Blocked {
        /// Why the send could not start.
        reason: String,
    },
    /// Server acknowledged the publish.
    Accepted {
        /// Server-assigned seq.
        seq: u64,
    },
    /// Server rejected the publish.
    Rejected {
        /// Error description.
        error: String,
    },
    /// Caller asked to resend a failed message.
    Retry,
}

/// Actions to be executed by topic-client.
///
/// These are instructions, not side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishAction {
    /// Insert the provisional entry into the cache.
    InsertEntry,
    /// Remove the entry from the cache.
    RemoveEntry,
    /// Set the entry's `sending` flag.
    MarkSending,
    /// Clear `sending`, set `failed`; the entry stays cached.
    MarkFailed,
    /// Clear `failed` ahead of a resend.
    ClearFailed,
    /// Call the session's publish operation.
    SendPublish,
    /// Swap the provisional id for the confirmed `seq` and clear `sending`.
    Reposition {
        /// Server-assigned seq.
        seq: u64,
    },
    /// Notify data-changed listeners.
    EmitDataChanged,
    /// Resolve the caller with an "aborted" outcome instead of an error.
    ResolveAborted,
}
