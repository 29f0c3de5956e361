//! # topicsync-core
//!
//! Pure logic for topicsync (no I/O, instant tests).
//!
//! This crate implements the cache, the publish state machine and the
//! deletion planner for a single topic without any network access, so
//! every rule can be tested synchronously.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure**: they take input and produce
//! output without side effects. The controller in `topicsync-client` owns
//! one instance of each component, calls the Session, and interprets the
//! actions produced here. Components never call each other; the only
//! cross-module references are data types.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod allocator;
pub mod cache;
pub mod counters;
pub mod deletion;
pub mod events;
pub mod publish;
pub mod registry;
pub mod status;

pub use allocator::ProvisionalIdAllocator;
pub use cache::{CacheError, MessageCache, MessageEntry};
pub use counters::TopicCounters;
pub use deletion::{plan_deletion, ranges_from_ids, DeletionPlan, DeletionRange, RangeError};
pub use events::{EventChannel, Listener, SubscriptionHandle, TopicEvents};
pub use publish::{PublishAction, PublishEvent, PublishState};
pub use registry::{RegistryError, SubscriberRegistry};
pub use status::{message_status, MessageStatus};
