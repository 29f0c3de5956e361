//! Synchronous broadcast channels.
//!
//! Each channel maps subscription handles to callbacks. `emit` invokes every
//! live callback in subscription order before returning. Nothing is buffered
//! or replayed: a listener only sees values emitted after it subscribed.

use std::fmt;
use topicsync_types::{Credential, Info, Presence, SubscriberRecord, TopicDescription};

use crate::cache::MessageEntry;

/// Callback invoked for every emitted value.
pub type Listener<T> = Box<dyn Fn(&T) + Send + Sync>;

/// Opaque handle identifying one subscription to a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

/// A hot, ordered, multi-subscriber event stream.
pub struct EventChannel<T> {
    next_id: u64,
    listeners: Vec<(SubscriptionHandle, Listener<T>)>,
}

impl<T> EventChannel<T> {
    /// Create a channel with no listeners.
    pub fn new() -> Self {
        Self {
            next_id: 0,
            listeners: Vec::new(),
        }
    }

    /// Register a callback; returns the handle to unsubscribe it.
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionHandle
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let handle = SubscriptionHandle(self.next_id);
        self.next_id += 1;
        self.listeners.push((handle, Box::new(listener)));
        handle
    }

    /// Remove a callback. Returns `true` if the handle was live.
    pub fn unsubscribe(&mut self, handle: SubscriptionHandle) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(h, _)| *h != handle);
        self.listeners.len() != before
    }

    /// Deliver a value to every listener, in subscription order.
    ///
    /// Returns the number of listeners invoked.
    pub fn emit(&self, value: &T) -> usize {
        for (_, listener) in &self.listeners {
            listener(value);
        }
        self.listeners.len()
    }

    /// Number of live listeners.
    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }
}

impl<T> Default for EventChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for EventChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// The set of channels a topic emits on.
#[derive(Debug, Default)]
pub struct TopicEvents {
    /// A message was added, changed or removed (`None` for bulk changes).
    pub data: EventChannel<Option<MessageEntry>>,
    /// The topic description changed.
    pub meta_desc: EventChannel<TopicDescription>,
    /// A single subscription record changed.
    pub meta_sub: EventChannel<SubscriberRecord>,
    /// The subscription list changed; carries the full set.
    pub subs_updated: EventChannel<Vec<SubscriberRecord>>,
    /// Tags changed.
    pub tags: EventChannel<Vec<String>>,
    /// Credentials changed.
    pub creds: EventChannel<Vec<Credential>>,
    /// Presence notification received.
    pub pres: EventChannel<Presence>,
    /// Info notification received.
    pub info: EventChannel<Info>,
    /// The topic was deleted; carries the topic name.
    pub deleted: EventChannel<String>,
}

impl TopicEvents {
    /// Create channels with no listeners.
    pub fn new() -> Self {
        Self::default()
    }
}
