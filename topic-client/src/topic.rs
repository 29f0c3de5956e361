//! Topic - the controller for one synchronized topic.
//!
//! This module provides [`Topic`], the API applications use to mirror a
//! remote topic: publish optimistically, delete ranges, route server pushes,
//! and track subscriber receipts.
//!
//! # Architecture
//!
//! Topic owns one instance of each topicsync-core component and is the only
//! place they meet. Pure decisions (publish transitions, deletion plans) come
//! from topicsync-core; Topic executes them and performs the I/O through the
//! [`Session`] trait.
//!
//! ```text
//! Application → Topic → Session → Network
//!                 ↓
//!         topicsync-core (cache, publish machine, planner, registry)
//! ```
//!
//! State lives behind a single async mutex that is never held across a
//! session call, so every mutation is atomic with respect to interleaved
//! operations. Events are emitted while the lock is held, right after the
//! mutation they describe; listeners must not call back into the topic.
//!
//! # Example
//!
//! ```ignore
//! use topicsync_client::{MockSession, Topic, TopicConfig};
//!
//! let topic = Topic::new(&TopicConfig::for_topic("grpTest", "usrAlice"), MockSession::new());
//! topic.subscribe(MetaQuery::all()).await?;
//! let ack = topic.publish(json!("hello")).await?.into_ack()?;
//! topic.note_read(ack.seq).await?;
//! ```

use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use tokio::sync::Mutex;
use topicsync_core::{
    message_status, plan_deletion, ranges_from_ids, CacheError, DeletionRange, MessageCache,
    MessageEntry, MessageStatus, PublishAction, PublishEvent, PublishState, SubscriberRegistry,
    TopicCounters, TopicEvents,
};
use topicsync_types::{
    Credential, CtrlResult, Info, MetaParams, MetaQuery, MetaResult, Presence, PresenceWhat,
    PublishAck, PublishRequest, RemoteRange, Seq, SeqRange, ServerMessage, SubscriberRecord,
    Timestamp, TopicDescription, UserId, WatermarkKind,
};

use crate::codec::{ContentCodec, PlainTextCodec};
use crate::config::TopicConfig;
use crate::error::TopicError;
use crate::session::Session;

/// How a publish that did not fail ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The server accepted the message.
    Confirmed(PublishAck),
    /// The message was cancelled before it was sent.
    Aborted,
}

impl PublishOutcome {
    /// The acknowledgement, or [`TopicError::Cancelled`] if aborted.
    pub fn into_ack(self) -> Result<PublishAck, TopicError> {
        match self {
            PublishOutcome::Confirmed(ack) => Ok(ack),
            PublishOutcome::Aborted => Err(TopicError::Cancelled),
        }
    }

    /// Server-assigned seq, if confirmed.
    pub fn seq(&self) -> Option<u64> {
        match self {
            PublishOutcome::Confirmed(ack) => Some(ack.seq),
            PublishOutcome::Aborted => None,
        }
    }
}

/// Result of a delete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteOutcome {
    /// Server deletion id; `None` when nothing had to be sent.
    pub del_id: Option<u64>,
    /// Number of cached entries removed.
    pub removed: usize,
}

/// Side effects of one publish transition that need the caller.
#[derive(Debug, Default)]
struct Step {
    send: bool,
    aborted: bool,
}

struct TopicState {
    name: String,
    active: bool,
    /// Bumped on every reset; acks from before a reset are not counted.
    epoch: u64,
    cache: MessageCache,
    counters: TopicCounters,
    registry: SubscriberRegistry,
    description: Option<TopicDescription>,
    tags: Vec<String>,
    creds: Vec<Credential>,
    publishes: HashMap<Seq, PublishState>,
    events: TopicEvents,
}

impl TopicState {
    fn new(name: String) -> Self {
        Self {
            name,
            active: false,
            epoch: 0,
            cache: MessageCache::new(),
            counters: TopicCounters::new(),
            registry: SubscriberRegistry::new(),
            description: None,
            tags: Vec::new(),
            creds: Vec::new(),
            publishes: HashMap::new(),
            events: TopicEvents::new(),
        }
    }

    /// Feed `event` to the publish machine of `seq` and run the cache-side
    /// actions it returns.
    fn step(&mut self, seq: Seq, event: PublishEvent, mut draft: Option<MessageEntry>) -> Step {
        let current = self.publishes.remove(&seq).unwrap_or_default();
        let (next, actions) = current.on_event(event);

        let mut step = Step::default();
        let mut target = seq;
        let mut removed = None;

        for action in actions {
            match action {
                PublishAction::InsertEntry => {
                    if let Some(entry) = draft.take() {
                        if let Err(err) = self.cache.insert(entry) {
                            tracing::warn!(topic = %self.name, %seq, error = %err, "draft not inserted");
                        }
                    }
                }
                PublishAction::RemoveEntry => removed = self.cache.remove(seq),
                PublishAction::MarkSending => self.update_entry(seq, |e| {
                    e.sending = true;
                    e.failed = false;
                }),
                PublishAction::MarkFailed => self.update_entry(seq, |e| {
                    e.sending = false;
                    e.failed = true;
                }),
                PublishAction::ClearFailed => self.update_entry(seq, |e| e.failed = false),
                PublishAction::SendPublish => step.send = true,
                PublishAction::Reposition { seq: confirmed } => {
                    target = self.confirm(seq, confirmed);
                }
                PublishAction::EmitDataChanged => {
                    let entry = self.cache.get(target).cloned().or_else(|| removed.clone());
                    self.events.data.emit(&entry);
                }
                PublishAction::ResolveAborted => step.aborted = true,
            }
        }

        if matches!(
            next,
            PublishState::Queued
                | PublishState::Sending
                | PublishState::Failed {
                    retryable: true,
                    ..
                }
        ) {
            self.publishes.insert(seq, next);
        }
        step
    }

    fn update_entry(&mut self, seq: Seq, f: impl FnOnce(&mut MessageEntry)) {
        if let Some(entry) = self.cache.get_mut(seq) {
            f(entry);
        }
    }

    /// Swap a provisional id for the server's seq. Returns the confirmed id.
    fn confirm(&mut self, provisional: Seq, seq: u64) -> Seq {
        let confirmed = Seq::Confirmed(seq);
        self.counters.note_seq(confirmed);

        match self.cache.reposition(provisional, confirmed) {
            Ok(_) => self.update_entry(confirmed, |e| e.sending = false),
            Err(CacheError::Duplicate(_)) => {
                // The server push beat the ack; keep the server copy.
                self.cache.remove(provisional);
                tracing::debug!(topic = %self.name, %provisional, seq, "confirmed copy already cached");
            }
            Err(CacheError::NotFound(_)) => {
                tracing::debug!(topic = %self.name, %provisional, seq, "confirmed entry not cached");
            }
        }
        confirmed
    }

    /// Remove every cached entry in `ranges`. Emits one data event if
    /// anything was removed.
    fn flush(&mut self, ranges: &[SeqRange]) -> usize {
        self.flush_planned(&[], ranges)
    }

    /// Remove exactly `ids` plus every cached entry in `ranges`. Emits one
    /// data event if anything was removed.
    fn flush_planned(&mut self, ids: &[Seq], ranges: &[SeqRange]) -> usize {
        let mut removed = 0;
        for seq in ids {
            if self.cache.remove(*seq).is_some() {
                self.publishes.remove(seq);
                removed += 1;
            }
        }
        for range in ranges {
            for entry in self.cache.delete_range(range) {
                self.publishes.remove(&entry.seq);
                removed += 1;
            }
        }
        if removed > 0 {
            self.events.data.emit(&None);
        }
        removed
    }

    fn reset(&mut self) {
        let had_messages = !self.cache.is_empty();
        self.active = false;
        self.epoch += 1;
        self.cache.clear();
        self.counters.reset();
        self.registry.clear();
        self.description = None;
        self.tags.clear();
        self.creds.clear();
        self.publishes.clear();
        if had_messages {
            self.events.data.emit(&None);
        }
    }

    fn route_data(&mut self, msg: ServerMessage) -> bool {
        let entry = MessageEntry::from_server(msg);
        let seq = entry.seq;
        match self.cache.insert(entry) {
            Ok(_) => {
                self.counters.note_seq(seq);
                let inserted = self.cache.get(seq).cloned();
                self.events.data.emit(&inserted);
                true
            }
            Err(_) => false,
        }
    }

    fn apply_meta(&mut self, result: MetaResult) {
        if let Some(desc) = result.desc {
            self.apply_desc(desc);
        }
        if let Some(subs) = result.subs {
            self.apply_subs(subs);
        }
        if let Some(tags) = result.tags {
            self.apply_tags(tags);
        }
        if let Some(creds) = result.creds {
            self.apply_creds(creds);
        }
    }

    fn apply_desc(&mut self, desc: TopicDescription) {
        if desc.seq > 0 {
            self.counters.note_seq(Seq::Confirmed(desc.seq));
        }
        self.counters.note_del_id(desc.clear);
        self.events.meta_desc.emit(&desc);
        self.description = Some(desc);
    }

    fn apply_subs(&mut self, subs: Vec<SubscriberRecord>) {
        for record in subs {
            let stored = self.registry.upsert(record).clone();
            self.events.meta_sub.emit(&stored);
        }
        let all = self.registry.to_vec();
        self.events.subs_updated.emit(&all);
    }

    fn apply_tags(&mut self, tags: Vec<String>) {
        self.events.tags.emit(&tags);
        self.tags = tags;
    }

    fn apply_creds(&mut self, creds: Vec<Credential>) {
        self.events.creds.emit(&creds);
        self.creds = creds;
    }

    fn apply_meta_params(&mut self, params: MetaParams) {
        if let Some(public) = params.public {
            let desc = self.description.get_or_insert_with(TopicDescription::default);
            desc.public = Some(public);
            desc.updated = Some(Timestamp::now());
            let snapshot = desc.clone();
            self.events.meta_desc.emit(&snapshot);
        }
        if let Some(tags) = params.tags {
            self.apply_tags(tags);
        }
    }

    /// Advance another user's watermark from a notification. Unknown users
    /// are ignored.
    fn note_peer_watermark(&mut self, user_id: &UserId, kind: WatermarkKind, seq: u64) {
        if let Err(err) = self.registry.note_watermark(user_id, kind, seq) {
            tracing::debug!(topic = %self.name, error = %err, "receipt for unknown subscriber");
        }
    }

    fn route_pres(&mut self, pres: Presence) {
        let mut gone = false;
        match &pres.what {
            PresenceWhat::Read { seq } => {
                self.note_peer_watermark(&pres.src, WatermarkKind::Read, *seq);
            }
            PresenceWhat::Recv { seq } => {
                self.note_peer_watermark(&pres.src, WatermarkKind::Received, *seq);
            }
            PresenceWhat::Del { del_id, ranges } => {
                self.counters.note_del_id(*del_id);
                let ranges: Vec<SeqRange> = ranges.iter().map(RemoteRange::to_seq_range).collect();
                self.flush(&ranges);
            }
            PresenceWhat::Gone => {
                self.reset();
                gone = true;
            }
            PresenceWhat::On | PresenceWhat::Off | PresenceWhat::Upd => {}
        }

        self.events.pres.emit(&pres);
        if gone {
            self.events.deleted.emit(&self.name);
        }
    }

    fn route_info(&mut self, info: Info) {
        if let Some(kind) = info.what.watermark() {
            self.note_peer_watermark(&info.from, kind, info.seq);
        }
        self.events.info.emit(&info);
    }
}

/// Controller for one topic.
///
/// Generic over the [`Session`] that carries requests and the
/// [`ContentCodec`] that interprets message content.
pub struct Topic<S: Session, C: ContentCodec = PlainTextCodec> {
    name: String,
    me: UserId,
    echo: bool,
    sync_receipts: bool,
    session: S,
    codec: C,
    state: Mutex<TopicState>,
}

impl<S: Session> Topic<S, PlainTextCodec> {
    /// Create a topic controller with the plain-text codec.
    pub fn new(config: &TopicConfig, session: S) -> Self {
        Self::with_codec(config, session, PlainTextCodec)
    }
}

impl<S: Session, C: ContentCodec> Topic<S, C> {
    /// Create a topic controller with a custom codec.
    pub fn with_codec(config: &TopicConfig, session: S, codec: C) -> Self {
        Self {
            name: config.topic.name.clone(),
            me: UserId::new(config.topic.user_id.clone()),
            echo: config.publish.echo,
            sync_receipts: config.publish.sync_receipts,
            session,
            codec,
            state: Mutex::new(TopicState::new(config.topic.name.clone())),
        }
    }

    /// Topic name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The acting user.
    pub fn user_id(&self) -> &UserId {
        &self.me
    }

    /// The underlying session.
    pub fn session(&self) -> &S {
        &self.session
    }

    /// The content codec.
    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Check if the topic is attached.
    pub async fn is_active(&self) -> bool {
        self.state.lock().await.active
    }

    /// Register or remove listeners.
    ///
    /// ```ignore
    /// let handle = topic.with_events(|ev| ev.data.subscribe(|e| println!("{:?}", e))).await;
    /// ```
    pub async fn with_events<R>(&self, f: impl FnOnce(&mut TopicEvents) -> R) -> R {
        let mut state = self.state.lock().await;
        f(&mut state.events)
    }

    // ===========================================
    // Publishing
    // ===========================================

    /// Build a draft with a fresh provisional id. The draft is not cached
    /// until it is published.
    pub async fn create_draft(&self, content: Value) -> MessageEntry {
        let seq = self.state.lock().await.counters.provisional.next();
        MessageEntry::draft(seq, self.me.clone(), content, Timestamp::now())
    }

    /// Draft and publish `content`.
    pub async fn publish(&self, content: Value) -> Result<PublishOutcome, TopicError> {
        let draft = self.create_draft(content).await;
        self.publish_draft(draft).await
    }

    /// Publish a draft created by [`create_draft`](Self::create_draft).
    pub async fn publish_draft(&self, draft: MessageEntry) -> Result<PublishOutcome, TopicError> {
        self.publish_draft_after(draft, std::future::ready(Ok(()))).await
    }

    /// Publish a draft once `precondition` resolves.
    ///
    /// The draft is cached (and visible) immediately. If the precondition
    /// fails the draft is removed and [`TopicError::Precondition`] returned.
    /// If the draft is cancelled while waiting, nothing is sent and the
    /// outcome is [`PublishOutcome::Aborted`].
    pub async fn publish_draft_after<F>(
        &self,
        draft: MessageEntry,
        precondition: F,
    ) -> Result<PublishOutcome, TopicError>
    where
        F: Future<Output = Result<(), String>> + Send,
    {
        let seq = draft.seq;
        {
            let mut state = self.state.lock().await;
            if !seq.is_provisional()
                || state.cache.find(seq).is_some()
                || state.publishes.contains_key(&seq)
            {
                return Err(TopicError::NotADraft(seq));
            }
            state.step(seq, PublishEvent::Enqueue, Some(draft));
        }
        tracing::debug!(topic = %self.name, %seq, "message queued");

        if let Err(error) = precondition.await {
            let mut state = self.state.lock().await;
            state.step(
                seq,
                PublishEvent::PreconditionFailed {
                    error: error.clone(),
                },
                None,
            );
            tracing::warn!(topic = %self.name, %seq, %error, "publish precondition failed");
            return Err(TopicError::Precondition(error));
        }

        self.dispatch(seq).await
    }

    /// Send a queued message, or abort it if it was cancelled.
    async fn dispatch(&self, seq: Seq) -> Result<PublishOutcome, TopicError> {
        let (request, epoch) = {
            let mut state = self.state.lock().await;
            if !matches!(state.publishes.get(&seq), Some(PublishState::Queued)) {
                tracing::debug!(topic = %self.name, %seq, "publish dropped before dispatch");
                return Ok(PublishOutcome::Aborted);
            }

            let cancelled = state.cache.get(seq).map_or(true, |e| e.cancelled);
            if !cancelled && !state.active {
                state.step(
                    seq,
                    PublishEvent::Blocked {
                        reason: TopicError::InactiveTopic.to_string(),
                    },
                    None,
                );
                return Err(TopicError::InactiveTopic);
            }

            let step = state.step(seq, PublishEvent::Dispatch { cancelled }, None);
            if step.aborted || !step.send {
                tracing::info!(topic = %self.name, %seq, "publish cancelled before sending");
                return Ok(PublishOutcome::Aborted);
            }

            let content = state
                .cache
                .get(seq)
                .map(|e| e.content.clone())
                .ok_or_else(|| TopicError::NotFound(seq.to_string()))?;
            (self.request_for(content), state.epoch)
        };

        tracing::debug!(topic = %self.name, %seq, "sending publish");
        let result = self.session.publish(request).await;

        let mut state = self.state.lock().await;
        match result {
            Ok(ack) => {
                // The seq exists on the server even if the entry is gone locally.
                if state.epoch == epoch {
                    state.counters.note_seq(Seq::Confirmed(ack.seq));
                }
                if state.publishes.contains_key(&seq) {
                    state.update_entry(seq, |e| e.created_at = ack.ts);
                    state.step(seq, PublishEvent::Accepted { seq: ack.seq }, None);
                } else {
                    tracing::debug!(topic = %self.name, provisional = %seq, seq = ack.seq, "entry flushed while in flight");
                }
                tracing::info!(topic = %self.name, provisional = %seq, seq = ack.seq, "publish confirmed");
                Ok(PublishOutcome::Confirmed(ack))
            }
            Err(err) => {
                state.step(
                    seq,
                    PublishEvent::Rejected {
                        error: err.to_string(),
                    },
                    None,
                );
                tracing::warn!(topic = %self.name, %seq, error = %err, "publish failed");
                Err(err.into())
            }
        }
    }

    fn request_for(&self, content: Value) -> PublishRequest {
        PublishRequest {
            topic: self.name.clone(),
            attachments: self.codec.attachments(&content),
            content,
            no_echo: !self.echo,
        }
    }

    /// Cancel a message that has not been sent.
    ///
    /// A queued message is flagged and dropped when its turn to send comes;
    /// a failed one is removed at once. Returns `false` if the message is
    /// already in flight, confirmed, or unknown.
    pub async fn cancel_send(&self, seq: Seq) -> bool {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        match state.publishes.get(&seq) {
            Some(PublishState::Queued) => {
                let Some(entry) = state.cache.get_mut(seq) else {
                    return false;
                };
                entry.cancelled = true;
                let snapshot = entry.clone();
                state.events.data.emit(&Some(snapshot));
                true
            }
            Some(PublishState::Failed { .. }) => {
                state.publishes.remove(&seq);
                let removed = state.cache.remove(seq);
                if removed.is_some() {
                    state.events.data.emit(&removed);
                }
                true
            }
            _ => false,
        }
    }

    /// Resend a failed message under its provisional id.
    pub async fn retry(&self, seq: Seq) -> Result<PublishOutcome, TopicError> {
        {
            let mut state = self.state.lock().await;
            let retryable = matches!(
                state.publishes.get(&seq),
                Some(PublishState::Failed {
                    retryable: true,
                    ..
                })
            );
            if !retryable || state.cache.find(seq).is_none() {
                return Err(TopicError::NotFound(format!("no failed message {}", seq)));
            }
            state.step(seq, PublishEvent::Retry, None);
        }
        tracing::debug!(topic = %self.name, %seq, "retrying publish");
        self.dispatch(seq).await
    }

    // ===========================================
    // Inbound routing
    // ===========================================

    /// Route a message pushed by the server. Returns `false` for duplicates.
    pub async fn route_data(&self, msg: ServerMessage) -> bool {
        let seq = msg.seq;
        let inserted = self.state.lock().await.route_data(msg);
        if !inserted {
            tracing::debug!(topic = %self.name, seq, "duplicate message ignored");
        }
        inserted
    }

    /// Route a topic description.
    pub async fn route_meta_desc(&self, desc: TopicDescription) {
        self.state.lock().await.apply_desc(desc);
    }

    /// Route subscription records.
    pub async fn route_meta_subs(&self, subs: Vec<SubscriberRecord>) {
        self.state.lock().await.apply_subs(subs);
    }

    /// Route the topic's tags.
    pub async fn route_tags(&self, tags: Vec<String>) {
        self.state.lock().await.apply_tags(tags);
    }

    /// Route the topic's credentials.
    pub async fn route_creds(&self, creds: Vec<Credential>) {
        self.state.lock().await.apply_creds(creds);
    }

    /// Route a presence notification.
    pub async fn route_pres(&self, pres: Presence) {
        self.state.lock().await.route_pres(pres);
    }

    /// Route an info notification.
    pub async fn route_info(&self, info: Info) {
        self.state.lock().await.route_info(info);
    }

    // ===========================================
    // Lifecycle and metadata
    // ===========================================

    /// Attach to the topic: fetch metadata and mark the topic active.
    pub async fn subscribe(&self, query: MetaQuery) -> Result<(), TopicError> {
        let result = self.session.get_meta(&self.name, query).await?;
        let mut state = self.state.lock().await;
        state.active = true;
        state.apply_meta(result);
        tracing::info!(topic = %self.name, "topic attached");
        Ok(())
    }

    /// Fetch metadata and apply it locally.
    pub async fn get_meta(&self, query: MetaQuery) -> Result<MetaResult, TopicError> {
        let result = self.session.get_meta(&self.name, query).await?;
        self.state.lock().await.apply_meta(result.clone());
        Ok(result)
    }

    /// Update metadata on the server, then locally.
    pub async fn set_meta(&self, params: MetaParams) -> Result<CtrlResult, TopicError> {
        let result = self.session.set_meta(&self.name, params.clone()).await?;
        self.state.lock().await.apply_meta_params(params);
        Ok(result)
    }

    /// Detach from the topic.
    ///
    /// With `unsubscribe`, local state is also discarded. No topic-deleted
    /// event is emitted.
    pub async fn leave(&self, unsubscribe: bool) -> Result<(), TopicError> {
        if !unsubscribe && !self.is_active().await {
            return Err(TopicError::InactiveTopic);
        }
        self.session.leave(&self.name, unsubscribe).await?;

        let mut state = self.state.lock().await;
        state.active = false;
        if unsubscribe {
            state.reset();
        }
        tracing::info!(topic = %self.name, unsubscribe, "topic detached");
        Ok(())
    }

    /// Delete the topic on the server and discard local state.
    pub async fn delete_topic(&self, hard: bool) -> Result<(), TopicError> {
        self.session.delete_topic(&self.name, hard).await?;

        let mut state = self.state.lock().await;
        state.reset();
        state.events.deleted.emit(&self.name);
        tracing::info!(topic = %self.name, hard, "topic deleted");
        Ok(())
    }

    /// Remove a user's subscription.
    pub async fn del_subscription(&self, user_id: &UserId) -> Result<(), TopicError> {
        self.session
            .delete_subscription(&self.name, user_id)
            .await?;

        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        state.registry.remove(user_id);
        let all = state.registry.to_vec();
        state.events.subs_updated.emit(&all);
        Ok(())
    }

    // ===========================================
    // Deletion
    // ===========================================

    /// Delete messages in `ranges`.
    ///
    /// Provisional parts are removed locally only. Confirmed parts, clipped
    /// to the highest known seq, go to the server in one request; the cache
    /// is only touched after the server agrees. Drafts created while the
    /// request is in flight are not affected.
    pub async fn del_messages(
        &self,
        ranges: &[DeletionRange],
        hard: bool,
    ) -> Result<DeleteOutcome, TopicError> {
        let (plan, local_ids, epoch) = {
            let mut state = self.state.lock().await;
            let plan = plan_deletion(ranges, state.counters.max_seq)?;
            if !plan.needs_server() {
                let removed = state.flush(&plan.local);
                tracing::debug!(topic = %self.name, removed, "deleted local messages only");
                return Ok(DeleteOutcome {
                    del_id: None,
                    removed,
                });
            }
            if !state.active {
                return Err(TopicError::InactiveTopic);
            }
            let cache = &state.cache;
            let local_ids: Vec<Seq> = plan
                .local
                .iter()
                .flat_map(|range| cache.range(range).iter().map(|e| e.seq))
                .collect();
            (plan, local_ids, state.epoch)
        };

        tracing::debug!(topic = %self.name, ranges = ?plan.remote, hard, "sending delete");
        let ack = self
            .session
            .delete_messages(&self.name, &plan.remote, hard)
            .await?;

        let mut state = self.state.lock().await;
        if state.epoch != epoch {
            tracing::debug!(topic = %self.name, del_id = ack.del_id, "topic reset while delete was in flight");
            return Ok(DeleteOutcome {
                del_id: Some(ack.del_id),
                removed: 0,
            });
        }
        state.counters.note_del_id(ack.del_id);
        let removed = state.flush_planned(&local_ids, &plan.remote_seq_ranges());
        tracing::info!(topic = %self.name, del_id = ack.del_id, removed, "messages deleted");
        Ok(DeleteOutcome {
            del_id: Some(ack.del_id),
            removed,
        })
    }

    /// Delete the messages with the given ids.
    pub async fn del_messages_list(
        &self,
        ids: &[Seq],
        hard: bool,
    ) -> Result<DeleteOutcome, TopicError> {
        self.del_messages(&ranges_from_ids(ids), hard).await
    }

    /// Delete every message.
    pub async fn del_messages_all(&self, hard: bool) -> Result<DeleteOutcome, TopicError> {
        self.del_messages(&[DeletionRange::All], hard).await
    }

    /// Remove one message from the cache without telling the server.
    pub async fn flush_message(&self, seq: Seq) -> Option<MessageEntry> {
        let mut state = self.state.lock().await;
        state.publishes.remove(&seq);
        let removed = state.cache.remove(seq);
        if removed.is_some() {
            state.events.data.emit(&removed);
        }
        removed
    }

    /// Remove `[low, hi)` from the cache without telling the server.
    pub async fn flush_message_range(&self, low: Seq, hi: Seq) -> Result<usize, TopicError> {
        let range = SeqRange::new(low, hi)?;
        Ok(self.state.lock().await.flush(&[range]))
    }

    // ===========================================
    // Receipts
    // ===========================================

    /// Advance the acting user's watermark.
    ///
    /// Returns `true` if it moved. A moved watermark is reported to the
    /// server only while the topic is active; otherwise it stays local.
    pub async fn note_watermark(&self, kind: WatermarkKind, seq: u64) -> Result<bool, TopicError> {
        let mut state = self.state.lock().await;
        if !state.registry.note_watermark(&self.me, kind, seq)? {
            return Ok(false);
        }

        if !state.active {
            tracing::debug!(topic = %self.name, ?kind, seq, "topic inactive, watermark kept local");
        } else if self.sync_receipts {
            self.session.send_watermark(&self.name, kind, seq);
        }
        Ok(true)
    }

    /// Mark messages up to `seq` as read.
    pub async fn note_read(&self, seq: u64) -> Result<bool, TopicError> {
        self.note_watermark(WatermarkKind::Read, seq).await
    }

    /// Mark messages up to `seq` as received.
    pub async fn note_recv(&self, seq: u64) -> Result<bool, TopicError> {
        self.note_watermark(WatermarkKind::Received, seq).await
    }

    /// Number of other subscribers who read `seq`.
    pub async fn read_count(&self, seq: u64) -> usize {
        let state = self.state.lock().await;
        state.registry.count_at_least(WatermarkKind::Read, seq, &self.me)
    }

    /// Number of other subscribers who received `seq`.
    pub async fn recv_count(&self, seq: u64) -> usize {
        let state = self.state.lock().await;
        state
            .registry
            .count_at_least(WatermarkKind::Received, seq, &self.me)
    }

    /// Messages past the acting user's read watermark.
    pub async fn unread_count(&self) -> u64 {
        let state = self.state.lock().await;
        let read = state.registry.get(&self.me).map_or(0, |r| r.read);
        state.counters.max_seq.saturating_sub(read)
    }

    // ===========================================
    // Queries
    // ===========================================

    /// Snapshot of all cached messages in order.
    pub async fn messages(&self) -> Vec<MessageEntry> {
        self.state.lock().await.cache.iter().cloned().collect()
    }

    /// Cached messages in `range`, in order.
    pub async fn messages_in(&self, range: &SeqRange) -> Vec<MessageEntry> {
        self.state.lock().await.cache.range(range).to_vec()
    }

    /// One cached message.
    pub async fn message(&self, seq: Seq) -> Option<MessageEntry> {
        self.state.lock().await.cache.get(seq).cloned()
    }

    /// The last message in order.
    pub async fn latest_message(&self) -> Option<MessageEntry> {
        self.state.lock().await.cache.latest().cloned()
    }

    /// Number of cached messages.
    pub async fn len(&self) -> usize {
        self.state.lock().await.cache.len()
    }

    /// Check if no messages are cached.
    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.cache.is_empty()
    }

    /// Highest confirmed seq seen.
    pub async fn max_seq(&self) -> u64 {
        self.state.lock().await.counters.max_seq
    }

    /// Lowest confirmed seq seen.
    pub async fn min_seq(&self) -> u64 {
        self.state.lock().await.counters.min_seq
    }

    /// Highest deletion id seen.
    pub async fn max_del_id(&self) -> u64 {
        self.state.lock().await.counters.max_del_id
    }

    /// Delivery status of a cached message.
    pub async fn message_status(&self, seq: Seq) -> Option<MessageStatus> {
        let state = self.state.lock().await;
        state
            .cache
            .get(seq)
            .map(|entry| message_status(entry, &state.registry, &self.me))
    }

    /// Publish state of an unconfirmed message.
    pub async fn publish_state(&self, seq: Seq) -> Option<PublishState> {
        self.state.lock().await.publishes.get(&seq).cloned()
    }

    /// Text preview of a cached message.
    pub async fn preview(&self, seq: Seq, max_chars: usize) -> Option<String> {
        let state = self.state.lock().await;
        state
            .cache
            .get(seq)
            .map(|entry| self.codec.preview(&entry.content, max_chars))
    }

    /// Topic description, once received.
    pub async fn description(&self) -> Option<TopicDescription> {
        self.state.lock().await.description.clone()
    }

    /// Topic tags.
    pub async fn tags(&self) -> Vec<String> {
        self.state.lock().await.tags.clone()
    }

    /// Topic credentials.
    pub async fn creds(&self) -> Vec<Credential> {
        self.state.lock().await.creds.clone()
    }

    /// All subscribers in the order they were first seen.
    pub async fn subscribers(&self) -> Vec<SubscriberRecord> {
        self.state.lock().await.registry.to_vec()
    }

    /// One subscriber's record.
    pub async fn subscriber(&self, user_id: &UserId) -> Option<SubscriberRecord> {
        self.state.lock().await.registry.get(user_id).cloned()
    }
}
