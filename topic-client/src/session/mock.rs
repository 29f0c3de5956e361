//! Mock session for testing.
//!
//! Assigns seqs and deletion ids, captures every request, and can be told to
//! fail or hold the next call.

use super::{Session, SessionError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Semaphore;
use topicsync_types::{
    CtrlResult, DeleteAck, MetaParams, MetaQuery, MetaResult, PublishAck, PublishRequest,
    RemoteRange, Timestamp, UserId, WatermarkKind,
};

/// A captured `delete_messages` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteCall {
    /// Topic name.
    pub topic: String,
    /// Ranges sent to the server.
    pub ranges: Vec<RemoteRange>,
    /// Hard delete flag.
    pub hard: bool,
}

/// Mock session for testing.
///
/// Clones share state, so a test can keep one handle while the topic owns
/// another.
#[derive(Debug, Default)]
pub struct MockSession {
    inner: Arc<Mutex<MockSessionInner>>,
}

#[derive(Debug)]
struct MockSessionInner {
    next_seq: u64,
    next_del_id: u64,
    publishes: Vec<PublishRequest>,
    deletes: Vec<DeleteCall>,
    watermarks: Vec<(String, WatermarkKind, u64)>,
    meta_queries: Vec<MetaQuery>,
    meta_updates: Vec<MetaParams>,
    deleted_subscriptions: Vec<UserId>,
    leaves: Vec<bool>,
    deleted_topics: Vec<bool>,
    meta_responses: VecDeque<MetaResult>,
    publish_gate: Option<Arc<Semaphore>>,
    delete_gate: Option<Arc<Semaphore>>,
    fail_next_publish: Option<SessionError>,
    fail_next_delete: Option<SessionError>,
    fail_next_meta: Option<SessionError>,
    fail_next_ctrl: Option<SessionError>,
}

impl Default for MockSessionInner {
    fn default() -> Self {
        Self {
            next_seq: 1,
            next_del_id: 1,
            publishes: Vec::new(),
            deletes: Vec::new(),
            watermarks: Vec::new(),
            meta_queries: Vec::new(),
            meta_updates: Vec::new(),
            deleted_subscriptions: Vec::new(),
            leaves: Vec::new(),
            deleted_topics: Vec::new(),
            meta_responses: VecDeque::new(),
            publish_gate: None,
            delete_gate: None,
            fail_next_publish: None,
            fail_next_delete: None,
            fail_next_meta: None,
            fail_next_ctrl: None,
        }
    }
}

impl MockSession {
    /// Create a new mock session. The first publish is assigned seq 1.
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, MockSessionInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Seq the next successful publish is assigned.
    pub fn set_next_seq(&self, seq: u64) {
        self.inner().next_seq = seq;
    }

    /// Deletion id the next successful delete returns.
    pub fn set_next_del_id(&self, del_id: u64) {
        self.inner().next_del_id = del_id;
    }

    /// Queue a result for the next `get_meta` call. Without one, an empty
    /// result is returned.
    pub fn queue_meta(&self, result: MetaResult) {
        self.inner().meta_responses.push_back(result);
    }

    /// All publish requests received, in call order.
    pub fn publishes(&self) -> Vec<PublishRequest> {
        self.inner().publishes.clone()
    }

    /// All delete calls received, in call order.
    pub fn deletes(&self) -> Vec<DeleteCall> {
        self.inner().deletes.clone()
    }

    /// All watermarks sent, in call order.
    pub fn watermarks(&self) -> Vec<(String, WatermarkKind, u64)> {
        self.inner().watermarks.clone()
    }

    /// All `get_meta` queries received.
    pub fn meta_queries(&self) -> Vec<MetaQuery> {
        self.inner().meta_queries.clone()
    }

    /// All `set_meta` parameters received.
    pub fn meta_updates(&self) -> Vec<MetaParams> {
        self.inner().meta_updates.clone()
    }

    /// Users whose subscription was deleted.
    pub fn deleted_subscriptions(&self) -> Vec<UserId> {
        self.inner().deleted_subscriptions.clone()
    }

    /// `unsubscribe` flag of each `leave` call.
    pub fn leaves(&self) -> Vec<bool> {
        self.inner().leaves.clone()
    }

    /// `hard` flag of each `delete_topic` call.
    pub fn deleted_topics(&self) -> Vec<bool> {
        self.inner().deleted_topics.clone()
    }

    /// Cause the next publish to fail with the given error.
    pub fn fail_next_publish(&self, error: SessionError) {
        self.inner().fail_next_publish = Some(error);
    }

    /// Cause the next `delete_messages` to fail with the given error.
    pub fn fail_next_delete(&self, error: SessionError) {
        self.inner().fail_next_delete = Some(error);
    }

    /// Cause the next `get_meta` to fail with the given error.
    pub fn fail_next_meta(&self, error: SessionError) {
        self.inner().fail_next_meta = Some(error);
    }

    /// Cause the next `set_meta`, `delete_subscription`, `leave` or
    /// `delete_topic` to fail with the given error.
    pub fn fail_next_ctrl(&self, error: SessionError) {
        self.inner().fail_next_ctrl = Some(error);
    }

    /// Hold publishes in flight until [`release_publishes`](Self::release_publishes).
    ///
    /// Held requests are already captured by [`publishes`](Self::publishes).
    pub fn hold_publishes(&self) {
        self.inner().publish_gate = Some(Arc::new(Semaphore::new(0)));
    }

    /// Let `n` held publishes complete.
    pub fn release_publishes(&self, n: usize) {
        if let Some(gate) = &self.inner().publish_gate {
            gate.add_permits(n);
        }
    }

    /// Hold deletes in flight until [`release_deletes`](Self::release_deletes).
    ///
    /// Held requests are already captured by [`deletes`](Self::deletes).
    pub fn hold_deletes(&self) {
        self.inner().delete_gate = Some(Arc::new(Semaphore::new(0)));
    }

    /// Let `n` held deletes complete.
    pub fn release_deletes(&self, n: usize) {
        if let Some(gate) = &self.inner().delete_gate {
            gate.add_permits(n);
        }
    }

    /// Clear all state.
    pub fn reset(&self) {
        *self.inner() = MockSessionInner::default();
    }

    async fn pass(gate: Option<Arc<Semaphore>>) -> Result<(), SessionError> {
        if let Some(gate) = gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|e| SessionError::Transport(e.to_string()))?;
            permit.forget();
        }
        Ok(())
    }

    fn take_ctrl_failure(&self) -> Result<(), SessionError> {
        match self.inner().fail_next_ctrl.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl Clone for MockSession {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl Session for MockSession {
    async fn publish(&self, request: PublishRequest) -> Result<PublishAck, SessionError> {
        let gate = {
            let mut inner = self.inner();
            inner.publishes.push(request);
            inner.publish_gate.clone()
        };
        Self::pass(gate).await?;

        let mut inner = self.inner();
        if let Some(error) = inner.fail_next_publish.take() {
            return Err(error);
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        Ok(PublishAck {
            seq,
            ts: Timestamp::now(),
        })
    }

    async fn get_meta(&self, _topic: &str, query: MetaQuery) -> Result<MetaResult, SessionError> {
        let mut inner = self.inner();
        inner.meta_queries.push(query);
        if let Some(error) = inner.fail_next_meta.take() {
            return Err(error);
        }
        Ok(inner.meta_responses.pop_front().unwrap_or_default())
    }

    async fn set_meta(
        &self,
        _topic: &str,
        params: MetaParams,
    ) -> Result<CtrlResult, SessionError> {
        self.take_ctrl_failure()?;
        self.inner().meta_updates.push(params);
        Ok(CtrlResult::ok())
    }

    async fn delete_messages(
        &self,
        topic: &str,
        ranges: &[RemoteRange],
        hard: bool,
    ) -> Result<DeleteAck, SessionError> {
        let gate = {
            let mut inner = self.inner();
            inner.deletes.push(DeleteCall {
                topic: topic.to_string(),
                ranges: ranges.to_vec(),
                hard,
            });
            inner.delete_gate.clone()
        };
        Self::pass(gate).await?;

        let mut inner = self.inner();
        if let Some(error) = inner.fail_next_delete.take() {
            return Err(error);
        }
        let del_id = inner.next_del_id;
        inner.next_del_id += 1;
        Ok(DeleteAck { del_id })
    }

    async fn delete_subscription(
        &self,
        _topic: &str,
        user_id: &UserId,
    ) -> Result<CtrlResult, SessionError> {
        self.take_ctrl_failure()?;
        self.inner().deleted_subscriptions.push(user_id.clone());
        Ok(CtrlResult::ok())
    }

    async fn leave(&self, _topic: &str, unsubscribe: bool) -> Result<CtrlResult, SessionError> {
        self.take_ctrl_failure()?;
        self.inner().leaves.push(unsubscribe);
        Ok(CtrlResult::ok())
    }

    async fn delete_topic(&self, _topic: &str, hard: bool) -> Result<CtrlResult, SessionError> {
        self.take_ctrl_failure()?;
        self.inner().deleted_topics.push(hard);
        Ok(CtrlResult::ok())
    }

    fn send_watermark(&self, topic: &str, kind: WatermarkKind, seq: u64) {
        self.inner().watermarks.push((topic.to_string(), kind, seq));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(text: &str) -> PublishRequest {
        PublishRequest {
            topic: "grpTest".into(),
            content: json!(text),
            no_echo: false,
            attachments: vec![],
        }
    }

    #[tokio::test]
    async fn publish_assigns_increasing_seqs() {
        let session = MockSession::new();
        session.set_next_seq(10);

        let a = session.publish(request("a")).await.unwrap();
        let b = session.publish(request("b")).await.unwrap();

        assert_eq!(a.seq, 10);
        assert_eq!(b.seq, 11);
        assert_eq!(session.publishes().len(), 2);
    }

    #[tokio::test]
    async fn forced_publish_failure_is_one_shot() {
        let session = MockSession::new();
        session.fail_next_publish(SessionError::Rejected {
            code: 403,
            text: "permission denied".into(),
        });

        let result = session.publish(request("a")).await;
        assert!(matches!(result, Err(SessionError::Rejected { code: 403, .. })));

        let ack = session.publish(request("b")).await.unwrap();
        assert_eq!(ack.seq, 1);
    }

    #[tokio::test]
    async fn delete_records_call_and_returns_ids() {
        let session = MockSession::new();
        session.set_next_del_id(7);
        let ranges = vec![RemoteRange::new(1, 8).unwrap()];

        let ack = session.delete_messages("grpTest", &ranges, true).await.unwrap();

        assert_eq!(ack.del_id, 7);
        assert_eq!(
            session.deletes(),
            vec![DeleteCall {
                topic: "grpTest".into(),
                ranges,
                hard: true,
            }]
        );
    }

    #[tokio::test]
    async fn failed_delete_is_still_captured() {
        let session = MockSession::new();
        session.fail_next_delete(SessionError::Timeout);

        let ranges = vec![RemoteRange::new(1, 2).unwrap()];
        let result = session.delete_messages("grpTest", &ranges, false).await;

        assert_eq!(result, Err(SessionError::Timeout));
        assert_eq!(session.deletes().len(), 1);
    }

    #[tokio::test]
    async fn get_meta_returns_queued_results_then_empty() {
        let session = MockSession::new();
        session.queue_meta(MetaResult {
            tags: Some(vec!["rust".into()]),
            ..Default::default()
        });

        let first = session.get_meta("grpTest", MetaQuery::all()).await.unwrap();
        let second = session.get_meta("grpTest", MetaQuery::all()).await.unwrap();

        assert_eq!(first.tags, Some(vec!["rust".to_string()]));
        assert_eq!(second, MetaResult::default());
        assert_eq!(session.meta_queries().len(), 2);
    }

    #[tokio::test]
    async fn ctrl_failure_applies_to_next_ctrl_call() {
        let session = MockSession::new();
        session.fail_next_ctrl(SessionError::NotConnected);

        assert!(session.leave("grpTest", true).await.is_err());
        assert!(session.leave("grpTest", true).await.is_ok());
        assert_eq!(session.leaves(), vec![true]);
    }

    #[tokio::test]
    async fn clone_shares_state() {
        let a = MockSession::new();
        let b = a.clone();

        a.send_watermark("grpTest", WatermarkKind::Read, 5);
        b.send_watermark("grpTest", WatermarkKind::Received, 6);

        assert_eq!(a.watermarks().len(), 2);
        a.reset();
        assert!(b.watermarks().is_empty());
    }

    #[tokio::test]
    async fn held_publish_completes_after_release() {
        let session = MockSession::new();
        session.hold_publishes();

        let s = session.clone();
        let handle = tokio::spawn(async move { s.publish(request("held")).await });

        while session.publishes().is_empty() {
            tokio::task::yield_now().await;
        }
        assert!(!handle.is_finished());

        session.release_publishes(1);
        let ack = handle.await.unwrap().unwrap();
        assert_eq!(ack.seq, 1);
    }

    #[tokio::test]
    async fn held_delete_completes_after_release() {
        let session = MockSession::new();
        session.hold_deletes();

        let s = session.clone();
        let handle = tokio::spawn(async move {
            let ranges = [RemoteRange::new(1, 3).unwrap()];
            s.delete_messages("grpTest", &ranges, false).await
        });

        while session.deletes().is_empty() {
            tokio::task::yield_now().await;
        }
        assert!(!handle.is_finished());

        session.release_deletes(1);
        let ack = handle.await.unwrap().unwrap();
        assert_eq!(ack.del_id, 1);
    }
}
