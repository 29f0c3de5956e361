//! Replay a scripted session against an in-process topic.
//!
//! A script is a JSON array of operations, each tagged by `op`:
//!
//! ```json
//! [
//!   { "op": "subscribe", "desc": { "seq": 3 } },
//!   { "op": "push", "seq": 1, "from": "usrPeer", "content": "hi" },
//!   { "op": "publish", "content": "hello" },
//!   { "op": "delete", "ranges": ["1:3"] },
//!   { "op": "read", "seq": 4 }
//! ]
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use topicsync_client::{MockSession, SessionError, Topic, TopicConfig, TopicError};
use topicsync_core::{MessageEntry, MessageStatus};
use topicsync_types::{
    Info, InfoWhat, MetaQuery, MetaResult, Presence, PresenceWhat, Seq, ServerMessage,
    SubscriberRecord, Timestamp, TopicDescription, UserId,
};

use super::plan::parse_range;

/// Characters kept in message previews.
const PREVIEW_CHARS: usize = 40;

/// One scripted step.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    /// Attach to the topic; the given metadata is what the server answers.
    Subscribe {
        #[serde(default)]
        desc: Option<TopicDescription>,
        #[serde(default)]
        subs: Option<Vec<SubscriberRecord>>,
        #[serde(default)]
        tags: Option<Vec<String>>,
    },
    /// A message pushed by the server.
    Push {
        seq: u64,
        from: UserId,
        content: Value,
    },
    /// Publish new content.
    Publish { content: Value },
    /// Make the next publish fail with a server rejection.
    FailNextPublish { code: u16, text: String },
    /// Make the next delete fail with a server rejection.
    FailNextDelete { code: u16, text: String },
    /// Retry a failed publish.
    Retry { seq: Seq },
    /// Cancel a pending publish.
    Cancel { seq: Seq },
    /// Delete ranges (`low:hi`, `low:` or `all`).
    Delete {
        ranges: Vec<String>,
        #[serde(default)]
        hard: Option<bool>,
    },
    /// Delete an explicit id list.
    DeleteIds {
        ids: Vec<Seq>,
        #[serde(default)]
        hard: Option<bool>,
    },
    /// Delete everything.
    DeleteAll {
        #[serde(default)]
        hard: Option<bool>,
    },
    /// Drop one message locally.
    Flush { seq: Seq },
    /// Mark messages read up to `seq`.
    Read { seq: u64 },
    /// Mark messages received up to `seq`.
    Recv { seq: u64 },
    /// Presence notification from the server.
    Pres { src: UserId, what: PresenceWhat },
    /// Info notification from another subscriber.
    Info {
        from: UserId,
        what: InfoWhat,
        #[serde(default)]
        seq: u64,
    },
    /// Leave the topic.
    Leave {
        #[serde(default)]
        unsubscribe: bool,
    },
    /// Delete the whole topic.
    DeleteTopic {
        #[serde(default)]
        hard: bool,
    },
}

impl Op {
    fn name(&self) -> &'static str {
        match self {
            Op::Subscribe { .. } => "subscribe",
            Op::Push { .. } => "push",
            Op::Publish { .. } => "publish",
            Op::FailNextPublish { .. } => "fail_next_publish",
            Op::FailNextDelete { .. } => "fail_next_delete",
            Op::Retry { .. } => "retry",
            Op::Cancel { .. } => "cancel",
            Op::Delete { .. } => "delete",
            Op::DeleteIds { .. } => "delete_ids",
            Op::DeleteAll { .. } => "delete_all",
            Op::Flush { .. } => "flush",
            Op::Read { .. } => "read",
            Op::Recv { .. } => "recv",
            Op::Pres { .. } => "pres",
            Op::Info { .. } => "info",
            Op::Leave { .. } => "leave",
            Op::DeleteTopic { .. } => "delete_topic",
        }
    }
}

/// Parse a script from its JSON text.
pub fn parse_script(text: &str) -> Result<Vec<Op>> {
    serde_json::from_str(text).context("Failed to parse replay script")
}

/// Run the replay command.
pub async fn run(config: &TopicConfig, script: &Path) -> Result<()> {
    let text = tokio::fs::read_to_string(script)
        .await
        .with_context(|| format!("Failed to read script {}", script.display()))?;
    let ops = parse_script(&text)?;

    for line in replay(config, ops).await? {
        println!("{}", line);
    }
    Ok(())
}

/// Replay `ops` against a fresh topic and render the final state.
///
/// A failing operation is reported in the output and does not stop the
/// replay.
pub async fn replay(config: &TopicConfig, ops: Vec<Op>) -> Result<Vec<String>> {
    let session = MockSession::new();
    let topic = Topic::new(config, session.clone());
    let events = Arc::new(Mutex::new(Vec::new()));
    attach_event_log(&topic, &events).await;

    let mut lines = vec![format!(
        "=== replay {} as {} ({} ops) ===",
        topic.name(),
        topic.user_id(),
        ops.len()
    )];

    for (index, op) in ops.into_iter().enumerate() {
        let name = op.name();
        match apply(&topic, &session, config, op).await {
            Ok(Some(note)) => lines.push(format!("#{} {}: {}", index, name, note)),
            Ok(None) => lines.push(format!("#{} {}: ok", index, name)),
            Err(e) => {
                tracing::warn!(op = name, index, error = %e, "replay step failed");
                lines.push(format!("#{} {}: error: {}", index, name, e));
            }
        }
    }

    lines.push(String::new());
    lines.push("Messages:".to_string());
    for entry in topic.messages().await {
        lines.push(render_entry(&topic, &entry).await);
    }

    lines.push(String::new());
    lines.push("Subscribers:".to_string());
    for record in topic.subscribers().await {
        lines.push(format!(
            "  {} recv={} read={}",
            record.user_id, record.received, record.read
        ));
    }

    lines.push(String::new());
    lines.push("Counters:".to_string());
    lines.push(format!(
        "  active={} max_seq={} min_seq={} max_del_id={} unread={}",
        topic.is_active().await,
        topic.max_seq().await,
        topic.min_seq().await,
        topic.max_del_id().await,
        topic.unread_count().await
    ));

    lines.push(String::new());
    lines.push("Events:".to_string());
    if let Ok(log) = events.lock() {
        lines.extend(log.iter().map(|event| format!("  {}", event)));
    }

    Ok(lines)
}

async fn apply(
    topic: &Topic<MockSession>,
    session: &MockSession,
    config: &TopicConfig,
    op: Op,
) -> Result<Option<String>, TopicError> {
    let default_hard = config.delete.hard;
    match op {
        Op::Subscribe { desc, subs, tags } => {
            session.queue_meta(MetaResult {
                desc,
                subs,
                tags,
                creds: None,
            });
            topic.subscribe(MetaQuery::all()).await?;
        }
        Op::Push { seq, from, content } => {
            let added = topic
                .route_data(ServerMessage {
                    seq,
                    from,
                    ts: Timestamp::now(),
                    content,
                })
                .await;
            if !added {
                return Ok(Some("duplicate".to_string()));
            }
        }
        Op::Publish { content } => {
            session.set_next_seq(topic.max_seq().await + 1);
            let outcome = topic.publish(content).await?;
            return Ok(Some(match outcome.seq() {
                Some(seq) => format!("confirmed as {}", seq),
                None => "aborted".to_string(),
            }));
        }
        Op::FailNextPublish { code, text } => {
            session.fail_next_publish(SessionError::Rejected { code, text });
        }
        Op::FailNextDelete { code, text } => {
            session.fail_next_delete(SessionError::Rejected { code, text });
        }
        Op::Retry { seq } => {
            session.set_next_seq(topic.max_seq().await + 1);
            let outcome = topic.retry(seq).await?;
            if let Some(confirmed) = outcome.seq() {
                return Ok(Some(format!("confirmed as {}", confirmed)));
            }
        }
        Op::Cancel { seq } => {
            if !topic.cancel_send(seq).await {
                return Ok(Some("not cancellable".to_string()));
            }
        }
        Op::Delete { ranges, hard } => {
            let parsed = ranges
                .iter()
                .map(|r| parse_range(r).map_err(|e| TopicError::InvalidRange(e.to_string())))
                .collect::<Result<Vec<_>, _>>()?;
            let outcome = topic
                .del_messages(&parsed, hard.unwrap_or(default_hard))
                .await?;
            return Ok(Some(describe_delete(outcome.del_id, outcome.removed)));
        }
        Op::DeleteIds { ids, hard } => {
            let outcome = topic
                .del_messages_list(&ids, hard.unwrap_or(default_hard))
                .await?;
            return Ok(Some(describe_delete(outcome.del_id, outcome.removed)));
        }
        Op::DeleteAll { hard } => {
            let outcome = topic
                .del_messages_all(hard.unwrap_or(default_hard))
                .await?;
            return Ok(Some(describe_delete(outcome.del_id, outcome.removed)));
        }
        Op::Flush { seq } => {
            if topic.flush_message(seq).await.is_none() {
                return Ok(Some("not cached".to_string()));
            }
        }
        Op::Read { seq } => {
            if !topic.note_read(seq).await? {
                return Ok(Some("unchanged".to_string()));
            }
        }
        Op::Recv { seq } => {
            if !topic.note_recv(seq).await? {
                return Ok(Some("unchanged".to_string()));
            }
        }
        Op::Pres { src, what } => {
            topic.route_pres(Presence { what, src }).await;
        }
        Op::Info { from, what, seq } => {
            topic.route_info(Info { from, what, seq }).await;
        }
        Op::Leave { unsubscribe } => {
            topic.leave(unsubscribe).await?;
        }
        Op::DeleteTopic { hard } => {
            topic.delete_topic(hard).await?;
        }
    }
    Ok(None)
}

fn describe_delete(del_id: Option<u64>, removed: usize) -> String {
    match del_id {
        Some(id) => format!("del_id {}, removed {}", id, removed),
        None => format!("local only, removed {}", removed),
    }
}

async fn render_entry(topic: &Topic<MockSession>, entry: &MessageEntry) -> String {
    let status = topic
        .message_status(entry.seq)
        .await
        .map(status_label)
        .unwrap_or("unknown");
    let preview = topic
        .preview(entry.seq, PREVIEW_CHARS)
        .await
        .unwrap_or_default();
    format!("  {:>4} {} [{}] {}", entry.seq.raw(), entry.from, status, preview)
}

fn status_label(status: MessageStatus) -> &'static str {
    match status {
        MessageStatus::Queued => "queued",
        MessageStatus::Sending => "sending",
        MessageStatus::Failed => "failed",
        MessageStatus::Cancelled => "cancelled",
        MessageStatus::Sent => "sent",
        MessageStatus::Received => "received",
        MessageStatus::Read => "read",
        MessageStatus::ToMe => "to me",
    }
}

async fn attach_event_log(topic: &Topic<MockSession>, events: &Arc<Mutex<Vec<String>>>) {
    let data = Arc::clone(events);
    let desc = Arc::clone(events);
    let subs = Arc::clone(events);
    let pres = Arc::clone(events);
    let info = Arc::clone(events);
    let deleted = Arc::clone(events);

    topic
        .with_events(move |ev| {
            ev.data.subscribe(move |entry: &Option<MessageEntry>| {
                if let Ok(mut log) = data.lock() {
                    log.push(match entry {
                        Some(e) => format!("data {}", e.seq),
                        None => "data (bulk)".to_string(),
                    });
                }
            });
            ev.meta_desc.subscribe(move |d: &TopicDescription| {
                if let Ok(mut log) = desc.lock() {
                    log.push(format!("desc seq={} clear={}", d.seq, d.clear));
                }
            });
            ev.subs_updated.subscribe(move |records: &Vec<SubscriberRecord>| {
                if let Ok(mut log) = subs.lock() {
                    log.push(format!("subs {}", records.len()));
                }
            });
            ev.pres.subscribe(move |p: &Presence| {
                if let Ok(mut log) = pres.lock() {
                    log.push(format!("pres {} {:?}", p.src, p.what));
                }
            });
            ev.info.subscribe(move |i: &Info| {
                if let Ok(mut log) = info.lock() {
                    log.push(format!("info {} {:?} {}", i.from, i.what, i.seq));
                }
            });
            ev.deleted.subscribe(move |name: &String| {
                if let Ok(mut log) = deleted.lock() {
                    log.push(format!("deleted {}", name));
                }
            });
        })
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TopicConfig {
        TopicConfig::for_topic("grpReplay", "usrMe")
    }

    fn section<'a>(lines: &'a [String], header: &str) -> Vec<&'a str> {
        lines
            .iter()
            .skip_while(|l| l.as_str() != header)
            .skip(1)
            .take_while(|l| !l.is_empty())
            .map(String::as_str)
            .collect()
    }

    #[test]
    fn parses_tagged_ops() {
        let ops = parse_script(
            r#"[
                {"op": "subscribe", "desc": {"seq": 2}},
                {"op": "push", "seq": 1, "from": "usrPeer", "content": "hi"},
                {"op": "delete", "ranges": ["1:3", "all"], "hard": true},
                {"op": "pres", "src": "usrPeer", "what": {"what": "read", "seq": 1}},
                {"op": "cancel", "seq": -1}
            ]"#,
        )
        .unwrap();

        assert_eq!(ops.len(), 5);
        assert!(matches!(ops[2], Op::Delete { hard: Some(true), .. }));
        assert!(matches!(
            ops[3],
            Op::Pres {
                what: PresenceWhat::Read { seq: 1 },
                ..
            }
        ));
        assert!(matches!(
            ops[4],
            Op::Cancel {
                seq: Seq::Provisional(1)
            }
        ));
    }

    #[test]
    fn rejects_unknown_op() {
        assert!(parse_script(r#"[{"op": "explode"}]"#).is_err());
    }

    #[tokio::test]
    async fn replay_renders_messages_and_counters() {
        let ops = parse_script(
            r#"[
                {"op": "subscribe", "subs": [{"user_id": "usrMe", "access_mode": "JRWPS"},
                                             {"user_id": "usrPeer", "access_mode": "JRWPS"}]},
                {"op": "push", "seq": 1, "from": "usrPeer", "content": "from peer"},
                {"op": "publish", "content": "mine"},
                {"op": "info", "from": "usrPeer", "what": "read", "seq": 2},
                {"op": "read", "seq": 1}
            ]"#,
        )
        .unwrap();

        let lines = replay(&config(), ops).await.unwrap();

        assert_eq!(lines[3], "#2 publish: confirmed as 2");
        let messages = section(&lines, "Messages:");
        assert_eq!(messages.len(), 2);
        assert!(messages[0].contains("usrPeer [to me] from peer"));
        assert!(messages[1].contains("usrMe [read] mine"));

        let counters = section(&lines, "Counters:");
        assert_eq!(
            counters,
            vec!["  active=true max_seq=2 min_seq=1 max_del_id=0 unread=1"]
        );
    }

    #[tokio::test]
    async fn failing_ops_are_reported_not_fatal() {
        let ops = parse_script(
            r#"[
                {"op": "publish", "content": "too early"},
                {"op": "subscribe"},
                {"op": "fail_next_publish", "code": 503, "text": "busy"},
                {"op": "publish", "content": "flaky"},
                {"op": "retry", "seq": -2}
            ]"#,
        )
        .unwrap();

        let lines = replay(&config(), ops).await.unwrap();

        assert!(lines[1].starts_with("#0 publish: error:"));
        assert!(lines[4].starts_with("#3 publish: error:"));
        assert!(lines[4].contains("503"));
        assert_eq!(lines[5], "#4 retry: confirmed as 1");

        let messages = section(&lines, "Messages:");
        assert_eq!(messages.len(), 2);
        assert!(messages[0].contains("[failed] too early"));
        assert!(messages[1].contains("flaky"));
    }

    #[tokio::test]
    async fn deletes_and_gone_presence_show_in_events() {
        let ops = parse_script(
            r#"[
                {"op": "subscribe"},
                {"op": "push", "seq": 1, "from": "usrPeer", "content": "a"},
                {"op": "push", "seq": 2, "from": "usrPeer", "content": "b"},
                {"op": "delete", "ranges": ["1:2"]},
                {"op": "pres", "src": "usrPeer", "what": {"what": "gone"}}
            ]"#,
        )
        .unwrap();

        let lines = replay(&config(), ops).await.unwrap();

        assert_eq!(lines[4], "#3 delete: del_id 1, removed 1");
        assert!(section(&lines, "Messages:").is_empty());

        let events = section(&lines, "Events:");
        assert_eq!(events.last().copied(), Some("  deleted grpReplay"));
        assert!(events.contains(&"  data 1"));
        assert!(events.contains(&"  data (bulk)"));
    }

    #[tokio::test]
    async fn run_reads_script_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.json");
        std::fs::write(&path, r#"[{"op": "subscribe"}, {"op": "publish", "content": "x"}]"#)
            .unwrap();

        run(&config(), &path).await.unwrap();
        assert!(run(&config(), &dir.path().join("missing.json")).await.is_err());
    }
}
