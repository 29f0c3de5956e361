//! # topicsync-client
//!
//! Client-side synchronization for a single pub/sub topic.
//!
//! This is the library applications use to keep a local mirror of a topic
//! consistent with the messaging service.
//!
//! ## Features
//!
//! - **Optimistic publish**: drafts are visible at once under a provisional
//!   id and swapped for the server's seq on acknowledgement
//! - **Range deletion**: requests are merged, clipped, and split so local-only
//!   drafts never reach the server
//! - **Receipts**: monotonic read/receive watermarks per subscriber
//! - **Session abstraction**: pluggable request layer (real service, mock)
//! - **Pure core**: decisions come from topicsync-core
//!
//! ## Example
//!
//! ```ignore
//! use topicsync_client::{MockSession, Topic, TopicConfig};
//!
//! let config = TopicConfig::from_file(Path::new("topic.toml"))?;
//! let topic = Topic::new(&config, MockSession::new());
//!
//! topic.subscribe(MetaQuery::all()).await?;
//! topic.publish(json!("hello")).await?;
//! topic.del_messages_list(&[Seq::Confirmed(1)], false).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod config;
pub mod error;
pub mod session;
pub mod topic;

pub use codec::{ContentCodec, PlainTextCodec};
pub use config::{ConfigError, TopicConfig};
pub use error::TopicError;
pub use session::{DeleteCall, MockSession, Session, SessionError};
pub use topic::{DeleteOutcome, PublishOutcome, Topic};
