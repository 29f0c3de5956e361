//! # topicsync-types
//!
//! Identifier and boundary types shared by all topicsync crates.
//!
//! This crate provides the foundational types used across the workspace:
//! - [`Seq`], [`UserId`], [`Timestamp`] - Identity and ordering types
//! - [`SeqRange`], [`RemoteRange`] - Half-open message id intervals
//! - [`PublishRequest`], [`PublishAck`], [`DeleteAck`], ... - Records exchanged
//!   with the session collaborator
//! - [`TypesError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod messages;
mod range;

pub use error::TypesError;
pub use ids::{Seq, Timestamp, UserId};
pub use messages::{
    Credential, CtrlResult, DeleteAck, Info, InfoWhat, MetaParams, MetaQuery, MetaResult,
    Presence, PresenceWhat, PublishAck, PublishRequest, ServerMessage, SubscriberRecord,
    TopicDescription, WatermarkKind,
};
pub use range::{RemoteRange, SeqRange};
