//! # chatlist-types
//!
//! Shared vocabulary for the chatlist workspace.
//!
//! This crate provides the types used across all chatlist crates:
//! - [`ChatId`], [`OrderKey`], [`ContextId`], [`MessageId`] - Identity and ordering types
//! - [`ChatSummary`] - A chat as held by the ordered list
//! - [`DiffOp`], [`Patch`], [`UpdateFlags`] - View diffs produced by list mutations
//! - [`SearchEvent`], [`SearchFlags`] - Search pipeline output and options

#![warn(missing_docs)]
#![warn(clippy::all)]

mod chat;
mod diff;
mod ids;
mod search;

pub use chat::{ChatKind, ChatListScope, ChatPayload, ChatSummary};
pub use diff::{DiffOp, Patch, UpdateFlags};
pub use ids::{ChatId, ContextId, MessageId, OrderKey};
pub use search::{
    FoundChat, FoundMessage, MessageCursor, SearchEvent, SearchFlags, TopChatCategory,
};
