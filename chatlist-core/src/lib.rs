//! # chatlist-core
//!
//! Pure list and search logic for chatlist (no I/O, instant tests).
//!
//! This crate implements the state machines behind a live chat list and its
//! search surface without any backend access, enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects:
//! - [`ChatListSynchronizer`] turns position updates into view diffs
//! - [`ArchiveFolderView`] adds the synthetic archive row on top
//! - [`pinned`] turns a drag gesture into a new pinned order
//! - [`SearchSession`] decides which events a search stage result produces
//!
//! The actual backend calls are performed by `chatlist-client`, which feeds
//! results into these state machines and forwards what they produce.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod archive;
pub mod filter;
pub mod index;
pub mod pinned;
pub mod session;
pub mod synchronizer;

pub use archive::{ArchiveFolderView, ArchiveSnapshot, ArchiveUpdateReason, Row, ARCHIVE_ROW};
pub use filter::{any_word_starts_with, AcceptAll, FoundChatAssembler, SearchFilter};
pub use index::{InvariantViolation, OrderedChatIndex};
pub use pinned::{PinnedOrder, ReorderError};
pub use session::{
    ForceMode, GlobalStep, MergeOutcome, MessageStep, RecentStep, SearchLimits, SearchSession,
    SearchStart, Stage,
};
pub use synchronizer::{ChatListSynchronizer, LoadState, PositionUpdate, SyncOutcome};
