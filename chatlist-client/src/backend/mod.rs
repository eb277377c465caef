//! Backend abstraction for chatlist.
//!
//! This module provides the seam between the client and whatever owns the
//! actual chat data (a local database, a network client, a fixture file).
//!
//! # Design
//!
//! The backend trait is async and request/response only:
//! - list loading (`load_chats`, `fetch_chats`)
//! - search rounds (`search_local_chats`, `search_chats_on_server`,
//!   `search_contacts`, `search_public_chats`, `search_messages`)
//! - bookkeeping (`set_pinned_order`, top chats, recently found chats)
//!
//! Position updates flow the other way and are handed to
//! [`ChatListController::apply`](crate::ChatListController::apply).
//!
//! # Example
//!
//! ```ignore
//! let backend = MockBackend::new();
//! backend.add_chat(chat);
//! let page = backend.load_chats(ChatListScope::Main, 50).await?;
//! ```

mod mock;

pub use mock::{BackendCall, MockBackend};

use async_trait::async_trait;
use chatlist_types::{
    ChatId, ChatListScope, ChatSummary, FoundMessage, MessageCursor, TopChatCategory,
};
use thiserror::Error;

/// Backend errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The request was rejected.
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// The backend is not reachable.
    #[error("backend unavailable")]
    Unavailable,

    /// A referenced chat does not exist.
    #[error("chat not found: {0}")]
    ChatNotFound(ChatId),
}

/// One page of a chat list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChatPage {
    /// Chats in list order.
    pub chats: Vec<ChatSummary>,
    /// Whether this page reached the end of the list.
    pub complete: bool,
}

/// One page of message search results.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessagePage {
    /// Messages in result order.
    pub messages: Vec<FoundMessage>,
    /// Raw continuation token; empty when there are no more pages.
    pub next_cursor: String,
}

impl MessagePage {
    /// The continuation as a cursor, `None` on the last page.
    pub fn cursor(&self) -> Option<MessageCursor> {
        MessageCursor::from_token(&self.next_cursor)
    }
}

/// Backend trait consumed by the chat list controller and the search
/// coordinator.
///
/// Implementations must be safe to call from several tasks at once.
#[async_trait]
pub trait ChatBackend: Send + Sync + 'static {
    /// Load the next page of `scope`, up to `limit` chats.
    async fn load_chats(&self, scope: ChatListScope, limit: usize)
        -> Result<ChatPage, BackendError>;

    /// Resolve chat ids into summaries, skipping unknown ids.
    async fn fetch_chats(&self, ids: &[ChatId]) -> Result<Vec<ChatSummary>, BackendError>;

    /// Most-used chats of a category.
    async fn list_top_chats(
        &self,
        category: TopChatCategory,
        limit: usize,
    ) -> Result<Vec<ChatId>, BackendError>;

    /// Drop a chat from the top chats ranking.
    async fn remove_top_chat(
        &self,
        category: TopChatCategory,
        chat_id: ChatId,
    ) -> Result<(), BackendError>;

    /// Search locally known chats; an empty query returns recently found chats.
    async fn search_local_chats(&self, query: &str, limit: usize)
        -> Result<Vec<ChatId>, BackendError>;

    /// Search the user's chats on the server.
    async fn search_chats_on_server(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ChatId>, BackendError>;

    /// Search the user's contacts; results are private chat ids.
    async fn search_contacts(&self, query: &str, limit: usize)
        -> Result<Vec<ChatId>, BackendError>;

    /// Search the public directory by name or handle.
    async fn search_public_chats(&self, query: &str) -> Result<Vec<ChatId>, BackendError>;

    /// Search messages in `scope`, continuing from `cursor`.
    async fn search_messages(
        &self,
        scope: ChatListScope,
        query: &str,
        cursor: Option<&MessageCursor>,
        limit: usize,
    ) -> Result<MessagePage, BackendError>;

    /// Replace the pinned order of `scope`.
    async fn set_pinned_order(
        &self,
        scope: ChatListScope,
        ids: &[ChatId],
    ) -> Result<(), BackendError>;

    /// Put a chat at the front of the recently found list.
    async fn add_recently_found_chat(&self, chat_id: ChatId) -> Result<(), BackendError>;

    /// Drop a chat from the recently found list.
    async fn remove_recently_found_chat(&self, chat_id: ChatId) -> Result<(), BackendError>;

    /// Forget every recently found chat.
    async fn clear_recently_found_chats(&self) -> Result<(), BackendError>;
}
