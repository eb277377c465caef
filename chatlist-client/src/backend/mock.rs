//! Mock backend for testing.
//!
//! Serves an in-memory data set, records every call and can be told to fail
//! the next call of an operation or to hold a query until released.

use super::{BackendError, ChatBackend, ChatPage, MessagePage};
use async_trait::async_trait;
use chatlist_core::any_word_starts_with;
use chatlist_types::{
    ChatId, ChatListScope, ChatSummary, FoundMessage, MessageCursor, TopChatCategory,
};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Semaphore;

/// A recorded backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    /// `load_chats`
    LoadChats {
        /// Requested list.
        scope: ChatListScope,
        /// Requested page size.
        limit: usize,
    },
    /// `fetch_chats`
    FetchChats {
        /// Requested ids.
        ids: Vec<ChatId>,
    },
    /// `list_top_chats`
    ListTopChats {
        /// Requested category.
        category: TopChatCategory,
        /// Requested size.
        limit: usize,
    },
    /// `remove_top_chat`
    RemoveTopChat {
        /// Category removed from.
        category: TopChatCategory,
        /// Removed chat.
        chat_id: ChatId,
    },
    /// `search_local_chats`
    SearchLocalChats {
        /// Query.
        query: String,
        /// Budget.
        limit: usize,
    },
    /// `search_chats_on_server`
    SearchChatsOnServer {
        /// Query.
        query: String,
        /// Budget.
        limit: usize,
    },
    /// `search_contacts`
    SearchContacts {
        /// Query.
        query: String,
        /// Budget.
        limit: usize,
    },
    /// `search_public_chats`
    SearchPublicChats {
        /// Query.
        query: String,
    },
    /// `search_messages`
    SearchMessages {
        /// Scope.
        scope: ChatListScope,
        /// Query.
        query: String,
        /// Raw continuation token.
        cursor: Option<String>,
        /// Page size.
        limit: usize,
    },
    /// `set_pinned_order`
    SetPinnedOrder {
        /// Scope.
        scope: ChatListScope,
        /// New order.
        ids: Vec<ChatId>,
    },
    /// `add_recently_found_chat`
    AddRecentlyFound {
        /// Added chat.
        chat_id: ChatId,
    },
    /// `remove_recently_found_chat`
    RemoveRecentlyFound {
        /// Removed chat.
        chat_id: ChatId,
    },
    /// `clear_recently_found_chats`
    ClearRecentlyFound,
}

impl BackendCall {
    /// The operation name, as used by [`MockBackend::fail_next`].
    pub fn op(&self) -> &'static str {
        match self {
            BackendCall::LoadChats { .. } => "load_chats",
            BackendCall::FetchChats { .. } => "fetch_chats",
            BackendCall::ListTopChats { .. } => "list_top_chats",
            BackendCall::RemoveTopChat { .. } => "remove_top_chat",
            BackendCall::SearchLocalChats { .. } => "search_local_chats",
            BackendCall::SearchChatsOnServer { .. } => "search_chats_on_server",
            BackendCall::SearchContacts { .. } => "search_contacts",
            BackendCall::SearchPublicChats { .. } => "search_public_chats",
            BackendCall::SearchMessages { .. } => "search_messages",
            BackendCall::SetPinnedOrder { .. } => "set_pinned_order",
            BackendCall::AddRecentlyFound { .. } => "add_recently_found_chat",
            BackendCall::RemoveRecentlyFound { .. } => "remove_recently_found_chat",
            BackendCall::ClearRecentlyFound => "clear_recently_found_chats",
        }
    }
}

/// Mock backend for testing.
///
/// Clones share the same state, so a test can keep a handle while the
/// coordinator owns another.
#[derive(Debug, Default)]
pub struct MockBackend {
    inner: Arc<Mutex<MockBackendInner>>,
}

#[derive(Debug, Default)]
struct MockBackendInner {
    chats: BTreeMap<ChatId, ChatSummary>,
    server_only: HashSet<ChatId>,
    public: HashSet<ChatId>,
    joined_public: HashSet<ChatId>,
    top_chats: HashMap<TopChatCategory, Vec<ChatId>>,
    recently_found: Vec<ChatId>,
    messages: Vec<FoundMessage>,
    scripted_chat_pages: VecDeque<ChatPage>,
    scripted_message_pages: VecDeque<MessagePage>,
    loaded: HashMap<ChatListScope, usize>,
    calls: Vec<BackendCall>,
    fail_next: HashMap<&'static str, String>,
    held: HashMap<String, Arc<Semaphore>>,
}

fn normalize(query: &str) -> String {
    query.trim().trim_start_matches('@').to_lowercase()
}

fn chat_matches(chat: &ChatSummary, query: &str) -> bool {
    let query = normalize(query);
    if query.is_empty() {
        return false;
    }
    any_word_starts_with(chat.title(), &query)
        || chat
            .username
            .as_deref()
            .is_some_and(|name| name.to_lowercase().starts_with(&query))
}

fn in_scope(chat: &ChatSummary, scope: ChatListScope) -> bool {
    match scope {
        ChatListScope::Main => !chat.archived,
        ChatListScope::Archive => chat.archived,
        ChatListScope::Folder(_) => false,
    }
}

impl MockBackend {
    /// Create an empty mock backend.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockBackendInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add a chat the user is a member of.
    pub fn add_chat(&self, chat: ChatSummary) {
        let mut inner = self.lock();
        inner.chats.insert(chat.id, chat);
    }

    /// Add a chat that only server-side search finds.
    pub fn add_server_chat(&self, chat: ChatSummary) {
        let mut inner = self.lock();
        inner.server_only.insert(chat.id);
        inner.chats.insert(chat.id, chat);
    }

    /// Add a chat from the public directory.
    pub fn add_public_chat(&self, chat: ChatSummary) {
        let mut inner = self.lock();
        inner.public.insert(chat.id);
        inner.chats.insert(chat.id, chat);
    }

    /// Add a public chat the user has already joined.
    ///
    /// Local and global search both find it.
    pub fn add_joined_public_chat(&self, chat: ChatSummary) {
        let mut inner = self.lock();
        inner.joined_public.insert(chat.id);
        inner.chats.insert(chat.id, chat);
    }

    /// Set the top chats of a category.
    pub fn set_top_chats(&self, category: TopChatCategory, ids: Vec<ChatId>) {
        let mut inner = self.lock();
        inner.top_chats.insert(category, ids);
    }

    /// Set the recently found list, most recent first.
    pub fn set_recently_found(&self, ids: Vec<ChatId>) {
        let mut inner = self.lock();
        inner.recently_found = ids;
    }

    /// Add a message that message search can find.
    pub fn add_message(&self, message: FoundMessage) {
        let mut inner = self.lock();
        inner.messages.push(message);
    }

    /// Queue a page returned verbatim by the next `load_chats` call.
    pub fn queue_chat_page(&self, page: ChatPage) {
        let mut inner = self.lock();
        inner.scripted_chat_pages.push_back(page);
    }

    /// Queue a page returned verbatim by the next `search_messages` call.
    pub fn queue_message_page(&self, page: MessagePage) {
        let mut inner = self.lock();
        inner.scripted_message_pages.push_back(page);
    }

    /// Cause the next call of `op` (e.g. `"search_contacts"`) to fail.
    pub fn fail_next(&self, op: &'static str, error: &str) {
        let mut inner = self.lock();
        inner.fail_next.insert(op, error.to_string());
    }

    /// Make every search for `query` wait until [`release_query`](Self::release_query).
    pub fn hold_query(&self, query: &str) {
        let mut inner = self.lock();
        inner
            .held
            .insert(query.to_string(), Arc::new(Semaphore::new(0)));
    }

    /// Let held searches for `query` complete.
    pub fn release_query(&self, query: &str) {
        let mut inner = self.lock();
        if let Some(gate) = inner.held.remove(query) {
            gate.close();
        }
    }

    /// All calls so far, in order.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.lock().calls.clone()
    }

    /// Number of calls of `op`.
    pub fn call_count(&self, op: &str) -> usize {
        self.lock().calls.iter().filter(|call| call.op() == op).count()
    }

    /// Clear the call log.
    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Record a call and take its injected failure, if any.
    fn record(&self, call: BackendCall) -> Result<(), BackendError> {
        let mut inner = self.lock();
        let op = call.op();
        inner.calls.push(call);
        match inner.fail_next.remove(op) {
            Some(error) => Err(BackendError::RequestFailed(error)),
            None => Ok(()),
        }
    }

    /// Wait while `query` is held.
    async fn gate(&self, query: &str) {
        let gate = self.lock().held.get(query).cloned();
        if let Some(gate) = gate {
            // Closing the semaphore is the release signal.
            let _ = gate.acquire().await;
        }
    }

    fn matching(
        &self,
        query: &str,
        limit: usize,
        pick: impl Fn(&MockBackendInner, &ChatSummary) -> bool,
    ) -> Vec<ChatId> {
        let guard = self.lock();
        let inner: &MockBackendInner = &guard;
        let mut found: Vec<&ChatSummary> = inner
            .chats
            .values()
            .filter(|chat| pick(inner, chat) && chat_matches(chat, query))
            .collect();
        found.sort_by(|a, b| a.list_order(b));
        found.into_iter().take(limit).map(|chat| chat.id).collect()
    }
}

impl Clone for MockBackend {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    async fn load_chats(
        &self,
        scope: ChatListScope,
        limit: usize,
    ) -> Result<ChatPage, BackendError> {
        self.record(BackendCall::LoadChats { scope, limit })?;
        let mut inner = self.lock();
        if let Some(page) = inner.scripted_chat_pages.pop_front() {
            return Ok(page);
        }
        let mut members: Vec<&ChatSummary> = inner
            .chats
            .values()
            .filter(|chat| {
                chat.order_key.is_member()
                    && in_scope(chat, scope)
                    && !inner.server_only.contains(&chat.id)
                    && !inner.public.contains(&chat.id)
            })
            .collect();
        members.sort_by(|a, b| a.list_order(b));
        let offset = inner.loaded.get(&scope).copied().unwrap_or(0);
        let chats: Vec<ChatSummary> = members
            .iter()
            .skip(offset)
            .take(limit)
            .map(|chat| (*chat).clone())
            .collect();
        let complete = offset + chats.len() >= members.len();
        inner.loaded.insert(scope, offset + chats.len());
        Ok(ChatPage { chats, complete })
    }

    async fn fetch_chats(&self, ids: &[ChatId]) -> Result<Vec<ChatSummary>, BackendError> {
        self.record(BackendCall::FetchChats { ids: ids.to_vec() })?;
        let inner = self.lock();
        Ok(ids
            .iter()
            .filter_map(|id| inner.chats.get(id).cloned())
            .collect())
    }

    async fn list_top_chats(
        &self,
        category: TopChatCategory,
        limit: usize,
    ) -> Result<Vec<ChatId>, BackendError> {
        self.record(BackendCall::ListTopChats { category, limit })?;
        let inner = self.lock();
        Ok(inner
            .top_chats
            .get(&category)
            .map(|ids| ids.iter().take(limit).copied().collect())
            .unwrap_or_default())
    }

    async fn remove_top_chat(
        &self,
        category: TopChatCategory,
        chat_id: ChatId,
    ) -> Result<(), BackendError> {
        self.record(BackendCall::RemoveTopChat { category, chat_id })?;
        let mut inner = self.lock();
        if let Some(ids) = inner.top_chats.get_mut(&category) {
            ids.retain(|id| *id != chat_id);
        }
        Ok(())
    }

    async fn search_local_chats(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ChatId>, BackendError> {
        self.record(BackendCall::SearchLocalChats {
            query: query.to_string(),
            limit,
        })?;
        self.gate(query).await;
        if query.trim().is_empty() {
            let inner = self.lock();
            return Ok(inner.recently_found.iter().take(limit).copied().collect());
        }
        Ok(self.matching(query, limit, |inner, chat| {
            !inner.server_only.contains(&chat.id) && !inner.public.contains(&chat.id)
        }))
    }

    async fn search_chats_on_server(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ChatId>, BackendError> {
        self.record(BackendCall::SearchChatsOnServer {
            query: query.to_string(),
            limit,
        })?;
        self.gate(query).await;
        Ok(self.matching(query, limit, |inner, chat| {
            !inner.public.contains(&chat.id)
        }))
    }

    async fn search_contacts(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ChatId>, BackendError> {
        self.record(BackendCall::SearchContacts {
            query: query.to_string(),
            limit,
        })?;
        self.gate(query).await;
        Ok(self.matching(query, limit, |_, chat| chat.kind.is_contact()))
    }

    async fn search_public_chats(&self, query: &str) -> Result<Vec<ChatId>, BackendError> {
        self.record(BackendCall::SearchPublicChats {
            query: query.to_string(),
        })?;
        self.gate(query).await;
        Ok(self.matching(query, usize::MAX, |inner, chat| {
            inner.public.contains(&chat.id) || inner.joined_public.contains(&chat.id)
        }))
    }

    async fn search_messages(
        &self,
        scope: ChatListScope,
        query: &str,
        cursor: Option<&MessageCursor>,
        limit: usize,
    ) -> Result<MessagePage, BackendError> {
        self.record(BackendCall::SearchMessages {
            scope,
            query: query.to_string(),
            cursor: cursor.map(|c| c.as_str().to_string()),
            limit,
        })?;
        self.gate(query).await;
        let mut inner = self.lock();
        if let Some(page) = inner.scripted_message_pages.pop_front() {
            return Ok(page);
        }
        let needle = query.trim().to_lowercase();
        let hits: Vec<&FoundMessage> = inner
            .messages
            .iter()
            .filter(|message| message.text.to_lowercase().contains(&needle))
            .collect();
        let offset = cursor
            .and_then(|c| c.as_str().parse::<usize>().ok())
            .unwrap_or(0);
        let messages: Vec<FoundMessage> = hits
            .iter()
            .skip(offset)
            .take(limit)
            .map(|message| (*message).clone())
            .collect();
        let next = offset + messages.len();
        let next_cursor = if next < hits.len() {
            next.to_string()
        } else {
            String::new()
        };
        Ok(MessagePage {
            messages,
            next_cursor,
        })
    }

    async fn set_pinned_order(
        &self,
        scope: ChatListScope,
        ids: &[ChatId],
    ) -> Result<(), BackendError> {
        self.record(BackendCall::SetPinnedOrder {
            scope,
            ids: ids.to_vec(),
        })
    }

    async fn add_recently_found_chat(&self, chat_id: ChatId) -> Result<(), BackendError> {
        self.record(BackendCall::AddRecentlyFound { chat_id })?;
        let mut inner = self.lock();
        inner.recently_found.retain(|id| *id != chat_id);
        inner.recently_found.insert(0, chat_id);
        Ok(())
    }

    async fn remove_recently_found_chat(&self, chat_id: ChatId) -> Result<(), BackendError> {
        self.record(BackendCall::RemoveRecentlyFound { chat_id })?;
        self.lock().recently_found.retain(|id| *id != chat_id);
        Ok(())
    }

    async fn clear_recently_found_chats(&self) -> Result<(), BackendError> {
        self.record(BackendCall::ClearRecentlyFound)?;
        self.lock().recently_found.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatlist_types::{ChatKind, MessageId, OrderKey};

    fn chat(id: i64, key: i64, title: &str) -> ChatSummary {
        ChatSummary::new(ChatId::new(id), OrderKey::new(key), title)
    }

    #[tokio::test]
    async fn load_chats_pages_in_list_order() {
        let backend = MockBackend::new();
        backend.add_chat(chat(1, 100, "a"));
        backend.add_chat(chat(2, 300, "b"));
        backend.add_chat(chat(3, 200, "c"));

        let page = backend.load_chats(ChatListScope::Main, 2).await.unwrap();
        assert_eq!(
            page.chats.iter().map(|c| c.id.value()).collect::<Vec<_>>(),
            vec![2, 3]
        );
        assert!(!page.complete);

        let page = backend.load_chats(ChatListScope::Main, 2).await.unwrap();
        assert_eq!(page.chats.len(), 1);
        assert!(page.complete);
    }

    #[tokio::test]
    async fn searches_split_by_source() {
        let backend = MockBackend::new();
        backend.add_chat(chat(1, 100, "Alice Local"));
        backend.add_server_chat(chat(2, 0, "Alice Server"));
        backend.add_public_chat(chat(3, 0, "Alice Public").with_username("alice_pub"));
        backend.add_chat(
            chat(4, 50, "Alicia Contact").with_kind(ChatKind::Private {
                is_bot: false,
                is_contact: true,
                is_support: false,
            }),
        );

        let local = backend.search_local_chats("ali", 30).await.unwrap();
        assert_eq!(local, vec![ChatId::new(1), ChatId::new(4)]);
        let server = backend.search_chats_on_server("ali", 100).await.unwrap();
        assert!(server.contains(&ChatId::new(2)));
        assert!(!server.contains(&ChatId::new(3)));
        let contacts = backend.search_contacts("ali", 50).await.unwrap();
        assert_eq!(contacts, vec![ChatId::new(4)]);
        let public = backend.search_public_chats("alice_p").await.unwrap();
        assert_eq!(public, vec![ChatId::new(3)]);
    }

    #[tokio::test]
    async fn joined_public_chat_is_found_locally_and_globally() {
        let backend = MockBackend::new();
        backend.add_joined_public_chat(chat(5, 10, "Rust News").with_username("rustnews"));

        let local = backend.search_local_chats("rust", 30).await.unwrap();
        assert_eq!(local, vec![ChatId::new(5)]);
        let public = backend.search_public_chats("rust").await.unwrap();
        assert_eq!(public, vec![ChatId::new(5)]);
    }

    #[tokio::test]
    async fn fail_next_fails_once_and_records() {
        let backend = MockBackend::new();
        backend.fail_next("search_contacts", "boom");
        let err = backend.search_contacts("x", 1).await.unwrap_err();
        assert_eq!(err, BackendError::RequestFailed("boom".into()));
        assert!(backend.search_contacts("x", 1).await.is_ok());
        assert_eq!(backend.call_count("search_contacts"), 2);
    }

    #[tokio::test]
    async fn message_search_pages_by_offset() {
        let backend = MockBackend::new();
        for id in 0..3 {
            backend.add_message(FoundMessage {
                chat_id: ChatId::new(1),
                message_id: MessageId::new(id),
                text: format!("hello {}", id),
                date: 0,
            });
        }
        let page = backend
            .search_messages(ChatListScope::Main, "hello", None, 2)
            .await
            .unwrap();
        assert_eq!(page.messages.len(), 2);
        let cursor = page.cursor().unwrap();
        let page = backend
            .search_messages(ChatListScope::Main, "hello", Some(&cursor), 2)
            .await
            .unwrap();
        assert_eq!(page.messages.len(), 1);
        assert_eq!(page.cursor(), None);
    }

    #[tokio::test]
    async fn held_query_waits_for_release() {
        let backend = MockBackend::new();
        backend.add_chat(chat(1, 100, "Alice"));
        backend.hold_query("ali");

        let task = {
            let backend = backend.clone();
            tokio::spawn(async move { backend.search_local_chats("ali", 30).await })
        };
        tokio::task::yield_now().await;
        assert!(!task.is_finished());

        backend.release_query("ali");
        let found = task.await.unwrap().unwrap();
        assert_eq!(found, vec![ChatId::new(1)]);
    }

    #[tokio::test]
    async fn recently_found_moves_to_front() {
        let backend = MockBackend::new();
        backend.set_recently_found(vec![ChatId::new(1), ChatId::new(2)]);
        backend.add_recently_found_chat(ChatId::new(2)).await.unwrap();
        let recent = backend.search_local_chats("", 20).await.unwrap();
        assert_eq!(recent, vec![ChatId::new(2), ChatId::new(1)]);
    }
}
