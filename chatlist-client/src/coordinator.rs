//! SearchCoordinator - the async search pipeline.
//!
//! This module provides [`SearchCoordinator`], which runs the staged search
//! against a [`ChatBackend`] and reports everything it shows as
//! [`SearchEvent`]s on a single channel.
//!
//! # Architecture
//!
//! The coordinator owns a pure [`SearchSession`] (from chatlist-core) behind
//! one lock. Each query spawns a pipeline task that calls the backend without
//! holding the lock and feeds results back into the session, which discards
//! anything dispatched under an older [`ContextId`].
//!
//! ```text
//! on_query_changed → SearchSession::begin → spawn pipeline
//!                                               ↓
//!                top → local rounds → global → messages
//!                                               ↓
//!                                     SearchEvent channel
//! ```
//!
//! # Example
//!
//! ```ignore
//! let (coordinator, mut events) =
//!     SearchCoordinator::new(Arc::new(backend), Arc::new(AcceptAll), config);
//! if let Some(task) = coordinator.on_query_changed(ChatListScope::Main, "ali").await {
//!     task.await?;
//! }
//! while let Ok(event) = events.try_recv() { /* update the view */ }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use chatlist_core::{
    any_word_starts_with, FoundChatAssembler, ForceMode, GlobalStep, MessageStep, RecentStep,
    SearchFilter, SearchSession, SearchStart, Stage,
};
use chatlist_types::{
    ChatId, ChatListScope, ChatSummary, ContextId, FoundChat, FoundMessage, MessageCursor,
    SearchEvent, SearchFlags, TopChatCategory,
};

use crate::backend::{BackendError, ChatBackend, MessagePage};
use crate::config::SearchConfig;

/// How the top chats stage gets its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TopFetch {
    /// Reuse the cached list when there is one.
    Cached,
    /// Fetch and deliver loudly.
    Loud,
    /// Fetch and deliver silently.
    Silent,
}

/// Drives the staged search pipeline.
///
/// Cheap to clone; clones share the same session.
pub struct SearchCoordinator<B: ChatBackend> {
    shared: Arc<Shared<B>>,
}

impl<B: ChatBackend> Clone for SearchCoordinator<B> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

struct Shared<B: ChatBackend> {
    backend: Arc<B>,
    filter: Arc<dyn SearchFilter>,
    config: SearchConfig,
    session: Mutex<SearchSession>,
    events: mpsc::UnboundedSender<SearchEvent>,
}

impl<B: ChatBackend> SearchCoordinator<B> {
    /// Create a coordinator and the receiving end of its event channel.
    pub fn new(
        backend: Arc<B>,
        filter: Arc<dyn SearchFilter>,
        config: SearchConfig,
    ) -> (Self, mpsc::UnboundedReceiver<SearchEvent>) {
        Self::with_flags(backend, filter, config, SearchFlags::NONE)
    }

    /// Create a coordinator with initial search options.
    pub fn with_flags(
        backend: Arc<B>,
        filter: Arc<dyn SearchFilter>,
        config: SearchConfig,
        flags: SearchFlags,
    ) -> (Self, mpsc::UnboundedReceiver<SearchEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let session = SearchSession::new(config.limits(), flags);
        let shared = Arc::new(Shared {
            backend,
            filter,
            config,
            session: Mutex::new(session),
            events,
        });
        (Self { shared }, receiver)
    }

    // ===========================================
    // Lifecycle
    // ===========================================

    /// The search surface was shown.
    ///
    /// Starts the empty-query session if none ran yet; an unchanged finished
    /// empty-query session refreshes its top chats in the background.
    pub async fn open(&self, scope: ChatListScope) -> Option<JoinHandle<()>> {
        let query = {
            let mut session = self.shared.session.lock().await;
            if !session.open() {
                return None;
            }
            self.shared.emit([SearchEvent::SessionOpened]);
            session.query().unwrap_or_default().to_string()
        };
        tracing::info!(?scope, "Search opened");
        self.start(scope, &query, ForceMode::Top).await
    }

    /// The search surface was hidden. Flushes queued recently found chats.
    pub async fn close(&self, scope: ChatListScope) {
        let pending = {
            let mut session = self.shared.session.lock().await;
            if !session.close() {
                return;
            }
            self.shared.emit([SearchEvent::SessionClosed]);
            let mut applied = Vec::new();
            for chat in session.drain_recently_found() {
                self.shared.emit(session.apply_recently_found(&chat));
                applied.push(chat.id());
            }
            applied
        };
        tracing::info!(?scope, flushed = pending.len(), "Search closed");
        for chat_id in pending {
            if let Err(e) = self.shared.backend.add_recently_found_chat(chat_id).await {
                tracing::warn!(%chat_id, error = %e, "Failed to record recently found chat");
            }
        }
    }

    /// Warm up the surface before it is shown. Only the first call searches.
    pub async fn prepare(&self, scope: ChatListScope, initial_query: &str) -> Option<JoinHandle<()>> {
        {
            let mut session = self.shared.session.lock().await;
            if !session.prepare() {
                return None;
            }
        }
        self.start(scope, initial_query, ForceMode::None).await
    }

    /// The query text changed. `None` when the query and scope are unchanged.
    pub async fn on_query_changed(
        &self,
        scope: ChatListScope,
        query: &str,
    ) -> Option<JoinHandle<()>> {
        self.start(scope, query, ForceMode::None).await
    }

    /// Re-run a finished empty-query session loudly (pull to refresh).
    pub async fn reload_results(&self, scope: ChatListScope) -> Option<JoinHandle<()>> {
        let query = {
            let session = self.shared.session.lock().await;
            session.query().unwrap_or_default().to_string()
        };
        self.start(scope, &query, ForceMode::All).await
    }

    /// Replace the search options. Takes effect with the next query.
    pub async fn set_flags(&self, flags: SearchFlags) {
        self.shared.session.lock().await.set_flags(flags);
    }

    async fn start(
        &self,
        scope: ChatListScope,
        query: &str,
        force: ForceMode,
    ) -> Option<JoinHandle<()>> {
        let mut session = self.shared.session.lock().await;
        let (context_id, stage, top) = match session.begin(scope, query, force) {
            SearchStart::Unchanged => return None,
            SearchStart::ReloadTop { context_id } => {
                let shared = Arc::clone(&self.shared);
                return Some(tokio::spawn(async move {
                    shared.load_top_chats(context_id, TopFetch::Silent).await;
                }));
            }
            SearchStart::Rerun { context_id, stage } => (context_id, stage, TopFetch::Loud),
            SearchStart::New {
                context_id,
                stage,
                events,
            } => {
                self.shared.emit(events);
                (context_id, stage, TopFetch::Cached)
            }
        };
        drop(session);

        tracing::debug!(%context_id, ?stage, query, "Search started");
        let shared = Arc::clone(&self.shared);
        Some(tokio::spawn(async move {
            shared.run(context_id, stage, top).await;
        }))
    }

    // ===========================================
    // Results
    // ===========================================

    /// Request the next message page. `None` when there is nothing to load.
    pub async fn load_more_messages(&self) -> Option<JoinHandle<()>> {
        let context_id = {
            let session = self.shared.session.lock().await;
            if !session.can_load_more_messages() {
                return None;
            }
            session.context_id()
        };
        let shared = Arc::clone(&self.shared);
        Some(tokio::spawn(async move {
            shared.run_messages(context_id, true).await;
        }))
    }

    /// Drop a chat from the top chats. Returns false if it was not shown.
    pub async fn remove_top_chat(&self, chat_id: ChatId) -> bool {
        let (context_id, category, reload) = {
            let mut session = self.shared.session.lock().await;
            let Some((event, reload)) = session.remove_top_chat(chat_id) else {
                return false;
            };
            self.shared.emit([event]);
            (
                session.context_id(),
                TopChatCategory::from(session.flags()),
                reload,
            )
        };
        if let Err(e) = self.shared.backend.remove_top_chat(category, chat_id).await {
            tracing::warn!(%chat_id, error = %e, "Failed to remove top chat");
        }
        if reload {
            self.shared
                .load_top_chats(context_id, TopFetch::Silent)
                .await;
        }
        true
    }

    /// The user picked `chat` from the results.
    ///
    /// Queued while the surface is open and recorded when it closes.
    pub async fn add_recently_found_chat(&self, chat: FoundChat) {
        let chat_id = chat.id();
        {
            let mut session = self.shared.session.lock().await;
            match session.add_recently_found(chat) {
                RecentStep::Queued => {
                    tracing::debug!(%chat_id, "Recently found chat queued");
                    return;
                }
                RecentStep::Applied(events) => self.shared.emit(events),
            }
        }
        if let Err(e) = self.shared.backend.add_recently_found_chat(chat_id).await {
            tracing::warn!(%chat_id, error = %e, "Failed to record recently found chat");
        }
    }

    /// Forget one recently found chat.
    pub async fn remove_recently_found_chat(&self, chat_id: ChatId) {
        {
            let mut session = self.shared.session.lock().await;
            let event = session.remove_recently_found(chat_id);
            self.shared.emit(event);
        }
        if let Err(e) = self.shared.backend.remove_recently_found_chat(chat_id).await {
            tracing::warn!(%chat_id, error = %e, "Failed to remove recently found chat");
        }
    }

    /// Forget every recently found chat. Does nothing when none are shown.
    pub async fn clear_recently_found_chats(&self) {
        {
            let mut session = self.shared.session.lock().await;
            match session.clear_recently_found() {
                Some(events) => self.shared.emit(events),
                None => return,
            }
        }
        if let Err(e) = self.shared.backend.clear_recently_found_chats().await {
            tracing::warn!(error = %e, "Failed to clear recently found chats");
        }
    }

    // ===========================================
    // Accessors
    // ===========================================

    /// Current context.
    pub async fn context_id(&self) -> ContextId {
        self.shared.session.lock().await.context_id()
    }

    /// Whether the search surface is open.
    pub async fn is_open(&self) -> bool {
        self.shared.session.lock().await.is_open()
    }

    /// Whether the current session has nothing more to load.
    pub async fn is_end_reached(&self) -> bool {
        self.shared.session.lock().await.is_end_reached()
    }

    /// Whether the current session reached its slow stages.
    pub async fn is_heavy_part_reached(&self) -> bool {
        self.shared.session.lock().await.is_heavy_part_reached()
    }

    /// Snapshot of the cached top chats.
    pub async fn top_chats(&self) -> Vec<ChatSummary> {
        self.shared.session.lock().await.top_chats().to_vec()
    }

    /// Snapshot of the local results.
    pub async fn local_chats(&self) -> Vec<FoundChat> {
        self.shared.session.lock().await.local_chats().to_vec()
    }

    /// Snapshot of the global results.
    pub async fn global_chats(&self) -> Vec<FoundChat> {
        self.shared.session.lock().await.global_chats().to_vec()
    }

    /// Snapshot of the message results.
    pub async fn messages(&self) -> Vec<FoundMessage> {
        self.shared.session.lock().await.messages().to_vec()
    }
}

impl<B: ChatBackend> Shared<B> {
    fn emit<I: IntoIterator<Item = SearchEvent>>(&self, events: I) {
        for event in events {
            if self.events.send(event).is_err() {
                tracing::debug!("Search event receiver dropped");
                return;
            }
        }
    }

    fn assembler(&self, flags: SearchFlags) -> FoundChatAssembler<'_> {
        FoundChatAssembler {
            flags,
            filter: self.filter.as_ref(),
            self_chat_id: self.config.self_chat_id,
        }
    }

    async fn is_current(&self, context_id: ContextId) -> bool {
        let current = self.session.lock().await.is_current(context_id);
        if !current {
            tracing::debug!(%context_id, "Discarding stale search result");
        }
        current
    }

    /// Query and options of the session `context_id`, `None` once superseded.
    async fn query_and_flags(&self, context_id: ContextId) -> Option<(String, SearchFlags)> {
        let session = self.session.lock().await;
        if !session.is_current(context_id) {
            tracing::debug!(%context_id, "Search superseded before it ran");
            return None;
        }
        Some((
            session.query().unwrap_or_default().to_string(),
            session.flags(),
        ))
    }

    async fn fetch_chats(&self, ids: &[ChatId]) -> Vec<ChatSummary> {
        if ids.is_empty() {
            return Vec::new();
        }
        match self.backend.fetch_chats(ids).await {
            Ok(chats) => chats,
            Err(e) => {
                tracing::warn!(count = ids.len(), error = %e, "Failed to fetch chats");
                Vec::new()
            }
        }
    }

    async fn run(self: Arc<Self>, context_id: ContextId, stage: Stage, top: TopFetch) {
        match stage {
            Stage::TopChats => {
                self.load_top_chats(context_id, top).await;
                self.run_local(context_id).await;
            }
            Stage::LocalChats => self.run_local(context_id).await,
            Stage::Messages => self.run_messages(context_id, false).await,
        }
    }

    // ===========================================
    // Top chats
    // ===========================================

    async fn load_top_chats(&self, context_id: ContextId, fetch: TopFetch) {
        let flags = {
            let session = self.session.lock().await;
            if fetch == TopFetch::Cached && !session.top_chats().is_empty() {
                return;
            }
            session.flags()
        };
        let category = TopChatCategory::from(flags);
        let ids = match self
            .backend
            .list_top_chats(category, self.config.limits().top_chats)
            .await
        {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!(?category, error = %e, "Failed to load top chats");
                Vec::new()
            }
        };
        if !self.is_current(context_id).await {
            return;
        }
        let chats = self.fetch_chats(&ids).await;
        let chats: Vec<ChatSummary> = self
            .assembler(flags)
            .assemble(chats, "", false, &[])
            .into_iter()
            .map(|found| found.chat)
            .collect();

        let mut session = self.session.lock().await;
        match session.set_top_chats(context_id, chats, fetch == TopFetch::Silent) {
            Some(events) => self.emit(events),
            None => tracing::debug!(%context_id, "Discarding stale top chats"),
        }
    }

    // ===========================================
    // Local chats
    // ===========================================

    fn matches_self_chat(&self, query: &str) -> bool {
        !query.is_empty()
            && self
                .config
                .self_chat_names
                .iter()
                .any(|name| any_word_starts_with(name, query))
    }

    async fn local_round(&self, round: u8, query: &str, limit: usize) -> Vec<ChatId> {
        let result = match round {
            1 => self.backend.search_local_chats(query, limit).await,
            2 => self.backend.search_chats_on_server(query, limit).await,
            _ => self.backend.search_contacts(query, limit).await,
        };
        result.unwrap_or_else(|e| {
            tracing::warn!(round, query, error = %e, "Local search round failed");
            Vec::new()
        })
    }

    async fn run_local(&self, context_id: ContextId) {
        let Some((query, flags)) = self.query_and_flags(context_id).await else {
            return;
        };
        let limits = self.config.limits();
        let budget = limits.local_budget(&query, flags);
        let follows = !query.is_empty();

        // Every id a round returned, including ones the filter drops.
        let mut returned: Vec<ChatId> = Vec::new();
        let mut delivered = false;

        for round in 1..=3u8 {
            let limit = match round {
                1 => budget,
                2 if follows && returned.len() < limits.server_target => {
                    limits.server_target - returned.len()
                }
                3 if follows && returned.len() < limits.contacts_target => {
                    limits.contacts_target - returned.len()
                }
                _ => continue,
            };

            let mut ids = self.local_round(round, &query, limit).await;
            if !self.is_current(context_id).await {
                return;
            }
            if round == 1 {
                if let Some(self_id) = self.config.self_chat_id {
                    if self.matches_self_chat(&query) {
                        ids.retain(|id| *id != self_id);
                        ids.insert(0, self_id);
                    }
                }
            }
            ids.retain(|id| !returned.contains(id));
            returned.extend(ids.iter().copied());

            let chats = self.fetch_chats(&ids).await;
            let chats = self.assembler(flags).assemble(chats, &query, false, &[]);

            let more_pending = follows
                && ((round == 1 && returned.len() < limits.server_target)
                    || (round < 3 && returned.len() < limits.contacts_target));
            if chats.is_empty() && more_pending {
                continue;
            }

            let mut session = self.session.lock().await;
            let events = if delivered {
                session.append_local_chats(context_id, chats)
            } else {
                session.set_local_chats(context_id, chats)
            };
            match events {
                Some(events) => self.emit(events),
                None => {
                    tracing::debug!(%context_id, round, "Discarding stale local chats");
                    return;
                }
            }
            delivered = true;
        }

        self.run_global(context_id).await;
    }

    // ===========================================
    // Global chats
    // ===========================================

    async fn run_global(&self, context_id: ContextId) {
        let step = {
            let mut session = self.session.lock().await;
            let Some((events, step)) = session.begin_global(context_id) else {
                return;
            };
            self.emit(events);
            step
        };

        match step {
            GlobalStep::Done => return,
            GlobalStep::Skip => {}
            GlobalStep::Fetch { query, flags } => {
                let ids = match self.backend.search_public_chats(&query).await {
                    Ok(ids) => ids,
                    Err(e) => {
                        tracing::warn!(query, error = %e, "Global search failed");
                        Vec::new()
                    }
                };
                if !self.is_current(context_id).await {
                    return;
                }
                let chats = self.fetch_chats(&ids).await;
                let chats = self.assembler(flags).assemble(chats, &query, true, &[]);

                let mut session = self.session.lock().await;
                match session.set_global_chats(context_id, chats) {
                    Some(events) => self.emit(events),
                    None => {
                        tracing::debug!(%context_id, "Discarding stale global chats");
                        return;
                    }
                }
            }
        }

        self.run_messages(context_id, false).await;
    }

    // ===========================================
    // Messages
    // ===========================================

    /// One page request; a failed continuation is retried once.
    async fn request_messages(
        &self,
        scope: ChatListScope,
        query: &str,
        cursor: Option<&MessageCursor>,
        limit: usize,
    ) -> Result<MessagePage, BackendError> {
        match self.backend.search_messages(scope, query, cursor, limit).await {
            Err(e) if cursor.is_some() => {
                tracing::debug!(error = %e, "Retrying message page");
                self.backend.search_messages(scope, query, cursor, limit).await
            }
            result => result,
        }
    }

    /// Drop messages whose chat the filter rejects.
    async fn filter_messages(&self, messages: Vec<FoundMessage>) -> Vec<FoundMessage> {
        let mut ids: Vec<ChatId> = messages.iter().map(|m| m.chat_id).collect();
        ids.sort();
        ids.dedup();
        let chats: HashMap<ChatId, ChatSummary> = self
            .fetch_chats(&ids)
            .await
            .into_iter()
            .map(|chat| (chat.id, chat))
            .collect();
        messages
            .into_iter()
            .filter(|message| {
                chats
                    .get(&message.chat_id)
                    .map_or(true, |chat| self.filter.include_message_source(chat))
            })
            .collect()
    }

    async fn run_messages(&self, context_id: ContextId, is_more: bool) {
        let step = {
            let mut session = self.session.lock().await;
            let Some((events, step)) = session.begin_messages(context_id, is_more) else {
                return;
            };
            self.emit(events);
            step
        };
        let MessageStep::Fetch {
            query,
            scope,
            mut cursor,
            limit,
        } = step
        else {
            return;
        };

        let mut stalled = false;
        let (messages, next) = loop {
            let page = match self.request_messages(scope, &query, cursor.as_ref(), limit).await {
                Ok(page) => page,
                Err(e) => {
                    tracing::warn!(query, error = %e, "Message search failed");
                    break (Vec::new(), None);
                }
            };
            let next = page.cursor();
            if next.is_some() && next == cursor {
                if !stalled {
                    stalled = true;
                    tracing::debug!(query, "Message cursor did not advance, retrying");
                    continue;
                }
                let messages = self.filter_messages(page.messages).await;
                break (messages, None);
            }

            let messages = self.filter_messages(page.messages).await;
            if messages.is_empty() && next.is_some() {
                if !self.is_current(context_id).await {
                    return;
                }
                cursor = next;
                continue;
            }
            break (messages, next);
        };

        let mut session = self.session.lock().await;
        match session.set_messages(context_id, messages, next, is_more) {
            Some(events) => self.emit(events),
            None => tracing::debug!(%context_id, "Discarding stale messages"),
        }
    }
}
