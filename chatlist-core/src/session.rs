//! Search session state machine.
//!
//! Holds everything the search pipeline shows and decides which events a
//! stage result produces. The async coordinator in `chatlist-client` performs
//! the backend calls and feeds results back in; every result carries the
//! [`ContextId`] it was dispatched under, and a result for any other context
//! is ignored without touching state.
//!
//! Stage order for one session:
//!
//! ```text
//! top chats ──▶ local chats ──▶ (heavy part) global chats ──▶ messages ──▶ end
//!   (empty query only)  (up to 3 rounds)                        (paged)
//! ```

use chatlist_types::{
    ChatId, ChatListScope, ChatSummary, ContextId, FoundChat, FoundMessage, MessageCursor,
    SearchEvent, SearchFlags,
};
use std::collections::VecDeque;

/// Result sizes and round budgets used by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchLimits {
    /// Top chats requested per fetch.
    pub top_chats: usize,
    /// First local round budget for an empty query.
    pub local_empty_query: usize,
    /// First local round budget when filter flags are set.
    pub local_filtered: usize,
    /// First local round budget otherwise.
    pub local_default: usize,
    /// Server round runs while fewer results than this were found.
    pub server_target: usize,
    /// Contacts round runs while fewer results than this were found.
    pub contacts_target: usize,
    /// Size of the first message page.
    pub messages_first_page: usize,
    /// Size of every further message page.
    pub messages_more_page: usize,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            top_chats: 30,
            local_empty_query: 20,
            local_filtered: 50,
            local_default: 30,
            server_target: 100,
            contacts_target: 50,
            messages_first_page: 20,
            messages_more_page: 30,
        }
    }
}

impl SearchLimits {
    /// Budget of the first local round.
    pub fn local_budget(&self, query: &str, flags: SearchFlags) -> usize {
        if query.is_empty() {
            self.local_empty_query
        } else if flags.is_filtered() {
            self.local_filtered
        } else {
            self.local_default
        }
    }
}

/// How hard a repeated identical query should be re-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForceMode {
    /// An identical query is a no-op.
    None,
    /// Refresh top chats in the background.
    Top,
    /// Re-run the whole pipeline.
    All,
}

/// Transition of a stage result from one size to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Nothing was shown and now something is.
    Added,
    /// Something was shown and now nothing is.
    Removed,
    /// Something was shown and is replaced.
    Updated,
    /// Nothing before and nothing now.
    Unchanged,
}

impl MergeOutcome {
    /// Classify a replacement of `old` results by `new` results.
    pub fn classify(old: usize, new: usize) -> Self {
        match (old, new) {
            (0, 0) => MergeOutcome::Unchanged,
            (0, _) => MergeOutcome::Added,
            (_, 0) => MergeOutcome::Removed,
            _ => MergeOutcome::Updated,
        }
    }
}

/// Where the pipeline starts for a fresh session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Top chats, then local.
    TopChats,
    /// Local chat rounds.
    LocalChats,
    /// Straight to messages.
    Messages,
}

/// What a query request turned into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchStart {
    /// Identical query and scope; nothing to do.
    Unchanged,
    /// Identical finished empty query: refresh top chats silently.
    ReloadTop {
        /// Current context.
        context_id: ContextId,
    },
    /// Identical finished empty query: run the pipeline again loudly.
    Rerun {
        /// Current context.
        context_id: ContextId,
        /// First stage to run.
        stage: Stage,
    },
    /// A new session started.
    New {
        /// The new context.
        context_id: ContextId,
        /// First stage to run.
        stage: Stage,
        /// Events produced by the reset.
        events: Vec<SearchEvent>,
    },
}

/// How the global stage proceeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlobalStep {
    /// Global search is off; continue with messages.
    Skip,
    /// The query is empty; the session is finished.
    Done,
    /// Search the public directory.
    Fetch {
        /// Query with a leading `@` removed.
        query: String,
        /// Flags to filter public results with.
        flags: SearchFlags,
    },
}

/// How the message stage proceeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageStep {
    /// No message search for this session.
    Done,
    /// Request a page.
    Fetch {
        /// Query to search for.
        query: String,
        /// Scope to search in.
        scope: ChatListScope,
        /// Continuation, `None` for the first page.
        cursor: Option<MessageCursor>,
        /// Page size.
        limit: usize,
    },
}

/// What adding a recently found chat requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecentStep {
    /// The search surface is open; the chat waits until it closes.
    Queued,
    /// Applied locally; the backend must be told.
    Applied(Vec<SearchEvent>),
}

/// Stage results and milestones of the current search session.
#[derive(Debug)]
pub struct SearchSession {
    limits: SearchLimits,
    flags: SearchFlags,
    context_id: ContextId,
    query: Option<String>,
    scope: ChatListScope,
    is_open: bool,
    is_prepared: bool,

    top: Vec<ChatSummary>,
    top_visibility: Option<bool>,

    local: Vec<FoundChat>,
    local_query: Option<String>,

    global: Vec<FoundChat>,

    messages: Vec<FoundMessage>,
    cursor: Option<MessageCursor>,
    loading_messages: bool,

    end_reached: bool,
    heavy_part_reached: bool,

    recently_found: VecDeque<FoundChat>,
}

impl SearchSession {
    /// Create an idle session.
    pub fn new(limits: SearchLimits, flags: SearchFlags) -> Self {
        Self {
            limits,
            flags,
            context_id: ContextId::default(),
            query: None,
            scope: ChatListScope::default(),
            is_open: false,
            is_prepared: false,
            top: Vec::new(),
            top_visibility: None,
            local: Vec::new(),
            local_query: None,
            global: Vec::new(),
            messages: Vec::new(),
            cursor: None,
            loading_messages: false,
            end_reached: false,
            heavy_part_reached: false,
            recently_found: VecDeque::new(),
        }
    }

    // ===========================================
    // Accessors
    // ===========================================

    /// Limits in use.
    pub fn limits(&self) -> &SearchLimits {
        &self.limits
    }

    /// Current options.
    pub fn flags(&self) -> SearchFlags {
        self.flags
    }

    /// Replace the options. Takes effect with the next query.
    pub fn set_flags(&mut self, flags: SearchFlags) {
        self.flags = flags;
    }

    /// Current context.
    pub fn context_id(&self) -> ContextId {
        self.context_id
    }

    /// Whether `context_id` is the current one.
    pub fn is_current(&self, context_id: ContextId) -> bool {
        self.context_id == context_id
    }

    /// Current query, if a session was started.
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Current scope.
    pub fn scope(&self) -> ChatListScope {
        self.scope
    }

    /// Whether the search surface is open.
    pub fn is_open(&self) -> bool {
        self.is_open
    }

    /// Whether nothing more can be loaded.
    pub fn is_end_reached(&self) -> bool {
        self.end_reached
    }

    /// Whether the slow stages were reached.
    pub fn is_heavy_part_reached(&self) -> bool {
        self.heavy_part_reached
    }

    /// Whether a message page is in flight.
    pub fn is_loading_messages(&self) -> bool {
        self.loading_messages
    }

    /// Cached top chats.
    pub fn top_chats(&self) -> &[ChatSummary] {
        &self.top
    }

    /// Local results.
    pub fn local_chats(&self) -> &[FoundChat] {
        &self.local
    }

    /// Whether local results are the recently found list.
    pub fn local_chats_are_recent(&self) -> bool {
        self.query.as_deref().map_or(true, str::is_empty)
    }

    /// Global results.
    pub fn global_chats(&self) -> &[FoundChat] {
        &self.global
    }

    /// Message results.
    pub fn messages(&self) -> &[FoundMessage] {
        &self.messages
    }

    /// Continuation for the next message page.
    pub fn cursor(&self) -> Option<&MessageCursor> {
        self.cursor.as_ref()
    }

    /// Chats waiting to be recorded as recently found.
    pub fn pending_recently_found(&self) -> usize {
        self.recently_found.len()
    }

    // ===========================================
    // Lifecycle
    // ===========================================

    /// Mark the surface open. Returns false if it already was.
    pub fn open(&mut self) -> bool {
        !std::mem::replace(&mut self.is_open, true)
    }

    /// Mark the surface closed. Returns false if it already was.
    pub fn close(&mut self) -> bool {
        std::mem::replace(&mut self.is_open, false)
    }

    /// Mark the surface prepared. Returns false if it already was.
    pub fn prepare(&mut self) -> bool {
        !std::mem::replace(&mut self.is_prepared, true)
    }

    fn first_stage(&self, query: &str) -> Stage {
        if self.flags.contains(SearchFlags::NO_CHATS) {
            Stage::Messages
        } else if self.flags.contains(SearchFlags::NEED_TOP_CHATS) && query.is_empty() {
            Stage::TopChats
        } else {
            Stage::LocalChats
        }
    }

    /// Start a search for `query` in `scope`.
    pub fn begin(&mut self, scope: ChatListScope, query: &str, force: ForceMode) -> SearchStart {
        if self.query.as_deref() == Some(query) && self.scope == scope {
            if !self.end_reached || !query.is_empty() {
                return SearchStart::Unchanged;
            }
            return match force {
                ForceMode::None => SearchStart::Unchanged,
                ForceMode::Top if self.can_reload_top() => SearchStart::ReloadTop {
                    context_id: self.context_id,
                },
                ForceMode::Top => SearchStart::Unchanged,
                ForceMode::All => SearchStart::Rerun {
                    context_id: self.context_id,
                    stage: self.first_stage(query),
                },
            };
        }

        self.context_id = self.context_id.next();
        let mut events = vec![SearchEvent::NewSearch {
            context_id: self.context_id,
            is_default: query.is_empty(),
        }];
        events.extend(self.clear_messages());
        self.loading_messages = false;
        self.end_reached = false;
        self.heavy_part_reached = false;
        self.query = Some(query.to_string());
        self.scope = scope;
        self.top_visibility = if self.flags.contains(SearchFlags::NO_CHATS) {
            None
        } else {
            Some(query.is_empty())
        };

        SearchStart::New {
            context_id: self.context_id,
            stage: self.first_stage(query),
            events,
        }
    }

    fn can_reload_top(&self) -> bool {
        self.flags.contains(SearchFlags::NEED_TOP_CHATS) && !self.flags.contains(SearchFlags::NO_CHATS)
    }

    // ===========================================
    // Milestones
    // ===========================================

    /// Fire the heavy part milestone once per session.
    pub fn reach_heavy_part(&mut self) -> Option<SearchEvent> {
        if std::mem::replace(&mut self.heavy_part_reached, true) {
            return None;
        }
        Some(SearchEvent::HeavyPartReached {
            context_id: self.context_id,
        })
    }

    /// Fire the end milestone once per session.
    pub fn reach_end(&mut self) -> Option<SearchEvent> {
        if std::mem::replace(&mut self.end_reached, true) {
            return None;
        }
        Some(SearchEvent::EndReached {
            context_id: self.context_id,
        })
    }

    // ===========================================
    // Top chats
    // ===========================================

    /// Deliver a top chats result. `None` when stale.
    pub fn set_top_chats(
        &mut self,
        context_id: ContextId,
        chats: Vec<ChatSummary>,
        silent: bool,
    ) -> Option<Vec<SearchEvent>> {
        if !self.is_current(context_id) {
            return None;
        }
        let old_ids: Vec<ChatId> = self.top.iter().map(|chat| chat.id).collect();
        let same_ids = old_ids.len() == chats.len()
            && old_ids.iter().zip(&chats).all(|(old, new)| *old == new.id);
        let event = match MergeOutcome::classify(old_ids.len(), chats.len()) {
            MergeOutcome::Unchanged => None,
            MergeOutcome::Added => Some(SearchEvent::TopChatsAdded {
                chats: chats.clone(),
                silent,
            }),
            MergeOutcome::Removed => Some(SearchEvent::TopChatsRemoved { silent }),
            MergeOutcome::Updated if same_ids => None,
            MergeOutcome::Updated => Some(SearchEvent::TopChatsUpdated {
                old_ids,
                chats: chats.clone(),
                silent,
            }),
        };
        if event.is_some() {
            self.top = chats;
        }
        Some(event.into_iter().collect())
    }

    /// Drop one top chat. `None` when it is not shown.
    ///
    /// The second value tells whether top chats should be refreshed.
    pub fn remove_top_chat(&mut self, chat_id: ChatId) -> Option<(SearchEvent, bool)> {
        let position = self.top.iter().position(|chat| chat.id == chat_id)?;
        self.top.remove(position);
        if self.top.is_empty() {
            let silent = !self.query.as_deref().map_or(true, str::is_empty);
            Some((SearchEvent::TopChatsRemoved { silent }, false))
        } else {
            Some((SearchEvent::TopChatRemoved { chat_id, position }, true))
        }
    }

    // ===========================================
    // Local chats
    // ===========================================

    fn take_top_visibility(&mut self) -> Option<SearchEvent> {
        match self.top_visibility.take()? {
            true if !self.top.is_empty() => Some(SearchEvent::TopChatsShown {
                chats: self.top.clone(),
            }),
            true => None,
            false => Some(SearchEvent::TopChatsHidden),
        }
    }

    /// Deliver the first local round. `None` when stale.
    pub fn set_local_chats(
        &mut self,
        context_id: ContextId,
        chats: Vec<FoundChat>,
    ) -> Option<Vec<SearchEvent>> {
        if !self.is_current(context_id) {
            return None;
        }
        let old_count = self.local.len();
        let mut events = Vec::new();
        match MergeOutcome::classify(old_count, chats.len()) {
            MergeOutcome::Unchanged => {}
            MergeOutcome::Added => events.push(SearchEvent::LocalChatsAdded {
                chats: chats.clone(),
            }),
            MergeOutcome::Removed => events.push(SearchEvent::LocalChatsRemoved { old_count }),
            MergeOutcome::Updated => events.push(SearchEvent::LocalChatsUpdated {
                old_count,
                chats: chats.clone(),
            }),
        }
        self.local = chats;
        self.local_query = self.query.clone();
        events.extend(self.take_top_visibility());
        Some(events)
    }

    /// Deliver a later local round. `None` when stale.
    pub fn append_local_chats(
        &mut self,
        context_id: ContextId,
        chats: Vec<FoundChat>,
    ) -> Option<Vec<SearchEvent>> {
        if !self.is_current(context_id) {
            return None;
        }
        let old_count = self.local.len();
        if old_count == 0 {
            return self.set_local_chats(context_id, chats);
        }
        if chats.is_empty() {
            return Some(Vec::new());
        }
        self.local.extend(chats.iter().cloned());
        Some(vec![SearchEvent::LocalChatsAppended { old_count, chats }])
    }

    // ===========================================
    // Global chats
    // ===========================================

    fn clear_global(&mut self) -> Option<SearchEvent> {
        if self.global.is_empty() {
            return None;
        }
        let old_count = self.global.len();
        self.global.clear();
        Some(SearchEvent::GlobalChatsRemoved { old_count })
    }

    /// Enter the global stage. `None` when stale.
    pub fn begin_global(&mut self, context_id: ContextId) -> Option<(Vec<SearchEvent>, GlobalStep)> {
        if !self.is_current(context_id) {
            return None;
        }
        let mut events: Vec<SearchEvent> = self.reach_heavy_part().into_iter().collect();
        if !self.flags.contains(SearchFlags::NEED_GLOBAL_SEARCH) {
            return Some((events, GlobalStep::Skip));
        }
        let query = self.query.clone().unwrap_or_default();
        if query.is_empty() {
            events.extend(self.clear_global());
            events.extend(self.clear_messages());
            events.extend(self.reach_end());
            return Some((events, GlobalStep::Done));
        }
        let query = query.strip_prefix('@').unwrap_or(&query).to_string();
        Some((
            events,
            GlobalStep::Fetch {
                query,
                flags: self.flags - SearchFlags::ONLY_CONTACTS,
            },
        ))
    }

    /// Deliver the global result. `None` when stale.
    pub fn set_global_chats(
        &mut self,
        context_id: ContextId,
        chats: Vec<FoundChat>,
    ) -> Option<Vec<SearchEvent>> {
        if !self.is_current(context_id) {
            return None;
        }
        let old_count = self.global.len();
        let event = match MergeOutcome::classify(old_count, chats.len()) {
            MergeOutcome::Unchanged => None,
            MergeOutcome::Added => Some(SearchEvent::GlobalChatsAdded {
                chats: chats.clone(),
            }),
            MergeOutcome::Removed => Some(SearchEvent::GlobalChatsRemoved { old_count }),
            MergeOutcome::Updated => Some(SearchEvent::GlobalChatsUpdated {
                old_count,
                chats: chats.clone(),
            }),
        };
        self.global = chats;
        Some(event.into_iter().collect())
    }

    // ===========================================
    // Messages
    // ===========================================

    fn clear_messages(&mut self) -> Option<SearchEvent> {
        self.cursor = None;
        if self.messages.is_empty() {
            return None;
        }
        let old_count = self.messages.len();
        self.messages.clear();
        Some(SearchEvent::MessagesRemoved { old_count })
    }

    /// Whether another message page can be requested.
    pub fn can_load_more_messages(&self) -> bool {
        !self.loading_messages && !self.messages.is_empty() && self.cursor.is_some()
    }

    /// Enter the message stage. `None` when stale or a page is in flight.
    pub fn begin_messages(
        &mut self,
        context_id: ContextId,
        is_more: bool,
    ) -> Option<(Vec<SearchEvent>, MessageStep)> {
        if !self.is_current(context_id) || self.loading_messages {
            return None;
        }
        let query = self.query.clone().unwrap_or_default();
        if !self.flags.contains(SearchFlags::NEED_MESSAGES) || query.is_empty() {
            let events = self.reach_end().into_iter().collect();
            return Some((events, MessageStep::Done));
        }
        let cursor = if is_more {
            match &self.cursor {
                Some(cursor) => Some(cursor.clone()),
                None => return None,
            }
        } else {
            None
        };
        self.loading_messages = true;
        let limit = if is_more {
            self.limits.messages_more_page
        } else {
            self.limits.messages_first_page
        };
        Some((
            Vec::new(),
            MessageStep::Fetch {
                query,
                scope: self.scope,
                cursor,
                limit,
            },
        ))
    }

    /// Deliver a message page. `None` when stale or nothing was requested.
    pub fn set_messages(
        &mut self,
        context_id: ContextId,
        page: Vec<FoundMessage>,
        next_cursor: Option<MessageCursor>,
        is_more: bool,
    ) -> Option<Vec<SearchEvent>> {
        if !self.is_current(context_id) || !self.loading_messages {
            return None;
        }
        self.loading_messages = false;

        let mut events = Vec::new();
        if !is_more {
            events.push(SearchEvent::HeavyPartFinished { context_id });
        }
        if page.is_empty() {
            if !is_more {
                events.extend(self.clear_messages());
            }
            self.cursor = None;
            events.extend(self.reach_end());
            return Some(events);
        }

        let old_count = self.messages.len();
        if is_more {
            self.messages.extend(page.iter().cloned());
            events.push(SearchEvent::MessagesAppended {
                old_count,
                messages: page,
            });
        } else {
            self.messages = page;
            let messages = self.messages.clone();
            match MergeOutcome::classify(old_count, messages.len()) {
                MergeOutcome::Added => events.push(SearchEvent::MessagesAdded { messages }),
                _ => events.push(SearchEvent::MessagesUpdated {
                    old_count,
                    messages,
                }),
            }
        }
        self.cursor = next_cursor;
        if self.cursor.is_none() {
            events.extend(self.reach_end());
        }
        Some(events)
    }

    // ===========================================
    // Recently found
    // ===========================================

    /// Record that the user picked `chat` from the results.
    pub fn add_recently_found(&mut self, chat: FoundChat) -> RecentStep {
        if self.is_open {
            self.recently_found.push_back(chat);
            return RecentStep::Queued;
        }
        RecentStep::Applied(self.apply_recently_found(&chat))
    }

    /// Take every queued chat, in arrival order, once the surface is closed.
    pub fn drain_recently_found(&mut self) -> Vec<FoundChat> {
        if self.is_open {
            return Vec::new();
        }
        self.recently_found.drain(..).collect()
    }

    /// Move or insert `chat` at the front of the recently found list.
    pub fn apply_recently_found(&mut self, chat: &FoundChat) -> Vec<SearchEvent> {
        let showing_recent = self.query.as_deref() == Some("")
            && self.local_query.as_deref() == Some("");
        if !showing_recent {
            return Vec::new();
        }
        match self.local.iter().position(|found| found.id() == chat.id()) {
            Some(0) => Vec::new(),
            Some(from) => {
                let moved = self.local.remove(from);
                self.local.insert(0, moved.clone());
                vec![SearchEvent::LocalChatMoved { chat: moved, from }]
            }
            None => {
                self.local.insert(0, chat.clone());
                if self.local.len() == 1 {
                    vec![SearchEvent::LocalChatsAdded {
                        chats: self.local.clone(),
                    }]
                } else {
                    vec![SearchEvent::LocalChatInserted { chat: chat.clone() }]
                }
            }
        }
    }

    /// Forget one recently found chat. `None` when it is not shown.
    pub fn remove_recently_found(&mut self, chat_id: ChatId) -> Option<SearchEvent> {
        let position = self.local.iter().position(|found| found.id() == chat_id)?;
        self.local.remove(position);
        if self.local.is_empty() {
            Some(SearchEvent::LocalChatsRemoved { old_count: 1 })
        } else {
            Some(SearchEvent::LocalChatRemoved {
                chat_id,
                position,
                total: self.local.len() + 1,
            })
        }
    }

    /// Forget every recently found chat.
    ///
    /// `None` when nothing is shown, in which case the backend is left alone.
    pub fn clear_recently_found(&mut self) -> Option<Vec<SearchEvent>> {
        let old_count = self.local.len();
        if old_count == 0 {
            return None;
        }
        if !self.local_chats_are_recent() {
            return Some(Vec::new());
        }
        self.local.clear();
        Some(vec![SearchEvent::LocalChatsRemoved { old_count }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatlist_types::{MessageId, OrderKey};

    fn summary(id: i64) -> ChatSummary {
        ChatSummary::new(ChatId::new(id), OrderKey::new(id), &format!("chat {}", id))
    }

    fn found(id: i64) -> FoundChat {
        FoundChat::local(summary(id), "")
    }

    fn message(id: i64) -> FoundMessage {
        FoundMessage {
            chat_id: ChatId::new(1),
            message_id: MessageId::new(id),
            text: format!("message {}", id),
            date: 0,
        }
    }

    fn session(flags: SearchFlags) -> SearchSession {
        SearchSession::new(SearchLimits::default(), flags)
    }

    fn start(session: &mut SearchSession, query: &str) -> ContextId {
        match session.begin(ChatListScope::Main, query, ForceMode::None) {
            SearchStart::New { context_id, .. } => context_id,
            other => panic!("expected a new session, got {:?}", other),
        }
    }

    #[test]
    fn merge_outcome_classification() {
        assert_eq!(MergeOutcome::classify(0, 0), MergeOutcome::Unchanged);
        assert_eq!(MergeOutcome::classify(0, 3), MergeOutcome::Added);
        assert_eq!(MergeOutcome::classify(3, 0), MergeOutcome::Removed);
        assert_eq!(MergeOutcome::classify(3, 5), MergeOutcome::Updated);
    }

    #[test]
    fn local_budget_depends_on_query_and_filter() {
        let limits = SearchLimits::default();
        assert_eq!(limits.local_budget("", SearchFlags::ONLY_CONTACTS), 20);
        assert_eq!(limits.local_budget("al", SearchFlags::ONLY_CONTACTS), 50);
        assert_eq!(limits.local_budget("al", SearchFlags::NEED_MESSAGES), 30);
    }

    // ===========================================
    // Session lifecycle
    // ===========================================

    #[test]
    fn new_query_bumps_context_and_picks_first_stage() {
        let mut s = session(SearchFlags::NEED_TOP_CHATS);
        match s.begin(ChatListScope::Main, "", ForceMode::None) {
            SearchStart::New {
                context_id,
                stage,
                events,
            } => {
                assert_eq!(context_id, ContextId::new(1));
                assert_eq!(stage, Stage::TopChats);
                assert_eq!(
                    events,
                    vec![SearchEvent::NewSearch {
                        context_id,
                        is_default: true
                    }]
                );
            }
            other => panic!("unexpected {:?}", other),
        }
        match s.begin(ChatListScope::Main, "al", ForceMode::None) {
            SearchStart::New { stage, .. } => assert_eq!(stage, Stage::LocalChats),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(s.context_id(), ContextId::new(2));
    }

    #[test]
    fn no_chats_flag_goes_straight_to_messages() {
        let mut s = session(SearchFlags::NO_CHATS | SearchFlags::NEED_TOP_CHATS);
        match s.begin(ChatListScope::Main, "", ForceMode::None) {
            SearchStart::New { stage, .. } => assert_eq!(stage, Stage::Messages),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn identical_query_is_unchanged_until_end_reached() {
        let mut s = session(SearchFlags::NEED_TOP_CHATS);
        let ctx = start(&mut s, "");
        assert_eq!(
            s.begin(ChatListScope::Main, "", ForceMode::Top),
            SearchStart::Unchanged
        );
        s.reach_end();
        assert_eq!(
            s.begin(ChatListScope::Main, "", ForceMode::Top),
            SearchStart::ReloadTop { context_id: ctx }
        );
        assert_eq!(
            s.begin(ChatListScope::Main, "", ForceMode::All),
            SearchStart::Rerun {
                context_id: ctx,
                stage: Stage::TopChats
            }
        );
        assert_eq!(
            s.begin(ChatListScope::Main, "", ForceMode::None),
            SearchStart::Unchanged
        );
    }

    #[test]
    fn scope_change_starts_new_session() {
        let mut s = session(SearchFlags::NONE);
        start(&mut s, "al");
        assert!(matches!(
            s.begin(ChatListScope::Archive, "al", ForceMode::None),
            SearchStart::New { .. }
        ));
    }

    #[test]
    fn stale_results_are_ignored() {
        let mut s = session(SearchFlags::NONE);
        let old = start(&mut s, "a");
        let current = start(&mut s, "al");
        assert_eq!(s.set_local_chats(old, vec![found(1)]), None);
        assert!(s.local_chats().is_empty());
        assert!(s.set_local_chats(current, vec![found(2)]).is_some());
        assert_eq!(s.local_chats().len(), 1);
    }

    #[test]
    fn milestones_fire_once() {
        let mut s = session(SearchFlags::NONE);
        let ctx = start(&mut s, "al");
        assert_eq!(
            s.reach_heavy_part(),
            Some(SearchEvent::HeavyPartReached { context_id: ctx })
        );
        assert_eq!(s.reach_heavy_part(), None);
        assert_eq!(
            s.reach_end(),
            Some(SearchEvent::EndReached { context_id: ctx })
        );
        assert_eq!(s.reach_end(), None);

        let next = start(&mut s, "ali");
        assert!(!s.is_end_reached());
        assert_eq!(
            s.reach_end(),
            Some(SearchEvent::EndReached { context_id: next })
        );
    }

    // ===========================================
    // Stage merges
    // ===========================================

    #[test]
    fn top_chats_update_only_when_ids_differ() {
        let mut s = session(SearchFlags::NEED_TOP_CHATS);
        let ctx = start(&mut s, "");
        let events = s
            .set_top_chats(ctx, vec![summary(1), summary(2)], false)
            .unwrap();
        assert!(matches!(events[..], [SearchEvent::TopChatsAdded { silent: false, .. }]));

        let events = s
            .set_top_chats(ctx, vec![summary(1), summary(2)], true)
            .unwrap();
        assert!(events.is_empty());

        let events = s
            .set_top_chats(ctx, vec![summary(2), summary(1)], true)
            .unwrap();
        assert!(matches!(events[..], [SearchEvent::TopChatsUpdated { silent: true, .. }]));

        let events = s.set_top_chats(ctx, vec![], false).unwrap();
        assert_eq!(events, vec![SearchEvent::TopChatsRemoved { silent: false }]);
    }

    #[test]
    fn first_local_result_shows_or_hides_top_chats() {
        let mut s = session(SearchFlags::NEED_TOP_CHATS);
        let ctx = start(&mut s, "");
        let _ = s.set_top_chats(ctx, vec![summary(9)], false);
        let events = s.set_local_chats(ctx, vec![found(1)]).unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], SearchEvent::TopChatsShown { .. }));

        let ctx = start(&mut s, "al");
        let events = s.set_local_chats(ctx, vec![found(1)]).unwrap();
        assert!(matches!(events[0], SearchEvent::LocalChatsUpdated { old_count: 1, .. }));
        assert_eq!(events[1], SearchEvent::TopChatsHidden);
    }

    #[test]
    fn later_local_rounds_append() {
        let mut s = session(SearchFlags::NONE);
        let ctx = start(&mut s, "al");
        let _ = s.set_local_chats(ctx, vec![found(1)]);
        let events = s.append_local_chats(ctx, vec![found(2), found(3)]).unwrap();
        assert!(matches!(
            events[..],
            [SearchEvent::LocalChatsAppended { old_count: 1, .. }]
        ));
        assert_eq!(s.local_chats().len(), 3);
        assert!(s.append_local_chats(ctx, vec![]).unwrap().is_empty());
    }

    #[test]
    fn append_to_empty_local_result_acts_as_first_round() {
        let mut s = session(SearchFlags::NONE);
        let ctx = start(&mut s, "al");
        let _ = s.set_local_chats(ctx, vec![]);
        let events = s.append_local_chats(ctx, vec![found(4)]).unwrap();
        assert!(matches!(events[0], SearchEvent::LocalChatsAdded { .. }));
    }

    #[test]
    fn both_empty_local_result_emits_nothing() {
        let mut s = session(SearchFlags::NONE);
        let ctx = start(&mut s, "al");
        assert_eq!(s.set_local_chats(ctx, vec![]), Some(vec![SearchEvent::TopChatsHidden]));
    }

    #[test]
    fn global_stage_strips_at_and_contacts_flag() {
        let mut s = session(SearchFlags::NEED_GLOBAL_SEARCH | SearchFlags::ONLY_CONTACTS);
        let ctx = start(&mut s, "@alice");
        let (events, step) = s.begin_global(ctx).unwrap();
        assert_eq!(events, vec![SearchEvent::HeavyPartReached { context_id: ctx }]);
        match step {
            GlobalStep::Fetch { query, flags } => {
                assert_eq!(query, "alice");
                assert!(!flags.contains(SearchFlags::ONLY_CONTACTS));
                assert!(flags.contains(SearchFlags::NEED_GLOBAL_SEARCH));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn global_stage_with_empty_query_finishes() {
        let mut s = session(SearchFlags::NEED_GLOBAL_SEARCH);
        let ctx = start(&mut s, "");
        let (events, step) = s.begin_global(ctx).unwrap();
        assert_eq!(step, GlobalStep::Done);
        assert_eq!(
            events,
            vec![
                SearchEvent::HeavyPartReached { context_id: ctx },
                SearchEvent::EndReached { context_id: ctx },
            ]
        );
    }

    #[test]
    fn global_stage_without_flag_skips() {
        let mut s = session(SearchFlags::NONE);
        let ctx = start(&mut s, "al");
        let (_, step) = s.begin_global(ctx).unwrap();
        assert_eq!(step, GlobalStep::Skip);
    }

    // ===========================================
    // Messages
    // ===========================================

    #[test]
    fn message_pages_flow() {
        let mut s = session(SearchFlags::NEED_MESSAGES);
        let ctx = start(&mut s, "hello");
        let (_, step) = s.begin_messages(ctx, false).unwrap();
        assert!(matches!(step, MessageStep::Fetch { cursor: None, limit: 20, .. }));
        assert!(s.begin_messages(ctx, false).is_none());

        let events = s
            .set_messages(ctx, vec![message(1)], MessageCursor::from_token("next"), false)
            .unwrap();
        assert_eq!(events[0], SearchEvent::HeavyPartFinished { context_id: ctx });
        assert!(matches!(events[1], SearchEvent::MessagesAdded { .. }));
        assert!(s.can_load_more_messages());

        let (_, step) = s.begin_messages(ctx, true).unwrap();
        match step {
            MessageStep::Fetch { cursor, limit, .. } => {
                assert_eq!(cursor.unwrap().as_str(), "next");
                assert_eq!(limit, 30);
            }
            other => panic!("unexpected {:?}", other),
        }
        let events = s.set_messages(ctx, vec![message(2)], None, true).unwrap();
        assert!(matches!(
            events[0],
            SearchEvent::MessagesAppended { old_count: 1, .. }
        ));
        assert_eq!(events[1], SearchEvent::EndReached { context_id: ctx });
        assert!(!s.can_load_more_messages());
        assert_eq!(s.messages().len(), 2);
    }

    #[test]
    fn empty_first_page_ends_session() {
        let mut s = session(SearchFlags::NEED_MESSAGES);
        let ctx = start(&mut s, "hello");
        let _ = s.begin_messages(ctx, false);
        let events = s.set_messages(ctx, vec![], None, false).unwrap();
        assert_eq!(
            events,
            vec![
                SearchEvent::HeavyPartFinished { context_id: ctx },
                SearchEvent::EndReached { context_id: ctx },
            ]
        );
    }

    #[test]
    fn messages_skipped_without_flag_or_query() {
        let mut s = session(SearchFlags::NONE);
        let ctx = start(&mut s, "hello");
        let (events, step) = s.begin_messages(ctx, false).unwrap();
        assert_eq!(step, MessageStep::Done);
        assert_eq!(events, vec![SearchEvent::EndReached { context_id: ctx }]);

        let mut s = session(SearchFlags::NEED_MESSAGES);
        let ctx = start(&mut s, "");
        let (_, step) = s.begin_messages(ctx, false).unwrap();
        assert_eq!(step, MessageStep::Done);
    }

    #[test]
    fn new_query_clears_messages() {
        let mut s = session(SearchFlags::NEED_MESSAGES);
        let ctx = start(&mut s, "hello");
        let _ = s.begin_messages(ctx, false);
        let _ = s.set_messages(ctx, vec![message(1), message(2)], None, false);
        match s.begin(ChatListScope::Main, "help", ForceMode::None) {
            SearchStart::New { events, .. } => {
                assert_eq!(events[1], SearchEvent::MessagesRemoved { old_count: 2 });
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(s.messages().is_empty());
        assert!(!s.is_loading_messages());
    }

    // ===========================================
    // Recently found
    // ===========================================

    #[test]
    fn recently_found_queued_while_open() {
        let mut s = session(SearchFlags::NONE);
        s.open();
        assert_eq!(s.add_recently_found(found(1)), RecentStep::Queued);
        assert_eq!(s.add_recently_found(found(2)), RecentStep::Queued);
        assert!(s.drain_recently_found().is_empty());
        s.close();
        let drained = s.drain_recently_found();
        assert_eq!(
            drained.iter().map(|f| f.id().value()).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert_eq!(s.pending_recently_found(), 0);
    }

    #[test]
    fn recently_found_moves_or_inserts_at_front() {
        let mut s = session(SearchFlags::NONE);
        let ctx = start(&mut s, "");
        let _ = s.set_local_chats(ctx, vec![found(1), found(2), found(3)]);

        let events = s.apply_recently_found(&found(3));
        assert!(matches!(events[..], [SearchEvent::LocalChatMoved { from: 2, .. }]));
        let events = s.apply_recently_found(&found(4));
        assert!(matches!(events[..], [SearchEvent::LocalChatInserted { .. }]));
        assert_eq!(
            s.local_chats()
                .iter()
                .map(|f| f.id().value())
                .collect::<Vec<_>>(),
            vec![4, 3, 1, 2]
        );
        assert!(s.apply_recently_found(&found(4)).is_empty());
    }

    #[test]
    fn recently_found_into_empty_list_is_added() {
        let mut s = session(SearchFlags::NONE);
        let ctx = start(&mut s, "");
        let _ = s.set_local_chats(ctx, vec![]);
        let events = s.apply_recently_found(&found(5));
        assert!(matches!(events[..], [SearchEvent::LocalChatsAdded { .. }]));
    }

    #[test]
    fn recently_found_ignored_for_nonempty_query() {
        let mut s = session(SearchFlags::NONE);
        let ctx = start(&mut s, "al");
        let _ = s.set_local_chats(ctx, vec![found(1)]);
        assert!(s.apply_recently_found(&found(2)).is_empty());
        assert_eq!(s.local_chats().len(), 1);
    }

    #[test]
    fn remove_and_clear_recently_found() {
        let mut s = session(SearchFlags::NONE);
        let ctx = start(&mut s, "");
        let _ = s.set_local_chats(ctx, vec![found(1), found(2)]);
        assert_eq!(
            s.remove_recently_found(ChatId::new(2)),
            Some(SearchEvent::LocalChatRemoved {
                chat_id: ChatId::new(2),
                position: 1,
                total: 2
            })
        );
        assert_eq!(s.remove_recently_found(ChatId::new(7)), None);
        assert_eq!(
            s.clear_recently_found(),
            Some(vec![SearchEvent::LocalChatsRemoved { old_count: 1 }])
        );
        assert_eq!(s.clear_recently_found(), None);
    }

    #[test]
    fn remove_top_chat_reports_refresh() {
        let mut s = session(SearchFlags::NEED_TOP_CHATS);
        let ctx = start(&mut s, "");
        let _ = s.set_top_chats(ctx, vec![summary(1), summary(2)], false);
        assert_eq!(
            s.remove_top_chat(ChatId::new(2)),
            Some((
                SearchEvent::TopChatRemoved {
                    chat_id: ChatId::new(2),
                    position: 1
                },
                true
            ))
        );
        assert_eq!(
            s.remove_top_chat(ChatId::new(1)),
            Some((SearchEvent::TopChatsRemoved { silent: false }, false))
        );
        assert_eq!(s.remove_top_chat(ChatId::new(1)), None);
    }
}
