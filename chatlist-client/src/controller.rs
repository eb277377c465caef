//! ChatListController - the live chat list.
//!
//! Owns an [`ArchiveFolderView`] for one [`ChatListScope`] behind a single
//! lock, feeds it backend updates and loaded pages, and commits pinned
//! reorders. Every mutation returns a [`ListChange`] for the view layer.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

use chatlist_core::{
    pinned, ArchiveFolderView, ArchiveSnapshot, ArchiveUpdateReason, LoadState, PinnedOrder,
    PositionUpdate, ReorderError, SyncOutcome,
};
use chatlist_types::{ChatId, ChatListScope, ChatSummary, DiffOp, Patch, UpdateFlags};

use crate::backend::{BackendError, ChatBackend};
use crate::config::ListConfig;

/// Controller errors.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// The drag gesture cannot be turned into a pinned order.
    #[error("invalid reorder: {0}")]
    Reorder(#[from] ReorderError),

    /// Backend error.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
}

/// An update pushed by the backend.
#[derive(Debug, Clone)]
pub enum BackendUpdate {
    /// A chat moved, appeared or left.
    Position(PositionUpdate),
    /// Counters, title or draft of a chat changed.
    Payload(ChatSummary),
    /// The list load state changed.
    LoadState(LoadState),
    /// The archive folder changed.
    Archive {
        /// Which fields to refresh.
        reason: ArchiveUpdateReason,
        /// New archive data.
        snapshot: ArchiveSnapshot,
    },
}

/// Diffs produced by one controller call.
#[derive(Debug, Default)]
#[must_use = "the patch must reach the view layer"]
pub struct ListChange {
    /// Diffs to apply, in order.
    pub patch: Patch,
    /// Follow-up work for the view.
    pub flags: UpdateFlags,
    /// The last chat left the list.
    pub became_empty: bool,
}

impl ListChange {
    fn merge(self, outcome: SyncOutcome) -> Self {
        Self {
            patch: self.patch.chain(outcome.patch),
            flags: self.flags | outcome.flags,
            became_empty: self.became_empty || outcome.became_empty,
        }
    }

    fn single(op: Option<DiffOp>) -> Self {
        Self {
            patch: Patch::from_ops(op.into_iter().collect()),
            ..Self::default()
        }
    }
}

impl From<SyncOutcome> for ListChange {
    fn from(outcome: SyncOutcome) -> Self {
        Self::default().merge(outcome)
    }
}

struct ListState {
    view: ArchiveFolderView,
    filtered: bool,
    loading: bool,
}

/// Keeps one chat list in step with the backend.
pub struct ChatListController<B: ChatBackend> {
    backend: Arc<B>,
    scope: ChatListScope,
    page_size: usize,
    state: Mutex<ListState>,
}

impl<B: ChatBackend> ChatListController<B> {
    /// Create a controller for `scope`. Only the main list shows the archive entry.
    pub fn new(backend: Arc<B>, scope: ChatListScope, config: &ListConfig) -> Self {
        let archive = config.archive_enabled && scope == ChatListScope::Main;
        Self {
            backend,
            scope,
            page_size: config.page_size,
            state: Mutex::new(ListState {
                view: ArchiveFolderView::new(archive),
                filtered: false,
                loading: false,
            }),
        }
    }

    /// The list this controller shows.
    pub fn scope(&self) -> ChatListScope {
        self.scope
    }

    /// Apply one backend update.
    pub async fn apply(&self, update: BackendUpdate) -> ListChange {
        let mut state = self.state.lock().await;
        match update {
            BackendUpdate::Position(update) => {
                let chat_id = update.chat.id;
                let outcome = state.view.apply(update);
                if outcome.tail_discarded {
                    tracing::debug!(%chat_id, "Dropped insert at the tail of a partial list");
                }
                if outcome.became_empty {
                    tracing::debug!(scope = ?self.scope, "Chat list became empty");
                }
                outcome.into()
            }
            BackendUpdate::Payload(chat) => ListChange::single(state.view.update_payload(&chat)),
            BackendUpdate::LoadState(load_state) => {
                state.view.set_load_state(load_state);
                ListChange::default()
            }
            BackendUpdate::Archive { reason, snapshot } => {
                ListChange::single(state.view.update_archive(reason, &snapshot))
            }
        }
    }

    /// Load the next page. Returns an empty change once the list is complete
    /// or while another page is loading.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Backend`] if the page request fails.
    pub async fn load_more(&self) -> Result<ListChange, ControllerError> {
        {
            let mut state = self.state.lock().await;
            if state.loading || state.view.list().is_complete() {
                return Ok(ListChange::default());
            }
            state.loading = true;
        }

        let result = self.backend.load_chats(self.scope, self.page_size).await;

        let mut state = self.state.lock().await;
        state.loading = false;
        let page = match result {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(scope = ?self.scope, error = %e, "Failed to load chats");
                return Err(e.into());
            }
        };
        tracing::debug!(
            scope = ?self.scope,
            count = page.chats.len(),
            complete = page.complete,
            "Loaded chat page"
        );

        let mut change = ListChange::from(state.view.append_page(page.chats));
        state.view.set_load_state(if page.complete {
            LoadState::Complete
        } else {
            LoadState::MoreAvailable
        });
        if !state.view.is_initial_load_finished() {
            change = change.merge(state.view.finish_initial_load());
        }
        Ok(change)
    }

    /// Show or hide the archive entry.
    pub async fn set_archive_enabled(&self, enabled: bool) -> ListChange {
        let mut state = self.state.lock().await;
        state.view.set_enabled(enabled).into()
    }

    /// Mark the list as a filtered projection; filtered lists cannot be reordered.
    pub async fn set_filtered(&self, filtered: bool) {
        self.state.lock().await.filtered = filtered;
    }

    /// Whether drag handles should be offered.
    pub async fn can_drag(&self) -> bool {
        let state = self.state.lock().await;
        pinned::can_drag(&state.view, state.filtered)
    }

    /// Commit a drag of row `from` onto row `to` inside the pinned prefix.
    ///
    /// Sends exactly one `set_pinned_order` request. The list itself is not
    /// touched; the backend answers with position updates. A failed commit is
    /// logged and not reported.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Reorder`] if the gesture is not a valid
    /// pinned reorder.
    pub async fn reorder_pinned(
        &self,
        from: usize,
        to: usize,
    ) -> Result<PinnedOrder, ControllerError> {
        let order = {
            let state = self.state.lock().await;
            pinned::reorder(&state.view, from, to, state.filtered)?
        };
        if let Err(e) = self.backend.set_pinned_order(self.scope, &order.ids).await {
            tracing::warn!(scope = ?self.scope, error = %e, "Failed to commit pinned order");
        }
        Ok(order)
    }

    /// Number of rows, the archive entry included.
    pub async fn row_count(&self) -> usize {
        self.state.lock().await.view.row_count()
    }

    /// Whether the archive entry is shown.
    pub async fn has_archive(&self) -> bool {
        self.state.lock().await.view.has_archive()
    }

    /// Row of a chat, if it is in the list.
    pub async fn row_of(&self, chat_id: ChatId) -> Option<usize> {
        self.state.lock().await.view.row_of(chat_id)
    }

    /// Chat ids in list order.
    pub async fn chat_ids(&self) -> Vec<ChatId> {
        self.state.lock().await.view.list().index().ids()
    }

    /// Current load state.
    pub async fn load_state(&self) -> LoadState {
        self.state.lock().await.view.list().load_state()
    }
}
