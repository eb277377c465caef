//! Archive folder view.
//!
//! Wraps a [`ChatListSynchronizer`] and shows a synthetic "archive" row at
//! position 0 whenever the main list is non-empty. Every diff coming out of
//! the inner list is shifted by one row while that entry is visible.

use chatlist_types::{ChatId, ChatSummary, DiffOp, Patch, UpdateFlags};

use crate::synchronizer::{ChatListSynchronizer, LoadState, PositionUpdate, SyncOutcome};

/// Row index of the synthetic archive entry.
pub const ARCHIVE_ROW: usize = 0;

/// What the archive entry displays.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArchiveSnapshot {
    /// Unread chats inside the archive.
    pub unread_count: u32,
    /// Unread mentions inside the archive.
    pub unread_mention_count: u32,
    /// Preview of the newest archived message.
    pub last_message: Option<String>,
    /// Number of archived chats.
    pub chat_count: usize,
}

/// Which part of the archive entry to refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveUpdateReason {
    /// Unread counters only.
    Counter,
    /// Last message preview only.
    LastMessage,
    /// Everything.
    Full,
}

/// A row as seen by the view layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Row<'a> {
    /// The synthetic archive entry.
    Archive(&'a ArchiveSnapshot),
    /// A real chat.
    Chat(&'a ChatSummary),
}

/// Chat list with an optional archive entry at row 0.
#[derive(Debug, Default)]
pub struct ArchiveFolderView {
    list: ChatListSynchronizer,
    enabled: bool,
    initial_load_finished: bool,
    entry: Option<ArchiveSnapshot>,
    snapshot: ArchiveSnapshot,
}

impl ArchiveFolderView {
    /// Create a view over an empty list.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            ..Self::default()
        }
    }

    /// The inner synchronizer.
    pub fn list(&self) -> &ChatListSynchronizer {
        &self.list
    }

    /// Whether the archive entry is currently shown.
    pub fn has_archive(&self) -> bool {
        self.entry.is_some()
    }

    fn offset(&self) -> usize {
        usize::from(self.has_archive())
    }

    /// Number of real chats.
    pub fn chat_count(&self) -> usize {
        self.list.len()
    }

    /// Number of rows, archive entry included.
    pub fn row_count(&self) -> usize {
        self.list.len() + self.offset()
    }

    /// Row at `position`.
    pub fn row(&self, position: usize) -> Option<Row<'_>> {
        match &self.entry {
            Some(entry) if position == ARCHIVE_ROW => Some(Row::Archive(entry)),
            Some(_) => self.list.index().get(position - 1).map(Row::Chat),
            None => self.list.index().get(position).map(Row::Chat),
        }
    }

    /// Row holding the chat with this id.
    pub fn row_of(&self, id: ChatId) -> Option<usize> {
        self.list
            .index()
            .locate(id)
            .map(|position| position + self.offset())
    }

    /// Enable or disable the archive entry.
    pub fn set_enabled(&mut self, enabled: bool) -> SyncOutcome {
        if self.enabled == enabled {
            return SyncOutcome::default();
        }
        self.enabled = enabled;
        self.settle(SyncOutcome::default())
    }

    /// Mark the first page as delivered, allowing the entry to appear.
    pub fn finish_initial_load(&mut self) -> SyncOutcome {
        if self.initial_load_finished {
            return SyncOutcome::default();
        }
        self.initial_load_finished = true;
        self.settle(SyncOutcome::default())
    }

    /// Whether the first page has been delivered.
    pub fn is_initial_load_finished(&self) -> bool {
        self.initial_load_finished
    }

    /// Apply one position update.
    pub fn apply(&mut self, update: PositionUpdate) -> SyncOutcome {
        let offset = self.offset();
        let outcome = self.list.apply(update);
        self.settle(shift(outcome, offset))
    }

    /// Append a loaded page.
    pub fn append_page(&mut self, chats: Vec<ChatSummary>) -> SyncOutcome {
        let offset = self.offset();
        let outcome = self.list.append_page(chats);
        self.settle(shift(outcome, offset))
    }

    /// Record how much of the list has been delivered.
    pub fn set_load_state(&mut self, state: LoadState) {
        self.list.set_load_state(state);
    }

    /// Replace a chat's payload in place.
    pub fn update_payload(&mut self, chat: &ChatSummary) -> Option<DiffOp> {
        let offset = self.offset();
        self.list.update_payload(chat).map(|op| op.shifted(offset))
    }

    /// Refresh the archive entry. Returns `Changed(0)` when it is shown.
    ///
    /// The snapshot is remembered even while the entry is hidden so it
    /// appears with current data.
    pub fn update_archive(
        &mut self,
        reason: ArchiveUpdateReason,
        snapshot: &ArchiveSnapshot,
    ) -> Option<DiffOp> {
        merge_snapshot(&mut self.snapshot, reason, snapshot);
        let entry = self.entry.as_mut()?;
        merge_snapshot(entry, reason, snapshot);
        Some(DiffOp::Changed {
            position: ARCHIVE_ROW,
        })
    }

    /// Add or drop the archive entry so it matches the current state.
    fn settle(&mut self, mut outcome: SyncOutcome) -> SyncOutcome {
        let wanted = self.enabled && self.initial_load_finished && !self.list.is_empty();
        if wanted == self.has_archive() {
            return outcome;
        }
        let op = if wanted {
            self.entry = Some(self.snapshot.clone());
            DiffOp::Inserted {
                position: ARCHIVE_ROW,
                count: 1,
            }
        } else {
            self.entry = None;
            DiffOp::Removed {
                position: ARCHIVE_ROW,
            }
        };
        outcome.patch = outcome.patch.chain(Patch::from_ops(vec![op]));
        outcome.flags |= UpdateFlags::INVALIDATE_DECORATIONS;
        outcome
    }
}

fn shift(outcome: SyncOutcome, offset: usize) -> SyncOutcome {
    SyncOutcome {
        patch: outcome.patch.shifted(offset),
        ..outcome
    }
}

fn merge_snapshot(target: &mut ArchiveSnapshot, reason: ArchiveUpdateReason, from: &ArchiveSnapshot) {
    match reason {
        ArchiveUpdateReason::Counter => {
            target.unread_count = from.unread_count;
            target.unread_mention_count = from.unread_mention_count;
        }
        ArchiveUpdateReason::LastMessage => {
            target.last_message = from.last_message.clone();
        }
        ArchiveUpdateReason::Full => {
            *target = from.clone();
        }
    }
}
