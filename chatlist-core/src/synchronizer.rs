//! Chat list synchronizer.
//!
//! Applies backend position updates to an [`OrderedChatIndex`] and turns each
//! one into the minimal set of view diffs plus follow-up flags.
//!
//! # Per-chat states
//!
//! ```text
//!              key != 0, not at an unproven tail
//!   ┌────────┐ ───────────────────────────────▶ ┌───────────────────┐
//!   │ Absent │                                  │ Present(position) │ ◀─┐ key changed
//!   └────────┘ ◀─────────────────────────────── └───────────────────┘ ──┘ (Moved)
//!                key == 0, or evicted at tail
//! ```
//!
//! While the list is not proven complete the synchronizer cannot know what
//! lies beyond its tail, so a chat landing exactly there is not shown.

use chatlist_types::{ChatSummary, DiffOp, OrderKey, Patch, UpdateFlags};

use crate::index::OrderedChatIndex;

/// How much of the list the backend has delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    /// The first page has not arrived yet.
    #[default]
    Loading,
    /// More pages can be requested.
    MoreAvailable,
    /// Every chat of the list has been delivered.
    Complete,
}

/// One position change reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionUpdate {
    /// Snapshot of the chat carrying its new key and pin state.
    pub chat: ChatSummary,
    /// The chat's source (sponsor, proxy) changed.
    pub source_changed: bool,
    /// The chat was pinned or unpinned.
    pub pin_state_changed: bool,
    /// The update belongs to the list this synchronizer shows.
    pub matches_scope: bool,
}

impl PositionUpdate {
    /// A plain position update for the current list.
    pub fn new(chat: ChatSummary) -> Self {
        Self {
            chat,
            source_changed: false,
            pin_state_changed: false,
            matches_scope: true,
        }
    }

    /// Mark the pin state as changed.
    pub fn with_pin_state_changed(mut self) -> Self {
        self.pin_state_changed = true;
        self
    }

    /// Mark the source as changed.
    pub fn with_source_changed(mut self) -> Self {
        self.source_changed = true;
        self
    }

    /// Mark the update as belonging to another list.
    pub fn out_of_scope(mut self) -> Self {
        self.matches_scope = false;
        self
    }

    fn metadata_changed(&self) -> bool {
        self.source_changed || self.pin_state_changed
    }
}

/// Result of applying one mutation.
#[derive(Debug, Default)]
#[must_use = "the patch must reach the view layer"]
pub struct SyncOutcome {
    /// Diffs to apply, in order.
    pub patch: Patch,
    /// Follow-up work for the caller.
    pub flags: UpdateFlags,
    /// The last chat left the list.
    pub became_empty: bool,
    /// A new chat landed at the tail of an unproven list and was not shown.
    pub tail_discarded: bool,
}

impl SyncOutcome {
    fn nothing(flags: UpdateFlags) -> Self {
        Self {
            flags,
            ..Self::default()
        }
    }
}

/// Row traits that decide whether a separator is drawn between two rows.
type Edge = (bool, bool);

fn edge(chat: &ChatSummary) -> Edge {
    (chat.archived, chat.is_pinned_or_special())
}

fn needs_separator(a: Option<Edge>, b: Option<Edge>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a != b)
}

/// Keeps an ordered chat list in step with backend position updates.
#[derive(Debug, Default)]
pub struct ChatListSynchronizer {
    index: OrderedChatIndex,
    load_state: LoadState,
}

impl ChatListSynchronizer {
    /// Create an empty synchronizer waiting for its first page.
    pub fn new() -> Self {
        Self::default()
    }

    /// The underlying index.
    pub fn index(&self) -> &OrderedChatIndex {
        &self.index
    }

    /// Number of chats.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Check if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Current load state.
    pub fn load_state(&self) -> LoadState {
        self.load_state
    }

    /// Whether the backend has delivered every chat.
    pub fn is_complete(&self) -> bool {
        self.load_state == LoadState::Complete
    }

    /// Record how much of the list has been delivered.
    pub fn set_load_state(&mut self, state: LoadState) {
        self.load_state = state;
    }

    fn edge_at(&self, position: Option<usize>) -> Option<Edge> {
        position.and_then(|p| self.index.get(p)).map(edge)
    }

    /// Apply one position update.
    pub fn apply(&mut self, update: PositionUpdate) -> SyncOutcome {
        let present = self.index.locate(update.chat.id);

        if !update.matches_scope {
            if present.is_some() {
                self.index.update_payload(update.chat.id, update.chat.payload);
            }
            return SyncOutcome::nothing(UpdateFlags::NONE);
        }

        let key = update.chat.order_key;
        match (present, key.is_member()) {
            (None, false) => SyncOutcome::nothing(UpdateFlags::NONE),
            (Some(position), false) => self.remove(position, update.metadata_changed()),
            (None, true) => self.insert(update),
            (Some(position), true) => {
                let stored = self.index.get(position).map(|chat| chat.order_key);
                if stored == Some(key) {
                    self.refresh(position, update)
                } else {
                    self.reposition(position, update)
                }
            }
        }
    }

    fn remove(&mut self, position: usize, metadata_changed: bool) -> SyncOutcome {
        let removed = self.index.remove_at(position);
        let prev = self.edge_at(position.checked_sub(1));
        let next = self.edge_at(Some(position));
        let removed = Some(edge(&removed));

        let mut flags = UpdateFlags::NONE;
        flags.set_if(
            UpdateFlags::INVALIDATE_DECORATIONS,
            metadata_changed
                || needs_separator(prev, removed)
                || needs_separator(next, removed)
                || needs_separator(prev, next),
        );
        SyncOutcome {
            patch: Patch::from_ops(vec![DiffOp::Removed { position }]),
            flags,
            became_empty: self.index.is_empty(),
            tail_discarded: false,
        }
    }

    fn insert(&mut self, update: PositionUpdate) -> SyncOutcome {
        let metadata_changed = update.metadata_changed();
        let at = self.index.insertion_point(&update.chat);
        if at == self.index.len() && !self.is_complete() {
            return SyncOutcome {
                tail_discarded: true,
                ..SyncOutcome::default()
            };
        }

        let position = self.index.insert(update.chat);
        let inserted = self.edge_at(Some(position));
        let mut flags = UpdateFlags::RETAIN_SCROLL_ANCHOR;
        flags.set_if(
            UpdateFlags::INVALIDATE_DECORATIONS,
            metadata_changed
                || needs_separator(self.edge_at(position.checked_sub(1)), inserted)
                || needs_separator(self.edge_at(Some(position + 1)), inserted),
        );
        SyncOutcome {
            patch: Patch::from_ops(vec![DiffOp::Inserted { position, count: 1 }]),
            flags,
            became_empty: false,
            tail_discarded: false,
        }
    }

    fn refresh(&mut self, position: usize, update: PositionUpdate) -> SyncOutcome {
        let mut flags = UpdateFlags::NONE;
        flags.set_if(
            UpdateFlags::INVALIDATE_DECORATIONS,
            update.metadata_changed(),
        );
        self.index.refresh(position, update.chat);
        SyncOutcome::nothing(flags)
    }

    fn reposition(&mut self, from: usize, update: PositionUpdate) -> SyncOutcome {
        let metadata_changed = update.metadata_changed();
        let old_key: OrderKey = self
            .index
            .get(from)
            .map(|chat| chat.order_key)
            .unwrap_or(OrderKey::NONE);
        let old_edge = self.edge_at(Some(from));
        let prev = self.edge_at(from.checked_sub(1));
        let next = self.edge_at(Some(from + 1));
        let leaving_invalidates = metadata_changed
            || needs_separator(prev, old_edge)
            || needs_separator(next, old_edge)
            || needs_separator(prev, next);

        let new_key = update.chat.order_key;
        let to = self.index.update_key(from, new_key, update.chat.pinned);

        if to + 1 == self.index.len() && new_key < old_key && !self.is_complete() {
            self.index.remove_at(to);
            let mut flags = UpdateFlags::NONE;
            flags.set_if(UpdateFlags::INVALIDATE_DECORATIONS, leaving_invalidates);
            return SyncOutcome {
                patch: Patch::from_ops(vec![DiffOp::Removed { position: from }]),
                flags,
                became_empty: self.index.is_empty(),
                tail_discarded: false,
            };
        }

        self.index.refresh(to, update.chat);
        let new_edge = self.edge_at(Some(to));
        let above = self.edge_at(to.checked_sub(1));
        let below = self.edge_at(Some(to + 1));
        let invalidate = leaving_invalidates
            || needs_separator(above, below)
            || needs_separator(above, new_edge)
            || needs_separator(below, new_edge);

        let mut flags = UpdateFlags::NONE;
        flags.set_if(UpdateFlags::INVALIDATE_DECORATIONS, invalidate);
        if from == to {
            return SyncOutcome::nothing(flags);
        }
        flags |= UpdateFlags::RETAIN_SCROLL_ANCHOR;
        SyncOutcome {
            patch: Patch::from_ops(vec![DiffOp::Moved { from, to }]),
            flags,
            became_empty: false,
            tail_discarded: false,
        }
    }

    /// Append a page delivered by list loading.
    ///
    /// Ids already present and chats without a key are skipped.
    pub fn append_page(&mut self, chats: Vec<ChatSummary>) -> SyncOutcome {
        let start = self.index.len();
        let last_edge = self.edge_at(start.checked_sub(1));
        let mut positions = Vec::with_capacity(chats.len());
        for chat in chats {
            if !chat.order_key.is_member() || self.index.contains(chat.id) {
                continue;
            }
            positions.push(self.index.insert(chat));
        }
        if positions.is_empty() {
            return SyncOutcome::default();
        }

        let contiguous = positions
            .iter()
            .enumerate()
            .all(|(offset, &position)| position == start + offset);
        let mut ops = if contiguous {
            vec![DiffOp::Inserted {
                position: start,
                count: positions.len(),
            }]
        } else {
            positions
                .iter()
                .map(|&position| DiffOp::Inserted { position, count: 1 })
                .collect()
        };

        let mut flags = UpdateFlags::NONE;
        let first_added = self.edge_at(Some(start));
        if contiguous && last_edge.map(|e| e.1) != first_added.map(|e| e.1) && start > 0 {
            ops.push(DiffOp::Changed {
                position: start - 1,
            });
            flags |= UpdateFlags::INVALIDATE_DECORATIONS;
        }
        SyncOutcome {
            patch: Patch::from_ops(ops),
            flags,
            became_empty: false,
            tail_discarded: false,
        }
    }

    /// Replace a chat's payload without touching its position.
    pub fn update_payload(&mut self, chat: &ChatSummary) -> Option<DiffOp> {
        self.index
            .update_payload(chat.id, chat.payload.clone())
            .map(|position| DiffOp::Changed { position })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatlist_types::ChatId;

    fn chat(id: i64, key: i64) -> ChatSummary {
        ChatSummary::new(ChatId::new(id), OrderKey::new(key), &format!("chat {}", id))
    }

    fn complete_with(chats: &[(i64, i64)]) -> ChatListSynchronizer {
        let mut sync = ChatListSynchronizer::new();
        sync.set_load_state(LoadState::Complete);
        let _ = sync.append_page(chats.iter().map(|&(id, key)| chat(id, key)).collect());
        sync
    }

    fn ops(outcome: SyncOutcome) -> Vec<DiffOp> {
        outcome.patch.collect()
    }

    // ===========================================
    // Insertion
    // ===========================================

    #[test]
    fn equal_keys_insert_as_b_then_a() {
        let mut sync = complete_with(&[]);
        let first = sync.apply(PositionUpdate::new(chat(1, 500)));
        assert_eq!(
            ops(first),
            vec![DiffOp::Inserted {
                position: 0,
                count: 1
            }]
        );
        let second = sync.apply(PositionUpdate::new(chat(2, 500)));
        assert!(second.flags.contains(UpdateFlags::RETAIN_SCROLL_ANCHOR));
        assert_eq!(
            ops(second),
            vec![DiffOp::Inserted {
                position: 0,
                count: 1
            }]
        );
        assert_eq!(sync.index().ids(), vec![ChatId::new(2), ChatId::new(1)]);
    }

    #[test]
    fn insert_at_unproven_tail_is_discarded() {
        let mut sync = ChatListSynchronizer::new();
        sync.set_load_state(LoadState::MoreAvailable);
        let _ = sync.append_page(vec![chat(1, 300), chat(2, 200)]);

        let outcome = sync.apply(PositionUpdate::new(chat(3, 100)));
        assert!(outcome.tail_discarded);
        assert!(outcome.patch.is_empty());
        assert_eq!(sync.len(), 2);

        let outcome = sync.apply(PositionUpdate::new(chat(4, 250)));
        assert!(!outcome.tail_discarded);
        assert_eq!(
            ops(outcome),
            vec![DiffOp::Inserted {
                position: 1,
                count: 1
            }]
        );
    }

    #[test]
    fn insert_at_tail_of_complete_list_is_shown() {
        let mut sync = complete_with(&[(1, 300)]);
        let outcome = sync.apply(PositionUpdate::new(chat(2, 100)));
        assert_eq!(
            ops(outcome),
            vec![DiffOp::Inserted {
                position: 1,
                count: 1
            }]
        );
    }

    #[test]
    fn zero_key_for_absent_chat_is_noop() {
        let mut sync = complete_with(&[(1, 300)]);
        let outcome = sync.apply(PositionUpdate::new(chat(2, 0)));
        assert!(outcome.patch.is_empty());
        assert_eq!(sync.len(), 1);
    }

    // ===========================================
    // Removal
    // ===========================================

    #[test]
    fn removal_signals_empty_only_at_zero() {
        let mut sync = ChatListSynchronizer::new();
        sync.set_load_state(LoadState::MoreAvailable);
        let _ = sync.append_page(vec![chat(1, 500), chat(2, 400)]);

        let outcome = sync.apply(PositionUpdate::new(chat(1, 0)));
        assert!(!outcome.became_empty);
        assert_eq!(ops(outcome), vec![DiffOp::Removed { position: 0 }]);
        assert_eq!(sync.len(), 1);

        let outcome = sync.apply(PositionUpdate::new(chat(2, 0)));
        assert!(outcome.became_empty);
        assert_eq!(ops(outcome), vec![DiffOp::Removed { position: 0 }]);
        assert!(sync.is_empty());
    }

    #[test]
    fn removing_last_pinned_invalidates_decorations() {
        let mut sync = ChatListSynchronizer::new();
        sync.set_load_state(LoadState::Complete);
        let _ = sync.append_page(vec![chat(1, 900).with_pinned(true), chat(2, 100)]);
        let outcome = sync.apply(PositionUpdate::new(chat(1, 0)));
        assert!(outcome.flags.contains(UpdateFlags::INVALIDATE_DECORATIONS));
    }

    // ===========================================
    // Moves
    // ===========================================

    #[test]
    fn key_increase_moves_chat() {
        let mut sync = complete_with(&[(1, 300), (2, 200), (3, 100)]);
        let outcome = sync.apply(PositionUpdate::new(chat(3, 400)));
        assert!(outcome.flags.contains(UpdateFlags::RETAIN_SCROLL_ANCHOR));
        assert_eq!(ops(outcome), vec![DiffOp::Moved { from: 2, to: 0 }]);
        assert_eq!(
            sync.index().ids(),
            vec![ChatId::new(3), ChatId::new(1), ChatId::new(2)]
        );
        sync.index().check_invariants().unwrap();
    }

    #[test]
    fn key_change_without_position_change_has_no_diff() {
        let mut sync = complete_with(&[(1, 300), (2, 200), (3, 100)]);
        let outcome = sync.apply(PositionUpdate::new(chat(2, 250)));
        assert!(outcome.patch.is_empty());
        assert!(!outcome.flags.contains(UpdateFlags::RETAIN_SCROLL_ANCHOR));
    }

    #[test]
    fn key_decrease_to_unproven_tail_evicts() {
        let mut sync = ChatListSynchronizer::new();
        sync.set_load_state(LoadState::MoreAvailable);
        let _ = sync.append_page(vec![chat(1, 300), chat(2, 200), chat(3, 100)]);

        let outcome = sync.apply(PositionUpdate::new(chat(1, 50)));
        assert_eq!(ops(outcome), vec![DiffOp::Removed { position: 0 }]);
        assert!(!sync.index().contains(ChatId::new(1)));
        assert_eq!(sync.len(), 2);
        sync.index().check_invariants().unwrap();
    }

    #[test]
    fn key_decrease_in_complete_list_moves_to_tail() {
        let mut sync = complete_with(&[(1, 300), (2, 200), (3, 100)]);
        let outcome = sync.apply(PositionUpdate::new(chat(1, 50)));
        assert_eq!(ops(outcome), vec![DiffOp::Moved { from: 0, to: 2 }]);
    }

    #[test]
    fn replaying_update_is_idempotent() {
        let mut sync = complete_with(&[(1, 300), (2, 200), (3, 100)]);
        let update = PositionUpdate::new(chat(3, 400));

        let first = sync.apply(update.clone());
        assert!(first.patch.has_structural_change());

        let second = sync.apply(update);
        assert!(!second.patch.has_structural_change());
        assert!(second.patch.is_empty());
        assert_eq!(sync.len(), 3);
    }

    #[test]
    fn pin_state_change_alone_invalidates_decorations() {
        let mut sync = complete_with(&[(1, 300), (2, 200)]);
        let update = PositionUpdate::new(chat(2, 200).with_pinned(true)).with_pin_state_changed();
        let outcome = sync.apply(update);
        assert!(outcome.patch.is_empty());
        assert!(outcome.flags.contains(UpdateFlags::INVALIDATE_DECORATIONS));
        assert!(sync.index().get(1).unwrap().pinned);
    }

    #[test]
    fn out_of_scope_update_only_refreshes_payload() {
        let mut sync = complete_with(&[(1, 300)]);
        let mut other = chat(1, 0);
        other.payload.unread_count = 4;
        let outcome = sync.apply(PositionUpdate::new(other).out_of_scope());
        assert!(outcome.patch.is_empty());
        assert_eq!(sync.len(), 1);
        assert_eq!(sync.index().get(0).unwrap().payload.unread_count, 4);
    }

    // ===========================================
    // Paging
    // ===========================================

    #[test]
    fn append_page_skips_present_ids() {
        let mut sync = ChatListSynchronizer::new();
        let _ = sync.append_page(vec![chat(1, 300), chat(2, 200)]);
        let outcome = sync.append_page(vec![chat(2, 200), chat(3, 100), chat(4, 50)]);
        assert_eq!(
            ops(outcome),
            vec![DiffOp::Inserted {
                position: 2,
                count: 2
            }]
        );
        assert_eq!(sync.len(), 4);
    }

    #[test]
    fn append_page_across_pinned_boundary_rebinds_previous_tail() {
        let mut sync = ChatListSynchronizer::new();
        let _ = sync.append_page(vec![chat(1, 900).with_pinned(true)]);
        let outcome = sync.append_page(vec![chat(2, 100)]);
        assert!(outcome.flags.contains(UpdateFlags::INVALIDATE_DECORATIONS));
        assert_eq!(
            ops(outcome),
            vec![
                DiffOp::Inserted {
                    position: 1,
                    count: 1
                },
                DiffOp::Changed { position: 0 },
            ]
        );
    }

    #[test]
    fn update_payload_reports_changed_row() {
        let mut sync = complete_with(&[(1, 300), (2, 200)]);
        let mut refreshed = chat(2, 200);
        refreshed.payload.draft = Some("hi".into());
        assert_eq!(
            sync.update_payload(&refreshed),
            Some(DiffOp::Changed { position: 1 })
        );
        assert_eq!(sync.update_payload(&chat(9, 1)), None);
    }
}
