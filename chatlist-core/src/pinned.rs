//! Drag-to-reorder of pinned chats.
//!
//! The special prefix of a list holds the archive entry, promoted chats and
//! pinned chats. Only pinned chats can be reordered. A drag between two rows
//! is translated into a new order of pinned ids, which the caller commits to
//! the backend. Nothing moves locally; the backend answers with position
//! updates.

use chatlist_types::ChatId;
use thiserror::Error;

use crate::archive::{ArchiveFolderView, Row};

/// Why a drag cannot be turned into a pinned order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReorderError {
    /// The row does not hold a pinned chat.
    #[error("row {position} does not hold a pinned chat")]
    NotPinned {
        /// Offending row.
        position: usize,
    },

    /// The list is a filtered projection.
    #[error("pinned chats cannot be reordered in a filtered list")]
    Filtered,

    /// The row falls outside the reorderable range.
    #[error("row {position} is outside the pinned range")]
    OutOfRange {
        /// Offending row.
        position: usize,
    },
}

/// The full pinned order to commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinnedOrder {
    /// Pinned chat ids, first row first.
    pub ids: Vec<ChatId>,
}

/// Rows in the special prefix and the pinned ids among them.
fn scan_prefix(view: &ArchiveFolderView) -> (usize, Vec<ChatId>) {
    let mut count = 0;
    let mut pinned = Vec::new();
    for position in 0..view.row_count() {
        match view.row(position) {
            Some(Row::Archive(_)) => count += 1,
            Some(Row::Chat(chat)) if chat.is_pinned_or_special() => {
                count += 1;
                if chat.pinned {
                    pinned.push(chat.id);
                }
            }
            _ => break,
        }
    }
    (count, pinned)
}

fn pinned_id(view: &ArchiveFolderView, position: usize) -> Result<ChatId, ReorderError> {
    match view.row(position) {
        Some(Row::Chat(chat)) if chat.pinned => Ok(chat.id),
        _ => Err(ReorderError::NotPinned { position }),
    }
}

/// Whether the view offers drag handles at all.
pub fn can_drag(view: &ArchiveFolderView, filtered: bool) -> bool {
    !filtered && scan_prefix(view).0 >= 2
}

/// Compute the pinned order after dragging row `from` onto row `to`.
pub fn reorder(
    view: &ArchiveFolderView,
    from: usize,
    to: usize,
    filtered: bool,
) -> Result<PinnedOrder, ReorderError> {
    if filtered {
        return Err(ReorderError::Filtered);
    }
    let from_id = pinned_id(view, from)?;
    let to_id = pinned_id(view, to)?;

    // Promoted chats can sit between pinned rows.
    let (_, mut ids) = scan_prefix(view);
    let index_of = |id: ChatId, position: usize| {
        ids.iter()
            .position(|pinned| *pinned == id)
            .ok_or(ReorderError::OutOfRange { position })
    };
    let from_index = index_of(from_id, from)?;
    let to_index = index_of(to_id, to)?;

    let moved = ids.remove(from_index);
    ids.insert(to_index, moved);
    Ok(PinnedOrder { ids })
}
