//! Ordered, duplicate-free chat index.
//!
//! The index keeps chats sorted by `(order_key desc, id desc)` together with
//! a companion map of present ids. The map answers membership in O(1) and
//! carries the stored key, so a chat can be located by binary search instead
//! of a linear scan.

use chatlist_types::{ChatId, ChatPayload, ChatSummary, OrderKey};
use std::cmp::Ordering;
use std::collections::HashMap;
use thiserror::Error;

/// A broken structural invariant reported by [`OrderedChatIndex::check_invariants`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    /// The id map and the sequence disagree on size.
    #[error("id map holds {map} ids but sequence holds {sequence} chats")]
    SizeMismatch {
        /// Entries in the id map.
        map: usize,
        /// Entries in the sequence.
        sequence: usize,
    },
    /// A chat in the sequence is missing from the map or carries another key.
    #[error("chat {id} at {position} disagrees with the id map")]
    MapMismatch {
        /// Offending chat.
        id: ChatId,
        /// Its position.
        position: usize,
    },
    /// Two neighbours are not in list order.
    #[error("chats at {position} and {} are out of order", position + 1)]
    OutOfOrder {
        /// Position of the first chat of the pair.
        position: usize,
    },
}

/// Compare two `(key, id)` slots in list order.
fn slot_order(a_key: OrderKey, a_id: ChatId, b_key: OrderKey, b_id: ChatId) -> Ordering {
    b_key.cmp(&a_key).then_with(|| b_id.cmp(&a_id))
}

/// Sorted sequence of chat summaries with a companion id set.
#[derive(Debug, Default)]
pub struct OrderedChatIndex {
    chats: Vec<ChatSummary>,
    keys: HashMap<ChatId, OrderKey>,
}

impl OrderedChatIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of chats.
    pub fn len(&self) -> usize {
        self.chats.len()
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.chats.is_empty()
    }

    /// Whether a chat with this id is present.
    pub fn contains(&self, id: ChatId) -> bool {
        self.keys.contains_key(&id)
    }

    /// Chat at `position`.
    pub fn get(&self, position: usize) -> Option<&ChatSummary> {
        self.chats.get(position)
    }

    /// Last chat of the sequence.
    pub fn last(&self) -> Option<&ChatSummary> {
        self.chats.last()
    }

    /// Iterate chats in list order.
    pub fn iter(&self) -> impl Iterator<Item = &ChatSummary> {
        self.chats.iter()
    }

    /// Ids in list order.
    pub fn ids(&self) -> Vec<ChatId> {
        self.chats.iter().map(|chat| chat.id).collect()
    }

    /// Position of the chat with this id.
    pub fn locate(&self, id: ChatId) -> Option<usize> {
        let key = *self.keys.get(&id)?;
        self.chats
            .binary_search_by(|probe| slot_order(probe.order_key, probe.id, key, id))
            .ok()
    }

    /// Position at which `chat` would be inserted.
    pub fn insertion_point(&self, chat: &ChatSummary) -> usize {
        self.chats
            .partition_point(|probe| probe.list_order(chat) == Ordering::Less)
    }

    /// Insert a chat at its sorted position and return that position.
    ///
    /// # Panics
    ///
    /// Panics if a chat with the same id is already present. A duplicate can
    /// only come from a broken caller, and continuing would corrupt the view.
    pub fn insert(&mut self, chat: ChatSummary) -> usize {
        assert!(
            !self.keys.contains_key(&chat.id),
            "chat {} is already present in the list",
            chat.id
        );
        let position = self.insertion_point(&chat);
        self.keys.insert(chat.id, chat.order_key);
        self.chats.insert(position, chat);
        position
    }

    /// Remove and return the chat at `position`.
    ///
    /// # Panics
    ///
    /// Panics if `position` is out of bounds.
    pub fn remove_at(&mut self, position: usize) -> ChatSummary {
        let chat = self.chats.remove(position);
        self.keys.remove(&chat.id);
        chat
    }

    /// Change the key and pin state of the chat at `position`.
    ///
    /// The whole sequence is re-sorted afterwards. Returns the new position.
    ///
    /// # Panics
    ///
    /// Panics if `position` is out of bounds.
    pub fn update_key(&mut self, position: usize, key: OrderKey, pinned: bool) -> usize {
        let chat = &mut self.chats[position];
        let id = chat.id;
        chat.order_key = key;
        chat.pinned = pinned;
        self.keys.insert(id, key);
        self.chats.sort_by(ChatSummary::list_order);
        self.locate(id).unwrap_or(position)
    }

    /// Replace every non-ordering field of the chat at `position`.
    ///
    /// The key is kept from the stored chat, so the sequence stays sorted.
    ///
    /// # Panics
    ///
    /// Panics if `position` is out of bounds or holds another chat.
    pub fn refresh(&mut self, position: usize, mut chat: ChatSummary) {
        let stored = &mut self.chats[position];
        assert_eq!(stored.id, chat.id, "refresh targets another chat");
        chat.order_key = stored.order_key;
        *stored = chat;
    }

    /// Replace the payload of a chat in place. Returns its position.
    pub fn update_payload(&mut self, id: ChatId, payload: ChatPayload) -> Option<usize> {
        let position = self.locate(id)?;
        self.chats[position].payload = payload;
        Some(position)
    }

    /// Number of leading chats that are pinned or promoted.
    pub fn pinned_prefix_len(&self) -> usize {
        self.chats
            .iter()
            .take_while(|chat| chat.is_pinned_or_special())
            .count()
    }

    /// Whether no ordinary chat sits between two pinned or promoted chats.
    pub fn is_pinned_prefix_contiguous(&self) -> bool {
        let prefix = self.pinned_prefix_len();
        self.chats[prefix..]
            .iter()
            .all(|chat| !chat.is_pinned_or_special())
    }

    /// Verify that the id map and the sorted sequence agree.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        if self.keys.len() != self.chats.len() {
            return Err(InvariantViolation::SizeMismatch {
                map: self.keys.len(),
                sequence: self.chats.len(),
            });
        }
        for (position, chat) in self.chats.iter().enumerate() {
            if self.keys.get(&chat.id) != Some(&chat.order_key) {
                return Err(InvariantViolation::MapMismatch {
                    id: chat.id,
                    position,
                });
            }
        }
        for (position, pair) in self.chats.windows(2).enumerate() {
            if pair[0].list_order(&pair[1]) != Ordering::Less {
                return Err(InvariantViolation::OutOfOrder { position });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat(id: i64, key: i64) -> ChatSummary {
        ChatSummary::new(ChatId::new(id), OrderKey::new(key), &format!("chat {}", id))
    }

    fn index_of(chats: &[(i64, i64)]) -> OrderedChatIndex {
        let mut index = OrderedChatIndex::new();
        for &(id, key) in chats {
            index.insert(chat(id, key));
        }
        index
    }

    #[test]
    fn insert_keeps_descending_order() {
        let index = index_of(&[(1, 100), (2, 300), (3, 200)]);
        assert_eq!(
            index.ids(),
            vec![ChatId::new(2), ChatId::new(3), ChatId::new(1)]
        );
        index.check_invariants().unwrap();
    }

    #[test]
    fn equal_keys_order_by_id_descending() {
        let index = index_of(&[(1, 500), (2, 500)]);
        assert_eq!(index.ids(), vec![ChatId::new(2), ChatId::new(1)]);
    }

    #[test]
    fn locate_finds_every_chat() {
        let index = index_of(&[(1, 10), (2, 20), (3, 20), (4, 40), (5, 5)]);
        for (position, chat) in index.iter().enumerate() {
            assert_eq!(index.locate(chat.id), Some(position));
        }
        assert_eq!(index.locate(ChatId::new(99)), None);
    }

    #[test]
    #[should_panic(expected = "already present")]
    fn duplicate_insert_panics() {
        let mut index = index_of(&[(1, 100)]);
        index.insert(chat(1, 200));
    }

    #[test]
    fn remove_at_drops_from_map() {
        let mut index = index_of(&[(1, 100), (2, 200)]);
        let removed = index.remove_at(0);
        assert_eq!(removed.id, ChatId::new(2));
        assert!(!index.contains(ChatId::new(2)));
        assert_eq!(index.len(), 1);
        index.check_invariants().unwrap();
    }

    #[test]
    fn update_key_resorts() {
        let mut index = index_of(&[(1, 100), (2, 200), (3, 300)]);
        let position = index.locate(ChatId::new(1)).unwrap();
        let new_position = index.update_key(position, OrderKey::new(400), false);
        assert_eq!(new_position, 0);
        assert_eq!(index.locate(ChatId::new(1)), Some(0));
        index.check_invariants().unwrap();
    }

    #[test]
    fn refresh_keeps_stored_key() {
        let mut index = index_of(&[(1, 100)]);
        let mut updated = chat(1, 999);
        updated.payload.title = "renamed".into();
        index.refresh(0, updated);
        assert_eq!(index.get(0).unwrap().order_key, OrderKey::new(100));
        assert_eq!(index.get(0).unwrap().title(), "renamed");
        index.check_invariants().unwrap();
    }

    #[test]
    fn update_payload_in_place() {
        let mut index = index_of(&[(1, 100), (2, 200)]);
        let payload = ChatPayload {
            title: "x".into(),
            unread_count: 3,
            ..ChatPayload::default()
        };
        assert_eq!(index.update_payload(ChatId::new(1), payload), Some(1));
        assert_eq!(index.get(1).unwrap().payload.unread_count, 3);
        assert_eq!(
            index.update_payload(ChatId::new(7), ChatPayload::default()),
            None
        );
    }

    #[test]
    fn pinned_prefix() {
        let mut index = OrderedChatIndex::new();
        index.insert(chat(1, 1000).with_pinned(true));
        index.insert(chat(2, 900).with_promoted(true));
        index.insert(chat(3, 100));
        assert_eq!(index.pinned_prefix_len(), 2);
        assert!(index.is_pinned_prefix_contiguous());

        index.insert(chat(4, 50).with_pinned(true));
        assert!(!index.is_pinned_prefix_contiguous());
    }
}
