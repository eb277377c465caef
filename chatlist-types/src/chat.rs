//! Chat summaries as held by the ordered list.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::{ChatId, OrderKey};

/// Which chat list a summary, an update, or a search belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(tag = "list", content = "id", rename_all = "snake_case")]
pub enum ChatListScope {
    /// The main chat list.
    #[default]
    Main,
    /// The archived chats.
    Archive,
    /// A user-defined folder.
    Folder(i32),
}

/// Coarse chat type, only consulted by search filter flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatKind {
    /// One-to-one chat with a user.
    Private {
        /// Whether the other side is a bot.
        #[serde(default)]
        is_bot: bool,
        /// Whether the other side is in the contact list.
        #[serde(default)]
        is_contact: bool,
        /// Whether this is the official support chat.
        #[serde(default)]
        is_support: bool,
    },
    /// End-to-end encrypted one-to-one chat.
    Secret,
    /// Basic group or supergroup.
    Group,
    /// Broadcast channel.
    Channel,
}

impl Default for ChatKind {
    fn default() -> Self {
        ChatKind::Private {
            is_bot: false,
            is_contact: false,
            is_support: false,
        }
    }
}

impl ChatKind {
    /// Private or secret chat with a single user.
    pub fn is_user_chat(&self) -> bool {
        matches!(self, ChatKind::Private { .. } | ChatKind::Secret)
    }

    /// Private chat with a bot.
    pub fn is_bot(&self) -> bool {
        matches!(self, ChatKind::Private { is_bot: true, .. })
    }

    /// Private chat with a contact.
    pub fn is_contact(&self) -> bool {
        matches!(self, ChatKind::Private { is_contact: true, .. })
    }

    /// Official support chat.
    pub fn is_support(&self) -> bool {
        matches!(self, ChatKind::Private { is_support: true, .. })
    }
}

/// Presentation payload carried by a summary.
///
/// Never interpreted by the list logic; it is only stored, replaced and handed
/// back to the view layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ChatPayload {
    /// Display title.
    pub title: String,
    /// Unread message counter.
    #[serde(default)]
    pub unread_count: u32,
    /// Unread mention counter.
    #[serde(default)]
    pub unread_mention_count: u32,
    /// Preview of the last message.
    #[serde(default)]
    pub last_message: Option<String>,
    /// Draft text, if any.
    #[serde(default)]
    pub draft: Option<String>,
}

/// A chat as it appears in an ordered list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSummary {
    /// Stable identity.
    pub id: ChatId,
    /// Sort key inside the list; [`OrderKey::NONE`] means "not in the list".
    #[serde(default)]
    pub order_key: OrderKey,
    /// Pinned by the user.
    #[serde(default)]
    pub pinned: bool,
    /// Lives in the archive folder.
    #[serde(default)]
    pub archived: bool,
    /// Sponsored entry shown in the special prefix; never user-reorderable.
    #[serde(default)]
    pub promoted: bool,
    /// Coarse chat type.
    #[serde(default)]
    pub kind: ChatKind,
    /// Whether the current user may post basic messages here.
    #[serde(default = "default_can_send")]
    pub can_send_messages: bool,
    /// Public handle, without the leading `@`.
    #[serde(default)]
    pub username: Option<String>,
    /// Opaque presentation payload.
    #[serde(default)]
    pub payload: ChatPayload,
}

fn default_can_send() -> bool {
    true
}

impl ChatSummary {
    /// Create a minimal summary with a title and an order key.
    pub fn new(id: ChatId, order_key: OrderKey, title: &str) -> Self {
        Self {
            id,
            order_key,
            pinned: false,
            archived: false,
            promoted: false,
            kind: ChatKind::default(),
            can_send_messages: true,
            username: None,
            payload: ChatPayload {
                title: title.to_string(),
                ..ChatPayload::default()
            },
        }
    }

    /// Mark the chat as pinned.
    pub fn with_pinned(mut self, pinned: bool) -> Self {
        self.pinned = pinned;
        self
    }

    /// Mark the chat as a promoted entry.
    pub fn with_promoted(mut self, promoted: bool) -> Self {
        self.promoted = promoted;
        self
    }

    /// Set the chat kind.
    pub fn with_kind(mut self, kind: ChatKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the public handle.
    pub fn with_username(mut self, username: &str) -> Self {
        self.username = Some(username.to_string());
        self
    }

    /// Display title from the payload.
    pub fn title(&self) -> &str {
        &self.payload.title
    }

    /// Part of the pinned/special prefix (pinned or promoted).
    pub fn is_pinned_or_special(&self) -> bool {
        self.pinned || self.promoted
    }

    /// List order: `order_key` descending, ties broken by `id` descending.
    pub fn list_order(&self, other: &Self) -> Ordering {
        other
            .order_key
            .cmp(&self.order_key)
            .then_with(|| other.id.cmp(&self.id))
    }
}
