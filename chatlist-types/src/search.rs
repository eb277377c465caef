//! Search results, flags and the event stream delivered to the view layer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign, Sub};

use crate::{ChatId, ChatSummary, ContextId, MessageId};

/// Option bits controlling which search stages run and which chats qualify.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchFlags(u32);

impl SearchFlags {
    /// No options.
    pub const NONE: SearchFlags = SearchFlags(0);
    /// Show top chats for an empty query.
    pub const NEED_TOP_CHATS: SearchFlags = SearchFlags(1);
    /// Run the message stage.
    pub const NEED_MESSAGES: SearchFlags = SearchFlags(1 << 1);
    /// Run the public (global) chat stage.
    pub const NEED_GLOBAL_SEARCH: SearchFlags = SearchFlags(1 << 2);
    /// Only chats the user can post in.
    pub const ONLY_WRITABLE: SearchFlags = SearchFlags(1 << 3);
    /// Only private and secret chats.
    pub const ONLY_USERS: SearchFlags = SearchFlags(1 << 4);
    /// Skip the chat stages entirely and go straight to messages.
    pub const NO_CHATS: SearchFlags = SearchFlags(1 << 5);
    /// Exclude bots.
    pub const NO_BOTS: SearchFlags = SearchFlags(1 << 6);
    /// Only private chats with contacts.
    pub const ONLY_CONTACTS: SearchFlags = SearchFlags(1 << 7);
    /// Exclude the self chat.
    pub const NO_SELF: SearchFlags = SearchFlags(1 << 8);
    /// Run every chat through the installed `SearchFilter`.
    pub const CUSTOM_FILTER: SearchFlags = SearchFlags(1 << 9);
    /// Ask for the group category of top chats instead of users.
    pub const TOP_CATEGORY_GROUPS: SearchFlags = SearchFlags(1 << 10);
    /// Exclude channels.
    pub const NO_CHANNELS: SearchFlags = SearchFlags(1 << 11);
    /// Exclude the support chat.
    pub const NO_SUPPORT: SearchFlags = SearchFlags(1 << 12);
    /// Exclude secret chats.
    pub const NO_SECRET: SearchFlags = SearchFlags(1 << 13);
    /// Exclude groups.
    pub const NO_GROUPS: SearchFlags = SearchFlags(1 << 14);

    /// Bits that turn the result into a filtered projection.
    pub const FILTER_FLAGS: SearchFlags = SearchFlags(
        Self::ONLY_WRITABLE.0
            | Self::ONLY_USERS.0
            | Self::NO_BOTS.0
            | Self::ONLY_CONTACTS.0
            | Self::NO_SELF.0
            | Self::CUSTOM_FILTER.0
            | Self::NO_CHANNELS.0
            | Self::NO_SUPPORT.0
            | Self::NO_SECRET.0
            | Self::NO_GROUPS.0,
    );

    /// Create flags from raw bits.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw bits.
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Whether every bit of `other` is set.
    pub const fn contains(&self, other: SearchFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether any bit of `other` is set.
    pub const fn intersects(&self, other: SearchFlags) -> bool {
        self.0 & other.0 != 0
    }

    /// Whether any filtering bit is set.
    pub const fn is_filtered(&self) -> bool {
        self.intersects(Self::FILTER_FLAGS)
    }
}

impl BitOr for SearchFlags {
    type Output = SearchFlags;

    fn bitor(self, rhs: SearchFlags) -> SearchFlags {
        SearchFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for SearchFlags {
    fn bitor_assign(&mut self, rhs: SearchFlags) {
        self.0 |= rhs.0;
    }
}

impl Sub for SearchFlags {
    type Output = SearchFlags;

    fn sub(self, rhs: SearchFlags) -> SearchFlags {
        SearchFlags(self.0 & !rhs.0)
    }
}

impl fmt::Debug for SearchFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SearchFlags({:#06x})", self.0)
    }
}

/// Which top-chat ranking to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TopChatCategory {
    /// People the user talks to most.
    #[default]
    Users,
    /// Groups the user talks in most.
    Groups,
}

impl From<SearchFlags> for TopChatCategory {
    fn from(flags: SearchFlags) -> Self {
        if flags.contains(SearchFlags::TOP_CATEGORY_GROUPS) {
            TopChatCategory::Groups
        } else {
            TopChatCategory::Users
        }
    }
}

/// A chat surfaced by a search stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoundChat {
    /// The chat itself.
    pub chat: ChatSummary,
    /// Found by the public directory search.
    #[serde(default)]
    pub is_global: bool,
    /// Query that produced this entry, used for highlighting.
    #[serde(default)]
    pub query: String,
}

impl FoundChat {
    /// Wrap a chat found by a local round.
    pub fn local(chat: ChatSummary, query: &str) -> Self {
        Self {
            chat,
            is_global: false,
            query: query.to_string(),
        }
    }

    /// Wrap a chat found by the public directory.
    pub fn global(chat: ChatSummary, query: &str) -> Self {
        Self {
            chat,
            is_global: true,
            query: query.to_string(),
        }
    }

    /// Id of the wrapped chat.
    pub fn id(&self) -> ChatId {
        self.chat.id
    }
}

/// A message hit from the message stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoundMessage {
    /// Chat the message lives in.
    pub chat_id: ChatId,
    /// Message id inside that chat.
    pub message_id: MessageId,
    /// Message text.
    pub text: String,
    /// Unix timestamp of the message.
    #[serde(default)]
    pub date: i64,
}

/// Opaque continuation token for message pagination.
///
/// The empty string is the backend's way of saying "no more pages", so it
/// never becomes a cursor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageCursor(String);

impl MessageCursor {
    /// Parse a raw token; `None` when the token is empty.
    pub fn from_token(token: &str) -> Option<Self> {
        if token.is_empty() {
            None
        } else {
            Some(Self(token.to_string()))
        }
    }

    /// The raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Everything the search pipeline reports to the view layer.
///
/// Counts and positions refer to the result list they name at the moment the
/// event is emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent {
    /// The search surface was opened.
    SessionOpened,
    /// The search surface was closed.
    SessionClosed,
    /// A new session started with a fresh context id.
    NewSearch {
        /// Context of the new session.
        context_id: ContextId,
        /// Whether the query is empty.
        is_default: bool,
    },

    /// Top chats appeared.
    TopChatsAdded {
        /// New top chats.
        chats: Vec<ChatSummary>,
        /// Background refresh, no visual emphasis wanted.
        silent: bool,
    },
    /// Top chats changed.
    TopChatsUpdated {
        /// Ids shown before.
        old_ids: Vec<ChatId>,
        /// Chats shown now.
        chats: Vec<ChatSummary>,
        /// Background refresh.
        silent: bool,
    },
    /// Top chats disappeared.
    TopChatsRemoved {
        /// Background refresh.
        silent: bool,
    },
    /// Cached top chats should be displayed for an empty query.
    TopChatsShown {
        /// Cached top chats.
        chats: Vec<ChatSummary>,
    },
    /// Top chats should be hidden because the query is not empty.
    TopChatsHidden,
    /// One top chat was removed by the user.
    TopChatRemoved {
        /// Removed chat.
        chat_id: ChatId,
        /// Its position before removal.
        position: usize,
    },

    /// Local results appeared.
    LocalChatsAdded {
        /// New results.
        chats: Vec<FoundChat>,
    },
    /// Local results changed.
    LocalChatsUpdated {
        /// Number of results before.
        old_count: usize,
        /// Results now.
        chats: Vec<FoundChat>,
    },
    /// Local results disappeared.
    LocalChatsRemoved {
        /// Number of results before.
        old_count: usize,
    },
    /// A later local round appended results.
    LocalChatsAppended {
        /// Number of results before.
        old_count: usize,
        /// Appended results.
        chats: Vec<FoundChat>,
    },
    /// A recently found chat was inserted at the front.
    LocalChatInserted {
        /// Inserted chat.
        chat: FoundChat,
    },
    /// A local result was removed.
    LocalChatRemoved {
        /// Removed chat.
        chat_id: ChatId,
        /// Its position before removal.
        position: usize,
        /// Number of results before removal.
        total: usize,
    },
    /// A recently found chat moved to the front.
    LocalChatMoved {
        /// Moved chat.
        chat: FoundChat,
        /// Its position before the move.
        from: usize,
    },

    /// Global results appeared.
    GlobalChatsAdded {
        /// New results.
        chats: Vec<FoundChat>,
    },
    /// Global results changed.
    GlobalChatsUpdated {
        /// Number of results before.
        old_count: usize,
        /// Results now.
        chats: Vec<FoundChat>,
    },
    /// Global results disappeared.
    GlobalChatsRemoved {
        /// Number of results before.
        old_count: usize,
    },

    /// Message results appeared.
    MessagesAdded {
        /// New results.
        messages: Vec<FoundMessage>,
    },
    /// Message results changed.
    MessagesUpdated {
        /// Number of results before.
        old_count: usize,
        /// Results now.
        messages: Vec<FoundMessage>,
    },
    /// Message results disappeared.
    MessagesRemoved {
        /// Number of results before.
        old_count: usize,
    },
    /// Another page of messages arrived.
    MessagesAppended {
        /// Number of results before.
        old_count: usize,
        /// Appended results.
        messages: Vec<FoundMessage>,
    },

    /// The pipeline reached the slow network stages.
    HeavyPartReached {
        /// Session the milestone belongs to.
        context_id: ContextId,
    },
    /// The first message page arrived.
    HeavyPartFinished {
        /// Session the milestone belongs to.
        context_id: ContextId,
    },
    /// Nothing more can be loaded for this session.
    EndReached {
        /// Session the milestone belongs to.
        context_id: ContextId,
    },
}
