//! Search result filtering.
//!
//! Every chat surfaced by a search stage passes through the same gate: the
//! exclusion list, the [`SearchFlags`] filter bits and finally the caller's
//! [`SearchFilter`].

use chatlist_types::{ChatId, ChatKind, ChatSummary, FoundChat, SearchFlags};

/// Caller-supplied hooks consulted by the search pipeline.
///
/// Implementations must be side-effect free; they may be called from any
/// pipeline task.
pub trait SearchFilter: Send + Sync {
    /// Whether a chat may appear in results. Only consulted with
    /// [`SearchFlags::CUSTOM_FILTER`].
    fn include_chat(&self, _chat: &ChatSummary) -> bool {
        true
    }

    /// Whether messages from this chat may appear in results.
    fn include_message_source(&self, _chat: &ChatSummary) -> bool {
        true
    }

    /// Last chance to decorate a found chat before it is shown.
    fn adjust_found_chat(&self, _found: &mut FoundChat) {}
}

/// Filter that lets everything through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl SearchFilter for AcceptAll {}

/// Whether `flags` reject this chat.
fn rejected_by_flags(chat: &ChatSummary, flags: SearchFlags, self_chat_id: Option<ChatId>) -> bool {
    let kind = &chat.kind;
    (flags.contains(SearchFlags::NO_SELF) && Some(chat.id) == self_chat_id)
        || (flags.contains(SearchFlags::NO_CHANNELS) && matches!(kind, ChatKind::Channel))
        || (flags.contains(SearchFlags::NO_GROUPS) && matches!(kind, ChatKind::Group))
        || (flags.contains(SearchFlags::ONLY_USERS) && !kind.is_user_chat())
        || (flags.contains(SearchFlags::NO_SECRET) && matches!(kind, ChatKind::Secret))
        || (flags.contains(SearchFlags::ONLY_WRITABLE) && !chat.can_send_messages)
        || (flags.contains(SearchFlags::NO_BOTS) && kind.is_bot())
        || (flags.contains(SearchFlags::NO_SUPPORT) && kind.is_support())
        || (flags.contains(SearchFlags::ONLY_CONTACTS) && !kind.is_contact())
}

/// Turns raw backend chats into displayable search results.
pub struct FoundChatAssembler<'a> {
    /// Active search options.
    pub flags: SearchFlags,
    /// Caller hooks.
    pub filter: &'a dyn SearchFilter,
    /// The user's own chat, for [`SearchFlags::NO_SELF`].
    pub self_chat_id: Option<ChatId>,
}

impl FoundChatAssembler<'_> {
    /// Filter, wrap and adjust `chats`, skipping any id in `exclude`.
    ///
    /// Input order is preserved.
    pub fn assemble(
        &self,
        chats: Vec<ChatSummary>,
        query: &str,
        is_global: bool,
        exclude: &[ChatId],
    ) -> Vec<FoundChat> {
        let custom = self.flags.contains(SearchFlags::CUSTOM_FILTER);
        chats
            .into_iter()
            .filter(|chat| !exclude.contains(&chat.id))
            .filter(|chat| !rejected_by_flags(chat, self.flags, self.self_chat_id))
            .filter(|chat| !custom || self.filter.include_chat(chat))
            .map(|chat| {
                let mut found = FoundChat {
                    chat,
                    is_global,
                    query: query.to_string(),
                };
                self.filter.adjust_found_chat(&mut found);
                found
            })
            .collect()
    }
}

/// Whether any word of `text` starts with `prefix`, ignoring case.
///
/// `prefix` may span several words, so "saved m" matches "Saved Messages".
pub fn any_word_starts_with(text: &str, prefix: &str) -> bool {
    let prefix = prefix.trim().to_lowercase();
    if prefix.is_empty() {
        return false;
    }
    let text = text.to_lowercase();
    let mut at_word_start = true;
    for (offset, ch) in text.char_indices() {
        if at_word_start && ch.is_alphanumeric() && text[offset..].starts_with(&prefix) {
            return true;
        }
        at_word_start = !ch.is_alphanumeric();
    }
    false
}
