//! Identity and ordering types for chatlist.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of a chat, stable and unique within one list.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(i64);

impl ChatId {
    /// Create a ChatId from its raw value.
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Get the raw value of this ChatId.
    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChatId({})", self.0)
    }
}

/// Opaque identifier of a message inside a chat.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct MessageId(i64);

impl MessageId {
    /// Create a MessageId from its raw value.
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Get the raw value of this MessageId.
    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageId({})", self.0)
    }
}

/// Externally assigned sort key of a chat inside one list.
///
/// Higher keys sort first. The sentinel [`OrderKey::NONE`] (0) means the chat
/// is not a member of the list at all.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct OrderKey(i64);

impl OrderKey {
    /// "Not a member of this list".
    pub const NONE: OrderKey = OrderKey(0);

    /// Create an OrderKey from its raw value.
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Get the raw value of this OrderKey.
    pub const fn value(&self) -> i64 {
        self.0
    }

    /// Whether a chat carrying this key belongs to the list.
    pub const fn is_member(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for OrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for OrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OrderKey({})", self.0)
    }
}

/// Generation counter identifying the current search session.
///
/// Every asynchronous search result carries the id captured when it was
/// dispatched; a result whose id no longer equals the current one is stale.
///
/// Only equality is meaningful. The counter wraps from `u32::MAX` back to 0,
/// which is harmless because ids are never compared for order; the type
/// deliberately does not implement `PartialOrd`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ContextId(u32);

impl ContextId {
    /// Create a ContextId from its raw value.
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Get the raw value of this ContextId.
    pub const fn value(&self) -> u32 {
        self.0
    }

    /// The id of the next generation, wrapping at `u32::MAX`.
    pub const fn next(&self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContextId({})", self.0)
    }
}
