//! JSON fixtures that seed a [`MockBackend`].

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use chatlist_client::MockBackend;
use chatlist_core::PositionUpdate;
use chatlist_types::{ChatId, ChatSummary, FoundMessage, TopChatCategory};

/// Backend data and scripted updates.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Fixture {
    /// Chats the user is a member of.
    #[serde(default)]
    pub chats: Vec<ChatSummary>,
    /// Chats only server-side search finds.
    #[serde(default)]
    pub server_chats: Vec<ChatSummary>,
    /// Public directory entries.
    #[serde(default)]
    pub public_chats: Vec<ChatSummary>,
    /// Top chats, users category.
    #[serde(default)]
    pub top_users: Vec<ChatId>,
    /// Top chats, groups category.
    #[serde(default)]
    pub top_groups: Vec<ChatId>,
    /// Recently found chats, most recent first.
    #[serde(default)]
    pub recently_found: Vec<ChatId>,
    /// Searchable messages.
    #[serde(default)]
    pub messages: Vec<FoundMessage>,
    /// Position updates replayed after the list is loaded.
    #[serde(default)]
    pub updates: Vec<UpdateSpec>,
}

/// One scripted position update.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateSpec {
    /// New state of the chat.
    pub chat: ChatSummary,
    /// The pinned flag flipped.
    #[serde(default)]
    pub pin_state_changed: bool,
    /// The ordering source changed.
    #[serde(default)]
    pub source_changed: bool,
}

impl UpdateSpec {
    /// Convert into a position update.
    pub fn to_update(&self) -> PositionUpdate {
        let mut update = PositionUpdate::new(self.chat.clone());
        if self.pin_state_changed {
            update = update.with_pin_state_changed();
        }
        if self.source_changed {
            update = update.with_source_changed();
        }
        update
    }
}

impl Fixture {
    /// Load a fixture from a JSON file.
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read fixture {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Invalid fixture {}", path.display()))
    }

    /// Build a mock backend serving this fixture.
    pub fn backend(&self) -> MockBackend {
        let backend = MockBackend::new();
        for chat in &self.chats {
            backend.add_chat(chat.clone());
        }
        for chat in &self.server_chats {
            backend.add_server_chat(chat.clone());
        }
        for chat in &self.public_chats {
            backend.add_public_chat(chat.clone());
        }
        backend.set_top_chats(TopChatCategory::Users, self.top_users.clone());
        backend.set_top_chats(TopChatCategory::Groups, self.top_groups.clone());
        backend.set_recently_found(self.recently_found.clone());
        for message in &self.messages {
            backend.add_message(message.clone());
        }
        backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatlist_client::ChatBackend;
    use chatlist_types::ChatListScope;
    use tempfile::tempdir;

    const FIXTURE: &str = r#"{
        "chats": [
            {"id": 1, "order_key": 100, "payload": {"title": "Alice"}},
            {"id": 2, "order_key": 200, "pinned": true, "payload": {"title": "Bob"}}
        ],
        "top_users": [2],
        "updates": [
            {"chat": {"id": 1, "order_key": 300, "payload": {"title": "Alice"}}}
        ]
    }"#;

    #[tokio::test]
    async fn fixture_seeds_backend() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fixture.json");
        tokio::fs::write(&path, FIXTURE).await.unwrap();

        let fixture = Fixture::load(&path).await.unwrap();
        assert_eq!(fixture.chats.len(), 2);
        assert_eq!(fixture.updates.len(), 1);

        let backend = fixture.backend();
        let page = backend.load_chats(ChatListScope::Main, 10).await.unwrap();
        assert_eq!(page.chats[0].id, ChatId::new(2));
        assert!(page.complete);
        let top = backend
            .list_top_chats(TopChatCategory::Users, 10)
            .await
            .unwrap();
        assert_eq!(top, vec![ChatId::new(2)]);
    }

    #[tokio::test]
    async fn invalid_fixture_names_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();

        let err = Fixture::load(&path).await.unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }

    #[test]
    fn update_spec_carries_flags() {
        let spec: UpdateSpec = serde_json::from_str(
            r#"{"chat": {"id": 5, "order_key": 1, "payload": {"title": "x"}}, "pin_state_changed": true}"#,
        )
        .unwrap();
        let update = spec.to_update();
        assert!(update.pin_state_changed);
        assert!(!update.source_changed);
        assert!(update.matches_scope);
    }
}
