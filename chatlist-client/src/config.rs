//! Configuration loading for chatlist-client.
//!
//! Configuration is loaded from a TOML file (default: `chatlist.toml`).
//! Every field is optional; missing tables and keys fall back to defaults.

use chatlist_core::SearchLimits;
use chatlist_types::ChatId;
use serde::Deserialize;
use std::path::PathBuf;

/// Root configuration for chatlist-client.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ClientConfig {
    /// Search pipeline configuration.
    #[serde(default)]
    pub search: SearchConfig,
    /// Chat list configuration.
    #[serde(default)]
    pub list: ListConfig,
}

/// Search pipeline configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Top chats requested per fetch (default: 30).
    #[serde(default = "default_top_chats_limit")]
    pub top_chats_limit: usize,
    /// First local round budget for an empty query (default: 20).
    #[serde(default = "default_local_empty_query")]
    pub local_empty_query: usize,
    /// First local round budget with filter flags (default: 50).
    #[serde(default = "default_local_filtered")]
    pub local_filtered: usize,
    /// First local round budget otherwise (default: 30).
    #[serde(default = "default_local_default")]
    pub local_default: usize,
    /// Server round runs below this many results (default: 100).
    #[serde(default = "default_server_target")]
    pub server_target: usize,
    /// Contacts round runs below this many results (default: 50).
    #[serde(default = "default_contacts_target")]
    pub contacts_target: usize,
    /// First message page size (default: 20).
    #[serde(default = "default_messages_first_page")]
    pub messages_first_page: usize,
    /// Further message page size (default: 30).
    #[serde(default = "default_messages_more_page")]
    pub messages_more_page: usize,
    /// The user's own chat, offered for matching queries (optional).
    pub self_chat_id: Option<ChatId>,
    /// Names the self chat answers to, localized first (default: "Saved Messages").
    #[serde(default = "default_self_chat_names")]
    pub self_chat_names: Vec<String>,
}

/// Chat list configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ListConfig {
    /// Show the archive entry at the top of the main list (default: true).
    #[serde(default = "default_archive_enabled")]
    pub archive_enabled: bool,
    /// Chats requested per page (default: 50).
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

// Default value functions
fn default_top_chats_limit() -> usize {
    30
}

fn default_local_empty_query() -> usize {
    20
}

fn default_local_filtered() -> usize {
    50
}

fn default_local_default() -> usize {
    30
}

fn default_server_target() -> usize {
    100
}

fn default_contacts_target() -> usize {
    50
}

fn default_messages_first_page() -> usize {
    20
}

fn default_messages_more_page() -> usize {
    30
}

fn default_self_chat_names() -> Vec<String> {
    vec!["Saved Messages".to_string()]
}

fn default_archive_enabled() -> bool {
    true
}

fn default_page_size() -> usize {
    50
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_chats_limit: default_top_chats_limit(),
            local_empty_query: default_local_empty_query(),
            local_filtered: default_local_filtered(),
            local_default: default_local_default(),
            server_target: default_server_target(),
            contacts_target: default_contacts_target(),
            messages_first_page: default_messages_first_page(),
            messages_more_page: default_messages_more_page(),
            self_chat_id: None,
            self_chat_names: default_self_chat_names(),
        }
    }
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            archive_enabled: default_archive_enabled(),
            page_size: default_page_size(),
        }
    }
}

impl SearchConfig {
    /// Limits for the pure search session.
    pub fn limits(&self) -> SearchLimits {
        SearchLimits {
            top_chats: self.top_chats_limit,
            local_empty_query: self.local_empty_query,
            local_filtered: self.local_filtered,
            local_default: self.local_default,
            server_target: self.server_target,
            contacts_target: self.contacts_target,
            messages_first_page: self.messages_first_page,
            messages_more_page: self.messages_more_page,
        }
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_search_limits() {
        let config = ClientConfig::default();
        assert_eq!(config.search.limits(), SearchLimits::default());
        assert!(config.list.archive_enabled);
        assert_eq!(config.list.page_size, 50);
        assert_eq!(config.search.self_chat_names, vec!["Saved Messages"]);
    }

    #[test]
    fn config_from_toml_string() {
        let toml = r#"
[search]
top_chats_limit = 10
messages_first_page = 15
self_chat_id = 777
self_chat_names = ["Избранное", "Saved Messages"]

[list]
archive_enabled = false
page_size = 100
"#;

        let config: ClientConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.search.top_chats_limit, 10);
        assert_eq!(config.search.messages_first_page, 15);
        assert_eq!(config.search.messages_more_page, 30);
        assert_eq!(config.search.self_chat_id, Some(ChatId::new(777)));
        assert_eq!(config.search.self_chat_names.len(), 2);
        assert!(!config.list.archive_enabled);
        assert_eq!(config.list.page_size, 100);
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config: ClientConfig = toml::from_str("").unwrap();
        assert_eq!(config.search.server_target, 100);
        assert_eq!(config.search.contacts_target, 50);
        assert!(config.list.archive_enabled);
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = ClientConfig::from_file(std::path::Path::new("/nonexistent/chatlist.toml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
        assert!(err.to_string().contains("/nonexistent/chatlist.toml"));
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let path = std::env::temp_dir().join("chatlist-config-malformed.toml");
        std::fs::write(&path, "[search\ntop_chats_limit = ").unwrap();
        let err = ClientConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        let _ = std::fs::remove_file(&path);
    }
}
