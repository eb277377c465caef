//! # chatlist-client
//!
//! Async layer of chatlist: keeps a live chat list and runs chat search
//! against a pluggable backend.
//!
//! ## Features
//!
//! - **Live list**: [`ChatListController`] turns backend updates into view diffs
//! - **Staged search**: [`SearchCoordinator`] runs top, local, global and
//!   message search with stale-result isolation
//! - **Backend Abstraction**: Pluggable backend ([`MockBackend`] for tests and demos)
//! - **Pure State Machines**: Uses chatlist-core for side-effect-free logic
//!
//! ## Example
//!
//! ```ignore
//! use chatlist_client::{ChatListController, ClientConfig, MockBackend};
//!
//! let backend = Arc::new(MockBackend::new());
//! let config = ClientConfig::default();
//! let list = ChatListController::new(backend.clone(), ChatListScope::Main, &config.list);
//!
//! let change = list.load_more().await?;
//! for op in change.patch {
//!     // apply to the view
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod config;
pub mod controller;
pub mod coordinator;

pub use backend::{BackendCall, BackendError, ChatBackend, ChatPage, MessagePage, MockBackend};
pub use config::{ClientConfig, ConfigError, ListConfig, SearchConfig};
pub use controller::{BackendUpdate, ChatListController, ControllerError, ListChange};
pub use coordinator::SearchCoordinator;
