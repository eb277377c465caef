//! Load a chat list from a fixture and replay its updates.

use anyhow::{Context, Result};
use std::sync::Arc;

use chatlist_client::{BackendUpdate, ChatBackend, ChatListController, ListChange, ListConfig};
use chatlist_core::LoadState;
use chatlist_types::{ChatListScope, DiffOp, UpdateFlags};

use crate::fixture::Fixture;

/// Run the list command.
pub async fn run(fixture: &Fixture, scope: ChatListScope, config: &ListConfig) -> Result<()> {
    let backend = Arc::new(fixture.backend());
    let controller = ChatListController::new(backend, scope, config);

    println!("=== loading {:?} ===", scope);
    load_all(&controller).await?;
    println!("{} rows", controller.row_count().await);

    if !fixture.updates.is_empty() {
        println!();
        println!("=== replaying {} updates ===", fixture.updates.len());
    }
    for spec in &fixture.updates {
        let change = controller
            .apply(BackendUpdate::Position(spec.to_update()))
            .await;
        println!("{} (key {})", spec.chat.title(), spec.chat.order_key);
        print_change(&change_lines(change));
    }

    println!();
    println!("=== final order ===");
    if controller.has_archive().await {
        println!("  [archive]");
    }
    for (position, id) in controller.chat_ids().await.iter().enumerate() {
        println!("  {:>3}  chat {}", position, id);
    }
    Ok(())
}

/// Load pages until the list is complete or a page brings no new chats.
async fn load_all<B: ChatBackend>(controller: &ChatListController<B>) -> Result<()> {
    loop {
        let before = controller.chat_ids().await.len();
        let change = controller
            .load_more()
            .await
            .context("Failed to load chat list")?;
        if !change.patch.is_empty() {
            print_change(&change_lines(change));
        }
        if controller.load_state().await == LoadState::Complete {
            return Ok(());
        }
        if controller.chat_ids().await.len() == before {
            println!("  backend returned an empty page, stopping");
            return Ok(());
        }
    }
}

fn print_change(lines: &[String]) {
    for line in lines {
        println!("  {}", line);
    }
}

/// Human-readable lines for one change.
fn change_lines(change: ListChange) -> Vec<String> {
    let mut lines: Vec<String> = change
        .patch
        .map(|op| match op {
            DiffOp::Inserted { position, count } => format!("insert {} at {}", count, position),
            DiffOp::Removed { position } => format!("remove {}", position),
            DiffOp::Moved { from, to } => format!("move {} -> {}", from, to),
            DiffOp::Changed { position } => format!("change {}", position),
        })
        .collect();
    if change.flags.contains(UpdateFlags::RETAIN_SCROLL_ANCHOR) {
        lines.push("keep scroll anchor".to_string());
    }
    if change.flags.contains(UpdateFlags::INVALIDATE_DECORATIONS) {
        lines.push("redraw separators".to_string());
    }
    if change.became_empty {
        lines.push("list is empty".to_string());
    }
    if lines.is_empty() {
        lines.push("no change".to_string());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatlist_client::{ChatPage, MockBackend};
    use chatlist_types::{ChatId, ChatSummary, OrderKey, Patch};

    #[test]
    fn change_lines_describe_ops_and_flags() {
        let change = ListChange {
            patch: Patch::from_ops(vec![DiffOp::Moved { from: 3, to: 1 }]),
            flags: UpdateFlags::RETAIN_SCROLL_ANCHOR,
            became_empty: false,
        };
        assert_eq!(
            change_lines(change),
            vec!["move 3 -> 1".to_string(), "keep scroll anchor".to_string()]
        );
        assert_eq!(change_lines(ListChange::default()), vec!["no change".to_string()]);
    }

    #[tokio::test]
    async fn empty_incomplete_page_stops_loading() {
        let backend = MockBackend::new();
        backend.queue_chat_page(ChatPage {
            chats: vec![ChatSummary::new(ChatId::new(1), OrderKey::new(10), "one")],
            complete: false,
        });
        backend.queue_chat_page(ChatPage::default());
        backend.queue_chat_page(ChatPage::default());
        let controller = ChatListController::new(
            Arc::new(backend.clone()),
            ChatListScope::Main,
            &ListConfig::default(),
        );

        load_all(&controller).await.unwrap();

        assert_eq!(backend.call_count("load_chats"), 2);
        assert_eq!(controller.chat_ids().await, vec![ChatId::new(1)]);
        assert_eq!(controller.load_state().await, LoadState::MoreAvailable);
    }

    #[tokio::test]
    async fn list_runs_against_demo_fixture() {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/demo.json");
        let fixture = Fixture::load(&path).await.unwrap();
        let result = run(&fixture, ChatListScope::Main, &ListConfig::default()).await;
        assert!(result.is_ok());
    }
}
