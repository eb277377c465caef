//! Run search queries against a fixture and print the resulting events.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

use chatlist_client::{SearchConfig, SearchCoordinator};
use chatlist_core::AcceptAll;
use chatlist_types::{ChatListScope, ChatSummary, FoundChat, SearchEvent, SearchFlags};

use crate::fixture::Fixture;

/// Options of one search run.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// List to search in.
    pub scope: ChatListScope,
    /// Pipeline and filter flags.
    pub flags: SearchFlags,
    /// How many extra message pages to request after each query.
    pub more_pages: usize,
}

/// Run the search command.
pub async fn run(
    fixture: &Fixture,
    queries: &[String],
    options: &SearchOptions,
    config: SearchConfig,
) -> Result<()> {
    let backend = Arc::new(fixture.backend());
    let (coordinator, mut events) =
        SearchCoordinator::with_flags(backend, Arc::new(AcceptAll), config, options.flags);

    if let Some(task) = coordinator.open(options.scope).await {
        task.await.context("Search task failed")?;
    }
    print_events("open", &mut events);

    for query in queries {
        if let Some(task) = coordinator.on_query_changed(options.scope, query).await {
            task.await.context("Search task failed")?;
        }
        print_events(&format!("query {:?}", query), &mut events);

        for _ in 0..options.more_pages {
            let Some(task) = coordinator.load_more_messages().await else {
                break;
            };
            task.await.context("Message page task failed")?;
            print_events("more messages", &mut events);
        }
    }

    coordinator.close(options.scope).await;
    print_events("close", &mut events);
    Ok(())
}

fn print_events(label: &str, events: &mut UnboundedReceiver<SearchEvent>) {
    println!("=== {} ===", label);
    while let Ok(event) = events.try_recv() {
        println!("  {}", describe(&event));
    }
}

fn titles(chats: &[ChatSummary]) -> String {
    chats.iter().map(ChatSummary::title).collect::<Vec<_>>().join(", ")
}

fn found_titles(chats: &[FoundChat]) -> String {
    chats
        .iter()
        .map(|found| found.chat.title())
        .collect::<Vec<_>>()
        .join(", ")
}

/// One-line description of an event.
fn describe(event: &SearchEvent) -> String {
    match event {
        SearchEvent::SessionOpened => "opened".to_string(),
        SearchEvent::SessionClosed => "closed".to_string(),
        SearchEvent::NewSearch {
            context_id,
            is_default,
        } => format!("new search #{} (default: {})", context_id, is_default),
        SearchEvent::TopChatsAdded { chats, silent } => {
            format!("top added [{}] silent={}", titles(chats), silent)
        }
        SearchEvent::TopChatsUpdated { chats, silent, .. } => {
            format!("top updated [{}] silent={}", titles(chats), silent)
        }
        SearchEvent::TopChatsRemoved { silent } => format!("top removed silent={}", silent),
        SearchEvent::TopChatsShown { chats } => format!("top shown [{}]", titles(chats)),
        SearchEvent::TopChatsHidden => "top hidden".to_string(),
        SearchEvent::TopChatRemoved { chat_id, position } => {
            format!("top chat {} removed at {}", chat_id, position)
        }
        SearchEvent::LocalChatsAdded { chats } => format!("local added [{}]", found_titles(chats)),
        SearchEvent::LocalChatsUpdated { old_count, chats } => {
            format!("local updated {} -> [{}]", old_count, found_titles(chats))
        }
        SearchEvent::LocalChatsRemoved { old_count } => format!("local removed {}", old_count),
        SearchEvent::LocalChatsAppended { old_count, chats } => {
            format!("local appended after {} [{}]", old_count, found_titles(chats))
        }
        SearchEvent::LocalChatInserted { chat } => {
            format!("local inserted {}", chat.chat.title())
        }
        SearchEvent::LocalChatRemoved {
            chat_id, position, ..
        } => format!("local chat {} removed at {}", chat_id, position),
        SearchEvent::LocalChatMoved { chat, from } => {
            format!("local moved {} from {}", chat.chat.title(), from)
        }
        SearchEvent::GlobalChatsAdded { chats } => {
            format!("global added [{}]", found_titles(chats))
        }
        SearchEvent::GlobalChatsUpdated { old_count, chats } => {
            format!("global updated {} -> [{}]", old_count, found_titles(chats))
        }
        SearchEvent::GlobalChatsRemoved { old_count } => format!("global removed {}", old_count),
        SearchEvent::MessagesAdded { messages } => format!("messages added {}", messages.len()),
        SearchEvent::MessagesUpdated {
            old_count,
            messages,
        } => format!("messages updated {} -> {}", old_count, messages.len()),
        SearchEvent::MessagesRemoved { old_count } => format!("messages removed {}", old_count),
        SearchEvent::MessagesAppended {
            old_count,
            messages,
        } => format!("messages appended after {} +{}", old_count, messages.len()),
        SearchEvent::HeavyPartReached { .. } => "heavy part reached".to_string(),
        SearchEvent::HeavyPartFinished { .. } => "heavy part finished".to_string(),
        SearchEvent::EndReached { .. } => "end reached".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatlist_types::{ChatId, OrderKey};

    #[test]
    fn describe_lists_titles() {
        let chat = ChatSummary::new(ChatId::new(1), OrderKey::new(1), "Alice");
        let event = SearchEvent::LocalChatsAdded {
            chats: vec![FoundChat::local(chat, "al")],
        };
        assert_eq!(describe(&event), "local added [Alice]");
        assert_eq!(describe(&SearchEvent::TopChatsHidden), "top hidden");
    }

    #[tokio::test]
    async fn search_runs_against_demo_fixture() {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/demo.json");
        let fixture = Fixture::load(&path).await.unwrap();
        let options = SearchOptions {
            scope: ChatListScope::Main,
            flags: SearchFlags::NEED_TOP_CHATS
                | SearchFlags::NEED_MESSAGES
                | SearchFlags::NEED_GLOBAL_SEARCH,
            more_pages: 1,
        };
        let queries = vec!["al".to_string(), "".to_string()];
        let result = run(&fixture, &queries, &options, SearchConfig::default()).await;
        assert!(result.is_ok());
    }
}
