//! # chatlist
//!
//! CLI tool for replaying chat list and search fixtures.
//!
//! ## Commands
//!
//! - `list`: Load a chat list page by page and replay position updates
//! - `search`: Run search queries and print the events they produce
//!
//! ## Example
//!
//! ```bash
//! # Load the main list and replay its updates
//! chatlist --fixture fixtures/demo.json list
//!
//! # Search, then go back to the empty query
//! chatlist --fixture fixtures/demo.json search al ""
//!
//! # More detail
//! RUST_LOG=chatlist_client=debug chatlist --fixture fixtures/demo.json search al
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod fixture;

use chatlist_client::ClientConfig;
use chatlist_types::{ChatListScope, SearchFlags};
use commands::{list, search};
use fixture::Fixture;

/// CLI tool for replaying chat list and search fixtures.
#[derive(Parser, Debug)]
#[command(name = "chatlist")]
#[command(version, about, long_about = None)]
struct Cli {
    /// JSON fixture seeding the mock backend
    #[arg(long, global = true, default_value = "fixtures/demo.json")]
    fixture: PathBuf,

    /// TOML configuration file (defaults apply when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Chat list to use
    #[arg(long, global = true, value_enum, default_value_t = ScopeArg::Main)]
    scope: ScopeArg,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ScopeArg {
    Main,
    Archive,
}

impl From<ScopeArg> for ChatListScope {
    fn from(scope: ScopeArg) -> Self {
        match scope {
            ScopeArg::Main => ChatListScope::Main,
            ScopeArg::Archive => ChatListScope::Archive,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load the chat list and replay the fixture's position updates
    List,

    /// Run one or more search queries in order
    Search {
        /// Queries to run (use "" for the empty query)
        queries: Vec<String>,

        /// Skip the top chats stage
        #[arg(long)]
        no_top: bool,

        /// Skip the global search stage
        #[arg(long)]
        no_global: bool,

        /// Skip the message search stage
        #[arg(long)]
        no_messages: bool,

        /// Only show one-to-one chats
        #[arg(long)]
        only_users: bool,

        /// Hide bots
        #[arg(long)]
        no_bots: bool,

        /// Use the groups category for top chats
        #[arg(long)]
        top_groups: bool,

        /// Extra message pages to request after each query
        #[arg(long, default_value = "0")]
        more: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ClientConfig::from_file(path).context("Failed to load configuration")?,
        None => ClientConfig::default(),
    };
    let fixture = Fixture::load(&cli.fixture).await?;
    let scope = ChatListScope::from(cli.scope);

    match cli.command {
        Commands::List => {
            list::run(&fixture, scope, &config.list).await?;
        }
        Commands::Search {
            queries,
            no_top,
            no_global,
            no_messages,
            only_users,
            no_bots,
            top_groups,
            more,
        } => {
            let mut flags = SearchFlags::NONE;
            for (enabled, flag) in [
                (!no_top, SearchFlags::NEED_TOP_CHATS),
                (!no_global, SearchFlags::NEED_GLOBAL_SEARCH),
                (!no_messages, SearchFlags::NEED_MESSAGES),
                (only_users, SearchFlags::ONLY_USERS),
                (no_bots, SearchFlags::NO_BOTS),
                (top_groups, SearchFlags::TOP_CATEGORY_GROUPS),
            ] {
                if enabled {
                    flags |= flag;
                }
            }
            let options = search::SearchOptions {
                scope,
                flags,
                more_pages: more,
            };
            search::run(&fixture, &queries, &options, config.search).await?;
        }
    }

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
