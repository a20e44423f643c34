mod commands;
mod logging;
mod render;

use std::sync::Arc;

use anyhow::Result;
use calmirror_core::CalendarMirror;
use calmirror_core::account::AccountKey;
use calmirror_core::config::MirrorConfig;
use calmirror_core::remote::SnapshotProvider;
use calmirror_core::store::{FileAccountStore, FileEventStore};
use clap::{Parser, Subcommand};
use tracing::debug;

#[derive(Parser)]
#[command(name = "calmirror")]
#[command(about = "Inspect and query calendar accounts mirrored from their remote sources")]
struct Cli {
    /// Context id (defaults to `context` in config.toml)
    #[arg(long, global = true)]
    context: Option<u32>,

    /// User id (defaults to `user` in config.toml)
    #[arg(long, global = true)]
    user: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add or remove mirrored accounts
    Account {
        #[command(subcommand)]
        command: AccountCommands,
    },
    /// Show caching state without refreshing
    Status { account: u32 },
    /// List cached events, refreshing first if stale
    Events {
        account: u32,

        /// Show events from this date (YYYY-MM-DD, or "start" for all past events)
        #[arg(long)]
        from: Option<String>,

        /// Show events until this date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,

        /// Sort by start, end, summary, uid or updated
        #[arg(long)]
        sort: Option<String>,

        #[arg(long)]
        desc: bool,

        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show a single event
    Event {
        account: u32,
        uid: String,

        /// Pick one change exception of a recurring series
        #[arg(long)]
        recurrence_id: Option<String>,
    },
    /// List the change exceptions of a recurring series
    Exceptions { account: u32, uid: String },
    /// Find events whose summary, description or location contain a pattern
    Search {
        account: u32,
        pattern: String,

        #[arg(long)]
        from: Option<String>,

        #[arg(long)]
        to: Option<String>,
    },
    /// Show what changed in the mirror since a point in time
    Changes {
        account: u32,

        /// RFC 3339 timestamp, or a duration ago (e.g. "2h", "3days")
        #[arg(long)]
        since: String,
    },
}

#[derive(Subcommand)]
enum AccountCommands {
    /// Mirror a JSON snapshot file as a new account
    Add {
        account: u32,

        /// Path to the snapshot file
        #[arg(long)]
        source: String,

        /// Minutes between refreshes
        #[arg(long)]
        refresh: Option<i64>,
    },
    /// Delete an account and its cached events
    Remove { account: u32 },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = MirrorConfig::load()?;
    logging::init_tracing(&config.log_level);

    let mirror = build_mirror(&config);
    let key = |account| {
        AccountKey::new(
            cli.context.unwrap_or(config.context),
            cli.user.unwrap_or(config.user),
            account,
        )
    };

    match cli.command {
        Commands::Account { command } => match command {
            AccountCommands::Add {
                account,
                source,
                refresh,
            } => commands::account::add(&mirror, key(account), &source, refresh),
            AccountCommands::Remove { account } => commands::account::remove(&mirror, key(account)),
        },
        Commands::Status { account } => commands::status::run(&mirror, key(account)),
        Commands::Events {
            account,
            from,
            to,
            sort,
            desc,
            limit,
        } => {
            let params = commands::query_params(
                from.as_deref(),
                to.as_deref(),
                sort.as_deref(),
                desc,
                limit,
            )?;
            let access = mirror.open(&key(account))?;
            commands::events::list(access.as_ref(), &params)
        }
        Commands::Event {
            account,
            uid,
            recurrence_id,
        } => {
            let access = mirror.open(&key(account))?;
            commands::events::show(access.as_ref(), &uid, recurrence_id.as_deref())
        }
        Commands::Exceptions { account, uid } => {
            let access = mirror.open(&key(account))?;
            commands::events::exceptions(access.as_ref(), &uid)
        }
        Commands::Search {
            account,
            pattern,
            from,
            to,
        } => {
            let params = commands::query_params(from.as_deref(), to.as_deref(), None, false, None)?;
            let access = mirror.open(&key(account))?;
            commands::events::search(access.as_ref(), &pattern, &params)
        }
        Commands::Changes { account, since } => {
            let access = mirror.open(&key(account))?;
            commands::changes::run(access.as_ref(), &since)
        }
    }
}

fn build_mirror(config: &MirrorConfig) -> CalendarMirror {
    let data_dir = config.data_path();
    debug!(
        data_dir = %data_dir.display(),
        refresh_interval_minutes = config.default_refresh_interval,
        "opening mirror"
    );

    CalendarMirror::new(
        Arc::new(FileAccountStore::new(&data_dir)),
        Arc::new(FileEventStore::new(&data_dir)),
    )
    .with_provider(Arc::new(SnapshotProvider::new()))
    .with_settings(config.cache_settings())
}
