//! # hearth
//!
//! Command-line tool for inspecting and syncing a Hearth vault.
//!
//! ## Commands
//!
//! - `init`: Create the vault and its device key
//! - `set` / `get` / `rm` / `ls` / `clear`: Raw record access by category
//! - `mood`: Record a mood check-in
//! - `list`: Show a synced collection
//! - `status`: Show sync status and queue length
//! - `sync`: Drain the queue and merge every collection
//!
//! ## Example
//!
//! ```bash
//! # Create the vault
//! hearth init
//!
//! # Store and read a setting
//! hearth set settings theme '"dark"'
//! hearth get settings theme
//!
//! # Record a mood and sync
//! hearth mood 4 --note "Good walk"
//! hearth --config hearth.toml sync
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hearth_sync_client::{ClientConfig, Vault};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::{entities, init, item, status, sync};

/// Command-line tool for inspecting and syncing a Hearth vault.
#[derive(Parser, Debug)]
#[command(name = "hearth")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file (default: hearth.toml in the platform config directory)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Data directory holding records and the device key
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the vault and its device key
    Init,

    /// Store a JSON value at <category>/<key>
    Set {
        /// Category (mood, journal, habit, reminder, settings)
        category: String,
        /// Record key
        key: String,
        /// JSON value
        value: String,
    },

    /// Print the value at <category>/<key>
    Get {
        /// Category
        category: String,
        /// Record key
        key: String,
    },

    /// Remove the value at <category>/<key>
    Rm {
        /// Category
        category: String,
        /// Record key
        key: String,
    },

    /// List keys in a category
    Ls {
        /// Category
        category: String,
    },

    /// Remove every record in a category, or the whole vault
    Clear {
        /// Category (omit to clear everything)
        category: Option<String>,
    },

    /// Record a mood check-in
    Mood {
        /// Mood level, 1 to 5
        level: u8,

        /// Free-text note
        #[arg(long, short)]
        note: Option<String>,
    },

    /// Show a synced collection as JSON lines
    List {
        /// Entity kind (mood, journal, habit, reminder)
        kind: String,
    },

    /// Show sync status
    Status,

    /// Drain pending changes and merge every collection with the remote
    Sync,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = config::load(cli.config.as_deref(), cli.data_dir)?;

    // RUST_LOG wins over the config file
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init => init::run(&config).await,
        command => {
            let vault = Vault::open(&config).with_context(|| {
                format!(
                    "Failed to open vault at {}",
                    config.storage.data_dir.display()
                )
            })?;
            dispatch(&vault, &config, command).await
        }
    }
}

async fn dispatch(vault: &Vault, config: &ClientConfig, command: Commands) -> Result<()> {
    tracing::debug!(?command, "Running command");
    match command {
        Commands::Init => init::run(config).await?,
        Commands::Set {
            category,
            key,
            value,
        } => item::set(vault, &category, &key, &value)?,
        Commands::Get { category, key } => item::get(vault, &category, &key)?,
        Commands::Rm { category, key } => item::rm(vault, &category, &key)?,
        Commands::Ls { category } => item::ls(vault, &category)?,
        Commands::Clear { category } => item::clear(vault, category.as_deref())?,
        Commands::Mood { level, note } => {
            entities::record_mood(vault, level, note.as_deref()).await?
        }
        Commands::List { kind } => entities::list(vault, &kind)?,
        Commands::Status => status::run(vault, config).await?,
        Commands::Sync => sync::run(vault).await?,
    }
    Ok(())
}
