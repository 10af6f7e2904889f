//! # Robotics Gallery CLI (`gallery`)
//!
//! The `gallery` binary drives crawling, classification and moderation of
//! robotics application content.
//!
//! ## Usage
//!
//! ```bash
//! gallery --config ./config/gallery.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `gallery init` | Create the SQLite database and run schema migrations |
//! | `gallery sources` | List adapters, missing keys and configured targets |
//! | `gallery crawl` | Crawl sources, classify, and store relevant items |
//! | `gallery reprocess` | Re-ingest archived search responses |
//! | `gallery reclassify` | Re-run classification over approved items |
//! | `gallery pending` | Show the moderation queue |
//! | `gallery moderate <id>` | Approve or reject an item |
//! | `gallery runs` | Show recent crawler runs |
//! | `gallery stats` | Catalog counts by status and content type |
//!
//! ## Examples
//!
//! ```bash
//! # Crawl every source
//! gallery crawl --sources all
//!
//! # Try two sources without writing anything
//! gallery crawl --sources youtube,news --dry-run --limit 20
//!
//! # Rebuild candidates from saved search responses
//! gallery reprocess --dir ./data/raw
//! ```
//!
//! API keys are read from the environment (or a `.env` file). Logs go to
//! stderr and honor `RUST_LOG`; command output goes to stdout.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use gallery_core::models::{ItemStatus, StatusUpdate};
use gallery_crawler::config::{self, Credentials};
use gallery_crawler::progress::ProgressMode;
use gallery_crawler::sqlite_store::SqliteStore;
use gallery_crawler::{ingest, migrate, moderation, reclassify, reprocess, sources, stats};

/// Robotics Gallery: crawl, classify and moderate robotics deployment content.
#[derive(Parser)]
#[command(
    name = "gallery",
    about = "Robotics Gallery: crawl, classify and moderate robotics deployment content",
    version,
    long_about = "Collects robotics videos, articles, images and social posts from YouTube, \
    RSS feeds, Google Custom Search and SerpAPI, classifies each candidate against a fixed \
    robotics taxonomy with Gemini, and stores relevant items for human moderation."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/gallery.toml`. API keys are not read from
    /// this file; set them in the environment.
    #[arg(long, global = true, default_value = "./config/gallery.toml")]
    config: PathBuf,

    /// Progress output on stderr: `human`, `json` or `off`.
    /// Defaults to `human` when stderr is a terminal.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressArg>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProgressArg {
    Off,
    Human,
    Json,
}

impl From<ProgressArg> for ProgressMode {
    fn from(arg: ProgressArg) -> Self {
        match arg {
            ProgressArg::Off => ProgressMode::Off,
            ProgressArg::Human => ProgressMode::Human,
            ProgressArg::Json => ProgressMode::Json,
        }
    }
}

/// Moderation decisions accepted by `gallery moderate`.
#[derive(Clone, Copy, ValueEnum)]
enum Decision {
    Approved,
    Rejected,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the `gallery_items` and
    /// `crawler_runs` tables. Running it repeatedly is safe.
    Init,

    /// List adapters with missing keys and configured targets.
    Sources,

    /// Crawl sources, classify candidates, and store relevant items.
    ///
    /// Adapters run concurrently; candidates are then classified one at a
    /// time. Every run is recorded in `crawler_runs`.
    Crawl {
        /// Comma-separated adapter names, or `all`.
        #[arg(long, value_delimiter = ',', default_value = "all")]
        sources: Vec<String>,

        /// Classify and filter, but write nothing to the gallery.
        #[arg(long)]
        dry_run: bool,

        /// Maximum number of candidates to process.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Re-ingest archived search responses without calling the search APIs.
    Reprocess {
        /// Archive files to read. Defaults to every archive in `--dir`.
        files: Vec<PathBuf>,

        /// Archive directory. Defaults to `[archive].dir`.
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Classify and filter, but write nothing to the gallery.
        #[arg(long)]
        dry_run: bool,
    },

    /// Re-run classification over approved items.
    Reclassify {
        /// Report new classifications without updating items.
        #[arg(long)]
        dry_run: bool,

        /// Maximum number of items to reclassify.
        #[arg(long)]
        limit: Option<usize>,

        /// Items fetched per page.
        #[arg(long, default_value_t = 50)]
        batch_size: usize,
    },

    /// Show items waiting for moderation, newest first.
    Pending {
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },

    /// Approve or reject an item.
    Moderate {
        /// Item id.
        id: String,

        #[arg(long, value_enum)]
        status: Decision,

        /// Who made the decision.
        #[arg(long)]
        moderator: Option<String>,

        #[arg(long)]
        notes: Option<String>,

        /// Why the item was rejected.
        #[arg(long)]
        reason: Option<String>,
    },

    /// Show recent crawler runs.
    Runs {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },

    /// Catalog counts by status and content type.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut cfg = config::load_config(&cli.config)?;
    let credentials = Credentials::from_env();
    let progress = cli
        .progress
        .map(ProgressMode::from)
        .unwrap_or_else(ProgressMode::default_for_tty);

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Sources => {
            sources::list_sources(&cfg, &credentials)?;
        }
        Commands::Crawl {
            sources,
            dry_run,
            limit,
        } => {
            ingest::run_crawl_command(&cfg, &credentials, &sources, dry_run, limit, progress).await?;
        }
        Commands::Reprocess {
            files,
            dir,
            dry_run,
        } => {
            if let Some(dir) = dir {
                cfg.archive.dir = dir;
            }
            reprocess::run_reprocess_command(&cfg, &credentials, files, dry_run, progress).await?;
        }
        Commands::Reclassify {
            dry_run,
            limit,
            batch_size,
        } => {
            reclassify::run_reclassify_command(&cfg, &credentials, dry_run, limit, batch_size)
                .await?;
        }
        Commands::Pending { limit } => {
            let store = SqliteStore::open(&cfg).await?;
            moderation::list_pending(&store, limit).await?;
        }
        Commands::Moderate {
            id,
            status,
            moderator,
            notes,
            reason,
        } => {
            let mut update = StatusUpdate::new(match status {
                Decision::Approved => ItemStatus::Approved,
                Decision::Rejected => ItemStatus::Rejected,
            });
            update.moderator_id = moderator;
            update.notes = notes;
            update.rejection_reason = reason;
            let store = SqliteStore::open(&cfg).await?;
            moderation::moderate(&store, &id, &update).await?;
        }
        Commands::Runs { limit } => {
            let store = SqliteStore::open(&cfg).await?;
            moderation::list_runs(&store, limit).await?;
        }
        Commands::Stats => {
            let store = SqliteStore::open(&cfg).await?;
            stats::run_stats(&store, &cfg.db.path).await?;
        }
    }

    Ok(())
}
