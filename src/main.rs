//! # Tariff Harness CLI (`hts`)
//!
//! The `hts` binary is the primary interface for Tariff Harness. It
//! provides commands for snapshot ingestion, Qdrant indexing, snapshot
//! promotion, search, tariff lookup, and starting the HTTP API.
//!
//! ## Usage
//!
//! ```bash
//! hts --config ./config/hts.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `hts ingest hts` | Fetch the HTS schedule into a new snapshot |
//! | `hts ingest ecfr` | Fetch eCFR titles into a new snapshot |
//! | `hts index` | Embed a snapshot and upsert it into Qdrant |
//! | `hts promote <id>` | Make a snapshot the active one |
//! | `hts status` | List snapshots on disk and the active one |
//! | `hts search "<query>"` | Fuzzy or semantic search |
//! | `hts tariff <code>` | Look up a 10-digit HTS code |
//! | `hts serve` | Start the HTTP API server |
//!
//! ## Examples
//!
//! ```bash
//! # Build, index, and activate a fresh HTS snapshot
//! hts ingest hts --snapshot US-HTS-2025-10-18
//! hts index --snapshot US-HTS-2025-10-18
//! hts promote US-HTS-2025-10-18
//!
//! # Query it
//! hts tariff 0101210010
//! hts search "woven cotton fabric" --mode fuzzy
//! hts serve
//! ```

mod config;
mod embedding;
mod index_cmd;
mod ingest_ecfr;
mod ingest_hts;
mod models;
mod search;
mod sections;
mod server;
mod snapshot;
mod status;
mod store;
mod tariff;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Tariff Harness CLI, a snapshot-versioned ingestion and retrieval
/// service for US tariff and regulatory reference data.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/hts.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "hts",
    about = "Tariff Harness: snapshot-versioned ingestion and retrieval for US tariff data",
    version,
    long_about = "Tariff Harness fetches the US Harmonized Tariff Schedule and eCFR into \
    immutable dated snapshots, indexes snapshots into per-snapshot Qdrant collections for \
    semantic search, and serves tariff lookup and search via a CLI and HTTP API."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/hts.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Ingest source data into a new snapshot.
    ///
    /// Fetches from the upstream API and writes an immutable snapshot
    /// directory with a manifest. Ingestion never touches the active
    /// pointer; promote the snapshot separately once it is complete.
    Ingest {
        #[command(subcommand)]
        corpus: IngestCorpus,
    },

    /// Embed a snapshot and upsert it into its Qdrant collection.
    ///
    /// Point ids are deterministic, so re-running upserts in place.
    /// Requires an embedding provider to be configured.
    Index {
        /// Snapshot id, e.g. US-HTS-2025-10-18.
        #[arg(long)]
        snapshot: String,

        /// Override the collection name (default: derived from the
        /// snapshot id, e.g. us_hts_US-HTS-2025-10-18).
        #[arg(long)]
        collection: Option<String>,

        /// Drop and recreate the collection before indexing.
        #[arg(long)]
        recreate: bool,
    },

    /// Promote a snapshot to active.
    ///
    /// Verifies the snapshot directory and manifest exist, then swaps the
    /// active-version marker atomically. No index rebuild happens.
    Promote {
        /// Snapshot id to activate.
        snapshot: String,
    },

    /// List snapshots on disk and show which one is active.
    Status,

    /// Search the active snapshot.
    Search {
        /// The search query string.
        query: String,

        /// Search mode: `fuzzy` (article descriptions) or `semantic`
        /// (Qdrant vector search; requires embeddings).
        #[arg(long, default_value = "fuzzy")]
        mode: String,

        /// Maximum number of results to return.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Look up a 10-digit HTS code in the active snapshot.
    Tariff {
        /// Full statistical reporting number, e.g. 0101210010.
        code: String,
    },

    /// Start the HTTP API server.
    ///
    /// Binds to the address configured in `[server].bind` and serves
    /// `/v1/health`, `/v1/tariff`, `/v1/search`, and `/v1/snapshot`.
    Serve,
}

/// Ingestion subcommands, one per corpus.
#[derive(Subcommand)]
enum IngestCorpus {
    /// Fetch the HTS schedule chapter-by-chapter from the USITC export
    /// endpoint.
    Hts {
        /// Snapshot id to create, e.g. US-HTS-2025-10-18.
        #[arg(long)]
        snapshot: String,
    },

    /// Fetch eCFR titles from the versioner API and flatten them to
    /// section documents.
    Ecfr {
        /// Snapshot id to create, e.g. US-ECFR-2025-10-18.
        #[arg(long)]
        snapshot: String,

        /// Point-in-time date passed to the versioner API (YYYY-MM-DD).
        #[arg(long)]
        date: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Ingest { corpus } => match corpus {
            IngestCorpus::Hts { snapshot } => {
                ingest_hts::run_ingest_hts(&cfg, &snapshot).await?;
            }
            IngestCorpus::Ecfr { snapshot, date } => {
                ingest_ecfr::run_ingest_ecfr(&cfg, &snapshot, &date).await?;
            }
        },
        Commands::Index {
            snapshot,
            collection,
            recreate,
        } => {
            index_cmd::run_index(&cfg, &snapshot, collection, recreate).await?;
        }
        Commands::Promote { snapshot } => {
            snapshot::run_promote(&cfg, &snapshot)?;
        }
        Commands::Status => {
            status::run_status(&cfg)?;
        }
        Commands::Search { query, mode, limit } => {
            search::run_search(&cfg, &query, &mode, limit).await?;
        }
        Commands::Tariff { code } => {
            tariff::run_tariff(&cfg, &code)?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
