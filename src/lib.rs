//! # Tariff Harness
//!
//! A snapshot-versioned ingestion and retrieval service for US trade-law
//! reference data: the Harmonized Tariff Schedule (HTS) and the Electronic
//! Code of Federal Regulations (eCFR).
//!
//! Tariff Harness fetches source data into immutable, dated snapshots on
//! disk, indexes snapshots into per-snapshot Qdrant collections for semantic
//! search, and serves tariff lookup and search over HTTP. Exactly one
//! snapshot is "active" at a time; promotion is an atomic pointer swap with
//! no index rebuild.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌───────────────┐
//! │   Sources    │──▶│  Snapshots   │──▶│    Qdrant     │
//! │ USITC / eCFR │   │ csv+manifest │   │ one coll/snap │
//! └──────────────┘   └──────┬───────┘   └───────┬───────┘
//!                           │ active pointer    │
//!                     ┌─────┴─────┐       ┌─────┴─────┐
//!                     │    CLI    │       │   HTTP    │
//!                     │   (hts)   │       │  (axum)   │
//!                     └───────────┘       └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! hts ingest hts --snapshot US-HTS-2025-10-18   # fetch chapter CSVs
//! hts index --snapshot US-HTS-2025-10-18        # embed + upsert to Qdrant
//! hts promote US-HTS-2025-10-18                 # activate the snapshot
//! hts search "woven cotton fabric"              # fuzzy article search
//! hts serve                                     # start the HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`sections`] | HTS chapter to section mapping |
//! | [`snapshot`] | Snapshot layout and active-pointer protocol |
//! | [`store`] | In-memory HTS record store with fuzzy search |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`ingest_hts`] | USITC chapter CSV ingestion |
//! | [`ingest_ecfr`] | eCFR title XML ingestion |
//! | [`index_cmd`] | Qdrant collection indexing |
//! | [`search`] | Fuzzy and semantic search |
//! | [`server`] | HTTP API server |

pub mod config;
pub mod embedding;
pub mod index_cmd;
pub mod ingest_ecfr;
pub mod ingest_hts;
pub mod models;
pub mod search;
pub mod sections;
pub mod server;
pub mod snapshot;
pub mod status;
pub mod store;
pub mod tariff;
