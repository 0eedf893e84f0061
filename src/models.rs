//! Core data models used throughout Tariff Harness.
//!
//! These types represent the tariff records, manifest entries, and section
//! documents that flow through the ingestion and retrieval pipeline.

use serde::{Deserialize, Serialize};

/// Disclaimer stamped on every API response. The harness serves reference
/// data only; the signed PDFs remain the legal source of record.
pub const DEV_DISCLAIMER: &str = "DEV ONLY — non-legal; PDFs required for prod";

/// A single 10-digit HTS line, built from one CSV row of a snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct HtsRecord {
    /// Full statistical reporting number: heading/subheading + stat suffix,
    /// spaces removed (e.g. `0101210010`).
    pub hts10: String,
    /// Chapter number (first two digits of the heading), 0 when non-numeric.
    pub chapter: u8,
    /// Six-digit heading/subheading prefix (with its embedded dot).
    pub heading6: String,
    /// Statistical suffix as printed in the schedule.
    pub stat_suffix: String,
    /// Article description.
    pub article: String,
    /// Unit of quantity.
    pub uoq: String,
    /// Column 1 general rate of duty.
    pub rate_general: String,
    /// Column 1 special rate of duty.
    pub rate_special: String,
    /// Column 2 rate of duty.
    pub rate_col2: String,
}

/// One line of an HTS snapshot's `manifest.jsonl`: a fetched chapter CSV
/// and the hash of its exact bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub path: String,
    pub sha256: String,
    pub from: String,
    pub to: String,
}

/// A section-level eCFR document, one line of an eCFR snapshot's
/// `manifest.jsonl`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EcfrSection {
    pub snapshot_date: String,
    pub source: String,
    pub title: String,
    pub title_name: Option<String>,
    pub section: Option<String>,
    pub part: Option<String>,
    pub subpart: Option<String>,
    pub heading: String,
    pub citation: Option<String>,
    pub path: Option<String>,
    pub node_type: String,
    pub text: String,
}

impl EcfrSection {
    /// Text submitted to the embedding model: citation and heading up front
    /// so the vector carries the document's identity, then the body.
    pub fn embed_text(&self) -> String {
        let citation = self.citation.as_deref().unwrap_or("");
        format!("{} {}\n\n{}", citation, self.heading, self.text)
            .trim()
            .to_string()
    }
}

/// A semantic search hit: the stored payload plus Qdrant's cosine score.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredDoc {
    pub score: f32,
    pub payload: serde_json::Value,
}
