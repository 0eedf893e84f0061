//! Snapshot identity, disk layout, and the active-pointer protocol.
//!
//! A snapshot is an immutable dated capture of one corpus, named
//! `US-HTS-YYYY-MM-DD` or `US-ECFR-YYYY-MM-DD`. Snapshots live under the
//! configured root:
//!
//! ```text
//! <root>/us/hts/US-HTS-2025-10-18/csv/ch_01.csv
//! <root>/us/hts/US-HTS-2025-10-18/manifest.jsonl
//! <root>/us/ecfr/US-ECFR-2025-10-18/xml/title-19.xml
//! <root>/us/ecfr/US-ECFR-2025-10-18/manifest.jsonl
//! <root>/active_version.json
//! ```
//!
//! Exactly one snapshot is active at a time. The marker file holds
//! `{"snapshot_id": "..."}` and is swapped atomically on promotion, so a
//! concurrent reader sees either the old pointer or the new one, never a
//! torn write.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::Config;

/// Which corpus a snapshot captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corpus {
    Hts,
    Ecfr,
}

impl Corpus {
    /// Classifies a snapshot id by its prefix.
    pub fn from_snapshot_id(id: &str) -> Option<Corpus> {
        if id.starts_with("US-HTS-") {
            Some(Corpus::Hts)
        } else if id.starts_with("US-ECFR-") {
            Some(Corpus::Ecfr)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Corpus::Hts => "hts",
            Corpus::Ecfr => "ecfr",
        }
    }
}

/// Contents of the active-version marker file.
#[derive(Debug, Serialize, Deserialize)]
struct ActiveVersion {
    snapshot_id: String,
}

/// Directory of a snapshot under the root, e.g. `<root>/us/hts/<id>`.
pub fn snapshot_dir(root: &Path, snapshot_id: &str) -> Result<PathBuf> {
    let corpus = Corpus::from_snapshot_id(snapshot_id).ok_or_else(|| {
        anyhow::anyhow!(
            "Unrecognized snapshot id '{}'. Expected US-HTS-YYYY-MM-DD or US-ECFR-YYYY-MM-DD.",
            snapshot_id
        )
    })?;
    Ok(root.join("us").join(corpus.as_str()).join(snapshot_id))
}

/// Qdrant collection for a snapshot. Collection names cannot contain `:`,
/// so the id is joined with a corpus prefix by underscore, matching the
/// collections the indexer writes.
pub fn collection_name(snapshot_id: &str) -> Result<String> {
    let corpus = Corpus::from_snapshot_id(snapshot_id)
        .ok_or_else(|| anyhow::anyhow!("Unrecognized snapshot id '{}'", snapshot_id))?;
    Ok(format!("us_{}_{}", corpus.as_str(), snapshot_id))
}

/// Writes the active-version marker atomically (temp file + rename).
pub fn set_active(marker_path: &Path, snapshot_id: &str) -> Result<()> {
    if let Some(parent) = marker_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let body = serde_json::to_string(&ActiveVersion {
        snapshot_id: snapshot_id.to_string(),
    })?;

    let tmp = marker_path.with_extension("json.tmp");
    std::fs::write(&tmp, &body).with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, marker_path)
        .with_context(|| format!("Failed to replace {}", marker_path.display()))?;

    Ok(())
}

/// Reads the active-version marker.
pub fn get_active(marker_path: &Path) -> Result<String> {
    let body = std::fs::read_to_string(marker_path)
        .with_context(|| format!("Failed to read {}", marker_path.display()))?;
    let parsed: ActiveVersion =
        serde_json::from_str(&body).with_context(|| "Invalid active-version marker")?;
    Ok(parsed.snapshot_id)
}

/// Resolves the currently active snapshot id.
///
/// Resolution order: marker file if present and parseable, then the
/// `SNAPSHOT_ID` environment variable, then the configured default. A
/// corrupt marker falls through rather than failing the read path.
pub fn active_snapshot_id(config: &Config) -> String {
    let marker = config.snapshots.active_file_path();
    if marker.exists() {
        if let Ok(id) = get_active(&marker) {
            return id;
        }
    }
    std::env::var("SNAPSHOT_ID").unwrap_or_else(|_| config.snapshots.default_snapshot.clone())
}

/// Promotes a snapshot: verifies it exists on disk with a manifest, then
/// swaps the active pointer. No index rebuild happens; readers pick up the
/// new snapshot on their next load.
pub fn run_promote(config: &Config, snapshot_id: &str) -> Result<()> {
    let dir = snapshot_dir(&config.snapshots.root, snapshot_id)?;
    if !dir.exists() {
        bail!("Snapshot directory does not exist: {}", dir.display());
    }
    let manifest = dir.join("manifest.jsonl");
    if !manifest.exists() {
        bail!(
            "Snapshot {} has no manifest.jsonl; ingest did not complete",
            snapshot_id
        );
    }

    let marker = config.snapshots.active_file_path();
    let previous = if marker.exists() {
        get_active(&marker).ok()
    } else {
        None
    };

    set_active(&marker, snapshot_id)?;

    match previous {
        Some(prev) if prev != snapshot_id => {
            println!("promoted {} (was {})", snapshot_id, prev);
        }
        Some(_) => println!("promoted {} (already active)", snapshot_id),
        None => println!("promoted {}", snapshot_id),
    }

    Ok(())
}

/// Counts the manifest lines of a snapshot (rows fetched for HTS, section
/// documents for eCFR). Returns 0 when the manifest is missing.
pub fn manifest_entry_count(root: &Path, snapshot_id: &str) -> usize {
    let Ok(dir) = snapshot_dir(root, snapshot_id) else {
        return 0;
    };
    match std::fs::read_to_string(dir.join("manifest.jsonl")) {
        Ok(body) => body.lines().filter(|l| !l.trim().is_empty()).count(),
        Err(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corpus_classification() {
        assert_eq!(
            Corpus::from_snapshot_id("US-HTS-2025-10-18"),
            Some(Corpus::Hts)
        );
        assert_eq!(
            Corpus::from_snapshot_id("US-ECFR-2025-10-18"),
            Some(Corpus::Ecfr)
        );
        assert_eq!(Corpus::from_snapshot_id("EU-TARIC-2025-01-01"), None);
    }

    #[test]
    fn test_snapshot_dir_layout() {
        let dir = snapshot_dir(Path::new("/data"), "US-HTS-2025-10-18").unwrap();
        assert_eq!(dir, PathBuf::from("/data/us/hts/US-HTS-2025-10-18"));

        let dir = snapshot_dir(Path::new("/data"), "US-ECFR-2025-10-18").unwrap();
        assert_eq!(dir, PathBuf::from("/data/us/ecfr/US-ECFR-2025-10-18"));
    }

    #[test]
    fn test_collection_name_has_no_colon() {
        let name = collection_name("US-HTS-2025-10-18").unwrap();
        assert_eq!(name, "us_hts_US-HTS-2025-10-18");
        assert!(!name.contains(':'));
    }

    #[test]
    fn test_set_get_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let marker = tmp.path().join("nested").join("active_version.json");

        set_active(&marker, "US-HTS-2025-10-18").unwrap();
        assert_eq!(get_active(&marker).unwrap(), "US-HTS-2025-10-18");

        // Re-promotion overwrites
        set_active(&marker, "US-HTS-2025-11-01").unwrap();
        assert_eq!(get_active(&marker).unwrap(), "US-HTS-2025-11-01");
    }

    #[test]
    fn test_no_tmp_file_left_behind() {
        let tmp = tempfile::tempdir().unwrap();
        let marker = tmp.path().join("active_version.json");
        set_active(&marker, "US-HTS-2025-10-18").unwrap();

        let entries: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec!["active_version.json"]);
    }

    #[test]
    fn test_corrupt_marker_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let marker = tmp.path().join("active_version.json");
        std::fs::write(&marker, "not json").unwrap();
        assert!(get_active(&marker).is_err());
    }

    #[test]
    fn test_promote_requires_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        let config = test_config(tmp.path());

        // Missing directory
        assert!(run_promote(&config, "US-HTS-2025-10-18").is_err());

        // Directory but no manifest
        let dir = snapshot_dir(tmp.path(), "US-HTS-2025-10-18").unwrap();
        std::fs::create_dir_all(&dir).unwrap();
        assert!(run_promote(&config, "US-HTS-2025-10-18").is_err());

        // Manifest present
        std::fs::write(dir.join("manifest.jsonl"), "{}\n").unwrap();
        run_promote(&config, "US-HTS-2025-10-18").unwrap();
        assert_eq!(
            get_active(&config.snapshots.active_file_path()).unwrap(),
            "US-HTS-2025-10-18"
        );
    }

    #[test]
    fn test_manifest_entry_count() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = snapshot_dir(tmp.path(), "US-HTS-2025-10-18").unwrap();
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("manifest.jsonl"), "{}\n{}\n\n{}\n").unwrap();
        assert_eq!(manifest_entry_count(tmp.path(), "US-HTS-2025-10-18"), 3);
        assert_eq!(manifest_entry_count(tmp.path(), "US-HTS-1999-01-01"), 0);
    }

    fn test_config(root: &Path) -> Config {
        let toml = format!(
            "[server]\nbind = \"127.0.0.1:0\"\n[snapshots]\nroot = \"{}\"\n",
            root.display()
        );
        let f = tmpfile_with(&toml);
        crate::config::load_config(f.path()).unwrap()
    }

    fn tmpfile_with(content: &str) -> tempfile::NamedTempFile {
        use std::io::Write;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }
}
