//! HTS snapshot ingestion from the USITC export endpoint.
//!
//! Fetches the schedule chapter by chapter as CSV
//! (`?from=CC01&to=CC99&format=CSV&styles=false`), writes each chapter to
//! `csv/ch_CC.csv` under the snapshot directory, and records every file in
//! `manifest.jsonl` with a SHA-256 of its exact bytes. A failed chapter
//! aborts the run: a partial snapshot must never become promotable.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::Duration;

use crate::config::Config;
use crate::models::ManifestEntry;
use crate::snapshot::{snapshot_dir, Corpus};

/// The 99 chapter ranges queried against the export endpoint:
/// `("0101", "0199")` through `("9901", "9999")`.
fn chapter_ranges() -> impl Iterator<Item = (String, String)> {
    (1u32..100).map(|ch| (format!("{:02}01", ch), format!("{:02}99", ch)))
}

async fn fetch_chapter_csv(
    client: &reqwest::Client,
    export_url: &str,
    from: &str,
    to: &str,
) -> Result<String> {
    let resp = client
        .get(export_url)
        .query(&[("from", from), ("to", to), ("format", "CSV"), ("styles", "false")])
        .send()
        .await
        .with_context(|| format!("Export request failed for {}-{}", from, to))?
        .error_for_status()
        .with_context(|| format!("Export returned an error for {}-{}", from, to))?;

    Ok(resp.text().await?)
}

fn sha256_hex(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Runs a full HTS ingest into the given snapshot id.
pub async fn run_ingest_hts(config: &Config, snapshot_id: &str) -> Result<()> {
    if Corpus::from_snapshot_id(snapshot_id) != Some(Corpus::Hts) {
        anyhow::bail!(
            "Snapshot id '{}' is not an HTS snapshot (expected US-HTS-YYYY-MM-DD)",
            snapshot_id
        );
    }

    let base = snapshot_dir(&config.snapshots.root, snapshot_id)?;
    let csv_dir = base.join("csv");
    std::fs::create_dir_all(&csv_dir)
        .with_context(|| format!("Failed to create {}", csv_dir.display()))?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.ingest.timeout_secs))
        .build()?;

    let mut manifest: Vec<ManifestEntry> = Vec::new();

    for (from, to) in chapter_ranges() {
        let text = fetch_chapter_csv(&client, &config.ingest.hts_export_url, &from, &to).await?;
        let hash = sha256_hex(&text);

        let out = csv_dir.join(format!("ch_{}.csv", &from[..2]));
        std::fs::write(&out, &text).with_context(|| format!("Failed to write {}", out.display()))?;

        println!("saved {} ({})", out.display(), &hash[..8]);

        // Manifest paths are relative to the snapshot directory.
        let rel = out.strip_prefix(&base).unwrap_or(&out);
        manifest.push(ManifestEntry {
            path: rel.display().to_string(),
            sha256: hash,
            from,
            to,
        });
    }

    write_manifest(&base, &manifest)?;
    println!("snapshot complete: {}", snapshot_id);

    Ok(())
}

fn write_manifest(base: &Path, entries: &[ManifestEntry]) -> Result<()> {
    let mut body = String::new();
    for entry in entries {
        body.push_str(&serde_json::to_string(entry)?);
        body.push('\n');
    }
    let path = base.join("manifest.jsonl");
    std::fs::write(&path, body).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chapter_ranges_cover_schedule() {
        let ranges: Vec<_> = chapter_ranges().collect();
        assert_eq!(ranges.len(), 99);
        assert_eq!(ranges[0], ("0101".to_string(), "0199".to_string()));
        assert_eq!(ranges[98], ("9901".to_string(), "9999".to_string()));
    }

    #[test]
    fn test_sha256_hex() {
        // Known digest of the empty string.
        assert_eq!(
            sha256_hex(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(sha256_hex("a").len(), 64);
    }

    #[test]
    fn test_manifest_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let entries = vec![ManifestEntry {
            path: "csv/ch_01.csv".to_string(),
            sha256: sha256_hex("body"),
            from: "0101".to_string(),
            to: "0199".to_string(),
        }];
        write_manifest(tmp.path(), &entries).unwrap();

        let body = std::fs::read_to_string(tmp.path().join("manifest.jsonl")).unwrap();
        let parsed: ManifestEntry = serde_json::from_str(body.lines().next().unwrap()).unwrap();
        assert_eq!(parsed.from, "0101");
        assert_eq!(parsed.sha256, entries[0].sha256);
    }

    #[test]
    fn test_non_hts_snapshot_rejected() {
        let config = minimal_config();
        let err = tokio_test_block(run_ingest_hts(&config, "US-ECFR-2025-10-18"));
        assert!(err.is_err());
    }

    fn minimal_config() -> Config {
        use std::io::Write;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"[server]\nbind = \"127.0.0.1:0\"\n").unwrap();
        crate::config::load_config(f.path()).unwrap()
    }

    fn tokio_test_block<F: std::future::Future>(fut: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(fut)
    }
}
