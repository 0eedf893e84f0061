//! In-memory HTS record store.
//!
//! Loads every chapter CSV of a snapshot into memory and serves exact
//! code lookup plus fuzzy article search. The full schedule is ~30k rows
//! of short strings, so an in-process store is comfortably small and keeps
//! the read path free of database round-trips.
//!
//! CSV headers vary across USITC export vintages ("Heading/Subheading" vs
//! "heading subheading"), so headers are normalized before mapping to
//! canonical keys.

use anyhow::{bail, Context, Result};
use nucleo_matcher::pattern::{AtomKind, CaseMatching, Normalization, Pattern};
use nucleo_matcher::{Config as MatcherConfig, Matcher, Utf32Str};
use std::collections::HashMap;
use std::path::Path;

use crate::models::HtsRecord;

/// Lowercases a header and strips spaces, slashes, and dashes, so that
/// "Heading/Subheading" and "heading subheading" normalize identically.
fn normalize_header(header: &str) -> String {
    header
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, ' ' | '/' | '-'))
        .collect()
}

/// Maps a normalized header to its canonical column key. Unknown headers
/// pass through normalized, so extra export columns survive untouched.
fn canonical_key(normalized: &str) -> &str {
    match normalized {
        "headingsubheading" => "hs",
        "statsuffix" => "stat",
        "articledescription" => "article",
        "unitofquantity" => "uoq",
        "generalrateofduty" => "gen",
        "specialrateofduty" => "spec",
        "column2rateofduty" => "col2",
        other => other,
    }
}

/// Byte-clamped prefix; USITC headings are ASCII so this never lands
/// inside a multi-byte character in practice, but a non-boundary falls
/// back to the full string rather than panicking.
fn prefix(s: &str, n: usize) -> &str {
    if s.len() <= n {
        return s;
    }
    s.get(..n).unwrap_or(s)
}

fn build_record(row: &HashMap<String, String>) -> HtsRecord {
    let hs = row.get("hs").map(String::as_str).unwrap_or("").to_string();
    let stat = row
        .get("stat")
        .map(|s| s.trim().to_string())
        .unwrap_or_default();

    let hts10: String = format!("{}{}", hs, stat)
        .chars()
        .filter(|c| *c != ' ')
        .collect();

    let two = prefix(&hs, 2);
    let chapter = if two.len() == 2 && two.chars().all(|c| c.is_ascii_digit()) {
        two.parse::<u8>().unwrap_or(0)
    } else {
        0
    };

    let field = |key: &str| row.get(key).cloned().unwrap_or_default();

    HtsRecord {
        hts10,
        chapter,
        heading6: prefix(&hs, 7).to_string(),
        stat_suffix: stat,
        article: field("article"),
        uoq: field("uoq"),
        rate_general: field("gen"),
        rate_special: field("spec"),
        rate_col2: field("col2"),
    }
}

/// The loaded store: all records in file order, plus an exact-code index.
pub struct Store {
    records: Vec<HtsRecord>,
    by_code: HashMap<String, usize>,
}

impl Store {
    /// Loads every `*.csv` under `<snapshot_dir>/csv`, in filename order
    /// for deterministic record ordering. Rows that fail to parse are
    /// skipped; a missing csv directory is a hard error because it means
    /// the snapshot was never ingested.
    pub fn load(snapshot_dir: &Path) -> Result<Store> {
        let csv_dir = snapshot_dir.join("csv");
        if !csv_dir.is_dir() {
            bail!("Snapshot csv directory missing: {}", csv_dir.display());
        }

        let mut paths: Vec<_> = std::fs::read_dir(&csv_dir)
            .with_context(|| format!("Failed to read {}", csv_dir.display()))?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "csv"))
            .collect();
        paths.sort();

        let mut store = Store {
            records: Vec::new(),
            by_code: HashMap::new(),
        };

        for path in &paths {
            store
                .load_csv(path)
                .with_context(|| format!("Failed to load {}", path.display()))?;
        }

        Ok(store)
    }

    fn load_csv(&mut self, path: &Path) -> Result<()> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;

        let keys: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| canonical_key(&normalize_header(h)).to_string())
            .collect();

        for result in reader.records() {
            let Ok(record) = result else {
                // Malformed row; the rest of the file is still usable.
                continue;
            };

            let row: HashMap<String, String> = keys
                .iter()
                .cloned()
                .zip(record.iter().map(str::to_string))
                .collect();

            let rec = build_record(&row);
            let idx = self.records.len();
            if !rec.hts10.is_empty() {
                self.by_code.insert(rec.hts10.clone(), idx);
            }
            self.records.push(rec);
        }

        Ok(())
    }

    /// An empty store, for serving before any snapshot has been ingested.
    pub fn empty() -> Store {
        Store {
            records: Vec::new(),
            by_code: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Exact lookup by 10-digit code. Spaces in the query are ignored, so
    /// `"0101.21 0010"` and `"0101210010"` resolve identically once the
    /// caller strips formatting dots.
    pub fn get_by_code(&self, code: &str) -> Option<&HtsRecord> {
        let cleaned: String = code.chars().filter(|c| *c != ' ').collect();
        self.by_code.get(&cleaned).map(|&i| &self.records[i])
    }

    /// Fuzzy search over article descriptions. Returns up to `limit`
    /// records ranked by match score, ties broken by load order so the
    /// result is deterministic.
    pub fn search_article(&self, query: &str, limit: usize) -> Vec<(&HtsRecord, u32)> {
        let pattern = Pattern::new(
            query,
            CaseMatching::Ignore,
            Normalization::Smart,
            AtomKind::Fuzzy,
        );
        let mut matcher = Matcher::new(MatcherConfig::DEFAULT);

        let mut scored: Vec<(usize, u32)> = self
            .records
            .iter()
            .enumerate()
            .filter_map(|(i, rec)| {
                let mut buf = Vec::new();
                let haystack = Utf32Str::new(&rec.article, &mut buf);
                pattern.score(haystack, &mut matcher).map(|s| (i, s))
            })
            .collect();

        scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(limit);

        scored
            .into_iter()
            .map(|(i, s)| (&self.records[i], s))
            .collect()
    }
}
