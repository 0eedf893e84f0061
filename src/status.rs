//! Snapshot inventory listing.
//!
//! Walks the snapshot root and prints each snapshot with its manifest
//! entry count and whether it is the active one, in the same table style
//! the rest of the CLI uses.

use anyhow::Result;
use std::path::Path;

use crate::config::Config;
use crate::snapshot::{active_snapshot_id, manifest_entry_count};

fn list_corpus_snapshots(root: &Path, corpus: &str) -> Vec<String> {
    let dir = root.join("us").join(corpus);
    let Ok(entries) = std::fs::read_dir(&dir) else {
        return Vec::new();
    };

    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

pub fn run_status(config: &Config) -> Result<()> {
    let root = &config.snapshots.root;
    let active = active_snapshot_id(config);

    println!("{:<28} {:<8} {:>10}  ACTIVE", "SNAPSHOT", "CORPUS", "ENTRIES");

    let mut any = false;
    for corpus in ["hts", "ecfr"] {
        for id in list_corpus_snapshots(root, corpus) {
            let entries = manifest_entry_count(root, &id);
            let marker = if id == active { "*" } else { "" };
            println!("{:<28} {:<8} {:>10}  {}", id, corpus, entries, marker);
            any = true;
        }
    }

    if !any {
        println!("(no snapshots under {})", root.display());
    }

    println!();
    println!("active snapshot: {}", active);

    Ok(())
}
