//! CLI tariff lookup against the active snapshot.

use anyhow::{bail, Context, Result};

use crate::config::Config;
use crate::sections::{chapter_to_section, dev_citation};
use crate::snapshot::{active_snapshot_id, snapshot_dir};
use crate::store::Store;

pub fn run_tariff(config: &Config, code: &str) -> Result<()> {
    let snapshot_id = active_snapshot_id(config);
    let dir = snapshot_dir(&config.snapshots.root, &snapshot_id)?;
    let store = Store::load(&dir)
        .with_context(|| format!("Failed to load active snapshot {}", snapshot_id))?;

    let Some(rec) = store.get_by_code(code) else {
        bail!("code not found: {}", code);
    };

    println!("snapshot: {}", snapshot_id);
    println!("code:     {}", rec.hts10);
    println!(
        "chapter:  {} (section {})",
        rec.chapter,
        chapter_to_section(rec.chapter).unwrap_or("?")
    );
    println!("article:  {}", rec.article);
    println!("uoq:      {}", rec.uoq);
    println!(
        "rates:    general={} special={} col2={}",
        rec.rate_general, rec.rate_special, rec.rate_col2
    );
    println!("{}", dev_citation(rec.chapter, &rec.hts10));

    Ok(())
}
