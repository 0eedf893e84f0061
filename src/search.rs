//! Fuzzy and semantic search over the active snapshot.
//!
//! Fuzzy mode ranks HTS article descriptions in the in-memory store.
//! Semantic mode embeds the query and searches the active snapshot's
//! Qdrant collection. Both are exposed through the CLI here and reused by
//! the HTTP server.

use anyhow::{bail, Context, Result};
use qdrant_client::qdrant::SearchPointsBuilder;
use qdrant_client::Qdrant;
use std::time::Duration;

use crate::config::Config;
use crate::embedding;
use crate::models::ScoredDoc;
use crate::sections::dev_citation;
use crate::snapshot::{active_snapshot_id, collection_name, snapshot_dir};
use crate::store::Store;

/// Semantic search against a snapshot's Qdrant collection.
pub async fn semantic_search(
    config: &Config,
    snapshot_id: &str,
    query: &str,
    limit: usize,
) -> Result<Vec<ScoredDoc>> {
    if !config.embedding.is_enabled() {
        bail!("Mode 'semantic' requires embeddings. Set [embedding] provider in config.");
    }

    let provider = embedding::create_provider(&config.embedding)?;
    let query_vec = embedding::embed_query(provider.as_ref(), &config.embedding, query).await?;

    let client = Qdrant::from_url(&config.qdrant.url)
        .timeout(Duration::from_secs(config.qdrant.timeout_secs))
        .build()
        .context("Failed to create Qdrant client")?;

    let collection = collection_name(snapshot_id)?;

    let results = client
        .search_points(
            SearchPointsBuilder::new(&collection, query_vec, limit as u64).with_payload(true),
        )
        .await
        .context("Failed to search Qdrant")?;

    let docs = results
        .result
        .into_iter()
        .map(|point| {
            let payload = serde_json::to_value(&point.payload)
                .unwrap_or(serde_json::Value::Null);
            ScoredDoc {
                score: point.score,
                payload,
            }
        })
        .collect();

    Ok(docs)
}

/// CLI search command: prints ranked results for either mode.
pub async fn run_search(
    config: &Config,
    query: &str,
    mode: &str,
    limit: Option<usize>,
) -> Result<()> {
    let query = query.trim();
    if query.chars().count() < config.retrieval.min_query_len {
        bail!(
            "Query must be at least {} characters",
            config.retrieval.min_query_len
        );
    }

    let snapshot_id = active_snapshot_id(config);

    match mode {
        "fuzzy" => {
            let limit = limit.unwrap_or(config.retrieval.fuzzy_limit);
            let dir = snapshot_dir(&config.snapshots.root, &snapshot_id)?;
            let store = Store::load(&dir)
                .with_context(|| format!("Failed to load active snapshot {}", snapshot_id))?;

            let hits = store.search_article(query, limit);
            if hits.is_empty() {
                println!("No results.");
                return Ok(());
            }

            println!("snapshot: {}", snapshot_id);
            for (i, (rec, score)) in hits.iter().enumerate() {
                println!("{}. [{}] {}", i + 1, score, rec.article);
                println!("    code: {}  uoq: {}", rec.hts10, rec.uoq);
                println!(
                    "    rates: general={} special={} col2={}",
                    rec.rate_general, rec.rate_special, rec.rate_col2
                );
                println!("    {}", dev_citation(rec.chapter, &rec.hts10));
                println!();
            }
        }
        "semantic" => {
            let limit = limit.unwrap_or(config.retrieval.semantic_limit);
            let docs = semantic_search(config, &snapshot_id, query, limit).await?;
            if docs.is_empty() {
                println!("No results.");
                return Ok(());
            }

            println!("snapshot: {}", snapshot_id);
            for (i, doc) in docs.iter().enumerate() {
                let label = doc
                    .payload
                    .get("citation")
                    .or_else(|| doc.payload.get("Article Description"))
                    .or_else(|| doc.payload.get("heading"))
                    .and_then(|v| v.as_str())
                    .unwrap_or("(no label)");
                println!("{}. [{:.4}] {}", i + 1, doc.score, label);
            }
        }
        other => bail!("Unknown search mode: {}. Use fuzzy or semantic.", other),
    }

    Ok(())
}
