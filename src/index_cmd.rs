//! Qdrant indexing for a snapshot.
//!
//! Streams a snapshot's documents (HTS CSV rows or eCFR section documents),
//! embeds them in batches, and upserts them into the snapshot's collection.
//! Point ids are UUIDv5 over `<snapshot>:<position>`, so re-running the
//! indexer upserts in place instead of duplicating points.
//!
//! One collection per snapshot keeps promotion trivial: the active pointer
//! picks the collection, and old snapshots stay queryable until their
//! collections are dropped.

use anyhow::{bail, Context, Result};
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PointStruct, UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

use crate::config::Config;
use crate::embedding::{self, EmbeddingProvider};
use crate::models::EcfrSection;
use crate::snapshot::{collection_name, snapshot_dir, Corpus};

/// Builds the embed text for one HTS row: the chapter, then every
/// non-empty cell as `header: value`, pipe-separated.
fn row_to_text(chapter: &str, headers: &[String], cells: &[String]) -> String {
    let mut parts = vec![format!("chapter: {}", chapter)];
    for (k, v) in headers.iter().zip(cells.iter()) {
        if !v.is_empty() {
            parts.push(format!("{}: {}", k, v));
        }
    }
    parts.join(" | ")
}

/// Deterministic point id for a document at a stable position within a
/// snapshot.
fn point_id(name: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_DNS, name.as_bytes()).to_string()
}

/// Chapter label from a snapshot CSV filename (`ch_52.csv` → `52`).
fn chapter_from_filename(path: &Path) -> Option<String> {
    path.file_stem()?
        .to_str()?
        .split('_')
        .nth(1)
        .map(str::to_string)
}

fn payload_map(
    value: serde_json::Value,
) -> Result<HashMap<String, qdrant_client::qdrant::Value>> {
    serde_json::from_value(value).context("Failed to convert payload")
}

/// Accumulates texts and points, flushing embed+upsert batches.
struct Batcher<'a> {
    client: &'a Qdrant,
    provider: &'a dyn EmbeddingProvider,
    config: &'a Config,
    collection: &'a str,
    texts: Vec<String>,
    ids: Vec<String>,
    payloads: Vec<HashMap<String, qdrant_client::qdrant::Value>>,
    total: usize,
}

impl<'a> Batcher<'a> {
    fn new(
        client: &'a Qdrant,
        provider: &'a dyn EmbeddingProvider,
        config: &'a Config,
        collection: &'a str,
    ) -> Self {
        Self {
            client,
            provider,
            config,
            collection,
            texts: Vec::new(),
            ids: Vec::new(),
            payloads: Vec::new(),
            total: 0,
        }
    }

    async fn push(
        &mut self,
        id: String,
        text: String,
        payload: HashMap<String, qdrant_client::qdrant::Value>,
    ) -> Result<()> {
        self.texts
            .push(format!("{}{}", self.config.embedding.passage_prefix, text));
        self.ids.push(id);
        self.payloads.push(payload);

        if self.texts.len() >= self.config.qdrant.index_batch_size {
            self.flush().await?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        if self.texts.is_empty() {
            return Ok(());
        }

        let vectors =
            embedding::embed_texts(self.provider, &self.config.embedding, &self.texts).await?;
        if vectors.len() != self.texts.len() {
            bail!(
                "Embedding count mismatch: {} texts, {} vectors",
                self.texts.len(),
                vectors.len()
            );
        }

        let points: Vec<PointStruct> = self
            .ids
            .drain(..)
            .zip(vectors)
            .zip(self.payloads.drain(..))
            .map(|((id, vector), payload)| PointStruct::new(id, vector, payload))
            .collect();

        let batch_len = points.len();
        self.client
            .upsert_points(UpsertPointsBuilder::new(self.collection, points))
            .await
            .context("Failed to upsert points to Qdrant")?;

        self.total += batch_len;
        self.texts.clear();
        println!("upserted {} points (total: {})", batch_len, self.total);

        Ok(())
    }
}

/// Ensure the collection exists with the expected dimensionality.
/// With `recreate`, an existing collection is dropped first (full rebuild).
async fn ensure_collection(
    client: &Qdrant,
    name: &str,
    dims: u64,
    recreate: bool,
) -> Result<()> {
    let exists = client.collection_exists(name).await?;

    if exists && recreate {
        client
            .delete_collection(name)
            .await
            .context("Failed to delete Qdrant collection")?;
        println!("dropped collection '{}'", name);
    } else if exists {
        println!("collection '{}' already exists", name);
        return Ok(());
    }

    client
        .create_collection(
            CreateCollectionBuilder::new(name)
                .vectors_config(VectorParamsBuilder::new(dims, Distance::Cosine)),
        )
        .await
        .context("Failed to create Qdrant collection")?;
    println!("created collection '{}' (dim={}, distance=Cosine)", name, dims);

    Ok(())
}

/// Indexes one snapshot into Qdrant.
pub async fn run_index(
    config: &Config,
    snapshot_id: &str,
    collection_override: Option<String>,
    recreate: bool,
) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Indexing requires embeddings. Set [embedding] provider in config.");
    }

    let corpus = Corpus::from_snapshot_id(snapshot_id)
        .ok_or_else(|| anyhow::anyhow!("Unrecognized snapshot id '{}'", snapshot_id))?;

    let base = snapshot_dir(&config.snapshots.root, snapshot_id)?;
    let collection = match collection_override {
        Some(name) => name,
        None => collection_name(snapshot_id)?,
    };

    let provider = embedding::create_provider(&config.embedding)?;
    let dims = provider.dims() as u64;

    let client = Qdrant::from_url(&config.qdrant.url)
        .timeout(Duration::from_secs(config.qdrant.timeout_secs))
        .build()
        .context("Failed to create Qdrant client")?;

    println!("snapshot:   {}", snapshot_id);
    println!("collection: {}", collection);
    println!("qdrant:     {}", config.qdrant.url);
    println!("model:      {} (dim={})", provider.model_name(), dims);

    ensure_collection(&client, &collection, dims, recreate).await?;

    let mut batcher = Batcher::new(&client, provider.as_ref(), config, &collection);

    match corpus {
        Corpus::Hts => index_hts(&mut batcher, &base, snapshot_id).await?,
        Corpus::Ecfr => index_ecfr(&mut batcher, &base, snapshot_id).await?,
    }

    batcher.flush().await?;
    println!("indexed -> {}", collection);

    Ok(())
}

async fn index_hts(batcher: &mut Batcher<'_>, base: &Path, snapshot_id: &str) -> Result<()> {
    let csv_dir = base.join("csv");
    if !csv_dir.is_dir() {
        bail!("Snapshot csv directory missing: {}", csv_dir.display());
    }

    let mut paths: Vec<_> = std::fs::read_dir(&csv_dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "csv"))
        .collect();
    paths.sort();

    for path in &paths {
        let chapter = chapter_from_filename(path).unwrap_or_default();
        let source_csv = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        for (row_index, result) in reader.records().enumerate() {
            let Ok(record) = result else { continue };
            let cells: Vec<String> = record.iter().map(str::to_string).collect();

            let text = row_to_text(&chapter, &headers, &cells);

            let mut payload = serde_json::Map::new();
            payload.insert("snapshot_id".into(), snapshot_id.into());
            payload.insert("chapter".into(), chapter.clone().into());
            payload.insert("row_index".into(), (row_index as u64).into());
            payload.insert("source_csv".into(), source_csv.clone().into());
            for (k, v) in headers.iter().zip(cells.iter()) {
                // First occurrence wins on duplicated export headers.
                payload
                    .entry(k.clone())
                    .or_insert_with(|| v.clone().into());
            }

            let id = point_id(&format!("{}:{}:{}", snapshot_id, chapter, row_index));
            batcher
                .push(id, text, payload_map(serde_json::Value::Object(payload))?)
                .await?;
        }
    }

    Ok(())
}

async fn index_ecfr(batcher: &mut Batcher<'_>, base: &Path, snapshot_id: &str) -> Result<()> {
    let manifest_path = base.join("manifest.jsonl");
    let body = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("Manifest not found: {}", manifest_path.display()))?;

    for (idx, line) in body.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let doc: EcfrSection = serde_json::from_str(line)
            .with_context(|| format!("Invalid manifest line {}", idx + 1))?;

        let text = doc.embed_text();
        let id = point_id(&format!("{}:{}", snapshot_id, idx));
        let payload = payload_map(serde_json::to_value(&doc)?)?;

        batcher.push(id, text, payload).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_to_text_skips_empty_cells() {
        let headers = vec![
            "Heading/Subheading".to_string(),
            "Stat Suffix".to_string(),
            "Article Description".to_string(),
        ];
        let cells = vec!["0101.21".to_string(), String::new(), "Horses".to_string()];
        let text = row_to_text("01", &headers, &cells);
        assert_eq!(
            text,
            "chapter: 01 | Heading/Subheading: 0101.21 | Article Description: Horses"
        );
    }

    #[test]
    fn test_point_id_deterministic() {
        let a = point_id("US-HTS-2025-10-18:01:0");
        let b = point_id("US-HTS-2025-10-18:01:0");
        let c = point_id("US-HTS-2025-10-18:01:1");
        assert_eq!(a, b);
        assert_ne!(a, c);
        // Valid UUID shape
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn test_chapter_from_filename() {
        assert_eq!(
            chapter_from_filename(Path::new("/x/ch_52.csv")).as_deref(),
            Some("52")
        );
        assert_eq!(chapter_from_filename(Path::new("/x/notes.csv")), None);
    }

    #[test]
    fn test_payload_map_conversion() {
        let value = serde_json::json!({
            "snapshot_id": "US-HTS-2025-10-18",
            "chapter": "01",
            "row_index": 3,
        });
        let map = payload_map(value).unwrap();
        assert!(map.contains_key("snapshot_id"));
        assert!(map.contains_key("row_index"));
    }
}
