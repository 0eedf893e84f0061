use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub snapshots: SnapshotsConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub qdrant: QdrantConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SnapshotsConfig {
    #[serde(default = "default_snapshot_root")]
    pub root: PathBuf,
    /// Path of the active-version marker. Defaults to
    /// `<root>/active_version.json` when unset.
    #[serde(default)]
    pub active_file: Option<PathBuf>,
    /// Snapshot id used when neither the marker file nor the
    /// `SNAPSHOT_ID` environment variable resolves.
    #[serde(default = "default_snapshot_id")]
    pub default_snapshot: String,
}

impl Default for SnapshotsConfig {
    fn default() -> Self {
        Self {
            root: default_snapshot_root(),
            active_file: None,
            default_snapshot: default_snapshot_id(),
        }
    }
}

impl SnapshotsConfig {
    pub fn active_file_path(&self) -> PathBuf {
        self.active_file
            .clone()
            .unwrap_or_else(|| self.root.join("active_version.json"))
    }
}

fn default_snapshot_root() -> PathBuf {
    PathBuf::from("./snapshots")
}
fn default_snapshot_id() -> String {
    "US-HTS-YYYY-MM-DD".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_hts_export_url")]
    pub hts_export_url: String,
    #[serde(default = "default_ecfr_base_url")]
    pub ecfr_base_url: String,
    #[serde(default = "default_ingest_timeout")]
    pub timeout_secs: u64,
    /// Pause between eCFR title downloads; the versioner API is rate
    /// sensitive.
    #[serde(default = "default_title_delay")]
    pub title_delay_ms: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            hts_export_url: default_hts_export_url(),
            ecfr_base_url: default_ecfr_base_url(),
            timeout_secs: default_ingest_timeout(),
            title_delay_ms: default_title_delay(),
        }
    }
}

fn default_hts_export_url() -> String {
    "https://hts.usitc.gov/reststop/exportList".to_string()
}
fn default_ecfr_base_url() -> String {
    "https://www.ecfr.gov".to_string()
}
fn default_ingest_timeout() -> u64 {
    120
}
fn default_title_delay() -> u64 {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct QdrantConfig {
    /// gRPC endpoint. Qdrant serves gRPC on 6334 (REST is 6333, which
    /// this client does not speak).
    #[serde(default = "default_qdrant_url")]
    pub url: String,
    #[serde(default = "default_qdrant_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_index_batch")]
    pub index_batch_size: usize,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: default_qdrant_url(),
            timeout_secs: default_qdrant_timeout(),
            index_batch_size: default_index_batch(),
        }
    }
}

fn default_qdrant_url() -> String {
    "http://localhost:6334".to_string()
}
fn default_qdrant_timeout() -> u64 {
    60
}
fn default_index_batch() -> usize {
    512
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// OpenAI-compatible endpoint. A local embedding server (e.g. TEI
    /// hosting an E5 model) works by pointing this at it.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Prepended to indexed texts (E5 models expect `"passage: "`).
    #[serde(default)]
    pub passage_prefix: String,
    /// Prepended to query texts (E5 models expect `"query: "`).
    #[serde(default)]
    pub query_prefix: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            base_url: default_base_url(),
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
            passage_prefix: String::new(),
            query_prefix: String::new(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_base_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_fuzzy_limit")]
    pub fuzzy_limit: usize,
    #[serde(default = "default_semantic_limit")]
    pub semantic_limit: usize,
    #[serde(default = "default_min_query_len")]
    pub min_query_len: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            fuzzy_limit: default_fuzzy_limit(),
            semantic_limit: default_semantic_limit(),
            min_query_len: default_min_query_len(),
        }
    }
}

fn default_fuzzy_limit() -> usize {
    10
}
fn default_semantic_limit() -> usize {
    10
}
fn default_min_query_len() -> usize {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate retrieval
    if config.retrieval.fuzzy_limit == 0 || config.retrieval.semantic_limit == 0 {
        anyhow::bail!("retrieval limits must be >= 1");
    }
    if config.retrieval.min_query_len == 0 {
        anyhow::bail!("retrieval.min_query_len must be >= 1");
    }

    // Validate indexing
    if config.qdrant.index_batch_size == 0 {
        anyhow::bail!("qdrant.index_batch_size must be >= 1");
    }

    // Validate embedding
    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_minimal_config() {
        let f = write_config("[server]\nbind = \"127.0.0.1:8000\"\n");
        let cfg = load_config(f.path()).unwrap();
        assert_eq!(cfg.server.bind, "127.0.0.1:8000");
        assert_eq!(cfg.snapshots.root, PathBuf::from("./snapshots"));
        // gRPC port, not the REST 6333.
        assert_eq!(cfg.qdrant.url, "http://localhost:6334");
        assert!(!cfg.embedding.is_enabled());
        assert_eq!(cfg.retrieval.fuzzy_limit, 10);
    }

    #[test]
    fn test_active_file_defaults_under_root() {
        let f = write_config(
            "[server]\nbind = \"127.0.0.1:8000\"\n[snapshots]\nroot = \"/data/snaps\"\n",
        );
        let cfg = load_config(f.path()).unwrap();
        assert_eq!(
            cfg.snapshots.active_file_path(),
            PathBuf::from("/data/snaps/active_version.json")
        );
    }

    #[test]
    fn test_embedding_requires_model_and_dims() {
        let f = write_config(
            "[server]\nbind = \"127.0.0.1:8000\"\n[embedding]\nprovider = \"openai\"\n",
        );
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let f = write_config(
            "[server]\nbind = \"127.0.0.1:8000\"\n\
             [embedding]\nprovider = \"cohere\"\nmodel = \"x\"\ndims = 8\n",
        );
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn test_e5_prefixes_parse() {
        let f = write_config(
            "[server]\nbind = \"127.0.0.1:8000\"\n\
             [embedding]\nprovider = \"openai\"\nmodel = \"intfloat/e5-base-v2\"\ndims = 768\n\
             passage_prefix = \"passage: \"\nquery_prefix = \"query: \"\n",
        );
        let cfg = load_config(f.path()).unwrap();
        assert_eq!(cfg.embedding.passage_prefix, "passage: ");
        assert_eq!(cfg.embedding.query_prefix, "query: ");
    }
}
