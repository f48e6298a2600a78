use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub ingest: IngestConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    pub index: IndexConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub remote: Option<RemoteConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Root directory for the recursive local document walk.
    pub root: PathBuf,
    /// Caps the LOCAL candidate set only; remote items are uncapped.
    #[serde(default)]
    pub max_items: Option<usize>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    crate::chunker::DEFAULT_CHUNK_SIZE
}
fn default_chunk_overlap() -> usize {
    crate::chunker::DEFAULT_CHUNK_OVERLAP
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
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

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Directory holding the persisted index files.
    pub dir: PathBuf,
    #[serde(default = "default_index_name")]
    pub name: String,
    /// When true, `add` skips chunks whose `source` is already present
    /// in the loaded index. Default false: re-ingesting a source appends
    /// its chunks again.
    #[serde(default)]
    pub dedup_sources: bool,
}

fn default_index_name() -> String {
    "vector_database".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Result count used when a query does not specify `k`.
    #[serde(default = "default_k")]
    pub default_k: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            default_k: default_k(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}
fn default_k() -> usize {
    3
}

/// Remote (S3) ingestion settings. The bucket name and credentials come
/// from the environment (`S3_BUCKET_NAME`, `AWS_ACCESS_KEY_ID`,
/// `AWS_SECRET_ACCESS_KEY`, optional `AWS_SESSION_TOKEN`, `AWS_REGION`);
/// a missing bucket name degrades remote ingestion to a no-op.
#[derive(Debug, Deserialize, Clone)]
pub struct RemoteConfig {
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Custom endpoint for S3-compatible services (MinIO, LocalStack).
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

fn default_prefix() -> String {
    "data/".to_string()
}

#[cfg(test)]
impl Config {
    /// Hash-provider config rooted at `dir`, for unit tests that need a
    /// full `Config` without touching the network.
    pub fn default_for_tests(dir: &Path) -> Config {
        Config {
            ingest: IngestConfig {
                root: dir.to_path_buf(),
                max_items: None,
            },
            chunking: ChunkingConfig::default(),
            embedding: EmbeddingConfig {
                provider: "hash".to_string(),
                ..EmbeddingConfig::default()
            },
            index: IndexConfig {
                dir: dir.join("index"),
                name: default_index_name(),
                dedup_sources: false,
            },
            server: ServerConfig::default(),
            remote: None,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        anyhow::bail!("chunking.chunk_overlap must be < chunking.chunk_size");
    }

    if config.server.default_k == 0 {
        anyhow::bail!("server.default_k must be >= 1");
    }

    match config.embedding.provider.as_str() {
        "openai" => {
            if config.embedding.model.is_none() {
                anyhow::bail!("embedding.model must be specified for the openai provider");
            }
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                anyhow::bail!("embedding.dims must be > 0 for the openai provider");
            }
        }
        "hash" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be openai or hash.",
            other
        ),
    }

    Ok(config)
}
