use serde::{Deserialize, Serialize};

pub const DEFAULT_EMBEDDING_ENDPOINT: &str = "https://api.openai.com/v1";
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";

/// Application configuration, resolved once at process start and injected
/// into the components that need it. Provider selection is explicit: the
/// ordered `[[providers]]` list is the fallback chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    #[serde(default)]
    pub indexing: IndexingConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            embedding: EmbeddingConfig::default(),
            vector_store: VectorStoreConfig::default(),
            indexing: IndexingConfig::default(),
            retrieval: RetrievalConfig::default(),
            providers: default_providers(),
        }
    }
}

impl Config {
    pub fn config_path() -> Option<std::path::PathBuf> {
        dirs::config_dir().map(|p| p.join("docqa").join("config.toml"))
    }

    pub fn load() -> Result<Self, crate::error::ConfigError> {
        if let Some(path) = Self::config_path()
            && path.exists()
        {
            return Self::load_from(&path);
        }
        Ok(Self::default())
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self, crate::error::ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<(), crate::error::ConfigError> {
        let path = Self::config_path().ok_or_else(|| {
            crate::error::ConfigError::PathError("could not determine config directory".to_string())
        })?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }
}

/// Embedding provider settings (OpenAI-compatible `/embeddings` endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Name of the environment variable holding the API key.
    #[serde(default = "default_embedding_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_embedding_batch_size")]
    pub batch_size: u32,

    #[serde(default = "default_embedding_dimension")]
    pub dimension: u32,
}

fn default_embedding_endpoint() -> String {
    DEFAULT_EMBEDDING_ENDPOINT.to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_embedding_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_embedding_timeout() -> u64 {
    60
}

fn default_embedding_batch_size() -> u32 {
    32
}

fn default_embedding_dimension() -> u32 {
    1536
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: default_embedding_endpoint(),
            model: default_embedding_model(),
            api_key_env: default_embedding_key_env(),
            timeout_secs: default_embedding_timeout(),
            batch_size: default_embedding_batch_size(),
            dimension: default_embedding_dimension(),
        }
    }
}

/// Vector store backend selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreDriver {
    /// Qdrant over gRPC.
    #[default]
    Qdrant,
    /// Process-local store; for tests and offline development.
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default)]
    pub driver: StoreDriver,

    #[serde(default = "default_qdrant_url")]
    pub url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,
}

fn default_qdrant_url() -> String {
    DEFAULT_QDRANT_URL.to_string()
}

fn default_store_timeout() -> u64 {
    30
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            driver: StoreDriver::default(),
            url: default_qdrant_url(),
            api_key: None,
            timeout_secs: default_store_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// Target chunk size in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,

    /// Overlap between consecutive chunks in characters.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: u32,

    /// Generate a short document summary on upload when a generation
    /// provider is configured.
    #[serde(default = "default_summarize")]
    pub summarize: bool,

    /// How many leading chunks feed the summary prompt.
    #[serde(default = "default_summary_chunks")]
    pub summary_chunks: u32,
}

fn default_chunk_size() -> u32 {
    1000
}

fn default_chunk_overlap() -> u32 {
    200
}

fn default_summarize() -> bool {
    true
}

fn default_summary_chunks() -> u32 {
    10
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            summarize: default_summarize(),
            summary_chunks: default_summary_chunks(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Default number of chunks returned per query.
    #[serde(default = "default_top_n")]
    pub top_n: u32,

    /// How many similar feedback entries enrich the answer prompt.
    #[serde(default = "default_feedback_results")]
    pub feedback_results: u32,
}

fn default_top_n() -> u32 {
    5
}

fn default_feedback_results() -> u32 {
    5
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            feedback_results: default_feedback_results(),
        }
    }
}

/// One generation provider in the ordered fallback chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,

    /// OpenAI-compatible base URL (`{endpoint}/chat/completions`).
    pub endpoint: String,

    pub model: String,

    /// Name of the environment variable holding the API key; omit for
    /// providers that need none (e.g. a local server).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_provider_timeout() -> u64 {
    120
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.3
}

fn default_providers() -> Vec<ProviderConfig> {
    vec![ProviderConfig {
        name: "openai".to_string(),
        endpoint: "https://api.openai.com/v1".to_string(),
        model: "gpt-4o".to_string(),
        api_key_env: Some("OPENAI_API_KEY".to_string()),
        timeout_secs: default_provider_timeout(),
        max_tokens: default_max_tokens(),
        temperature: default_temperature(),
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.embedding.endpoint, DEFAULT_EMBEDDING_ENDPOINT);
        assert_eq!(config.vector_store.url, DEFAULT_QDRANT_URL);
        assert_eq!(config.indexing.chunk_size, 1000);
        assert_eq!(config.indexing.chunk_overlap, 200);
        assert_eq!(config.providers.len(), 1);
        assert_eq!(config.providers[0].name, "openai");
    }

    #[test]
    fn test_config_path() {
        assert!(Config::config_path().is_some());
    }

    #[test]
    fn test_load_from_partial_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[vector_store]
driver = "memory"

[[providers]]
name = "primary"
endpoint = "http://localhost:8080/v1"
model = "local-model"

[[providers]]
name = "secondary"
endpoint = "http://localhost:8081/v1"
model = "backup-model"
"#
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.vector_store.driver, StoreDriver::Memory);
        // Unspecified sections fall back to defaults
        assert_eq!(config.indexing.chunk_size, 1000);
        // Provider order in the file is the fallback order
        assert_eq!(config.providers[0].name, "primary");
        assert_eq!(config.providers[1].name, "secondary");
        assert_eq!(config.providers[1].timeout_secs, 120);
    }
}
