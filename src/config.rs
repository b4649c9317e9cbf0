use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "semsearch.toml";

const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";

/// Connection parameters for the vector store.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StoreConfig {
    pub url: String,
    pub port: u16,
    pub collection: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost".to_string(),
            port: 6334,
            collection: "test_collection".to_string(),
        }
    }
}

impl StoreConfig {
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.url, self.port)
    }
}

/// Parameters for the remote embedding service. The model determines the
/// vector dimension; both are deployment-time constants, and the collection
/// the store points at must have been created with the same dimension.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EmbeddingConfig {
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub model: String,
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: OPENAI_EMBEDDINGS_URL.to_string(),
            api_key: None,
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            dimension: 1536,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SearchConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// Upper bound on the number of hits per search. The store may return
    /// fewer.
    pub limit: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            embedding: EmbeddingConfig::default(),
            limit: 10,
        }
    }
}

/// Loads configuration from defaults, an optional TOML file and environment
/// variables prefixed with `SEMSEARCH_` (sections separated by `__`).
pub fn load_config() -> Result<SearchConfig> {
    let config_path =
        std::env::var("SEMSEARCH_CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
    log::info!("Loading configuration (file: {})", config_path);

    let figment = Figment::new()
        .merge(Serialized::defaults(SearchConfig::default()))
        .merge(Toml::file(&config_path))
        .merge(Env::prefixed("SEMSEARCH_").split("__"));

    let config: SearchConfig = figment.extract().context("Failed to extract SearchConfig")?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &SearchConfig) -> Result<()> {
    if config.store.collection.trim().is_empty() {
        return Err(anyhow::anyhow!("Collection name cannot be empty"));
    }
    if config.embedding.dimension == 0 {
        return Err(anyhow::anyhow!(
            "Embedding dimension must be greater than zero"
        ));
    }
    if config.limit == 0 {
        return Err(anyhow::anyhow!("Search limit must be greater than zero"));
    }
    Ok(())
}
