use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration for the whole retrieval pipeline.
///
/// Every section has defaults, so a config file only needs to name what it
/// changes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub storage: StorageConfig,
    pub search: SearchConfig,
    pub refiner: RefinerConfig,
    pub shaping: ShapingConfig,
    pub images: ImageConfig,
    pub pipeline: PipelineConfig,
}

/// Configuration for the text-generation model used by the generative
/// refiner and prettifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub base_url: String,
    pub temperature: f64,
    /// Upper bound for a single remote call, in seconds.
    pub timeout_secs: u64,
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "llama3.2:3b".to_string(),
            base_url: "http://localhost:11434".to_string(),
            temperature: 0.2,
            timeout_secs: 30,
        }
    }
}

/// Which embedding capability turns text into vectors.
///
/// The same backend must be used for indexing and for querying; a different
/// dimension at query time makes the index incompatible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Remote embedding model served by Ollama
    Ollama { model: String },
    /// Deterministic token hashing, no model download required
    Hashing { dimensions: usize },
}

impl Default for EmbeddingBackend {
    fn default() -> Self {
        Self::Hashing { dimensions: 256 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,
    /// Maximum number of embedding calls in flight while indexing.
    pub concurrency: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::default(),
            concurrency: 8,
        }
    }
}

/// Where the persisted index artifact and record store live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub index_path: String,
    pub records_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            index_path: "./data/catalogue.index".to_string(),
            records_path: "./data/catalogue_records.json".to_string(),
        }
    }
}

fn default_top_k() -> usize {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Number of nearest catalogue records returned per query
    pub top_k: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefinerMode {
    /// Generative refinement through the chat model
    Llm,
    /// Deterministic rule engine
    #[default]
    Rules,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RefinerConfig {
    pub mode: RefinerMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapingMode {
    /// Generative prettification through the chat model
    Llm,
    /// Direct field mapping
    #[default]
    Passthrough,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapingConfig {
    pub mode: ShapingMode,
    /// Currency code every displayed price is expressed in.
    pub currency: String,
}

impl Default for ShapingConfig {
    fn default() -> Self {
        Self {
            mode: ShapingMode::default(),
            currency: "INR".to_string(),
        }
    }
}

/// Image liveness checking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// When false, image URLs are passed through without fetching them.
    pub verify: bool,
    pub fetch_timeout_secs: u64,
    pub max_concurrent_checks: usize,
    /// Responses larger than this are treated as broken images.
    pub max_image_bytes: usize,
}

impl ImageConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            verify: true,
            fetch_timeout_secs: 10,
            max_concurrent_checks: 4,
            max_image_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Budget for a whole query; on expiry the query yields no products.
    pub query_timeout_secs: u64,
    pub transcribe_timeout_secs: u64,
}

impl PipelineConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    pub fn transcribe_timeout(&self) -> Duration {
        Duration::from_secs(self.transcribe_timeout_secs)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            query_timeout_secs: 120,
            transcribe_timeout_secs: 60,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from `config.yaml` if it exists, otherwise use defaults.
    pub fn load_or_default() -> Self {
        Self::load("config.yaml").unwrap_or_default()
    }
}
