//! TOML configuration.
//!
//! Every section is optional; missing values fall back to the defaults the
//! corpus job has always used (three local replica-set members on ports
//! 3001-3003, set `rs`, database `Política`, collection `Discursos`).
//!
//! ```toml
//! [corpus]
//! root = "./DiscursosOriginales"
//!
//! [store]
//! candidates = ["localhost:3001", "localhost:3002", "localhost:3003"]
//! replica_set = "rs"
//! write_timeout_ms = 5000
//!
//! [embedding]
//! provider = "local"
//! model = "all-minilm-l6-v2"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::decode::{TextEncoding, DEFAULT_ENCODINGS};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub decoding: DecodingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    #[serde(default = "default_corpus_root")]
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            root: default_corpus_root(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

fn default_corpus_root() -> PathBuf {
    PathBuf::from("./DiscursosOriginales")
}
fn default_include_globs() -> Vec<String> {
    vec!["*.txt".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct DecodingConfig {
    #[serde(default = "default_encodings")]
    pub encodings: Vec<TextEncoding>,
}

impl Default for DecodingConfig {
    fn default() -> Self {
        Self {
            encodings: default_encodings(),
        }
    }
}

fn default_encodings() -> Vec<TextEncoding> {
    DEFAULT_ENCODINGS.to_vec()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
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
            url: None,
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// `host:port` members, tried in order for a direct connection.
    #[serde(default = "default_candidates")]
    pub candidates: Vec<String>,
    #[serde(default = "default_replica_set")]
    pub replica_set: String,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_direct_timeout_ms")]
    pub direct_timeout_ms: u64,
    #[serde(default = "default_replica_set_timeout_ms")]
    pub replica_set_timeout_ms: u64,
    /// Majority write-acknowledgement wait.
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            candidates: default_candidates(),
            replica_set: default_replica_set(),
            database: default_database(),
            collection: default_collection(),
            direct_timeout_ms: default_direct_timeout_ms(),
            replica_set_timeout_ms: default_replica_set_timeout_ms(),
            write_timeout_ms: default_write_timeout_ms(),
        }
    }
}

fn default_candidates() -> Vec<String> {
    vec![
        "localhost:3001".to_string(),
        "localhost:3002".to_string(),
        "localhost:3003".to_string(),
    ]
}
fn default_replica_set() -> String {
    "rs".to_string()
}
fn default_database() -> String {
    "Política".to_string()
}
fn default_collection() -> String {
    "Discursos".to_string()
}
fn default_direct_timeout_ms() -> u64 {
    5000
}
fn default_replica_set_timeout_ms() -> u64 {
    10000
}
fn default_write_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    /// Pause after this many files. `0` disables pacing.
    #[serde(default = "default_pause_every")]
    pub pause_every: usize,
    #[serde(default = "default_pause_ms")]
    pub pause_ms: u64,
    #[serde(default = "default_true")]
    pub validate: bool,
    #[serde(default = "default_true")]
    pub create_indexes: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pause_every: default_pause_every(),
            pause_ms: default_pause_ms(),
            validate: true,
            create_indexes: true,
        }
    }
}

fn default_pause_every() -> usize {
    50
}
fn default_pause_ms() -> u64 {
    100
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log file, appended to. `None` logs to stdout only.
    #[serde(default = "default_log_file")]
    pub file: Option<PathBuf>,
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: default_log_file(),
            level: default_log_level(),
        }
    }
}

fn default_log_file() -> Option<PathBuf> {
    Some(PathBuf::from("ingest.log"))
}
fn default_log_level() -> String {
    "info".to_string()
}

/// Load and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Load `path` if it exists, otherwise use the built-in defaults.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(Config::default())
    }
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.store.candidates.is_empty() {
            bail!("store.candidates must list at least one host:port");
        }
        for candidate in &self.store.candidates {
            if candidate.trim().is_empty() || candidate.contains('/') {
                bail!(
                    "store.candidates entries must be host:port, got '{}'",
                    candidate
                );
            }
        }
        if self.store.database.is_empty() || self.store.collection.is_empty() {
            bail!("store.database and store.collection must be non-empty");
        }
        if self.store.write_timeout_ms == 0 {
            bail!("store.write_timeout_ms must be > 0");
        }
        if self.decoding.encodings.is_empty() {
            bail!("decoding.encodings must list at least one encoding");
        }
        if self.corpus.include_globs.is_empty() {
            bail!("corpus.include_globs must not be empty");
        }
        if self.embedding.dims == Some(0) {
            bail!("embedding.dims must be > 0");
        }

        match self.embedding.provider.as_str() {
            "local" => {}
            "openai" | "ollama" => {
                if self.embedding.model.is_none() {
                    bail!(
                        "embedding.model must be specified when provider is '{}'",
                        self.embedding.provider
                    );
                }
                if self.embedding.dims.is_none() {
                    bail!(
                        "embedding.dims must be specified when provider is '{}'",
                        self.embedding.provider
                    );
                }
            }
            other => bail!(
                "Unknown embedding provider: '{}'. Must be local, openai, or ollama.",
                other
            ),
        }

        Ok(())
    }
}
