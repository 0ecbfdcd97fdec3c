//! Embedding provider abstraction and implementations.
//!
//! Defines the [`EmbeddingProvider`] trait and concrete implementations:
//! - **`LocalProvider`**: runs a sentence-transformer model in-process via
//!   fastembed (default `all-minilm-l6-v2`, 384 dims). The model is loaded once
//!   at startup; inference runs on the blocking pool.
//! - **[`OpenAIProvider`]**: calls the OpenAI embeddings API.
//! - **[`OllamaProvider`]**: calls a local Ollama instance's `/api/embed` endpoint.
//! - **[`NullProvider`]**: zero vectors, for dry runs.
//!
//! # Provider Selection
//!
//! [`create_provider`] builds the provider named by `[embedding].provider`.
//! Any failure there is a [`IngestError::ModelUnavailable`] and aborts the
//! run; failures of individual [`embed`](EmbeddingProvider::embed) calls are
//! per-file and only fail that file.
//!
//! # Retry Strategy
//!
//! The HTTP providers use exponential backoff for transient errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::EmbeddingConfig;
use crate::error::{IngestError, IngestResult};

/// Text used to check that a provider answers before the run starts.
const PROBE_TEXT: &str = "probe";

/// Vector length of the default `all-minilm-l6-v2` model.
pub const DEFAULT_DIMS: usize = 384;

/// A text-to-vector model.
///
/// Every vector returned by one instance has length [`dims`](Self::dims).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"all-minilm-l6-v2"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `384`).
    fn dims(&self) -> usize;
    /// Embed one text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Embed `text` and reject vectors of the wrong length.
///
/// Errors come back as [`IngestError::Model`] so the pipeline can record the
/// file as failed and continue.
pub async fn embed_checked(provider: &dyn EmbeddingProvider, text: &str) -> IngestResult<Vec<f32>> {
    let vector = provider
        .embed(text)
        .await
        .map_err(|e| IngestError::Model(e.to_string()))?;
    if vector.len() != provider.dims() {
        return Err(IngestError::Model(format!(
            "{} returned {} dimensions, expected {}",
            provider.model_name(),
            vector.len(),
            provider.dims()
        )));
    }
    Ok(vector)
}

/// Embed a probe text once, turning any failure into
/// [`IngestError::ModelUnavailable`].
pub async fn ensure_available(provider: &dyn EmbeddingProvider) -> IngestResult<()> {
    embed_checked(provider, PROBE_TEXT)
        .await
        .map(|_| ())
        .map_err(|e| IngestError::ModelUnavailable(e.to_string()))
}

// ============ Null Provider ============

/// Returns a zero vector for every text. Used by dry runs, which never load
/// a model.
pub struct NullProvider {
    dims: usize,
}

impl NullProvider {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }
}

#[async_trait]
impl EmbeddingProvider for NullProvider {
    fn model_name(&self) -> &str {
        "null"
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![0.0; self.dims])
    }
}

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI API.
///
/// Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAIProvider {
    model: String,
    dims: usize,
    api_key: String,
    client: reqwest::Client,
    max_retries: u32,
}

impl OpenAIProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("embedding.model required for OpenAI provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow!("embedding.dims required for OpenAI provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;

        Ok(Self {
            model,
            dims,
            api_key,
            client: http_client(config)?,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({ "model": self.model, "input": [text] });
        let json = post_with_retry("OpenAI", self.max_retries, || {
            self.client
                .post("https://api.openai.com/v1/embeddings")
                .bearer_auth(&self.api_key)
                .json(&body)
        })
        .await?;
        first_vector(parse_openai_response(&json)?)
    }
}

/// Extract `data[].embedding` arrays in order.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing data array"))?;

    data.iter()
        .map(|item| {
            item.get("embedding")
                .ok_or_else(|| anyhow!("Invalid OpenAI response: missing embedding"))
                .and_then(json_to_vector)
        })
        .collect()
}

// ============ Ollama Provider ============

/// Embedding provider using a local Ollama instance.
///
/// Calls `POST /api/embed` on the configured URL (default `http://localhost:11434`).
pub struct OllamaProvider {
    model: String,
    dims: usize,
    url: String,
    client: reqwest::Client,
    max_retries: u32,
}

impl OllamaProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("embedding.model required for Ollama provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow!("embedding.dims required for Ollama provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());

        Ok(Self {
            model,
            dims,
            url,
            client: http_client(config)?,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({ "model": self.model, "input": [text] });
        let endpoint = format!("{}/api/embed", self.url.trim_end_matches('/'));
        let json = post_with_retry("Ollama", self.max_retries, || {
            self.client.post(&endpoint).json(&body)
        })
        .await?;
        first_vector(parse_ollama_response(&json)?)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    json.get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid Ollama response: missing embeddings array"))?
        .iter()
        .map(json_to_vector)
        .collect()
}

// ============ HTTP plumbing ============

fn http_client(config: &EmbeddingConfig) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?)
}

/// Send the request built by `request` until it succeeds or retries run out.
async fn post_with_retry<F>(label: &str, max_retries: u32, request: F) -> Result<serde_json::Value>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            warn!(provider = label, attempt, ?delay, "retrying embedding request");
            tokio::time::sleep(delay).await;
        }

        match request().send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return Ok(response.json().await?);
                }

                let body_text = response.text().await.unwrap_or_default();
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(anyhow!("{} API error {}: {}", label, status, body_text));
                    continue;
                }
                bail!("{} API error {}: {}", label, status, body_text);
            }
            Err(e) => {
                last_err = Some(anyhow!("{} connection error: {}", label, e));
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("{} embedding failed after retries", label)))
}

fn json_to_vector(value: &serde_json::Value) -> Result<Vec<f32>> {
    value
        .as_array()
        .ok_or_else(|| anyhow!("embedding is not an array"))?
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| anyhow!("embedding contains a non-numeric value"))
        })
        .collect()
}

fn first_vector(vectors: Vec<Vec<f32>>) -> Result<Vec<f32>> {
    vectors
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("Empty embedding response"))
}

// ============ Local Provider (fastembed) ============

#[cfg(feature = "local-embeddings")]
pub use local::LocalProvider;

#[cfg(feature = "local-embeddings")]
mod local {
    use std::sync::{Arc, Mutex};

    use anyhow::{anyhow, bail, Result};
    use async_trait::async_trait;

    use super::EmbeddingProvider;
    use crate::config::EmbeddingConfig;

    /// In-process sentence-transformer model.
    ///
    /// Weights are downloaded from Hugging Face on first use and cached;
    /// after that no network access is needed.
    pub struct LocalProvider {
        model_name: String,
        dims: usize,
        model: Arc<Mutex<fastembed::TextEmbedding>>,
    }

    impl LocalProvider {
        /// Load the configured model. Blocking work runs off the async runtime.
        pub async fn load(config: &EmbeddingConfig) -> Result<Self> {
            let model_name = config
                .model
                .clone()
                .unwrap_or_else(|| "all-minilm-l6-v2".to_string());
            let (fastembed_model, native_dims) = model_spec(&model_name)?;
            let dims = config.dims.unwrap_or(native_dims);

            let model = tokio::task::spawn_blocking(move || {
                fastembed::TextEmbedding::try_new(
                    fastembed::InitOptions::new(fastembed_model)
                        .with_show_download_progress(false),
                )
                .map_err(|e| anyhow!("Failed to initialize local embedding model: {}", e))
            })
            .await??;

            Ok(Self {
                model_name,
                dims,
                model: Arc::new(Mutex::new(model)),
            })
        }
    }

    #[async_trait]
    impl EmbeddingProvider for LocalProvider {
        fn model_name(&self) -> &str {
            &self.model_name
        }
        fn dims(&self) -> usize {
            self.dims
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let model = Arc::clone(&self.model);
            let texts = vec![text.to_string()];
            tokio::task::spawn_blocking(move || {
                let mut model = model
                    .lock()
                    .map_err(|_| anyhow!("local embedding model lock poisoned"))?;
                let embeddings = model
                    .embed(texts, None)
                    .map_err(|e| anyhow!("Local embedding failed: {}", e))?;
                embeddings
                    .into_iter()
                    .next()
                    .ok_or_else(|| anyhow!("Empty embedding response"))
            })
            .await?
        }
    }

    fn model_spec(name: &str) -> Result<(fastembed::EmbeddingModel, usize)> {
        match name {
            "all-minilm-l6-v2" => Ok((fastembed::EmbeddingModel::AllMiniLML6V2, 384)),
            "bge-small-en-v1.5" => Ok((fastembed::EmbeddingModel::BGESmallENV15, 384)),
            "bge-base-en-v1.5" => Ok((fastembed::EmbeddingModel::BGEBaseENV15, 768)),
            "multilingual-e5-small" => Ok((fastembed::EmbeddingModel::MultilingualE5Small, 384)),
            "multilingual-e5-base" => Ok((fastembed::EmbeddingModel::MultilingualE5Base, 768)),
            other => bail!(
                "Unknown local embedding model: '{}'. Supported models: \
                 all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, \
                 multilingual-e5-small, multilingual-e5-base",
                other
            ),
        }
    }
}

/// Create the [`EmbeddingProvider`] named in the configuration.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"local"` | `LocalProvider` (requires the `local-embeddings` feature) |
/// | `"openai"` | [`OpenAIProvider`] |
/// | `"ollama"` | [`OllamaProvider`] |
pub async fn create_provider(config: &EmbeddingConfig) -> IngestResult<Box<dyn EmbeddingProvider>> {
    let provider = build_provider(config)
        .await
        .map_err(|e| IngestError::ModelUnavailable(e.to_string()))?;
    info!(
        provider = %config.provider,
        model = provider.model_name(),
        dims = provider.dims(),
        "embedding provider ready"
    );
    Ok(provider)
}

async fn build_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "openai" => Ok(Box::new(OpenAIProvider::new(config)?)),
        "ollama" => Ok(Box::new(OllamaProvider::new(config)?)),
        #[cfg(feature = "local-embeddings")]
        "local" => Ok(Box::new(LocalProvider::load(config).await?)),
        #[cfg(not(feature = "local-embeddings"))]
        "local" => bail!("Local embedding provider requires --features local-embeddings"),
        other => bail!("Unknown embedding provider: {}", other),
    }
}
