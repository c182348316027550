//! Embedding provider implementations.
//!
//! Every backend implements the core [`EmbeddingProvider`] trait (model
//! name and dimension) plus the async [`Embedder`] trait that produces
//! vectors:
//!
//! - **[`DisabledProvider`]**: always errors; used when embeddings are not configured.
//! - **[`OpenAIProvider`]**: calls the OpenAI embeddings API with retry and backoff.
//! - **[`OllamaProvider`]**: calls a local Ollama instance's `/api/embed` endpoint.
//! - **`LocalProvider`**: runs all-MiniLM-L6-v2 (and friends) in-process via
//!   fastembed; requires the `local-embeddings` feature.
//! - **[`HashProvider`]**: deterministic token hashing, no model and no network.
//!
//! Callers go through [`embed_normalized`], which checks batch shape and
//! L2-normalizes every vector so inner product equals cosine similarity.
//!
//! # Retry Strategy
//!
//! The OpenAI and Ollama providers use exponential backoff for transient errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

#[cfg(feature = "local-embeddings")]
mod local;

#[cfg(feature = "local-embeddings")]
pub use local::LocalProvider;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::time::Duration;

use health_copilot_core::embedding::{l2_normalize, EmbeddingProvider};
use health_copilot_core::{Error, Result};

use crate::config::EmbeddingConfig;

/// An embedding backend that can turn text into vectors.
#[async_trait]
pub trait Embedder: EmbeddingProvider {
    /// Embed a batch, returning one vector per input in the same order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embed a batch and L2-normalize each vector.
///
/// Fails if the backend returns the wrong number of vectors or a vector
/// of the wrong dimension.
pub async fn embed_normalized(embedder: &dyn Embedder, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    let mut vectors = embedder.embed(texts).await?;
    if vectors.len() != texts.len() {
        return Err(Error::embedding(format!(
            "{} returned {} vectors for {} inputs",
            embedder.model_name(),
            vectors.len(),
            texts.len()
        )));
    }
    for v in vectors.iter_mut() {
        if v.len() != embedder.dims() {
            return Err(Error::embedding(format!(
                "{} returned a {}-dimensional vector, expected {}",
                embedder.model_name(),
                v.len(),
                embedder.dims()
            )));
        }
        l2_normalize(v);
    }
    Ok(vectors)
}

/// Embed a single query text, normalized.
pub async fn embed_query(embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>> {
    embed_normalized(embedder, &[text.to_string()])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| Error::embedding("empty embedding response"))
}

// ============ Disabled Provider ============

/// A no-op embedding provider that always returns errors.
pub struct DisabledProvider;

impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
}

#[async_trait]
impl Embedder for DisabledProvider {
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(Error::embedding("embedding provider is disabled"))
    }
}

// ============ Hash Provider ============

/// Deterministic bag-of-words embedder.
///
/// Each lower-cased alphanumeric token is hashed with SHA-256 into one of
/// `dims` buckets with a sign taken from the digest. Texts sharing words
/// get positively correlated vectors, which is enough for offline runs and
/// tests; it carries no semantic knowledge.
pub struct HashProvider {
    model: String,
    dims: usize,
}

impl HashProvider {
    pub fn new(model: impl Into<String>, dims: usize) -> Result<Self> {
        if dims == 0 {
            return Err(Error::configuration("hash embedder needs dims > 0"));
        }
        Ok(Self {
            model: model.into(),
            dims,
        })
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dims as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            v[bucket] += sign;
        }
        v
    }
}

impl EmbeddingProvider for HashProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
}

#[async_trait]
impl Embedder for HashProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI API.
///
/// Calls the `POST /v1/embeddings` endpoint with the configured model.
/// Requires the `OPENAI_API_KEY` environment variable to be set.
pub struct OpenAIProvider {
    model: String,
    dims: usize,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIProvider {
    /// # Errors
    ///
    /// Returns an error if `model` or `dims` is not set in config,
    /// or if `OPENAI_API_KEY` is not in the environment.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| Error::configuration("embedding.model required for OpenAI provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| Error::configuration("embedding.dims required for OpenAI provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| Error::configuration("OPENAI_API_KEY environment variable not set"))?;

        Ok(Self {
            model,
            dims,
            api_key,
            max_retries: config.max_retries,
            client: http_client(config.timeout_secs)?,
        })
    }
}

impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
}

#[async_trait]
impl Embedder for OpenAIProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let request = self
            .client
            .post("https://api.openai.com/v1/embeddings")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body);

        let json = send_with_retry(request, self.max_retries, "OpenAI").await?;
        parse_openai_response(&json)
    }
}

/// Parse the OpenAI embeddings API response JSON.
///
/// Extracts the `data[].embedding` arrays in order.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| Error::embedding("invalid OpenAI response: missing data array"))?;

    data.iter()
        .map(|item| {
            item.get("embedding")
                .ok_or_else(|| Error::embedding("invalid OpenAI response: missing embedding"))
                .and_then(json_to_vec)
        })
        .collect()
}

// ============ Ollama Provider ============

/// Embedding provider using a local Ollama instance.
///
/// Calls `POST /api/embed` on the configured URL (default: `http://localhost:11434`).
pub struct OllamaProvider {
    model: String,
    dims: usize,
    url: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| Error::configuration("embedding.model required for Ollama provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| Error::configuration("embedding.dims required for Ollama provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());

        Ok(Self {
            model,
            dims,
            url,
            max_retries: config.max_retries,
            client: http_client(config.timeout_secs)?,
        })
    }
}

impl EmbeddingProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
}

#[async_trait]
impl Embedder for OllamaProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let request = self
            .client
            .post(format!("{}/api/embed", self.url.trim_end_matches('/')))
            .json(&body);

        let json = send_with_retry(request, self.max_retries, "Ollama").await?;
        parse_ollama_response(&json)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    json.get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| Error::embedding("invalid Ollama response: missing embeddings array"))?
        .iter()
        .map(json_to_vec)
        .collect()
}

// ============ Shared HTTP plumbing ============

fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Error::configuration(format!("failed to build HTTP client: {}", e)))
}

fn json_to_vec(value: &serde_json::Value) -> Result<Vec<f32>> {
    value
        .as_array()
        .ok_or_else(|| Error::embedding("embedding is not an array"))?
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| Error::embedding("embedding holds a non-numeric value"))
        })
        .collect()
}

async fn send_with_retry(
    request: reqwest::RequestBuilder,
    max_retries: u32,
    label: &str,
) -> Result<serde_json::Value> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            // Exponential backoff: 1s, 2s, 4s, 8s, ...
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tracing::debug!(label, attempt, ?delay, "retrying embedding request");
            tokio::time::sleep(delay).await;
        }

        let Some(req) = request.try_clone() else {
            return Err(Error::embedding("embedding request body is not cloneable"));
        };

        match req.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return response
                        .json()
                        .await
                        .map_err(|e| Error::embedding(format!("{} response: {}", label, e)));
                }

                let body_text = response.text().await.unwrap_or_default();
                let err = Error::embedding(format!("{} API error {}: {}", label, status, body_text));

                // Rate limited or server error: retry
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(err);
                    continue;
                }
                return Err(err);
            }
            Err(e) => {
                last_err = Some(Error::embedding(format!("{} connection error: {}", label, e)));
            }
        }
    }

    Err(last_err
        .unwrap_or_else(|| Error::embedding(format!("{} embedding failed after retries", label))))
}

/// Create the configured [`Embedder`].
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledProvider`] |
/// | `"openai"` | [`OpenAIProvider`] |
/// | `"ollama"` | [`OllamaProvider`] |
/// | `"local"` | `LocalProvider` (feature `local-embeddings`) |
/// | `"hash"` | [`HashProvider`] |
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledProvider)),
        "openai" => Ok(Box::new(OpenAIProvider::new(config)?)),
        "ollama" => Ok(Box::new(OllamaProvider::new(config)?)),
        "hash" => Ok(Box::new(HashProvider::new(
            config.model.clone().unwrap_or_else(|| "token-hash".to_string()),
            config.dims.unwrap_or(0),
        )?)),
        #[cfg(feature = "local-embeddings")]
        "local" => Ok(Box::new(LocalProvider::new(config)?)),
        #[cfg(not(feature = "local-embeddings"))]
        "local" => Err(Error::configuration(
            "local embedding provider requires --features local-embeddings",
        )),
        other => Err(Error::configuration(format!(
            "unknown embedding provider: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use health_copilot_core::embedding::dot;

    struct ShortBatch;

    impl EmbeddingProvider for ShortBatch {
        fn model_name(&self) -> &str {
            "short"
        }
        fn dims(&self) -> usize {
            2
        }
    }

    #[async_trait]
    impl Embedder for ShortBatch {
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(vec![vec![1.0, 1.0]])
        }
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_hash_embedder_deterministic_and_normalized() {
        let provider = HashProvider::new("token-hash", 64).unwrap();
        let a = embed_normalized(&provider, &texts(&["Insulin therapy for diabetes"]))
            .await
            .unwrap();
        let b = embed_normalized(&provider, &texts(&["Insulin therapy for diabetes"]))
            .await
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0].len(), 64);
        assert!((dot(&a[0], &a[0]) - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_hash_embedder_shared_words_score_higher() {
        let provider = HashProvider::new("token-hash", 256).unwrap();
        let v = embed_normalized(
            &provider,
            &texts(&[
                "diabetes insulin glucose",
                "diabetes insulin glucose metformin",
                "seasonal influenza vaccine",
            ]),
        )
        .await
        .unwrap();
        assert!(dot(&v[0], &v[1]) > dot(&v[0], &v[2]));
    }

    #[tokio::test]
    async fn test_embed_normalized_rejects_short_batch() {
        let err = embed_normalized(&ShortBatch, &texts(&["a", "b"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
    }

    #[tokio::test]
    async fn test_disabled_provider_errors() {
        assert!(DisabledProvider.embed(&texts(&["x"])).await.is_err());
    }

    #[test]
    fn test_parse_openai_response() {
        let json = serde_json::json!({"data": [{"embedding": [0.5, -1.0]}, {"embedding": [1.0, 0.0]}]});
        let vectors = parse_openai_response(&json).unwrap();
        assert_eq!(vectors, vec![vec![0.5, -1.0], vec![1.0, 0.0]]);
        assert!(parse_openai_response(&serde_json::json!({})).is_err());
    }

    #[test]
    fn test_parse_ollama_response() {
        let json = serde_json::json!({"embeddings": [[0.1, 0.2, 0.3]]});
        let vectors = parse_ollama_response(&json).unwrap();
        assert_eq!(vectors.len(), 1);
        assert_eq!(vectors[0].len(), 3);
        assert!(parse_ollama_response(&serde_json::json!({"embeddings": ["x"]})).is_err());
    }

    #[test]
    fn test_create_embedder_hash() {
        let config = EmbeddingConfig {
            provider: "hash".to_string(),
            dims: Some(32),
            ..EmbeddingConfig::default()
        };
        let embedder = create_embedder(&config).unwrap();
        assert_eq!(embedder.model_name(), "token-hash");
        assert_eq!(embedder.dims(), 32);
    }
}
