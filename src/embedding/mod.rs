//! Embedding codec and provider abstraction.
//!
//! Defines the [`EmbeddingProvider`] trait and concrete implementations:
//! - **[`DisabledEmbeddings`]**: returns errors; used when embeddings are not configured.
//! - **[`OpenAiEmbeddings`]**: calls an OpenAI-compatible `POST /embeddings` endpoint.
//!
//! On top of the provider sits [`QueryCodec`], which validates the provider's
//! response element by element and produces the byte-exact serialized vector
//! used by the vector index.
//!
//! # Byte Layout
//!
//! A vector of `n` elements serializes to exactly `4 × n` bytes: each `f32`
//! in little-endian IEEE-754 order, packed with no padding and no length
//! prefix. The empty vector serializes to zero bytes.
//!
//! # Validation
//!
//! The provider response must look like `{ "data": [ { "embedding": [...] } ] }`.
//! Each element is parsed into a [`ParsedElement`]:
//!
//! | JSON element | Parsed as |
//! |--------------|-----------|
//! | number representable as a finite `f32` | `Number` |
//! | `null` | `Null` (encoded as `0.0`) |
//! | number overflowing `f32`, string, bool, array, object | `Rejected` |
//!
//! A single `Rejected` element invalidates the whole vector. NaN and
//! ±Infinity cannot be carried by a JSON document; a body containing them
//! fails to parse and is treated as a provider failure.
//!
//! No retries are performed: a failed or timed-out provider call fails the
//! encode immediately.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::EmbeddingConfig;

/// Default OpenAI-compatible API base.
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Trait for embedding providers.
///
/// Returns the provider's raw JSON body so that element-level validation
/// happens in one place ([`parse_embedding_response`]) regardless of backend.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-ada-002"`).
    fn model_name(&self) -> &str;

    /// Request an embedding for `text` and return the raw response body.
    async fn embed_raw(&self, text: &str) -> Result<Value>;
}

/// Why an encode produced no vector.
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embedding input must be a string, got {0}")]
    NotText(&'static str),
    #[error("embedding provider failed: {0:#}")]
    Provider(anyhow::Error),
    #[error("embedding provider timed out after {0:?}")]
    Timeout(Duration),
    #[error("embedding response has no result with an embedding array")]
    MissingEmbedding,
    #[error("embedding element {index} rejected: {found}")]
    RejectedElement { index: usize, found: String },
}

/// One element of a provider embedding array after parsing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParsedElement {
    Number(f32),
    Null,
    Rejected,
}

impl ParsedElement {
    pub fn parse(value: &Value) -> Self {
        match value {
            Value::Null => ParsedElement::Null,
            Value::Number(n) => match n.as_f64().map(|f| f as f32) {
                Some(f) if f.is_finite() => ParsedElement::Number(f),
                _ => ParsedElement::Rejected,
            },
            _ => ParsedElement::Rejected,
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Validate a provider response body into a vector.
///
/// Single pass over the embedding array; returns on the first rejected
/// element so no partial vector is ever produced.
pub fn parse_embedding_response(body: &Value) -> std::result::Result<Vec<f32>, EmbedError> {
    let elements = body
        .get("data")
        .and_then(Value::as_array)
        .and_then(|data| data.first())
        .and_then(|first| first.get("embedding"))
        .and_then(Value::as_array)
        .ok_or(EmbedError::MissingEmbedding)?;

    elements
        .iter()
        .enumerate()
        .map(|(index, value)| match ParsedElement::parse(value) {
            ParsedElement::Number(f) => Ok(f),
            ParsedElement::Null => Ok(0.0),
            ParsedElement::Rejected => Err(EmbedError::RejectedElement {
                index,
                found: match value {
                    Value::Number(n) => format!("non-finite f32 {}", n),
                    other => json_type_name(other).to_string(),
                },
            }),
        })
        .collect()
}

/// Text → validated vector → bytes, bounded by a timeout.
#[derive(Clone)]
pub struct QueryCodec {
    provider: Arc<dyn EmbeddingProvider>,
    timeout: Duration,
}

impl QueryCodec {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Embed `text` and validate the result.
    ///
    /// Empty and whitespace-only strings are forwarded to the provider like
    /// any other text.
    pub async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, EmbedError> {
        let body = tokio::time::timeout(self.timeout, self.provider.embed_raw(text))
            .await
            .map_err(|_| EmbedError::Timeout(self.timeout))?
            .map_err(EmbedError::Provider)?;
        parse_embedding_response(&body)
    }

    /// Embed `text` and return the serialized vector.
    pub async fn encode(&self, text: &str) -> std::result::Result<Vec<u8>, EmbedError> {
        self.embed(text).await.map(|v| vec_to_blob(&v))
    }

    /// Like [`encode`](Self::encode), for input of unknown JSON type.
    ///
    /// Anything other than a JSON string is rejected before the provider is
    /// contacted.
    pub async fn encode_value(&self, input: &Value) -> std::result::Result<Vec<u8>, EmbedError> {
        match input {
            Value::String(text) => self.encode(text).await,
            other => Err(EmbedError::NotText(json_type_name(other))),
        }
    }
}

// ============ Disabled Provider ============

/// A no-op embedding provider that always returns errors.
///
/// Used when `embedding.provider = "disabled"` in the configuration.
pub struct DisabledEmbeddings;

#[async_trait]
impl EmbeddingProvider for DisabledEmbeddings {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn embed_raw(&self, _text: &str) -> Result<Value> {
        bail!("Embedding provider is disabled")
    }
}

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI API.
///
/// Calls `POST {url}/embeddings` with `{ model, input }`.
/// Requires the `OPENAI_API_KEY` environment variable to be set.
pub struct OpenAiEmbeddings {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
}

impl OpenAiEmbeddings {
    /// Create a new OpenAI provider from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `model` is not set in config, or if
    /// `OPENAI_API_KEY` is not in the environment.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for OpenAI provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            api_key,
            model,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed_raw(&self, text: &str) -> Result<Value> {
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });

        let response = self
            .client
            .post(format!("{}/embeddings", self.url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("embedding request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("OpenAI API error {}: {}", status, body_text);
        }

        response
            .json::<Value>()
            .await
            .context("embedding response is not valid JSON")
    }
}

/// Create the appropriate [`EmbeddingProvider`] based on configuration.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledEmbeddings`] |
/// | `"openai"` | [`OpenAiEmbeddings`] |
pub fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledEmbeddings)),
        "openai" => Ok(Arc::new(OpenAiEmbeddings::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// # Example
///
/// ```rust
/// use task_recall::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
///
/// Reverses [`vec_to_blob`]. A trailing partial element (fewer than 4
/// bytes) is ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    similarity_f64(a, b) as f32
}

/// Cosine distance (`1 - similarity`); lower is closer.
///
/// Accumulates in `f64` so that large finite `f32` elements cannot
/// overflow. A distance that is still not finite (stored vectors holding
/// NaN or infinities) is reported as `f64::INFINITY` so it sorts last.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    let distance = 1.0 - similarity_f64(a, b);
    if distance.is_finite() {
        distance
    } else {
        f64::INFINITY
    }
}

fn similarity_f64(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f64::EPSILON {
        return 0.0;
    }

    dot / denom
}
