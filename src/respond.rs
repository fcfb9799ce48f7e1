//! Response orchestrator.
//!
//! [`Responder`] runs one query through the whole pipeline:
//!
//! ```text
//! validate ─▶ embed ─▶ retrieve ─▶ assemble ─▶ complete ─▶ answer
//!    │          │          │                      │
//!    ▼          ▼          ▼                      ▼
//!  error      error    no context               error
//! ```
//!
//! Each stage returns `Result<_, Failure>` and the stages are chained with
//! `?`, so the first failure is terminal. [`Responder::generate_refined_response`]
//! folds the outcome into a plain string: the answer text, or one of the
//! two sentinels below. Nothing escapes as an error.

use anyhow::Result;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::completion::{self, CompletionProvider, CompletionRequest};
use crate::config::Config;
use crate::context::assemble;
use crate::embedding::{self, EmbedError, QueryCodec};
use crate::retrieve::{clamp_top_n, RetrievalEngine};
use crate::store::{RecordStore, VectorIndex};

/// Returned when retrieval finds nothing to ground an answer in.
pub const NO_CONTEXT_SENTINEL: &str = "No relevant context found to answer your query.";

/// Returned for invalid input and for every processing failure.
pub const ERROR_SENTINEL: &str = "An error occurred while processing your request.";

/// Why a query did not produce an answer.
#[derive(Debug, Error)]
pub enum Failure {
    #[error("invalid query: {0}")]
    InvalidQuery(&'static str),
    #[error(transparent)]
    Embedding(#[from] EmbedError),
    #[error("no relevant context for query")]
    NoContext,
    #[error("completion provider failed: {0:#}")]
    Completion(anyhow::Error),
    #[error("completion provider timed out after {0:?}")]
    CompletionTimeout(Duration),
    #[error("completion response has no usable text")]
    EmptyCompletion,
}

impl Failure {
    /// The user-facing sentinel for this failure.
    pub fn sentinel(&self) -> &'static str {
        match self {
            Failure::NoContext => NO_CONTEXT_SENTINEL,
            _ => ERROR_SENTINEL,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResponderSettings {
    /// Hits requested from the vector index (clamped to `1..=10`).
    pub top_n: usize,
    /// Output budget passed to the completion provider.
    pub max_tokens: u32,
    pub completion_timeout: Duration,
}

impl Default for ResponderSettings {
    fn default() -> Self {
        Self {
            top_n: crate::models::MAX_CONTEXT_RECORDS,
            max_tokens: 500,
            completion_timeout: Duration::from_secs(60),
        }
    }
}

/// The end-to-end query pipeline.
///
/// Holds only shared, immutable collaborators; one `Responder` can serve
/// many concurrent queries.
#[derive(Clone)]
pub struct Responder {
    codec: QueryCodec,
    retrieval: RetrievalEngine,
    completion: Arc<dyn CompletionProvider>,
    settings: ResponderSettings,
}

impl Responder {
    pub fn new(
        codec: QueryCodec,
        retrieval: RetrievalEngine,
        completion: Arc<dyn CompletionProvider>,
        settings: ResponderSettings,
    ) -> Self {
        Self {
            codec,
            retrieval,
            completion,
            settings,
        }
    }

    /// Wire up providers from configuration over the given stores.
    pub fn from_config(
        config: &Config,
        index: Arc<dyn VectorIndex>,
        records: Arc<dyn RecordStore>,
    ) -> Result<Self> {
        let codec = QueryCodec::new(
            embedding::create_provider(&config.embedding)?,
            config.embedding.timeout(),
        );
        let retrieval = RetrievalEngine::new(index, records, config.retrieval.timeout());
        let completion = completion::create_provider(&config.completion)?;
        let settings = ResponderSettings {
            top_n: config.retrieval.top_n,
            max_tokens: config.completion.max_tokens,
            completion_timeout: config.completion.timeout(),
        };
        Ok(Self::new(codec, retrieval, completion, settings))
    }

    /// Answer `query`, or return one of the two sentinels.
    pub async fn generate_refined_response(&self, query: &str) -> String {
        self.answer(query).await.unwrap_or_else(report)
    }

    /// Like [`generate_refined_response`](Self::generate_refined_response)
    /// for a query of unknown JSON type; non-strings get the error sentinel
    /// without any external call.
    pub async fn generate_refined_response_json(&self, query: &Value) -> String {
        match query {
            Value::String(text) => self.generate_refined_response(text).await,
            _ => report(Failure::InvalidQuery("query must be a string")),
        }
    }

    /// Run the pipeline, keeping the failure reason.
    pub async fn answer(&self, query: &str) -> Result<String, Failure> {
        let query = validate_query(query)?;
        let vector = self.codec.encode(query).await?;

        let records = self
            .retrieval
            .retrieve(&vector, clamp_top_n(self.settings.top_n))
            .await;
        let context = assemble(&records).ok_or(Failure::NoContext)?;

        let request = CompletionRequest::for_query(query, &context, self.settings.max_tokens);
        self.complete(&request).await
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, Failure> {
        let limit = self.settings.completion_timeout;
        let response = tokio::time::timeout(limit, self.completion.complete(request))
            .await
            .map_err(|_| Failure::CompletionTimeout(limit))?
            .map_err(Failure::Completion)?;

        response
            .first_text()
            .map(str::to_string)
            .ok_or(Failure::EmptyCompletion)
    }
}

/// Only the exact empty string is invalid; whitespace is a valid query.
fn validate_query(query: &str) -> Result<&str, Failure> {
    if query.is_empty() {
        return Err(Failure::InvalidQuery("query is empty"));
    }
    Ok(query)
}

fn report(failure: Failure) -> String {
    match failure {
        Failure::NoContext => tracing::info!("no relevant context for query"),
        ref other => tracing::warn!(error = %other, "query failed"),
    }
    failure.sentinel().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels_are_distinguishable() {
        assert!(NO_CONTEXT_SENTINEL.to_lowercase().contains("no relevant context"));
        assert!(ERROR_SENTINEL.to_lowercase().contains("error"));
        assert!(!ERROR_SENTINEL.to_lowercase().contains("no relevant context"));
    }

    #[test]
    fn test_failure_sentinel_mapping() {
        assert_eq!(Failure::NoContext.sentinel(), NO_CONTEXT_SENTINEL);
        assert_eq!(Failure::EmptyCompletion.sentinel(), ERROR_SENTINEL);
        assert_eq!(
            Failure::InvalidQuery("query is empty").sentinel(),
            ERROR_SENTINEL
        );
        assert_eq!(
            Failure::Embedding(EmbedError::MissingEmbedding).sentinel(),
            ERROR_SENTINEL
        );
    }

    #[test]
    fn test_validate_query() {
        assert!(validate_query("").is_err());
        assert_eq!(validate_query("   ").unwrap(), "   ");
        assert_eq!(validate_query("status update").unwrap(), "status update");
    }
}
