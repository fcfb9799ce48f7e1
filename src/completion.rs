//! Completion provider abstraction.
//!
//! Defines the [`CompletionProvider`] trait, the request/response shapes the
//! orchestrator works with, and an OpenAI-compatible chat client.
//!
//! Response types are deliberately loose: `content` is kept as raw JSON so
//! that a provider returning a non-string content can be detected and
//! reported instead of failing deserialization.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::config::CompletionConfig;
use crate::embedding::DEFAULT_API_BASE;

pub const SYSTEM_PROMPT: &str = "You are a helpful, context-aware assistant.";

/// A single prompt pair with an output budget.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub max_tokens: u32,
}

impl CompletionRequest {
    /// Build the prompt pair for `query` grounded in `context`.
    pub fn for_query(query: &str, context: &str, max_tokens: u32) -> Self {
        let user_prompt = format!(
            "You answer questions about the user's ongoing tasks and past completed tasks.\n\n\
             User Query: {}\n\n\
             Relevant Context:\n{}\n\n\
             Please generate a helpful, concise, and actionable response.",
            query, context
        );
        Self {
            system_prompt: SYSTEM_PROMPT.to_string(),
            user_prompt,
            max_tokens,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub message: Option<ChoiceMessage>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<Value>,
}

impl CompletionResponse {
    /// Response whose single choice carries `content`.
    pub fn with_content(content: impl Into<Value>) -> Self {
        Self {
            choices: vec![Choice {
                message: Some(ChoiceMessage {
                    content: Some(content.into()),
                }),
            }],
        }
    }

    /// Trimmed text of the first choice, if it is a non-blank string.
    pub fn first_text(&self) -> Option<&str> {
        self.choices
            .first()?
            .message
            .as_ref()?
            .content
            .as_ref()?
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn model_name(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse>;
}

/// Always fails; used when `completion.provider = "disabled"`.
pub struct DisabledCompletion;

#[async_trait]
impl CompletionProvider for DisabledCompletion {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _request: &CompletionRequest) -> Result<CompletionResponse> {
        bail!("Completion provider is disabled")
    }
}

/// OpenAI-compatible `POST /chat/completions` client.
pub struct OpenAiChat {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
}

impl OpenAiChat {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("completion.model required for OpenAI provider"))?;
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
impl CompletionProvider for OpenAiChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": request.system_prompt },
                { "role": "user", "content": request.user_prompt },
            ],
            "max_tokens": request.max_tokens,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("completion request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("OpenAI API error {}: {}", status, body_text);
        }

        response
            .json::<CompletionResponse>()
            .await
            .context("completion response has an unexpected shape")
    }
}

pub fn create_provider(config: &CompletionConfig) -> Result<Arc<dyn CompletionProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledCompletion)),
        "openai" => Ok(Arc::new(OpenAiChat::new(config)?)),
        other => bail!("Unknown completion provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_embeds_query_and_context() {
        let req = CompletionRequest::for_query("status update", "(1) [ONGOING_TASK] Title: X", 500);
        assert_eq!(req.system_prompt, SYSTEM_PROMPT);
        assert!(req.user_prompt.contains("User Query: status update"));
        assert!(req
            .user_prompt
            .contains("Relevant Context:\n(1) [ONGOING_TASK] Title: X"));
        assert_eq!(req.max_tokens, 500);
    }

    #[test]
    fn test_first_text_trims() {
        let resp = CompletionResponse::with_content("  answer \n");
        assert_eq!(resp.first_text(), Some("answer"));
    }

    #[test]
    fn test_first_text_rejects_unusable_content() {
        assert_eq!(CompletionResponse::default().first_text(), None);
        assert_eq!(CompletionResponse::with_content("   ").first_text(), None);
        assert_eq!(CompletionResponse::with_content(42).first_text(), None);
        assert_eq!(CompletionResponse::with_content(json!(null)).first_text(), None);
        let no_message = CompletionResponse {
            choices: vec![Choice { message: None }],
        };
        assert_eq!(no_message.first_text(), None);
    }

    #[test]
    fn test_response_deserializes_openai_shape() {
        let resp: CompletionResponse = serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "hi"}}]
        }))
        .unwrap();
        assert_eq!(resp.first_text(), Some("hi"));

        let odd: CompletionResponse = serde_json::from_value(json!({
            "choices": [{"message": {"content": ["not", "text"]}}]
        }))
        .unwrap();
        assert_eq!(odd.first_text(), None);
    }

    #[tokio::test]
    async fn test_disabled_provider_fails() {
        let req = CompletionRequest::for_query("q", "c", 10);
        assert!(DisabledCompletion.complete(&req).await.is_err());
    }
}
