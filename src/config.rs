//! TOML configuration parsing and validation.
//!
//! Configuration is read from a single file (default `./config/recall.toml`).
//! Every section except `[db]` has defaults, so a minimal file is:
//!
//! ```toml
//! [db]
//! path = "./data/recall.sqlite"
//! ```
//!
//! which leaves both providers disabled. `ask` then answers with the
//! processing-error sentinel, which is useful for smoke tests.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::MAX_CONTEXT_RECORDS;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Expected vector length; only enforced when indexing the corpus.
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
    /// API base, e.g. `https://api.openai.com/v1`.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            timeout_secs: default_embedding_timeout_secs(),
            url: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_completion_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            max_tokens: default_max_tokens(),
            timeout_secs: default_completion_timeout_secs(),
            url: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default = "default_retrieval_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            timeout_secs: default_retrieval_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_embedding_timeout_secs() -> u64 {
    30
}
fn default_completion_timeout_secs() -> u64 {
    60
}
fn default_max_tokens() -> u32 {
    500
}
fn default_top_n() -> usize {
    MAX_CONTEXT_RECORDS
}
fn default_retrieval_timeout_secs() -> u64 {
    10
}
fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl CompletionConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl RetrievalConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if !(1..=MAX_CONTEXT_RECORDS).contains(&config.retrieval.top_n) {
        anyhow::bail!("retrieval.top_n must be in [1, {}]", MAX_CONTEXT_RECORDS);
    }

    if config.completion.max_tokens == 0 {
        anyhow::bail!("completion.max_tokens must be > 0");
    }

    for (section, provider, model) in [
        (
            "embedding",
            &config.embedding.provider,
            &config.embedding.model,
        ),
        (
            "completion",
            &config.completion.provider,
            &config.completion.model,
        ),
    ] {
        match provider.as_str() {
            "disabled" => {}
            "openai" => {
                if model.is_none() {
                    anyhow::bail!(
                        "{}.model must be specified when provider is '{}'",
                        section,
                        provider
                    );
                }
            }
            other => anyhow::bail!(
                "Unknown {} provider: '{}'. Must be disabled or openai.",
                section,
                other
            ),
        }
    }

    for (key, secs) in [
        ("embedding.timeout_secs", config.embedding.timeout_secs),
        ("completion.timeout_secs", config.completion.timeout_secs),
        ("retrieval.timeout_secs", config.retrieval.timeout_secs),
    ] {
        if secs == 0 {
            anyhow::bail!("{} must be > 0", key);
        }
    }

    if config.embedding.dims == Some(0) {
        anyhow::bail!("embedding.dims must be > 0 when set");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse_config("[db]\npath = \"/tmp/recall.sqlite\"\n").unwrap();
        assert!(!config.embedding.is_enabled());
        assert!(!config.completion.is_enabled());
        assert_eq!(config.retrieval.top_n, 10);
        assert_eq!(config.completion.max_tokens, 500);
        assert_eq!(config.server.bind, "127.0.0.1:7341");
    }

    #[test]
    fn test_full_config() {
        let config = parse_config(
            r#"
[db]
path = "./data/recall.sqlite"

[embedding]
provider = "openai"
model = "text-embedding-ada-002"
dims = 1536

[completion]
provider = "openai"
model = "gpt-4o-mini"
max_tokens = 300

[retrieval]
top_n = 5
timeout_secs = 3
"#,
        )
        .unwrap();
        assert_eq!(config.embedding.dims, Some(1536));
        assert_eq!(config.completion.max_tokens, 300);
        assert_eq!(config.retrieval.top_n, 5);
        assert_eq!(config.retrieval.timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_top_n_out_of_range() {
        let err = parse_config("[db]\npath = \"x\"\n[retrieval]\ntop_n = 11\n").unwrap_err();
        assert!(err.to_string().contains("top_n"));
        assert!(parse_config("[db]\npath = \"x\"\n[retrieval]\ntop_n = 0\n").is_err());
    }

    #[test]
    fn test_enabled_provider_requires_model() {
        let err = parse_config("[db]\npath = \"x\"\n[completion]\nprovider = \"openai\"\n")
            .unwrap_err();
        assert!(err.to_string().contains("completion.model"));
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        for section in ["embedding", "completion", "retrieval"] {
            let toml = format!(
                "[db]\npath = \"/tmp/recall.sqlite\"\n\n[{}]\ntimeout_secs = 0\n",
                section
            );
            let err = parse_config(&toml).unwrap_err();
            assert!(
                err.to_string()
                    .contains(&format!("{}.timeout_secs must be > 0", section)),
                "{}",
                err
            );
        }
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let err = parse_config("[db]\npath = \"x\"\n[embedding]\nprovider = \"local\"\n")
            .unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }
}
