//! Completion provider contract.
//!
//! The coaching chat hands the rendered system instructions plus the full
//! role/content history of a thread to a [`CompletionProvider`] and gets back the
//! assistant's reply text. Providers may fail; the service turns any failure into
//! the fixed fallback reply, so nothing here needs to be retried.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow, ensure};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Message, Role};

mod anthropic;
mod mock;

pub use anthropic::AnthropicProvider;
pub use mock::{MockCompletionProvider, UnavailableProvider};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// One prior turn handed to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl From<&Message> for ChatTurn {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompletionError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("rate limited")]
    RateLimited,

    #[error("network error: {0}")]
    Network(String),

    #[error("could not parse provider response: {0}")]
    Parse(String),

    #[error("provider returned an empty reply")]
    EmptyReply,
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Identifier for logs (usually the model name).
    fn id(&self) -> &str;

    async fn generate(
        &self,
        system_instructions: &str,
        messages: &[ChatTurn],
    ) -> Result<String, CompletionError>;
}

/// Provider selection and HTTP settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionConfig {
    /// "anthropic", "mock" or "unavailable"
    pub provider: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub api_key: Option<String>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            api_key: None,
        }
    }
}

pub fn provider_from_config(config: &CompletionConfig) -> Result<Arc<dyn CompletionProvider>> {
    match config.provider.as_str() {
        "anthropic" => {
            let api_key = config
                .api_key
                .clone()
                .filter(|key| !key.trim().is_empty())
                .ok_or_else(|| anyhow!("anthropic completion provider requires an API key"))?;
            ensure!(config.max_tokens > 0, "completion max_tokens must be positive");
            let provider = AnthropicProvider::new(
                config.base_url.clone(),
                config.model.clone(),
                api_key,
                config.max_tokens,
                config.timeout,
            )?;
            Ok(Arc::new(provider))
        }
        "mock" => Ok(Arc::new(MockCompletionProvider::default())),
        "unavailable" => Ok(Arc::new(UnavailableProvider)),
        other => Err(anyhow!("Unknown completion provider: {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_turn_from_message() {
        let message = Message {
            role: Role::Assistant,
            content: "hello".into(),
            timestamp: Utc::now(),
        };
        let turn = ChatTurn::from(&message);
        assert_eq!(turn.role, Role::Assistant);
        assert_eq!(turn.content, "hello");
    }

    #[test]
    fn test_anthropic_requires_api_key() {
        let config = CompletionConfig::default();
        assert!(provider_from_config(&config).is_err());

        let config = CompletionConfig {
            api_key: Some("sk-test".into()),
            ..CompletionConfig::default()
        };
        assert_eq!(provider_from_config(&config).unwrap().id(), DEFAULT_MODEL);
    }

    #[test]
    fn test_named_providers() {
        for (name, id) in [("mock", "mock-model"), ("unavailable", "unavailable")] {
            let config = CompletionConfig {
                provider: name.into(),
                ..CompletionConfig::default()
            };
            assert_eq!(provider_from_config(&config).unwrap().id(), id);
        }
        let config = CompletionConfig {
            provider: "openai".into(),
            ..CompletionConfig::default()
        };
        assert!(provider_from_config(&config).is_err());
    }
}
