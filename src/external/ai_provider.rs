use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum AiError {
    #[error("no AI provider configured")]
    NotConfigured,

    #[error("network error: {0}")]
    Network(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("rate limited")]
    RateLimited,

    #[error("request timed out")]
    Timeout,
}

impl AiError {
    /// Configuration problems are surfaced immediately; everything else is
    /// treated as transient and goes through the retry policy.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, AiError::NotConfigured)
    }
}

/// A text-completion capability backed by some vendor API.
#[async_trait]
pub trait AiProvider: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, AiError>;

    fn name(&self) -> &'static str;
}

/// Ordered list of AI providers; `complete` returns the first success.
///
/// An empty list models "no provider configured" and fails fast with
/// `AiError::NotConfigured` so callers can report it without retrying.
pub struct FallbackAi {
    providers: Vec<Arc<dyn AiProvider>>,
}

impl FallbackAi {
    pub fn new(providers: Vec<Arc<dyn AiProvider>>) -> Self {
        Self { providers }
    }

    pub fn is_configured(&self) -> bool {
        !self.providers.is_empty()
    }
}

#[async_trait]
impl AiProvider for FallbackAi {
    async fn complete(&self, prompt: &str) -> Result<String, AiError> {
        if self.providers.is_empty() {
            return Err(AiError::NotConfigured);
        }

        let mut last_err = AiError::NotConfigured;
        for provider in &self.providers {
            match provider.complete(prompt).await {
                Ok(text) => {
                    info!("AI completion served by {}", provider.name());
                    return Ok(text);
                }
                Err(e) => {
                    warn!("{} failed: {}. Trying next provider", provider.name(), e);
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }

    fn name(&self) -> &'static str {
        "fallback"
    }
}
