//! Language-model text client: one prompt in, the first completion out.
//!
//! The pipeline only ever needs "send this text, give me the answer", so the
//! seam is the small [`TextCompletion`] trait rather than the full
//! [`LLMProvider`] surface. Prompt wording lives in [`crate::prompts`];
//! response parsing in [`super::json`].
//!
//! No retry, backoff or caching happens here. A failed call is an
//! [`PaFillError::LmService`] and aborts the run.

use crate::error::PaFillError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Anything that turns a prompt into completion text.
#[async_trait]
pub trait TextCompletion: Send + Sync {
    /// Send `prompt` as a single user turn and return the first completion.
    async fn complete(&self, prompt: &str) -> Result<String, PaFillError>;

    /// Blocking form of [`complete`](Self::complete).
    ///
    /// Drives the call on a private current-thread runtime. Must not be
    /// called from inside an async runtime.
    fn complete_blocking(&self, prompt: &str) -> Result<String, PaFillError> {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| PaFillError::Internal(format!("Failed to create tokio runtime: {e}")))?
            .block_on(self.complete(prompt))
    }
}

/// [`TextCompletion`] backed by an `edgequake-llm` provider.
#[derive(Clone)]
pub struct LlmTextClient {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
    timeout: Duration,
}

impl LlmTextClient {
    /// Wrap a provider with default sampling (temperature 0.1, 4096 tokens)
    /// and a 60 s per-call timeout.
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            options: build_options(0.1, 4096),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: usize) -> Self {
        self.options = build_options(temperature, max_tokens);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Debug for LlmTextClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmTextClient")
            .field("provider", &"<dyn LLMProvider>")
            .field("temperature", &self.options.temperature)
            .field("max_tokens", &self.options.max_tokens)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[async_trait]
impl TextCompletion for LlmTextClient {
    async fn complete(&self, prompt: &str) -> Result<String, PaFillError> {
        let start = Instant::now();
        let messages = [ChatMessage::user(prompt)];

        let response = tokio::time::timeout(
            self.timeout,
            self.provider.chat(&messages, Some(&self.options)),
        )
        .await
        .map_err(|_| PaFillError::LmService {
            detail: format!("no response within {}s", self.timeout.as_secs()),
        })?
        .map_err(|e| PaFillError::LmService {
            detail: e.to_string(),
        })?;

        debug!(
            "LM call: {} prompt chars, {} input tokens, {} output tokens, {:?}",
            prompt.len(),
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );
        Ok(response.content)
    }
}

fn build_options(temperature: f32, max_tokens: usize) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(temperature),
        max_tokens: Some(max_tokens),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl TextCompletion for Echo {
        async fn complete(&self, prompt: &str) -> Result<String, PaFillError> {
            Ok(format!("echo: {prompt}"))
        }
    }

    #[test]
    fn build_options_sets_sampling() {
        let opts = build_options(0.1, 4096);
        assert_eq!(opts.temperature, Some(0.1));
        assert_eq!(opts.max_tokens, Some(4096));
    }

    #[test]
    fn blocking_mode_returns_the_same_text() {
        assert_eq!(Echo.complete_blocking("hi").unwrap(), "echo: hi");
    }

    #[tokio::test]
    async fn concurrent_mode_returns_text() {
        assert_eq!(Echo.complete("hi").await.unwrap(), "echo: hi");
    }
}
