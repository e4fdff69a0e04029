//! Completion service trait and the timeout decorator.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::LlmError;

/// Text-completion service consumed by the AI-backed pipeline stages.
///
/// Plain text in, plain text out — no streaming, no tool calling. Providers
/// are interchangeable; the pipeline never knows which one is active.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Short provider label for logs and error messages.
    fn provider_name(&self) -> &str;

    /// Run a single completion.
    async fn invoke(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Decorator that bounds every completion call with a hard timeout.
///
/// Expiry surfaces as `LlmError::Timeout`, which stages treat exactly like
/// any other invocation failure — the stage fallback fires and the run
/// continues.
pub struct Timebound {
    inner: Arc<dyn CompletionService>,
    limit: Duration,
}

impl Timebound {
    pub fn new(inner: Arc<dyn CompletionService>, limit: Duration) -> Self {
        Self { inner, limit }
    }
}

#[async_trait]
impl CompletionService for Timebound {
    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }

    async fn invoke(&self, prompt: &str) -> Result<String, LlmError> {
        match tokio::time::timeout(self.limit, self.inner.invoke(prompt)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout {
                provider: self.inner.provider_name().to_string(),
                limit: self.limit,
            }),
        }
    }
}
