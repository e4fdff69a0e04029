//! Completion-service integration.
//!
//! Supports:
//! - **Anthropic**: Direct API access via rig-core
//! - **OpenAI**: Direct API access via rig-core
//! - **Mock**: Context-aware canned responses (default — no credentials)
//!
//! The concrete provider is selected once at startup from configuration;
//! the pipeline only ever sees `Arc<dyn CompletionService>`. Every
//! provider is wrapped in `Timebound` so a hung request degrades into the
//! same failure path as any other provider error.

pub mod mock;
pub mod service;
mod rig_service;

pub use mock::{MockCompletion, ScriptedCompletion};
pub use rig_service::RigService;
pub use service::{CompletionService, Timebound};

use std::sync::Arc;
use std::time::Duration;

use rig::client::CompletionClient;
use secrecy::ExposeSecret;

use crate::error::LlmError;

/// Supported completion backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    Anthropic,
    OpenAi,
    Mock,
}

impl LlmBackend {
    /// Default model identifier for this backend.
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Anthropic => "claude-sonnet-4-20250514",
            Self::OpenAi => "gpt-4o",
            Self::Mock => "mock",
        }
    }
}

impl std::str::FromStr for LlmBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "anthropic" => Ok(Self::Anthropic),
            "openai" => Ok(Self::OpenAi),
            "mock" => Ok(Self::Mock),
            other => Err(format!("Unknown LLM provider: {other}")),
        }
    }
}

/// Configuration for creating a completion service.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    pub api_key: secrecy::SecretString,
    pub model: String,
    /// Hard per-call timeout; expiry is treated as an invocation failure.
    pub request_timeout: Duration,
}

/// Create a completion service from configuration.
pub fn create_service(config: &LlmConfig) -> Result<Arc<dyn CompletionService>, LlmError> {
    let inner: Arc<dyn CompletionService> = match config.backend {
        LlmBackend::Anthropic => create_anthropic_service(config)?,
        LlmBackend::OpenAi => create_openai_service(config)?,
        LlmBackend::Mock => {
            tracing::info!("Using mock completion service");
            Arc::new(MockCompletion::new())
        }
    };
    Ok(Arc::new(Timebound::new(inner, config.request_timeout)))
}

fn create_anthropic_service(config: &LlmConfig) -> Result<Arc<dyn CompletionService>, LlmError> {
    use rig::providers::anthropic;

    let client: rig::client::Client<anthropic::client::AnthropicExt> =
        anthropic::Client::new(config.api_key.expose_secret()).map_err(|e| {
            LlmError::RequestFailed {
                provider: "anthropic".to_string(),
                reason: format!("Failed to create Anthropic client: {}", e),
            }
        })?;

    let model = client.completion_model(&config.model);
    tracing::info!("Using Anthropic (model: {})", config.model);
    Ok(Arc::new(RigService::new(model, "anthropic", &config.model)))
}

fn create_openai_service(config: &LlmConfig) -> Result<Arc<dyn CompletionService>, LlmError> {
    use rig::providers::openai;

    let client: rig::client::Client<openai::client::OpenAIResponsesExt> =
        openai::Client::new(config.api_key.expose_secret()).map_err(|e| {
            LlmError::RequestFailed {
                provider: "openai".to_string(),
                reason: format!("Failed to create OpenAI client: {}", e),
            }
        })?;

    let model = client.completion_model(&config.model);
    tracing::info!("Using OpenAI (model: {})", config.model);
    Ok(Arc::new(RigService::new(model, "openai", &config.model)))
}
