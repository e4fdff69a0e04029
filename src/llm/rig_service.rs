//! Bridge from rig's `CompletionModel` to our `CompletionService` trait.

use async_trait::async_trait;
use rig::agent::{Agent, AgentBuilder};
use rig::completion::{CompletionModel, Prompt};

use crate::error::LlmError;
use crate::llm::service::CompletionService;

/// Sampling temperature for all pipeline completions.
const TEMPERATURE: f64 = 0.3;

/// Adapter wrapping a rig completion model as a plain-text service.
pub struct RigService<M: CompletionModel> {
    agent: Agent<M>,
    provider: &'static str,
    model: String,
}

impl<M: CompletionModel> RigService<M> {
    pub fn new(model: M, provider: &'static str, model_name: &str) -> Self {
        let agent = AgentBuilder::new(model).temperature(TEMPERATURE).build();
        Self {
            agent,
            provider,
            model: model_name.to_string(),
        }
    }

    /// Model identifier this service was built with.
    pub fn model_name(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl<M: CompletionModel + Send + Sync> CompletionService for RigService<M> {
    fn provider_name(&self) -> &str {
        self.provider
    }

    async fn invoke(&self, prompt: &str) -> Result<String, LlmError> {
        self.agent
            .prompt(prompt)
            .await
            .map_err(|e| LlmError::RequestFailed {
                provider: self.provider.to_string(),
                reason: e.to_string(),
            })
    }
}
