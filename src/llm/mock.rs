//! Mock completion services — the default backend for development, and a
//! scripted variant for tests that need exact control over responses.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use crate::error::LlmError;
use crate::llm::service::CompletionService;

/// Context-aware mock — dispatches canned responses on prompt markers so a
/// full pipeline run works end-to-end without any provider credentials.
pub struct MockCompletion;

impl MockCompletion {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MockCompletion {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionService for MockCompletion {
    fn provider_name(&self) -> &str {
        "mock"
    }

    async fn invoke(&self, prompt: &str) -> Result<String, LlmError> {
        let preview: String = prompt.chars().take(60).collect();
        debug!(prompt = %preview, "Mock completion");

        let finance = {
            let lower = prompt.to_lowercase();
            lower.contains("finance") || lower.contains("portfolio")
        };

        let response = if prompt.contains("Classify if this email") {
            if finance {
                r#"{"is_valid": true, "confidence": 0.95, "reason": "Valid financial services inquiry"}"#
            } else {
                r#"{"is_valid": true, "confidence": 0.9, "reason": "Valid business inquiry"}"#
            }
        } else if prompt.contains("Extract structured information") {
            if finance {
                r#"{"client_name": "Debabrata G.","company": "Finance Company","project_type": "AI Agent for Portfolio Management System","requirements": ["Real-time portfolio tracking","Risk analysis and alerts","Automated trading suggestions","Historical performance analytics","Integration with multiple brokers"],"timeline": "3 months","budget": "$15000-$20000"}"#
            } else {
                r#"{"client_name": "John Doe","company": "Tech Startup","project_type": "Web Application","requirements": ["React frontend","Rust backend","Database","User auth","API"],"timeline": "2 months","budget": "$10000-$15000"}"#
            }
        } else if prompt.contains("Create a realistic project plan") {
            if finance {
                r#"{"complexity": "complex","total_estimated_hours": 160,"phases": [{"name": "Phase 1: Discovery & Requirements","duration": "1.5 weeks","hours": 20,"tasks": ["Detailed requirements gathering","Technical design","Architecture review","Security planning"]},{"name": "Phase 2: Core Backend Development","duration": "3 weeks","hours": 60,"tasks": ["Database design","API endpoints","Authentication","Integration services"]},{"name": "Phase 3: Frontend & User Interface","duration": "2 weeks","hours": 40,"tasks": ["UI/UX design","Components","State management","Responsive design"]},{"name": "Phase 4: Testing & Quality Assurance","duration": "1.5 weeks","hours": 25,"tasks": ["Unit tests","Integration tests","Performance testing","Security audit"]},{"name": "Phase 5: Deployment & Handoff","duration": "1 week","hours": 15,"tasks": ["Production setup","Documentation","Staff training","Support plan"]}]}"#
            } else {
                r#"{"complexity": "medium","total_estimated_hours": 80,"phases": [{"name": "Phase 1: Planning & Design","duration": "1 week","hours": 15,"tasks": ["Requirements analysis","UI mockups","Database schema"]},{"name": "Phase 2: Development","duration": "2 weeks","hours": 40,"tasks": ["Backend development","Frontend development","Integration"]},{"name": "Phase 3: Testing & Launch","duration": "1 week","hours": 25,"tasks": ["Testing","Fixes","Deployment"]}]}"#
            }
        } else if prompt.contains("Write a professional") {
            MOCK_PROPOSAL
        } else {
            r#"{"response": "Mock service response"}"#
        };

        Ok(response.to_string())
    }
}

const MOCK_PROPOSAL: &str = "Dear Client,\n\n\
Thank you for your inquiry. We're interested in discussing your project.\n\n\
**Project Overview**\n\
We understand you need a custom solution and we have extensive experience building similar systems.\n\n\
**Our Process**\n\
1. Requirements gathering and analysis\n\
2. Design and planning\n\
3. Development and implementation\n\
4. Testing and quality assurance\n\
5. Deployment and support\n\n\
**Next Steps**\n\
Let's schedule a call to discuss your specific needs.\n\n\
Best regards,\nOttoMail Solutions";

/// Scripted completion service — pops pre-loaded responses in order.
///
/// Push `Ok` strings or error messages before driving the pipeline; each
/// `invoke` consumes one entry. An exhausted script is itself an error, so
/// tests fail loudly when a stage makes an unexpected call.
pub struct ScriptedCompletion {
    responses: Mutex<VecDeque<std::result::Result<String, String>>>,
}

impl ScriptedCompletion {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
        }
    }

    /// Queue a successful completion.
    pub fn push_ok(&self, response: impl Into<String>) {
        self.responses
            .lock()
            .expect("script lock poisoned")
            .push_back(Ok(response.into()));
    }

    /// Queue a provider failure.
    pub fn push_err(&self, reason: impl Into<String>) {
        self.responses
            .lock()
            .expect("script lock poisoned")
            .push_back(Err(reason.into()));
    }
}

impl Default for ScriptedCompletion {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn invoke(&self, _prompt: &str) -> Result<String, LlmError> {
        let next = self
            .responses
            .lock()
            .expect("script lock poisoned")
            .pop_front();
        match next {
            Some(Ok(response)) => Ok(response),
            Some(Err(reason)) => Err(LlmError::RequestFailed {
                provider: "scripted".to_string(),
                reason,
            }),
            None => Err(LlmError::RequestFailed {
                provider: "scripted".to_string(),
                reason: "script exhausted".to_string(),
            }),
        }
    }
}
