//! Classification stage — is this a genuine business inquiry?
//!
//! Failure here is never fatal: any provider or parse problem yields a
//! negative classification with confidence 0, so the router's branch
//! decision stays deterministic.

use tracing::{debug, warn};

use crate::error::LlmError;
use crate::llm::CompletionService;
use crate::pipeline::parse;
use crate::pipeline::state::{Classification, InquiryEmail, StagePatch, StepTag};

pub async fn run(llm: &dyn CompletionService, email: &InquiryEmail) -> StagePatch<Classification> {
    match request(llm, email).await {
        Ok(classification) => {
            debug!(
                id = %email.id,
                valid = classification.is_valid,
                confidence = classification.confidence,
                "Email classified"
            );
            StagePatch::ok(classification, StepTag::Classified)
        }
        Err(e) => {
            // The message distinguishes empty completions from transport
            // and parse failures; routing treats them all the same.
            let reason = e.to_string();
            warn!(id = %email.id, error = %reason, "Classification failed — treating as invalid inquiry");
            StagePatch::fallback(
                Classification::rejected(reason.clone()),
                StepTag::ClassificationFailed,
                reason,
            )
        }
    }
}

#[derive(Debug, serde::Deserialize)]
struct ClassifyResponse {
    is_valid: bool,
    confidence: f32,
    #[serde(default)]
    reason: String,
}

async fn request(
    llm: &dyn CompletionService,
    email: &InquiryEmail,
) -> Result<Classification, LlmError> {
    let raw = llm.invoke(&build_prompt(email)).await?;
    if raw.trim().is_empty() {
        return Err(LlmError::EmptyCompletion {
            provider: llm.provider_name().to_string(),
        });
    }

    let value = parse::completion_json(&raw)?;
    let response: ClassifyResponse =
        serde_json::from_value(value).map_err(|e| LlmError::MalformedResponse {
            reason: e.to_string(),
        })?;

    Ok(Classification {
        is_valid: response.is_valid,
        confidence: response.confidence.clamp(0.0, 1.0),
        reason: if response.reason.is_empty() {
            "No reason provided".to_string()
        } else {
            response.reason
        },
    })
}

fn build_prompt(email: &InquiryEmail) -> String {
    format!(
        "Classify if this email is a genuine business inquiry needing a proposal.\n\n\
         RULES - Email IS VALID if:\n\
         - Person asks about building/developing something (app, website, tool, system, etc.)\n\
         - Person asks for consulting, training, or professional services\n\
         - Person describes a business problem needing a solution\n\
         - Message is reasonably detailed (not one-word spam)\n\n\
         Rules - Email IS NOT VALID if:\n\
         - It's spam, promotional, or recruiting\n\
         - It's a job application\n\
         - It's generic \"I'll pay you big money\" with no details\n\
         - It's obviously auto-generated marketing\n\n\
         Email to analyze:\n\
         Subject: {subject}\n\
         From: {from}\n\
         Body: {body}\n\n\
         Return ONLY valid JSON:\n\
         {{\n\
             \"is_valid\": true or false,\n\
             \"confidence\": 0.0 to 1.0,\n\
             \"reason\": \"one sentence explanation\"\n\
         }}",
        subject = email.subject,
        from = email.sender,
        body = email.body,
    )
}
