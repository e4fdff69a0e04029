//! Extraction stage — structured client requirements from the email body.
//!
//! The fallback recovers a usable client name from the sender address and
//! fills the remaining fields with fixed defaults, so downstream stages
//! always see a complete profile.

use regex::Regex;
use tracing::{debug, warn};

use crate::error::LlmError;
use crate::llm::CompletionService;
use crate::pipeline::parse;
use crate::pipeline::state::{ClientProfile, InquiryEmail, StagePatch, StepTag};

pub async fn run(llm: &dyn CompletionService, email: &InquiryEmail) -> StagePatch<ClientProfile> {
    match request(llm, email).await {
        Ok(profile) => {
            debug!(id = %email.id, client = %profile.name, "Requirements extracted");
            StagePatch::ok(profile, StepTag::Extracted)
        }
        Err(e) => {
            let reason = e.to_string();
            warn!(id = %email.id, error = %reason, "Extraction failed — recovering client name from sender");
            StagePatch::fallback(fallback_profile(email), StepTag::ExtractionFallback, reason)
        }
    }
}

#[derive(Debug, serde::Deserialize)]
struct ExtractResponse {
    client_name: String,
    #[serde(default)]
    company: Option<String>,
    project_type: String,
    requirements: Vec<String>,
    timeline: String,
    budget: String,
}

async fn request(
    llm: &dyn CompletionService,
    email: &InquiryEmail,
) -> Result<ClientProfile, LlmError> {
    let raw = llm.invoke(&build_prompt(email)).await?;
    if raw.trim().is_empty() {
        return Err(LlmError::EmptyCompletion {
            provider: llm.provider_name().to_string(),
        });
    }

    let value = parse::completion_json(&raw)?;
    // All keys except `company` are required — a response missing any of
    // them counts as malformed and takes the fallback path whole.
    let response: ExtractResponse =
        serde_json::from_value(value).map_err(|e| LlmError::MalformedResponse {
            reason: e.to_string(),
        })?;

    Ok(ClientProfile {
        name: response.client_name,
        company: response.company,
        project_type: response.project_type,
        requirements: response.requirements,
        timeline: response.timeline,
        budget: response.budget,
    })
}

/// Deterministic profile used when extraction fails.
pub fn fallback_profile(email: &InquiryEmail) -> ClientProfile {
    ClientProfile {
        name: client_name_from_sender(&email.sender),
        company: None,
        project_type: email.subject.clone(),
        requirements: vec!["Discuss detailed requirements".to_string()],
        timeline: "To be determined".to_string(),
        budget: "Flexible".to_string(),
    }
}

/// Derive a human name from a sender address.
///
/// `"Jane Doe <jane@example.com>"` → `"Jane Doe"`;
/// `"krish.gupta12@example.com"` → `"Krish Gupta"`;
/// anything that derives to empty → `"Valued Client"`.
pub fn client_name_from_sender(sender: &str) -> String {
    let derived = if let Some((display, _)) = sender.split_once('<') {
        display.trim().to_string()
    } else {
        let local = sender.split('@').next().unwrap_or("");
        let spaced = Regex::new(r"[0-9_.\-]").unwrap().replace_all(local, " ");
        spaced
            .split_whitespace()
            .map(capitalize_word)
            .collect::<Vec<_>>()
            .join(" ")
    };

    if derived.is_empty() {
        "Valued Client".to_string()
    } else {
        derived
    }
}

/// Uppercase the first character, lowercase the rest.
fn capitalize_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

fn build_prompt(email: &InquiryEmail) -> String {
    format!(
        "Extract structured information from this inquiry email.\n\n\
         Email:\n\
         From: {from}\n\
         Subject: {subject}\n\
         Body: {body}\n\n\
         EXTRACTION GUIDELINES:\n\
         - client_name: Look for signature, name mentions, or parse from email address\n\
         - company: Business name if mentioned, otherwise null or infer from domain\n\
         - project_type: What they want built (be SPECIFIC, e.g., \"Custom CRM for Real Estate\", not just \"CRM\")\n\
         - requirements: 3-5 specific features or requirements mentioned\n\
         - timeline: When they need it (e.g., \"ASAP\", \"3 months\", \"Q1 2026\")\n\
         - budget: Any budget mentioned, or \"Flexible\" if not stated\n\n\
         EXAMPLE OUTPUT:\n\
         {{\n\
             \"client_name\": \"Debabrata G.\",\n\
             \"company\": \"Investment Firm\",\n\
             \"project_type\": \"AI Portfolio Management System\",\n\
             \"requirements\": [\"Real-time tracking\", \"Risk analysis\", \"Trading alerts\"],\n\
             \"timeline\": \"3 months\",\n\
             \"budget\": \"$15000-$25000\"\n\
         }}\n\n\
         Return ONLY valid JSON with extracted data:",
        from = email.sender,
        subject = email.subject,
        body = email.body,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedCompletion;

    fn sample_email() -> InquiryEmail {
        InquiryEmail {
            id: "e-1".into(),
            sender: "krish.gupta12@example.com".into(),
            subject: "CRM Development Inquiry".into(),
            body: "We need a CRM with reporting and automation.".into(),
        }
    }

    #[tokio::test]
    async fn valid_response_merges_verbatim() {
        let llm = ScriptedCompletion::new();
        llm.push_ok(
            r#"{"client_name": "Krish Gupta", "company": "Gupta Ventures", "project_type": "Custom CRM for Real Estate", "requirements": ["Lead tracking", "Reporting", "Automation"], "timeline": "3 months", "budget": "$20000"}"#,
        );

        let patch = run(&llm, &sample_email()).await;
        assert_eq!(patch.step, StepTag::Extracted);
        assert_eq!(patch.value.name, "Krish Gupta");
        assert_eq!(patch.value.company.as_deref(), Some("Gupta Ventures"));
        assert_eq!(patch.value.project_type, "Custom CRM for Real Estate");
        assert_eq!(patch.value.requirements.len(), 3);
        assert!(patch.error.is_none());
    }

    #[tokio::test]
    async fn null_company_is_accepted() {
        let llm = ScriptedCompletion::new();
        llm.push_ok(
            r#"{"client_name": "Jane", "company": null, "project_type": "Website", "requirements": ["Design"], "timeline": "ASAP", "budget": "Flexible"}"#,
        );

        let patch = run(&llm, &sample_email()).await;
        assert_eq!(patch.step, StepTag::Extracted);
        assert!(patch.value.company.is_none());
    }

    #[tokio::test]
    async fn missing_required_key_takes_fallback_whole() {
        let llm = ScriptedCompletion::new();
        // No project_type — nothing from this response may be merged.
        llm.push_ok(r#"{"client_name": "Jane", "requirements": ["Design"]}"#);

        let patch = run(&llm, &sample_email()).await;
        assert_eq!(patch.step, StepTag::ExtractionFallback);
        assert_eq!(patch.value.name, "Krish Gupta");
        assert_eq!(patch.value.project_type, "CRM Development Inquiry");
        assert_eq!(patch.value.timeline, "To be determined");
        assert_eq!(patch.value.budget, "Flexible");
        assert_eq!(
            patch.value.requirements,
            vec!["Discuss detailed requirements".to_string()]
        );
    }

    #[tokio::test]
    async fn transport_error_takes_fallback() {
        let llm = ScriptedCompletion::new();
        llm.push_err("rate limited");

        let patch = run(&llm, &sample_email()).await;
        assert_eq!(patch.step, StepTag::ExtractionFallback);
        assert!(patch.error.as_deref().unwrap().contains("rate limited"));
        assert!(patch.value.company.is_none());
    }

    #[test]
    fn name_recovery_from_dotted_local_part() {
        assert_eq!(
            client_name_from_sender("krish.gupta12@example.com"),
            "Krish Gupta"
        );
    }

    #[test]
    fn name_recovery_from_display_name() {
        assert_eq!(
            client_name_from_sender("Jane Doe <jane@example.com>"),
            "Jane Doe"
        );
    }

    #[test]
    fn name_recovery_empty_derivation_uses_default() {
        assert_eq!(client_name_from_sender("123@example.com"), "Valued Client");
        assert_eq!(client_name_from_sender("<jane@example.com>"), "Valued Client");
    }

    #[test]
    fn name_recovery_handles_underscores_and_hyphens() {
        assert_eq!(
            client_name_from_sender("mary_ann-smith@example.com"),
            "Mary Ann Smith"
        );
    }

    #[test]
    fn name_recovery_lowercases_tail_of_words() {
        assert_eq!(client_name_from_sender("BOB@example.com"), "Bob");
    }

    #[test]
    fn fallback_uses_raw_subject_as_project_type() {
        let profile = fallback_profile(&sample_email());
        assert_eq!(profile.project_type, "CRM Development Inquiry");
    }
}
