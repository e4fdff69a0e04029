//! Proposal stage — the full proposal email body.
//!
//! The prompt demands real extracted values and forbids bracket
//! placeholders. The fallback renders a fixed template from the same
//! state, so `proposal_text` is non-empty on every path.

use tracing::{debug, warn};

use crate::error::LlmError;
use crate::llm::CompletionService;
use crate::pipeline::cost::format_usd;
use crate::pipeline::state::{
    ClientProfile, CostEstimate, InquiryEmail, Phase, ProjectPlan, StagePatch, StepTag,
};

pub async fn run(
    llm: &dyn CompletionService,
    email: &InquiryEmail,
    profile: &ClientProfile,
    plan: &ProjectPlan,
    cost: &CostEstimate,
) -> StagePatch<String> {
    match request(llm, email, profile, plan, cost).await {
        Ok(text) => {
            debug!(chars = text.len(), "Proposal generated");
            StagePatch::ok(text, StepTag::ProposalGenerated)
        }
        Err(e) => {
            let reason = e.to_string();
            warn!(error = %reason, "Proposal generation failed — rendering template");
            StagePatch::fallback(
                fallback_proposal(profile, plan, cost),
                StepTag::ProposalFallback,
                reason,
            )
        }
    }
}

async fn request(
    llm: &dyn CompletionService,
    email: &InquiryEmail,
    profile: &ClientProfile,
    plan: &ProjectPlan,
    cost: &CostEstimate,
) -> Result<String, LlmError> {
    let raw = llm
        .invoke(&build_prompt(email, profile, plan, cost))
        .await?;
    // An empty body would break the non-empty guarantee; treat it like any
    // other failed invocation.
    if raw.trim().is_empty() {
        return Err(LlmError::EmptyCompletion {
            provider: llm.provider_name().to_string(),
        });
    }
    Ok(raw)
}

/// Render phases as bullet lines for prompts and the fallback template.
fn phase_lines(phases: &[Phase]) -> String {
    phases
        .iter()
        .map(|p| format!("• {}: {} ({} hours)", p.name, p.duration, p.hours))
        .collect::<Vec<_>>()
        .join("\n")
}

fn build_prompt(
    email: &InquiryEmail,
    profile: &ClientProfile,
    plan: &ProjectPlan,
    cost: &CostEstimate,
) -> String {
    format!(
        "Write a professional, personalized proposal email body (NO email headers, NO subject line).\n\n\
         CLIENT DETAILS:\n\
         Name: {name}\n\
         Email: {from}\n\
         Company: {company}\n\
         Project: {project}\n\n\
         PROJECT PLAN:\n\
         {phases}\n\n\
         BUSINESS TERMS:\n\
         Total Hours: {hours}\n\
         Complexity: {complexity}\n\
         Investment: ${min} - ${max}\n\
         Timeline: {timeline}\n\n\
         CRITICAL REQUIREMENTS:\n\
         - Address the client by their ACTUAL name: {name}\n\
         - Sign with \"OttoMail Solutions Team\" (NO placeholders like [Your Name])\n\
         - Use proper paragraph breaks (double newlines between sections)\n\
         - DO NOT use placeholders like [Company Name] or [Your Name] - use actual values\n\
         - Be specific about the project type: {project}\n\n\
         PROPOSAL STRUCTURE:\n\
         1. Greeting: Address {name} personally\n\
         2. Understanding: Show you understand their {project} needs\n\
         3. Approach: Your methodology and why it works\n\
         4. Project Breakdown: Summarize the phases with clear formatting\n\
         5. Investment: Cost range ${min} - ${max} and what's included\n\
         6. Business Value: Why this is worth the investment\n\
         7. Next Steps: Clear call-to-action (schedule call, etc.)\n\
         8. Sign-off: \"Best regards,\nOttoMail Solutions Team\"\n\n\
         TONE: Professional, confident, business-focused (not salesy)\n\
         LENGTH: 400-600 words\n\
         FORMATTING: Use double line breaks between sections for readability\n\n\
         Return ONLY the email body text (no JSON, no markdown formatting, just plain text with line breaks):",
        name = profile.name,
        from = email.sender,
        company = profile.company.as_deref().unwrap_or("their organization"),
        project = profile.project_type,
        phases = phase_lines(&plan.phases),
        hours = plan.total_estimated_hours,
        complexity = plan.complexity,
        min = format_usd(cost.min),
        max = format_usd(cost.max),
        timeline = profile.timeline,
    )
}

/// Fixed-template proposal used when generation fails.
pub fn fallback_proposal(profile: &ClientProfile, plan: &ProjectPlan, cost: &CostEstimate) -> String {
    let first_requirement = profile
        .requirements
        .first()
        .map(String::as_str)
        .unwrap_or("custom functionality");

    format!(
        "Dear {name},\n\n\
         Thank you for reaching out regarding your {project} project. We're excited about this opportunity.\n\n\
         **Understanding Your Needs**\n\
         Based on your inquiry, we understand you need a sophisticated solution with specific requirements including {requirement}. We have experience delivering projects of this complexity and scope.\n\n\
         **Our Approach**\n\
         We follow a structured phased development methodology:\n\n\
         {phases}\n\n\
         This phased approach ensures quality at each stage and allows for regular feedback and adjustments.\n\n\
         **Project Investment**\n\
         Based on our analysis, the estimated investment for your project is:\n\
         - Total Development Hours: {hours} hours\n\
         - Complexity Level: {complexity}\n\
         - Cost Range: ${min} - ${max}\n\
         - Timeline: {timeline}\n\n\
         **Why This Investment**\n\
         This budget covers comprehensive development, rigorous testing, and deployment support. We focus on delivering long-term value and ensuring your system is maintainable and scalable.\n\n\
         **Next Steps**\n\
         We'd like to schedule a 30-minute discovery call to:\n\
         1. Confirm specific requirements\n\
         2. Discuss timeline and priorities\n\
         3. Address any questions\n\
         4. Provide a detailed project plan\n\n\
         Please let me know your availability for this week or next.\n\n\
         Best regards,\n\
         OttoMail Solutions",
        name = profile.name,
        project = profile.project_type,
        requirement = first_requirement,
        phases = phase_lines(&plan.phases),
        hours = plan.total_estimated_hours,
        complexity = plan.complexity.to_uppercase(),
        min = format_usd(cost.min),
        max = format_usd(cost.max),
        timeline = profile.timeline,
    )
}
