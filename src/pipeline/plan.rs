//! Planning stage — phased project breakdown with complexity and hours.
//!
//! The complexity policy (finance/portfolio → complex, 160 h; generic →
//! medium, 80 h) is guidance embedded in the prompt — a successful
//! completion is stored verbatim even when the model diverges. The
//! fallback applies the same policy deterministically.

use tracing::{debug, warn};

use crate::error::LlmError;
use crate::llm::CompletionService;
use crate::pipeline::parse;
use crate::pipeline::state::{ClientProfile, Phase, ProjectPlan, StagePatch, StepTag};

pub async fn run(llm: &dyn CompletionService, profile: &ClientProfile) -> StagePatch<ProjectPlan> {
    match request(llm, profile).await {
        Ok(plan) => {
            debug!(
                complexity = %plan.complexity,
                hours = plan.total_estimated_hours,
                phases = plan.phases.len(),
                "Project plan generated"
            );
            StagePatch::ok(plan, StepTag::Planned)
        }
        Err(e) => {
            let reason = e.to_string();
            warn!(error = %reason, "Planning failed — synthesizing plan from project type");
            StagePatch::fallback(
                fallback_plan(&profile.project_type),
                StepTag::PlannedFallback,
                reason,
            )
        }
    }
}

async fn request(
    llm: &dyn CompletionService,
    profile: &ClientProfile,
) -> Result<ProjectPlan, LlmError> {
    let raw = llm.invoke(&build_prompt(profile)).await?;
    if raw.trim().is_empty() {
        return Err(LlmError::EmptyCompletion {
            provider: llm.provider_name().to_string(),
        });
    }

    let value = parse::completion_json(&raw)?;
    let plan: ProjectPlan =
        serde_json::from_value(value).map_err(|e| LlmError::MalformedResponse {
            reason: e.to_string(),
        })?;

    // Structural minimums: a plan with no phases or zero hours cannot feed
    // the cost calculator, so it counts as malformed.
    if plan.total_estimated_hours == 0 || plan.phases.is_empty() {
        return Err(LlmError::MalformedResponse {
            reason: "plan has no phases or zero estimated hours".to_string(),
        });
    }

    Ok(plan)
}

/// Deterministic plan synthesized from the project type alone.
///
/// Hour allocations are fifths of the total (discovery, 2× development,
/// testing, deployment); integer division drops any remainder.
pub fn fallback_plan(project_type: &str) -> ProjectPlan {
    let lower = project_type.to_lowercase();
    let is_complex = lower.contains("portfolio") || lower.contains("finance");

    let (complexity, hours) = if is_complex {
        ("complex", 160)
    } else {
        ("medium", 80)
    };
    let fifth = hours / 5;

    ProjectPlan {
        complexity: complexity.to_string(),
        total_estimated_hours: hours,
        phases: vec![
            Phase {
                name: "Phase 1: Discovery".to_string(),
                duration: "1-2 weeks".to_string(),
                hours: fifth,
                tasks: vec!["Requirements".into(), "Design".into(), "Planning".into()],
            },
            Phase {
                name: "Phase 2: Development".to_string(),
                duration: "2-3 weeks".to_string(),
                hours: fifth * 2,
                tasks: vec!["Backend".into(), "Frontend".into(), "Integration".into()],
            },
            Phase {
                name: "Phase 3: Testing".to_string(),
                duration: "1 week".to_string(),
                hours: fifth,
                tasks: vec!["QA".into(), "Bug fixes".into(), "Optimization".into()],
            },
            Phase {
                name: "Phase 4: Deployment".to_string(),
                duration: "1 week".to_string(),
                hours: fifth,
                tasks: vec!["Staging".into(), "Launch".into(), "Monitoring".into()],
            },
        ],
    }
}

fn build_prompt(profile: &ClientProfile) -> String {
    format!(
        "Create a realistic project plan for this inquiry.\n\n\
         Project: {project}\n\
         Client: {client}\n\
         Company: {company}\n\
         Requirements: {requirements}\n\
         Timeline: {timeline}\n\n\
         PLANNING GUIDELINES:\n\
         - Generate 5 phases: Discovery, Core Dev, Frontend/UI, Testing, Deployment\n\
         - Assign realistic duration and hours per phase\n\
         - Each phase has 4-5 specific tasks\n\
         - Complexity levels: simple (40-80 hrs), medium (80-120 hrs), complex (120-200 hrs)\n\
         - For finance/portfolio projects: assume COMPLEX (160 hrs)\n\
         - For generic/simple projects: assume MEDIUM (80 hrs)\n\n\
         Return ONLY valid JSON shaped like:\n\
         {{\n\
             \"complexity\": \"complex\",\n\
             \"total_estimated_hours\": 160,\n\
             \"phases\": [\n\
                 {{\"name\": \"Phase 1: Discovery & Requirements\", \"duration\": \"1.5 weeks\", \"hours\": 20, \"tasks\": [\"Requirements gathering\", \"Technical design\", \"Architecture review\", \"Security planning\"]}}\n\
             ]\n\
         }}",
        project = profile.project_type,
        client = profile.name,
        company = profile.company.as_deref().unwrap_or("Unknown"),
        requirements = profile.requirements.join(", "),
        timeline = profile.timeline,
    )
}
