//! Pipeline state — the single record threaded through every stage.
//!
//! Each stage produces a typed `StagePatch` that the router applies. A
//! patch carries a whole sub-record (classification, client profile, plan,
//! …), so a stage either installs its complete result or nothing — a
//! downstream stage can never observe a half-merged state.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PipelineError;

// ── Inbound email ───────────────────────────────────────────────────

/// An inbound inquiry email, as handed to the pipeline entry point.
///
/// The `id` doubles as the correlation key for logs and persisted records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InquiryEmail {
    pub id: String,
    /// Raw sender — either a bare address or `Display Name <addr>`.
    pub sender: String,
    pub subject: String,
    pub body: String,
}

// ── Step trail ──────────────────────────────────────────────────────

/// Progress marker appended by each stage.
///
/// The trail is append-only; the last tag is the run's current step and,
/// after the run returns, its terminal step. Fallback tags record which
/// recovery path fired without having to inspect `error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepTag {
    Received,
    Classified,
    ClassificationFailed,
    Extracted,
    ExtractionFallback,
    Planned,
    PlannedFallback,
    Costed,
    ProposalGenerated,
    ProposalFallback,
    Stored,
    StoreFailed,
    DraftCreated,
    DraftFailed,
    Notified,
    NotifyFailed,
}

impl StepTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Classified => "classified",
            Self::ClassificationFailed => "classification_failed",
            Self::Extracted => "extracted",
            Self::ExtractionFallback => "extraction_fallback",
            Self::Planned => "planned",
            Self::PlannedFallback => "planned_fallback",
            Self::Costed => "costed",
            Self::ProposalGenerated => "proposal_generated",
            Self::ProposalFallback => "proposal_fallback",
            Self::Stored => "stored",
            Self::StoreFailed => "store_failed",
            Self::DraftCreated => "draft_created",
            Self::DraftFailed => "draft_failed",
            Self::Notified => "notified",
            Self::NotifyFailed => "notify_failed",
        }
    }
}

impl fmt::Display for StepTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ── Stage sub-records ───────────────────────────────────────────────

/// Verdict of the classification stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub is_valid: bool,
    /// Always within [0, 1]; out-of-range model output is clamped.
    pub confidence: f32,
    /// Present on both paths — on fallback it holds the failure message.
    pub reason: String,
}

impl Classification {
    /// Negative verdict used when classification itself failed.
    pub(crate) fn rejected(reason: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            confidence: 0.0,
            reason: reason.into(),
        }
    }
}

/// Structured client requirements from the extraction stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientProfile {
    pub name: String,
    pub company: Option<String>,
    pub project_type: String,
    pub requirements: Vec<String>,
    pub timeline: String,
    pub budget: String,
}

/// One phase of a project plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phase {
    pub name: String,
    #[serde(default)]
    pub duration: String,
    pub hours: u32,
    #[serde(default)]
    pub tasks: Vec<String>,
}

/// Phased project breakdown from the planning stage.
///
/// `complexity` stays a raw string: a successful completion is stored
/// verbatim even when the model picks a tier outside the usual three, and
/// the cost multiplier table has a default for exactly that case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectPlan {
    pub complexity: String,
    pub total_estimated_hours: u32,
    pub phases: Vec<Phase>,
}

/// Price range from the cost calculator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostEstimate {
    pub min: i64,
    pub max: i64,
    pub hours: u32,
    pub complexity: String,
}

// ── Stage patch ─────────────────────────────────────────────────────

/// Typed patch produced by a stage and applied by the router.
#[derive(Debug)]
pub struct StagePatch<T> {
    pub value: T,
    pub step: StepTag,
    pub error: Option<String>,
}

impl<T> StagePatch<T> {
    /// Patch from a successful model path.
    pub fn ok(value: T, step: StepTag) -> Self {
        Self {
            value,
            step,
            error: None,
        }
    }

    /// Patch from a deterministic fallback, recording why it fired.
    pub fn fallback(value: T, step: StepTag, error: impl Into<String>) -> Self {
        Self {
            value,
            step,
            error: Some(error.into()),
        }
    }
}

// ── Pipeline state ──────────────────────────────────────────────────

/// State for one pipeline run, exclusively owned by the router.
#[derive(Debug)]
pub struct ProposalState {
    email: InquiryEmail,
    classification: Option<Classification>,
    client: Option<ClientProfile>,
    plan: Option<ProjectPlan>,
    cost: Option<CostEstimate>,
    proposal_text: Option<String>,
    client_id: Option<Uuid>,
    proposal_id: Option<Uuid>,
    draft_id: Option<String>,
    needs_human_review: bool,
    steps: Vec<StepTag>,
    error: Option<String>,
}

impl ProposalState {
    pub fn new(email: InquiryEmail) -> Self {
        Self {
            email,
            classification: None,
            client: None,
            plan: None,
            cost: None,
            proposal_text: None,
            client_id: None,
            proposal_id: None,
            draft_id: None,
            needs_human_review: false,
            steps: vec![StepTag::Received],
            error: None,
        }
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn email(&self) -> &InquiryEmail {
        &self.email
    }

    pub fn classification(&self) -> Option<&Classification> {
        self.classification.as_ref()
    }

    pub fn is_valid_inquiry(&self) -> bool {
        self.classification.as_ref().is_some_and(|c| c.is_valid)
    }

    pub fn confidence_score(&self) -> f32 {
        self.classification
            .as_ref()
            .map(|c| c.confidence)
            .unwrap_or(0.0)
    }

    pub fn client_profile(&self) -> Option<&ClientProfile> {
        self.client.as_ref()
    }

    pub fn plan(&self) -> Option<&ProjectPlan> {
        self.plan.as_ref()
    }

    pub fn cost(&self) -> Option<&CostEstimate> {
        self.cost.as_ref()
    }

    pub fn proposal_text(&self) -> Option<&str> {
        self.proposal_text.as_deref()
    }

    pub fn client_id(&self) -> Option<Uuid> {
        self.client_id
    }

    pub fn proposal_id(&self) -> Option<Uuid> {
        self.proposal_id
    }

    pub fn draft_id(&self) -> Option<&str> {
        self.draft_id.as_deref()
    }

    pub fn needs_human_review(&self) -> bool {
        self.needs_human_review
    }

    pub fn steps(&self) -> &[StepTag] {
        &self.steps
    }

    /// Last tag in the trail. The trail is never empty.
    pub fn current_step(&self) -> StepTag {
        *self.steps.last().unwrap_or(&StepTag::Received)
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    // ── Precondition accessors (fail loudly) ────────────────────────

    pub fn require_client(&self, stage: &'static str) -> Result<&ClientProfile, PipelineError> {
        self.client.as_ref().ok_or(PipelineError::Precondition {
            stage,
            field: "client profile",
        })
    }

    pub fn require_plan(&self, stage: &'static str) -> Result<&ProjectPlan, PipelineError> {
        self.plan.as_ref().ok_or(PipelineError::Precondition {
            stage,
            field: "project plan",
        })
    }

    pub fn require_cost(&self, stage: &'static str) -> Result<&CostEstimate, PipelineError> {
        self.cost.as_ref().ok_or(PipelineError::Precondition {
            stage,
            field: "cost estimate",
        })
    }

    pub fn require_proposal(&self, stage: &'static str) -> Result<&str, PipelineError> {
        self.proposal_text
            .as_deref()
            .ok_or(PipelineError::Precondition {
                stage,
                field: "proposal text",
            })
    }

    // ── Patch application ───────────────────────────────────────────

    fn merge(&mut self, step: StepTag, error: Option<String>) {
        self.steps.push(step);
        if error.is_some() {
            self.error = error;
        }
    }

    pub fn apply_classification(&mut self, patch: StagePatch<Classification>) {
        self.classification = Some(patch.value);
        self.merge(patch.step, patch.error);
    }

    pub fn apply_profile(&mut self, patch: StagePatch<ClientProfile>) {
        self.client = Some(patch.value);
        self.merge(patch.step, patch.error);
    }

    pub fn apply_plan(&mut self, patch: StagePatch<ProjectPlan>) {
        self.plan = Some(patch.value);
        self.merge(patch.step, patch.error);
    }

    pub fn apply_cost(&mut self, patch: StagePatch<CostEstimate>) {
        self.cost = Some(patch.value);
        self.merge(patch.step, patch.error);
    }

    pub fn apply_proposal(&mut self, patch: StagePatch<String>) {
        self.proposal_text = Some(patch.value);
        self.merge(patch.step, patch.error);
    }

    // ── Collaborator step records ───────────────────────────────────

    pub(crate) fn record_stored(&mut self, client_id: Uuid, proposal_id: Uuid) {
        self.client_id = Some(client_id);
        self.proposal_id = Some(proposal_id);
        self.merge(StepTag::Stored, None);
    }

    pub(crate) fn record_store_failed(&mut self, error: String) {
        self.merge(StepTag::StoreFailed, Some(error));
    }

    /// A draft exists — from here on the run needs human review.
    pub(crate) fn record_draft(&mut self, draft_id: String) {
        self.draft_id = Some(draft_id);
        self.needs_human_review = true;
        self.merge(StepTag::DraftCreated, None);
    }

    pub(crate) fn record_draft_failed(&mut self, error: String) {
        self.merge(StepTag::DraftFailed, Some(error));
    }

    pub(crate) fn record_notified(&mut self) {
        self.merge(StepTag::Notified, None);
    }

    pub(crate) fn record_notify_failed(&mut self, error: String) {
        self.merge(StepTag::NotifyFailed, Some(error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_email() -> InquiryEmail {
        InquiryEmail {
            id: "email-1".into(),
            sender: "alice@example.com".into(),
            subject: "Custom CRM".into(),
            body: "We need a CRM.".into(),
        }
    }

    #[test]
    fn new_state_starts_at_received() {
        let state = ProposalState::new(sample_email());
        assert_eq!(state.current_step(), StepTag::Received);
        assert!(!state.is_valid_inquiry());
        assert_eq!(state.confidence_score(), 0.0);
        assert!(state.plan().is_none());
        assert!(state.error().is_none());
    }

    #[test]
    fn classification_patch_merges_whole_record() {
        let mut state = ProposalState::new(sample_email());
        state.apply_classification(StagePatch::ok(
            Classification {
                is_valid: true,
                confidence: 0.9,
                reason: "Valid inquiry".into(),
            },
            StepTag::Classified,
        ));
        assert!(state.is_valid_inquiry());
        assert_eq!(state.current_step(), StepTag::Classified);
        assert!(state.error().is_none());
    }

    #[test]
    fn fallback_patch_records_error() {
        let mut state = ProposalState::new(sample_email());
        state.apply_classification(StagePatch::fallback(
            Classification::rejected("provider down"),
            StepTag::ClassificationFailed,
            "provider down",
        ));
        assert!(!state.is_valid_inquiry());
        assert_eq!(state.error(), Some("provider down"));
        assert_eq!(
            state.steps(),
            &[StepTag::Received, StepTag::ClassificationFailed]
        );
    }

    #[test]
    fn step_trail_is_append_only() {
        let mut state = ProposalState::new(sample_email());
        state.apply_classification(StagePatch::ok(
            Classification {
                is_valid: true,
                confidence: 1.0,
                reason: "ok".into(),
            },
            StepTag::Classified,
        ));
        state.record_stored(Uuid::new_v4(), Uuid::new_v4());
        state.record_draft("draft-1".into());
        assert_eq!(
            state.steps(),
            &[
                StepTag::Received,
                StepTag::Classified,
                StepTag::Stored,
                StepTag::DraftCreated,
            ]
        );
        assert!(state.needs_human_review());
        assert_eq!(state.draft_id(), Some("draft-1"));
    }

    #[test]
    fn require_accessors_fail_loudly_when_missing() {
        let state = ProposalState::new(sample_email());
        let err = state.require_plan("cost").unwrap_err();
        assert!(err.to_string().contains("cost"));
        assert!(err.to_string().contains("project plan"));
        assert!(state.require_client("planning").is_err());
        assert!(state.require_cost("proposal").is_err());
        assert!(state.require_proposal("draft").is_err());
    }

    #[test]
    fn step_tags_render_snake_case() {
        assert_eq!(StepTag::ExtractionFallback.to_string(), "extraction_fallback");
        assert_eq!(StepTag::ProposalGenerated.to_string(), "proposal_generated");
        assert_eq!(StepTag::ClassificationFailed.to_string(), "classification_failed");
    }
}
