//! Pipeline router — sequences stages and drives the two branch points.
//!
//! Every AI-backed stage is total (fallback on failure), so the router
//! carries no per-stage recovery logic of its own. It needs exactly two
//! decisions:
//!
//! - **Branch A** (after classification): invalid inquiries end the run
//!   immediately; downstream fields stay at their defaults.
//! - **Branch B** (after draft creation): notify only when a draft is
//!   waiting for human review. Draft creation always sets the flag today;
//!   the branch is the policy hook for future differentiation.
//!
//! Collaborator writes (store, draft, notify) are best-effort and
//! at-least-once; their failures are recorded in the step trail but never
//! stop the run. The only hard errors out of `run` are stage-precondition
//! violations, which indicate a routing bug.

use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::channels::{DraftBox, Notifier};
use crate::error::{Error, PipelineError, StorageError};
use crate::llm::CompletionService;
use crate::pipeline::cost::format_usd;
use crate::pipeline::state::{InquiryEmail, ProjectPlan, ProposalState, StagePatch, StepTag};
use crate::pipeline::{classify, cost, extract, plan, propose};
use crate::store::{NewClient, NewProposal, Storage};

/// Drives one inquiry at a time through the full stage sequence.
///
/// All collaborators are injected once at construction and shared across
/// runs; each run owns its own `ProposalState`.
pub struct ProposalPipeline {
    llm: Arc<dyn CompletionService>,
    storage: Arc<dyn Storage>,
    drafts: Arc<dyn DraftBox>,
    notifier: Arc<dyn Notifier>,
}

impl ProposalPipeline {
    pub fn new(
        llm: Arc<dyn CompletionService>,
        storage: Arc<dyn Storage>,
        drafts: Arc<dyn DraftBox>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            llm,
            storage,
            drafts,
            notifier,
        }
    }

    /// Run the full pipeline for one inquiry, returning the final state.
    pub async fn run(&self, email: InquiryEmail) -> Result<ProposalState, Error> {
        info!(id = %email.id, sender = %email.sender, "Processing inquiry");
        let mut state = ProposalState::new(email);

        let classification_patch = classify::run(self.llm.as_ref(), state.email()).await;
        state.apply_classification(classification_patch);

        // Branch A
        if !state.is_valid_inquiry() {
            info!(
                id = %state.email().id,
                step = %state.current_step(),
                confidence = state.confidence_score(),
                "Not a business inquiry — run complete"
            );
            return Ok(state);
        }

        let profile_patch = extract::run(self.llm.as_ref(), state.email()).await;
        state.apply_profile(profile_patch);

        let plan_patch = {
            let profile = state.require_client("planning")?;
            plan::run(self.llm.as_ref(), profile).await
        };
        state.apply_plan(plan_patch);

        let cost_patch = {
            let plan = state.require_plan("cost")?;
            StagePatch::ok(
                cost::estimate(plan.total_estimated_hours, &plan.complexity),
                StepTag::Costed,
            )
        };
        state.apply_cost(cost_patch);

        let proposal_patch = {
            let profile = state.require_client("proposal")?;
            let plan = state.require_plan("proposal")?;
            let estimate = state.require_cost("proposal")?;
            propose::run(self.llm.as_ref(), state.email(), profile, plan, estimate).await
        };
        state.apply_proposal(proposal_patch);

        self.store(&mut state).await?;
        self.create_draft(&mut state).await?;

        // Branch B
        if state.needs_human_review() {
            self.notify(&mut state).await;
        }

        info!(
            id = %state.email().id,
            step = %state.current_step(),
            error = state.error().unwrap_or("none"),
            "Inquiry processing complete"
        );
        Ok(state)
    }

    /// Run a batch of inquiries sequentially.
    ///
    /// Failures on individual inquiries are logged but don't fail the
    /// batch — matching the at-least-once posture of the spool.
    pub async fn run_batch(&self, emails: Vec<InquiryEmail>) -> Vec<ProposalState> {
        let count = emails.len();
        let mut results = Vec::with_capacity(count);
        for email in emails {
            match self.run(email).await {
                Ok(state) => results.push(state),
                Err(e) => {
                    error!(error = %e, "Failed to process inquiry in batch");
                }
            }
        }
        info!(processed = results.len(), total = count, "Batch complete");
        results
    }

    /// Persist the client and proposal records, merging ids into state.
    async fn store(&self, state: &mut ProposalState) -> Result<(), PipelineError> {
        let new_client = {
            let profile = state.require_client("store")?;
            NewClient {
                name: profile.name.clone(),
                email: state.email().sender.clone(),
                project_type: profile.project_type.clone(),
                requirements: profile.requirements.clone(),
                original_body: state.email().body.clone(),
            }
        };
        let plan = state.require_plan("store")?.clone();
        let estimate = state.require_cost("store")?.clone();
        let proposal_text = state.require_proposal("store")?.to_string();

        match self
            .try_store(new_client, plan, estimate.min, estimate.max, proposal_text)
            .await
        {
            Ok((client_id, proposal_id)) => {
                info!(
                    id = %state.email().id,
                    client_id = %client_id,
                    proposal_id = %proposal_id,
                    "Client and proposal stored"
                );
                state.record_stored(client_id, proposal_id);
            }
            Err(e) => {
                error!(id = %state.email().id, error = %e, "Storage failed — continuing without ids");
                state.record_store_failed(e.to_string());
            }
        }
        Ok(())
    }

    async fn try_store(
        &self,
        new_client: NewClient,
        plan: ProjectPlan,
        cost_min: i64,
        cost_max: i64,
        proposal_text: String,
    ) -> Result<(Uuid, Uuid), StorageError> {
        let client_id = self.storage.create_client(new_client).await?;
        let proposal_id = self
            .storage
            .create_proposal(NewProposal {
                client_id,
                plan,
                proposal_text,
                cost_min,
                cost_max,
            })
            .await?;
        Ok((client_id, proposal_id))
    }

    /// Write the reply draft. Success flips `needs_human_review`.
    async fn create_draft(&self, state: &mut ProposalState) -> Result<(), PipelineError> {
        let body = state.require_proposal("draft")?.to_string();
        let to = state.email().sender.clone();
        let subject = format!("Re: {}", state.email().subject);

        match self.drafts.create_draft(&to, &subject, &body).await {
            Ok(draft_id) => {
                info!(id = %state.email().id, draft_id = %draft_id, "Draft created");
                state.record_draft(draft_id);
            }
            Err(e) => {
                error!(id = %state.email().id, error = %e, "Draft creation failed");
                state.record_draft_failed(e.to_string());
            }
        }
        Ok(())
    }

    async fn notify(&self, state: &mut ProposalState) {
        let text = notification_text(state);
        match self.notifier.send_message(&text).await {
            Ok(()) => state.record_notified(),
            Err(e) => {
                warn!(id = %state.email().id, error = %e, "Notification failed");
                state.record_notify_failed(e.to_string());
            }
        }
    }
}

/// One-line summary for the human reviewer.
fn notification_text(state: &ProposalState) -> String {
    let client = state
        .client_profile()
        .map(|p| p.name.as_str())
        .unwrap_or("Unknown client");
    let project = state
        .client_profile()
        .map(|p| p.project_type.as_str())
        .unwrap_or("unspecified project");
    let range = state
        .cost()
        .map(|c| format!("${} - ${}", format_usd(c.min), format_usd(c.max)))
        .unwrap_or_else(|| "cost pending".to_string());
    let draft = state.draft_id().unwrap_or("n/a");

    format!("New proposal drafted for {client} — {project} ({range}). Draft {draft} awaiting review.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::channels::EmlDraftBox;
    use crate::error::ChannelError;
    use crate::llm::ScriptedCompletion;
    use crate::store::LibSqlStorage;

    /// Notifier that records every message it was asked to deliver.
    struct RecordingNotifier {
        sent: Mutex<Vec<String>>,
    }

    impl RecordingNotifier {
        fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
            }
        }

        fn messages(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send_message(&self, text: &str) -> Result<(), ChannelError> {
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    struct Fixture {
        pipeline: ProposalPipeline,
        llm: Arc<ScriptedCompletion>,
        storage: Arc<LibSqlStorage>,
        notifier: Arc<RecordingNotifier>,
        drafts_dir: tempfile::TempDir,
    }

    async fn fixture() -> Fixture {
        let llm = Arc::new(ScriptedCompletion::new());
        let storage = Arc::new(LibSqlStorage::new_memory().await.unwrap());
        let drafts_dir = tempfile::tempdir().unwrap();
        let drafts =
            Arc::new(EmlDraftBox::new(drafts_dir.path(), "proposals@ottomail.dev").unwrap());
        let notifier = Arc::new(RecordingNotifier::new());

        let pipeline = ProposalPipeline::new(
            Arc::clone(&llm) as Arc<dyn CompletionService>,
            Arc::clone(&storage) as Arc<dyn Storage>,
            drafts,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
        );

        Fixture {
            pipeline,
            llm,
            storage,
            notifier,
            drafts_dir,
        }
    }

    fn portfolio_inquiry() -> InquiryEmail {
        InquiryEmail {
            id: "run-1".into(),
            sender: "debabrata@financecorp.com".into(),
            subject: "AI Agent for Portfolio Management System - Development Inquiry".into(),
            body: "We're looking for help building an AI agent that manages portfolios.".into(),
        }
    }

    fn push_happy_path_script(llm: &ScriptedCompletion) {
        llm.push_ok(r#"{"is_valid": true, "confidence": 0.95, "reason": "Valid financial inquiry"}"#);
        llm.push_ok(
            r#"{"client_name": "Debabrata G.", "company": "Finance Corp", "project_type": "AI Portfolio Management System", "requirements": ["Real-time tracking", "Risk analysis", "Alerts"], "timeline": "3 months", "budget": "$15000-$25000"}"#,
        );
        llm.push_ok(
            r#"{"complexity": "complex", "total_estimated_hours": 160, "phases": [{"name": "Phase 1: Discovery", "duration": "1.5 weeks", "hours": 20, "tasks": ["Requirements"]}, {"name": "Phase 2: Build", "duration": "4 weeks", "hours": 140, "tasks": ["Everything else"]}]}"#,
        );
        llm.push_ok("Dear Debabrata G.,\n\nHere is our detailed proposal.\n\nBest regards,\nOttoMail Solutions Team");
    }

    #[tokio::test]
    async fn happy_path_walks_every_step() {
        let f = fixture().await;
        push_happy_path_script(&f.llm);

        let state = f.pipeline.run(portfolio_inquiry()).await.unwrap();

        assert_eq!(
            state.steps(),
            &[
                StepTag::Received,
                StepTag::Classified,
                StepTag::Extracted,
                StepTag::Planned,
                StepTag::Costed,
                StepTag::ProposalGenerated,
                StepTag::Stored,
                StepTag::DraftCreated,
                StepTag::Notified,
            ]
        );
        assert!(state.error().is_none());
        assert!(state.is_valid_inquiry());
        assert!(state.needs_human_review());

        // Cost derived from the parsed plan: 160 h complex.
        let estimate = state.cost().unwrap();
        assert_eq!(estimate.min, 14_400);
        assert_eq!(estimate.max, 17_600);

        // Ids merged back from storage.
        assert!(state.client_id().is_some());
        assert!(state.proposal_id().is_some());
        let pending = f.storage.get_pending_proposals().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, state.proposal_id().unwrap());

        // Draft landed on disk.
        let draft_path = f
            .drafts_dir
            .path()
            .join(format!("{}.eml", state.draft_id().unwrap()));
        assert!(draft_path.exists());

        // Notification mentions client and range.
        let messages = f.notifier.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("Debabrata G."));
        assert!(messages[0].contains("$14,400 - $17,600"));
    }

    #[tokio::test]
    async fn branch_a_invalid_inquiry_stops_the_run() {
        let f = fixture().await;
        f.llm
            .push_ok(r#"{"is_valid": false, "confidence": 0.98, "reason": "Recruiting spam"}"#);

        let state = f.pipeline.run(portfolio_inquiry()).await.unwrap();

        assert_eq!(state.steps(), &[StepTag::Received, StepTag::Classified]);
        assert!(!state.is_valid_inquiry());
        assert!(state.client_profile().is_none());
        assert!(state.plan().is_none());
        assert!(state.cost().is_none());
        assert!(state.proposal_text().is_none());
        assert!(!state.needs_human_review());
        assert!(f.storage.get_pending_proposals().await.unwrap().is_empty());
        assert!(f.notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn classification_failure_is_a_negative_verdict() {
        let f = fixture().await;
        f.llm.push_err("connection reset");

        let state = f.pipeline.run(portfolio_inquiry()).await.unwrap();

        assert_eq!(state.current_step(), StepTag::ClassificationFailed);
        assert!(!state.is_valid_inquiry());
        assert_eq!(state.confidence_score(), 0.0);
        assert!(state.error().unwrap().contains("connection reset"));
        assert!(state.proposal_text().is_none());
    }

    #[tokio::test]
    async fn full_fallback_path_still_produces_proposal() {
        let f = fixture().await;
        // Classification succeeds; every later completion fails.
        f.llm
            .push_ok(r#"{"is_valid": true, "confidence": 0.8, "reason": "Real inquiry"}"#);
        f.llm.push_err("provider down");
        f.llm.push_err("provider down");
        f.llm.push_err("provider down");

        let state = f.pipeline.run(portfolio_inquiry()).await.unwrap();

        assert_eq!(
            state.steps(),
            &[
                StepTag::Received,
                StepTag::Classified,
                StepTag::ExtractionFallback,
                StepTag::PlannedFallback,
                StepTag::Costed,
                StepTag::ProposalFallback,
                StepTag::Stored,
                StepTag::DraftCreated,
                StepTag::Notified,
            ]
        );

        // Name recovered from the sender address.
        assert_eq!(state.client_profile().unwrap().name, "Debabrata");
        // Subject mentions "Portfolio" → complex fallback plan.
        let plan = state.plan().unwrap();
        assert_eq!(plan.complexity, "complex");
        assert_eq!(plan.total_estimated_hours, 160);

        let text = state.proposal_text().unwrap();
        assert!(!text.is_empty());
        assert!(text.contains("Dear Debabrata,"));
        assert!(state.error().is_some());
    }

    #[tokio::test]
    async fn notification_text_summarizes_run() {
        let f = fixture().await;
        push_happy_path_script(&f.llm);
        let state = f.pipeline.run(portfolio_inquiry()).await.unwrap();

        let text = notification_text(&state);
        assert!(text.contains("AI Portfolio Management System"));
        assert!(text.contains(state.draft_id().unwrap()));
    }

    #[tokio::test]
    async fn batch_processes_independent_runs() {
        let f = fixture().await;
        // Two inquiries: first invalid, second fully fallback.
        f.llm
            .push_ok(r#"{"is_valid": false, "confidence": 0.9, "reason": "spam"}"#);
        f.llm
            .push_ok(r#"{"is_valid": true, "confidence": 0.7, "reason": "real"}"#);
        f.llm.push_err("down");
        f.llm.push_err("down");
        f.llm.push_err("down");

        let second = InquiryEmail {
            id: "run-2".into(),
            sender: "jane@example.com".into(),
            subject: "Website refresh".into(),
            body: "Please quote a website refresh.".into(),
        };

        let results = f
            .pipeline
            .run_batch(vec![portfolio_inquiry(), second])
            .await;

        assert_eq!(results.len(), 2);
        assert!(!results[0].is_valid_inquiry());
        assert!(results[1].is_valid_inquiry());
        assert_eq!(results[1].plan().unwrap().complexity, "medium");
    }
}
