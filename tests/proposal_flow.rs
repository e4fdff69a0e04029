//! End-to-end pipeline runs against the public API.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use ottomail::channels::{DraftBox, EmlDraftBox, Notifier};
use ottomail::error::ChannelError;
use ottomail::llm::{CompletionService, MockCompletion, ScriptedCompletion};
use ottomail::pipeline::{InquiryEmail, ProposalPipeline, StepTag};
use ottomail::store::{LibSqlStorage, Storage};

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

struct Harness {
    pipeline: ProposalPipeline,
    storage: Arc<LibSqlStorage>,
    notifier: Arc<RecordingNotifier>,
    drafts_dir: tempfile::TempDir,
}

async fn harness(llm: Arc<dyn CompletionService>) -> Harness {
    let storage = Arc::new(LibSqlStorage::new_memory().await.unwrap());
    let drafts_dir = tempfile::tempdir().unwrap();
    let drafts: Arc<dyn DraftBox> =
        Arc::new(EmlDraftBox::new(drafts_dir.path(), "proposals@ottomail.dev").unwrap());
    let notifier = Arc::new(RecordingNotifier::new());

    let pipeline = ProposalPipeline::new(
        llm,
        Arc::clone(&storage) as Arc<dyn Storage>,
        drafts,
        Arc::clone(&notifier) as Arc<dyn Notifier>,
    );

    Harness {
        pipeline,
        storage,
        notifier,
        drafts_dir,
    }
}

fn portfolio_inquiry() -> InquiryEmail {
    InquiryEmail {
        id: "test_001".into(),
        sender: "debabrata@financecorp.com".into(),
        subject: "AI Agent for Portfolio Management System - Development Inquiry".into(),
        body: "Hi,\n\n\
               I'm Debabrata from a financial services company. We're looking for help building\n\
               an AI agent that can manage investment portfolios in real-time. The system needs to:\n\
               - Track portfolio performance in real-time\n\
               - Provide risk analysis and alerts\n\
               - Suggest portfolio rebalancing strategies\n\n\
               What would be the timeline and cost?\n\n\
               Best regards,\nDebabrata G.\n"
            .into(),
    }
}

#[tokio::test]
async fn mock_provider_runs_portfolio_inquiry_end_to_end() {
    let h = harness(Arc::new(MockCompletion::new())).await;

    let state = h.pipeline.run(portfolio_inquiry()).await.unwrap();

    assert_eq!(state.current_step(), StepTag::Notified);
    assert!(state.is_valid_inquiry());
    assert!(state.error().is_none());

    // Finance inquiry → complex plan → the reference price band.
    let plan = state.plan().unwrap();
    assert_eq!(plan.complexity, "complex");
    assert_eq!(plan.total_estimated_hours, 160);
    let estimate = state.cost().unwrap();
    assert_eq!(estimate.min, 14_400);
    assert_eq!(estimate.max, 17_600);

    // Proposal present and drafted to disk.
    let text = state.proposal_text().unwrap();
    assert!(!text.is_empty());
    let draft_path = h
        .drafts_dir
        .path()
        .join(format!("{}.eml", state.draft_id().unwrap()));
    let draft = std::fs::read_to_string(draft_path).unwrap();
    assert!(draft.contains("Subject: Re: AI Agent for Portfolio Management System"));
    assert!(draft.contains("debabrata@financecorp.com"));

    // Stored and queued for human approval.
    let pending = h.storage.get_pending_proposals().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].cost_min, 14_400);
    assert!(!pending[0].approved_by_human);

    assert_eq!(h.notifier.messages().len(), 1);
}

#[tokio::test]
async fn proposal_is_non_empty_even_when_every_completion_fails() {
    let llm = Arc::new(ScriptedCompletion::new());
    llm.push_ok(r#"{"is_valid": true, "confidence": 0.8, "reason": "genuine"}"#);
    llm.push_err("provider offline");
    llm.push_err("provider offline");
    llm.push_err("provider offline");

    let h = harness(llm).await;
    let state = h.pipeline.run(portfolio_inquiry()).await.unwrap();

    assert!(state.is_valid_inquiry());
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

    let text = state.proposal_text().unwrap();
    assert!(!text.is_empty());
    // Name recovered from sender, subject reused as project type.
    assert!(text.contains("Dear Debabrata,"));
    assert!(text.contains("AI Agent for Portfolio Management System"));
    // Subject mentions "Portfolio" → complex fallback pricing.
    assert!(text.contains("$14,400 - $17,600"));
}

#[tokio::test]
async fn invalid_inquiry_never_acquires_downstream_state() {
    let llm = Arc::new(ScriptedCompletion::new());
    llm.push_ok(r#"{"is_valid": false, "confidence": 0.97, "reason": "Job application"}"#);

    let h = harness(llm).await;

    let spam = InquiryEmail {
        id: "spam_001".into(),
        sender: "recruiter@jobs.example".into(),
        subject: "Exciting career opportunity".into(),
        body: "We reviewed your profile and would love to chat!".into(),
    };
    let state = h.pipeline.run(spam).await.unwrap();

    assert_eq!(state.current_step(), StepTag::Classified);
    assert!(!state.is_valid_inquiry());
    assert!(state.plan().is_none());
    assert!(state.cost().is_none());
    assert!(state.proposal_text().is_none());
    assert!(state.draft_id().is_none());
    assert!(h.storage.get_pending_proposals().await.unwrap().is_empty());
    assert!(h.notifier.messages().is_empty());
}

#[tokio::test]
async fn classification_failure_never_escapes_the_entry_point() {
    let llm = Arc::new(ScriptedCompletion::new());
    llm.push_err("socket hangup");

    let h = harness(llm).await;
    let state = h.pipeline.run(portfolio_inquiry()).await.unwrap();

    assert_eq!(state.current_step(), StepTag::ClassificationFailed);
    assert!(!state.is_valid_inquiry());
    assert_eq!(state.confidence_score(), 0.0);
    assert!(state.error().unwrap().contains("socket hangup"));
}

#[tokio::test]
async fn approved_proposal_leaves_pending_queue() {
    let h = harness(Arc::new(MockCompletion::new())).await;
    let state = h.pipeline.run(portfolio_inquiry()).await.unwrap();

    let proposal_id = state.proposal_id().unwrap();
    h.storage.approve_proposal(proposal_id).await.unwrap();
    assert!(h.storage.get_pending_proposals().await.unwrap().is_empty());
}
