//! Storage interface for client and proposal records.
//!
//! The pipeline treats both writes as fire-and-forget: the returned ids are
//! merged back into the run state, but a storage failure never stops a run.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StorageError;
use crate::pipeline::state::ProjectPlan;

/// A new client row, captured at proposal time.
#[derive(Debug, Clone)]
pub struct NewClient {
    pub name: String,
    pub email: String,
    pub project_type: String,
    pub requirements: Vec<String>,
    pub original_body: String,
}

/// A new proposal row for an existing client.
#[derive(Debug, Clone)]
pub struct NewProposal {
    pub client_id: Uuid,
    pub plan: ProjectPlan,
    pub proposal_text: String,
    pub cost_min: i64,
    pub cost_max: i64,
}

/// Review status of a stored proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalStatus {
    /// Waiting for a human to approve.
    PendingApproval,
    /// Approved for dispatch.
    Approved,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingApproval => "pending_approval",
            Self::Approved => "approved",
        }
    }
}

/// A persisted proposal.
#[derive(Debug, Clone)]
pub struct ProposalRecord {
    pub id: Uuid,
    pub client_id: Uuid,
    pub plan: ProjectPlan,
    pub proposal_text: String,
    pub cost_min: i64,
    pub cost_max: i64,
    pub status: ProposalStatus,
    pub approved_by_human: bool,
    pub created_at: DateTime<Utc>,
}

/// Backend-agnostic storage trait for clients and proposals.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Insert a new client. Returns the generated id.
    async fn create_client(&self, client: NewClient) -> Result<Uuid, StorageError>;

    /// Insert a new proposal in `pending_approval` state. Returns its id.
    async fn create_proposal(&self, proposal: NewProposal) -> Result<Uuid, StorageError>;

    /// Fetch proposals still waiting for human approval.
    async fn get_pending_proposals(&self) -> Result<Vec<ProposalRecord>, StorageError>;

    /// Mark a proposal as approved by a human.
    async fn approve_proposal(&self, id: Uuid) -> Result<(), StorageError>;
}
