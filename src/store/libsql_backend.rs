//! libSQL storage backend — async `Storage` trait implementation.
//!
//! Supports local file and in-memory databases. `libsql::Connection` is
//! `Send + Sync` and safe for concurrent async use, so a single connection
//! is reused for all operations.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::StorageError;
use crate::store::migrations;
use crate::store::traits::{NewClient, NewProposal, ProposalRecord, ProposalStatus, Storage};

/// libSQL database backend.
pub struct LibSqlStorage {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlStorage {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StorageError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| StorageError::Pool(format!("Failed to create connection: {e}")))?;

        let storage = Self {
            db: Arc::new(db),
            conn,
        };
        migrations::run_migrations(&storage.conn).await?;
        info!(path = %path.display(), "Database opened");
        Ok(storage)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StorageError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| StorageError::Pool(format!("Failed to create in-memory database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| StorageError::Pool(format!("Failed to create connection: {e}")))?;

        let storage = Self {
            db: Arc::new(db),
            conn,
        };
        migrations::run_migrations(&storage.conn).await?;
        Ok(storage)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn str_to_status(s: &str) -> ProposalStatus {
    match s {
        "approved" => ProposalStatus::Approved,
        _ => ProposalStatus::PendingApproval,
    }
}

const PROPOSAL_COLUMNS: &str = "id, client_id, project_plan, proposal_text, estimated_cost_min, estimated_cost_max, status, approved_by_human, created_at";

/// Map a libsql row (in `PROPOSAL_COLUMNS` order) to a ProposalRecord.
fn row_to_proposal(row: &libsql::Row) -> Result<ProposalRecord, StorageError> {
    let id_str: String = row
        .get(0)
        .map_err(|e| StorageError::Query(format!("proposal id: {e}")))?;
    let client_id_str: String = row
        .get(1)
        .map_err(|e| StorageError::Query(format!("proposal client_id: {e}")))?;
    let plan_json: String = row
        .get(2)
        .map_err(|e| StorageError::Query(format!("proposal plan: {e}")))?;
    let proposal_text: String = row
        .get(3)
        .map_err(|e| StorageError::Query(format!("proposal text: {e}")))?;
    let cost_min: i64 = row
        .get(4)
        .map_err(|e| StorageError::Query(format!("proposal cost_min: {e}")))?;
    let cost_max: i64 = row
        .get(5)
        .map_err(|e| StorageError::Query(format!("proposal cost_max: {e}")))?;
    let status_str: String = row
        .get(6)
        .map_err(|e| StorageError::Query(format!("proposal status: {e}")))?;
    let approved: i64 = row
        .get(7)
        .map_err(|e| StorageError::Query(format!("proposal approved flag: {e}")))?;
    let created_str: String = row
        .get(8)
        .map_err(|e| StorageError::Query(format!("proposal created_at: {e}")))?;

    let plan = serde_json::from_str(&plan_json)
        .map_err(|e| StorageError::Serialization(format!("project plan: {e}")))?;

    Ok(ProposalRecord {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil()),
        client_id: Uuid::parse_str(&client_id_str).unwrap_or_else(|_| Uuid::nil()),
        plan,
        proposal_text,
        cost_min,
        cost_max,
        status: str_to_status(&status_str),
        approved_by_human: approved != 0,
        created_at: parse_datetime(&created_str),
    })
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Storage for LibSqlStorage {
    async fn create_client(&self, client: NewClient) -> Result<Uuid, StorageError> {
        let id = Uuid::new_v4();
        let requirements = serde_json::to_string(&client.requirements)
            .map_err(|e| StorageError::Serialization(format!("requirements: {e}")))?;

        self.conn()
            .execute(
                "INSERT INTO clients (id, client_name, client_email, project_type, requirements, original_email_body, status, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'new', ?7)",
                params![
                    id.to_string(),
                    client.name,
                    client.email,
                    client.project_type,
                    requirements,
                    client.original_body,
                    Utc::now().to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| StorageError::Query(format!("create_client: {e}")))?;

        debug!(client_id = %id, "Client stored");
        Ok(id)
    }

    async fn create_proposal(&self, proposal: NewProposal) -> Result<Uuid, StorageError> {
        let id = Uuid::new_v4();
        let plan = serde_json::to_string(&proposal.plan)
            .map_err(|e| StorageError::Serialization(format!("project plan: {e}")))?;

        self.conn()
            .execute(
                "INSERT INTO proposals (id, client_id, project_plan, proposal_text, estimated_cost_min, estimated_cost_max, status, approved_by_human, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8)",
                params![
                    id.to_string(),
                    proposal.client_id.to_string(),
                    plan,
                    proposal.proposal_text,
                    proposal.cost_min,
                    proposal.cost_max,
                    ProposalStatus::PendingApproval.as_str(),
                    Utc::now().to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| StorageError::Query(format!("create_proposal: {e}")))?;

        debug!(proposal_id = %id, client_id = %proposal.client_id, "Proposal stored");
        Ok(id)
    }

    async fn get_pending_proposals(&self) -> Result<Vec<ProposalRecord>, StorageError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {PROPOSAL_COLUMNS} FROM proposals WHERE status = 'pending_approval' ORDER BY created_at ASC"
                ),
                (),
            )
            .await
            .map_err(|e| StorageError::Query(format!("get_pending_proposals: {e}")))?;

        let mut proposals = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| StorageError::Query(format!("get_pending_proposals: {e}")))?
        {
            proposals.push(row_to_proposal(&row)?);
        }
        Ok(proposals)
    }

    async fn approve_proposal(&self, id: Uuid) -> Result<(), StorageError> {
        let changed = self
            .conn()
            .execute(
                "UPDATE proposals SET status = ?1, approved_by_human = 1 WHERE id = ?2",
                params![ProposalStatus::Approved.as_str(), id.to_string()],
            )
            .await
            .map_err(|e| StorageError::Query(format!("approve_proposal: {e}")))?;

        if changed == 0 {
            return Err(StorageError::NotFound {
                entity: "proposal".to_string(),
                id: id.to_string(),
            });
        }

        debug!(proposal_id = %id, "Proposal approved");
        Ok(())
    }
}
