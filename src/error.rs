//! Error types for OttoMail.

use std::time::Duration;

/// Top-level error type for the agent.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Completion-service errors.
///
/// Every variant is recoverable at the stage level: an AI-backed stage maps
/// any of these to its deterministic fallback. The `Display` strings are
/// what end up in `ProposalState::error`, so each variant must render
/// distinguishably.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} timed out after {limit:?}")]
    Timeout { provider: String, limit: Duration },

    #[error("Empty completion from provider {provider}")]
    EmptyCompletion { provider: String },

    #[error("Malformed completion: {reason}")]
    MalformedResponse { reason: String },
}

/// Persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Collaborator channel errors (inbound mail, draft box, notifications).
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Failed to parse inbound message: {0}")]
    MessageParse(String),

    #[error("Invalid recipient address: {0}")]
    InvalidAddress(String),

    #[error("Draft creation failed: {0}")]
    DraftFailed(String),

    #[error("Notification delivery failed: {0}")]
    NotifyFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Pipeline contract violations.
///
/// Raised when a stage is driven against a state that is missing a field
/// its preconditions require. This is a routing bug, not a runtime
/// condition — it is never masked by a fallback.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Stage {stage} precondition violated: {field} not populated")]
    Precondition {
        stage: &'static str,
        field: &'static str,
    },
}

/// Result type alias for the agent.
pub type Result<T> = std::result::Result<T, Error>;
