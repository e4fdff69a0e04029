//! Persistence layer — libSQL-backed client and proposal records.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlStorage;
pub use traits::{NewClient, NewProposal, ProposalRecord, ProposalStatus, Storage};
