//! Inquiry-to-proposal pipeline.
//!
//! Every inbound inquiry flows through:
//! 1. `classify` — genuine business inquiry or not (branch A gate)
//! 2. `extract` — structured client requirements
//! 3. `plan` — phased project breakdown
//! 4. `cost` — deterministic pricing (no model call)
//! 5. `propose` — proposal email body
//! 6. store → draft → notify (branch B gate)
//!
//! Each AI-backed stage is total: on any provider or parse failure it
//! merges a deterministic fallback and the run keeps going. The only hard
//! errors are stage-precondition violations, which indicate a routing bug
//! rather than a runtime condition.

pub mod classify;
pub mod cost;
pub mod extract;
pub mod parse;
pub mod plan;
pub mod propose;
pub mod router;
pub mod state;

pub use router::ProposalPipeline;
pub use state::{InquiryEmail, ProposalState, StepTag};
