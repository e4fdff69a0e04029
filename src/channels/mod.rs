//! Collaborator channels — inbound mail parsing, the draft box, and
//! outbound notifications. Pure I/O adapters; all business logic lives in
//! the pipeline.

pub mod drafts;
pub mod inbound;
pub mod notify;

pub use drafts::{DraftBox, EmlDraftBox};
pub use inbound::{InquirySpool, parse_inquiry};
pub use notify::{LogNotifier, Notifier, WebhookNotifier};
