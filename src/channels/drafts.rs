//! Draft box — writes RFC 5322 draft replies for human review.
//!
//! **Drafts are never sent.** There is no mail transport configured
//! anywhere in this crate; dispatch is a separate human action on the
//! written files.

use std::path::PathBuf;

use async_trait::async_trait;
use lettre::Message;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use tracing::debug;
use uuid::Uuid;

use crate::error::ChannelError;

/// Draft-creation collaborator consumed after a proposal is produced.
#[async_trait]
pub trait DraftBox: Send + Sync {
    /// Build and persist a draft. Returns the draft id.
    async fn create_draft(&self, to: &str, subject: &str, body: &str)
    -> Result<String, ChannelError>;
}

/// Draft box writing `.eml` files into a directory.
///
/// The file stem is the draft id.
pub struct EmlDraftBox {
    dir: PathBuf,
    from: Mailbox,
}

impl EmlDraftBox {
    pub fn new(dir: impl Into<PathBuf>, from_address: &str) -> Result<Self, ChannelError> {
        let from: Mailbox = from_address
            .parse()
            .map_err(|e| ChannelError::InvalidAddress(format!("{from_address}: {e}")))?;
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, from })
    }
}

#[async_trait]
impl DraftBox for EmlDraftBox {
    async fn create_draft(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<String, ChannelError> {
        let recipient: Mailbox = to
            .parse()
            .map_err(|e| ChannelError::InvalidAddress(format!("{to}: {e}")))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(recipient)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| ChannelError::DraftFailed(e.to_string()))?;

        let draft_id = Uuid::new_v4().to_string();
        let path = self.dir.join(format!("{draft_id}.eml"));
        std::fs::write(&path, message.formatted())?;

        debug!(draft_id = %draft_id, path = %path.display(), "Draft written");
        Ok(draft_id)
    }
}
