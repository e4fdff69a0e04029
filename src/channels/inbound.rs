//! Inbound inquiry parsing and the drop-directory spool.
//!
//! Raw RFC 822 messages land as `.eml` files in an inbox directory (the
//! mailbox fetcher itself lives outside this crate). Each spool pass parses
//! new files into `InquiryEmail`s; processed files are moved aside so an
//! inquiry enters the pipeline at most once per pass.

use std::path::{Path, PathBuf};

use mail_parser::MessageParser;
use tracing::{debug, warn};

use crate::error::ChannelError;
use crate::pipeline::state::InquiryEmail;

/// Parse a raw RFC 822 message into an inquiry.
///
/// The sender keeps its display name (`Jane Doe <jane@example.com>`) when
/// one is present — extraction's name recovery depends on it.
pub fn parse_inquiry(id: &str, raw: &[u8]) -> Result<InquiryEmail, ChannelError> {
    let message = MessageParser::default()
        .parse(raw)
        .ok_or_else(|| ChannelError::MessageParse("not a valid RFC 822 message".to_string()))?;

    let sender = first_mailbox(message.from())
        .ok_or_else(|| ChannelError::MessageParse("missing From header".to_string()))?;

    let subject = message.subject().unwrap_or_default().to_string();
    let body = message
        .body_text(0)
        .map(|text| text.into_owned())
        .unwrap_or_default();

    Ok(InquiryEmail {
        id: id.to_string(),
        sender,
        subject,
        body,
    })
}

/// First sender mailbox, rendered as `Name <addr>` or a bare address.
fn first_mailbox(addr: Option<&mail_parser::Address>) -> Option<String> {
    let first = match addr? {
        mail_parser::Address::List(list) => list.first(),
        mail_parser::Address::Group(groups) => groups.first().and_then(|g| g.addresses.first()),
    }?;

    match (first.name.as_deref(), first.address.as_deref()) {
        (Some(name), Some(address)) => Some(format!("{name} <{address}>")),
        (None, Some(address)) => Some(address.to_string()),
        (Some(name), None) => Some(name.to_string()),
        (None, None) => None,
    }
}

/// Drop-directory spool of inbound `.eml` files.
pub struct InquirySpool {
    inbox: PathBuf,
    processed: PathBuf,
}

impl InquirySpool {
    pub fn new(
        inbox: impl Into<PathBuf>,
        processed: impl Into<PathBuf>,
    ) -> Result<Self, ChannelError> {
        let inbox = inbox.into();
        let processed = processed.into();
        std::fs::create_dir_all(&inbox)?;
        std::fs::create_dir_all(&processed)?;
        Ok(Self { inbox, processed })
    }

    /// Parse all `.eml` files currently in the inbox, oldest name first.
    ///
    /// Unparsable files are moved straight to the processed directory so
    /// they don't wedge the spool.
    pub fn fetch_new(&self) -> Result<Vec<InquiryEmail>, ChannelError> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(&self.inbox)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "eml"))
            .collect();
        paths.sort();

        let mut inquiries = Vec::new();
        for path in paths {
            let id = file_stem(&path);
            let raw = std::fs::read(&path)?;
            match parse_inquiry(&id, &raw) {
                Ok(email) => {
                    debug!(id = %email.id, sender = %email.sender, "Inquiry fetched from spool");
                    inquiries.push(email);
                }
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "Unparsable inbox file — moving aside");
                    let _ = self.mark_processed(&id);
                }
            }
        }
        Ok(inquiries)
    }

    /// Move an inquiry's file out of the inbox.
    pub fn mark_processed(&self, id: &str) -> Result<(), ChannelError> {
        let name = format!("{id}.eml");
        std::fs::rename(self.inbox.join(&name), self.processed.join(&name))?;
        Ok(())
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
