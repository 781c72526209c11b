//! Fetched message records

use crate::error::{Error, Result};
use mailparse::{MailHeaderMap, ParsedMail};

/// Directory name used for messages without a Subject header.
pub const NO_SUBJECT: &str = "-No subject-";

/// One message as retrieved from the server.
#[derive(Debug, Clone)]
pub struct MessageRecord {
    /// 1-based position in the session's listing.
    pub sequence: u32,
    /// Server-assigned unique id (UIDL).
    pub uid: String,
    /// Raw RFC 5322 content.
    pub raw: Vec<u8>,
}

impl MessageRecord {
    /// Parse the raw content into a MIME tree borrowing from `raw`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the message is not valid MIME.
    pub fn parse(&self) -> Result<ParsedMail<'_>> {
        mailparse::parse_mail(&self.raw)
            .map_err(|e| Error::Parse(format!("Message {} ({}): {e}", self.sequence, self.uid)))
    }
}

/// The decoded Subject header, or [`NO_SUBJECT`] when absent.
#[must_use]
pub fn subject(mail: &ParsedMail<'_>) -> String {
    mail.get_headers()
        .get_first_value("Subject")
        .unwrap_or_else(|| NO_SUBJECT.to_string())
}
