//! Test data model for the fake POP3 server
//!
//! Provides a builder-style API for constructing mailbox state:
//!
//! ```ignore
//! let mailbox = MailboxBuilder::new()
//!     .credentials("testuser", "testpass")
//!     .message("uid-1", raw_rfc5322_bytes)
//!     .message("uid-2", raw_rfc5322_bytes)
//!     .build();
//! ```
//!
//! The `Mailbox` is shared with the fake server via `Arc<Mutex<_>>`.
//! Messages are removed from it only when a session that marked them
//! with DELE ends with QUIT.

/// Default login accepted by the fake server.
pub const TEST_USER: &str = "testuser";
pub const TEST_PASSWORD: &str = "testpass";

/// A complete maildrop plus the credentials that unlock it.
#[derive(Debug, Clone)]
pub struct Mailbox {
    pub user: String,
    pub password: String,
    pub messages: Vec<TestMessage>,
    /// RETR of this message (1-based) answers `-ERR`.
    pub failing_retrieve: Option<usize>,
}

impl Mailbox {
    pub fn uids(&self) -> Vec<String> {
        self.messages.iter().map(|m| m.uid.clone()).collect()
    }
}

/// A test message.
///
/// - `uid`: the UIDL value -- stable across sessions, unlike the
///   sequence number which is just the position in the maildrop.
/// - `raw`: the complete RFC 5322 message returned by RETR.
#[derive(Debug, Clone)]
pub struct TestMessage {
    pub uid: String,
    pub raw: Vec<u8>,
}

/// Builder for constructing a `Mailbox` step by step.
pub struct MailboxBuilder {
    mailbox: Mailbox,
}

impl MailboxBuilder {
    pub fn new() -> Self {
        Self {
            mailbox: Mailbox {
                user: TEST_USER.to_string(),
                password: TEST_PASSWORD.to_string(),
                messages: Vec::new(),
                failing_retrieve: None,
            },
        }
    }

    /// Replace the accepted login.
    pub fn credentials(mut self, user: &str, password: &str) -> Self {
        self.mailbox.user = user.to_string();
        self.mailbox.password = password.to_string();
        self
    }

    /// Append a message to the maildrop.
    pub fn message(mut self, uid: &str, raw: &[u8]) -> Self {
        self.mailbox.messages.push(TestMessage {
            uid: uid.to_string(),
            raw: raw.to_vec(),
        });
        self
    }

    /// Make RETR of message `sequence` fail.
    pub fn fail_retrieve(mut self, sequence: usize) -> Self {
        self.mailbox.failing_retrieve = Some(sequence);
        self
    }

    /// Consume the builder and return the finished `Mailbox`.
    pub fn build(self) -> Mailbox {
        self.mailbox
    }
}
