//! POP3S mailbox unpacker
//!
//! Connects to a POP3-over-TLS server, retrieves every message,
//! optionally deletes it, and writes each non-multipart MIME part to
//! a file, optionally grouped per message by UID or Subject.
//!
//! Settings come from `.fetchrc` files, command-line flags and
//! `POP3_*` environment variables (see [`Settings`]).

mod client;
mod config;
mod connection;
mod error;
mod message;
mod session;
mod unpack;

pub use client::{MailFetcher, Progress, RunSummary};
pub use config::{
    CONFIG_FILE_NAME, DEFAULT_PORT, ENV_DIRECTORY, ENV_PASSWORD, ENV_PORT, ENV_SERVER, ENV_USER,
    FileConfig, Options, Overrides, Settings, SubdirMode,
};
pub use connection::{connect_tls, tls_connector};
pub use error::{Error, Result};
pub use message::{MessageRecord, NO_SUBJECT, subject};
pub use session::{MailboxStat, MessageCursor, MessageInfo, Pop3Session};
pub use unpack::{
    FALLBACK_EXTENSION, LeafPart, UnpackedMessage, Unpacker, extension_for, leaf_parts,
    sanitize_component, synthesized_name,
};
