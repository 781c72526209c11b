//! Fetch-and-unpack run

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::message;
use crate::session::Pop3Session;
use crate::unpack::{UnpackedMessage, Unpacker};
use tracing::info;

/// Progress reported once per message.
#[derive(Debug)]
pub enum Progress<'a> {
    /// The message has been retrieved and is about to be unpacked.
    Started {
        sequence: u32,
        uid: &'a str,
        subject: &'a str,
    },
    /// All parts of the message are on disk.
    Unpacked(&'a UnpackedMessage),
}

/// Totals for a completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub messages: usize,
    pub files: usize,
}

/// Drains a POP3 mailbox into a local directory.
pub struct MailFetcher {
    settings: Settings,
}

impl MailFetcher {
    #[must_use]
    pub const fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Fetch every message, unpack it, then close the session.
    ///
    /// Messages are deleted on the server only if the whole run
    /// succeeds and `delete_on_fetch` is set; any error drops the
    /// session without QUIT.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered: [`Error::Config`] for
    /// incomplete settings, [`Error::Connection`] or [`Error::Auth`]
    /// while opening, [`Error::Fetch`] or [`Error::Parse`] per message,
    /// and [`Error::Filesystem`] when writing.
    pub async fn run(&self, mut on_progress: impl FnMut(Progress<'_>)) -> Result<RunSummary> {
        let settings = &self.settings;
        settings.validate()?;

        let mut session = Pop3Session::open(settings).await?;
        let stat = session.stat().await?;
        info!("Mailbox holds {} message(s), {} octets", stat.count, stat.octets);

        tokio::fs::create_dir_all(&settings.directory)
            .await
            .map_err(|e| Error::filesystem(&settings.directory, e))?;

        let unpacker = Unpacker::new(
            &settings.directory,
            settings.subdir_mode,
            settings.sanitize_filenames,
        );
        let mut summary = RunSummary::default();

        let mut cursor = session.fetch_all(settings.delete_on_fetch).await?;
        while let Some(record) = cursor.next().await? {
            let mail = record.parse()?;
            let subject = message::subject(&mail);
            on_progress(Progress::Started {
                sequence: record.sequence,
                uid: &record.uid,
                subject: &subject,
            });

            let unpacked = unpacker.unpack(&record, &mail, &subject).await?;
            summary.messages += 1;
            summary.files += unpacked.files.len();
            on_progress(Progress::Unpacked(&unpacked));
        }

        session.close().await?;
        info!(
            "Unpacked {} message(s) into {} file(s)",
            summary.messages, summary.files
        );
        Ok(summary)
    }
}
