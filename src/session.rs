//! POP3 session over an encrypted stream
//!
//! Implements the client side of RFC 1939 that a fetch-and-delete run
//! needs: USER/PASS, STAT, LIST, UIDL, RETR, DELE and QUIT.
//!
//! Deletions are only committed by the server when the session ends
//! with QUIT. Dropping a [`Pop3Session`] without calling
//! [`Pop3Session::close`] leaves every marked message in place.

use crate::config::Settings;
use crate::connection::connect_tls;
use crate::error::{Error, Result};
use crate::message::MessageRecord;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tracing::{debug, info};

/// Entry of a LIST response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageInfo {
    pub sequence: u32,
    pub size: u64,
}

/// Result of STAT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailboxStat {
    pub count: u32,
    pub octets: u64,
}

/// An authenticated POP3 session.
pub struct Pop3Session<S = TlsStream<TcpStream>> {
    stream: BufReader<S>,
}

impl Pop3Session {
    /// Connect over TLS and log in with the settings' credentials.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the server cannot be reached or
    /// greets with something other than `+OK`, and [`Error::Auth`] if
    /// the credentials are rejected.
    pub async fn open(settings: &Settings) -> Result<Self> {
        let stream = connect_tls(&settings.server, settings.port, settings.insecure).await?;
        let mut session = Self::greet(stream).await?;
        session.login(&settings.user, &settings.password).await?;
        info!("Logged in to {} as {}", settings.server, settings.user);
        Ok(session)
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Pop3Session<S> {
    /// Wrap an established stream and consume the server greeting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the greeting is missing or
    /// negative.
    pub async fn greet(stream: S) -> Result<Self> {
        let mut session = Self {
            stream: BufReader::new(stream),
        };
        let greeting = session
            .read_line()
            .await
            .map_err(|e| Error::Connection(format!("No greeting: {e}")))?;
        match parse_status(&greeting) {
            Ok(Status::Ok(text)) => {
                debug!("Server greeting: {}", text);
                Ok(session)
            }
            Ok(Status::Err(text)) => Err(Error::Connection(format!("Server refused: {text}"))),
            Err(e) => Err(Error::Connection(e.to_string())),
        }
    }

    /// Authenticate with USER and PASS.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if either command is answered with `-ERR`.
    pub async fn login(&mut self, user: &str, password: &str) -> Result<()> {
        self.send(&format!("USER {user}")).await?;
        if let Status::Err(text) = self.read_status().await? {
            return Err(Error::Auth(text));
        }
        self.send(&format!("PASS {password}")).await?;
        if let Status::Err(text) = self.read_status().await? {
            return Err(Error::Auth(text));
        }
        Ok(())
    }

    /// Message count and total size.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fetch`] on a negative or malformed reply.
    pub async fn stat(&mut self) -> Result<MailboxStat> {
        let text = self.command("STAT").await?;
        let mut fields = text.split_whitespace();
        let count = parse_field(fields.next(), "STAT count")?;
        let octets = parse_field(fields.next(), "STAT size")?;
        Ok(MailboxStat { count, octets })
    }

    /// Every message currently in the maildrop, in sequence order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fetch`] on a negative or malformed reply.
    pub async fn list(&mut self) -> Result<Vec<MessageInfo>> {
        self.command("LIST").await?;
        let mut messages = Vec::new();
        for line in self.read_multiline().await? {
            let line = String::from_utf8_lossy(&line);
            let mut fields = line.split_whitespace();
            let sequence = parse_field(fields.next(), "LIST message number")?;
            let size = parse_field(fields.next(), "LIST size")?;
            messages.push(MessageInfo { sequence, size });
        }
        messages.sort_by_key(|m| m.sequence);
        Ok(messages)
    }

    /// The server-assigned unique id of message `sequence`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fetch`] on a negative or malformed reply.
    pub async fn uid(&mut self, sequence: u32) -> Result<String> {
        let text = self.command(&format!("UIDL {sequence}")).await?;
        let mut fields = text.split_whitespace();
        let _: u32 = parse_field(fields.next(), "UIDL message number")?;
        fields
            .next()
            .map(str::to_string)
            .ok_or_else(|| Error::Fetch(format!("UIDL {sequence}: missing unique id")))
    }

    /// Full raw content of message `sequence`, lines joined with CRLF.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fetch`] if the server refuses or the transfer
    /// breaks off.
    pub async fn retrieve(&mut self, sequence: u32) -> Result<Vec<u8>> {
        self.command(&format!("RETR {sequence}")).await?;
        let lines = self.read_multiline().await?;
        let mut raw = Vec::with_capacity(lines.iter().map(|l| l.len() + 2).sum());
        for line in lines {
            raw.extend_from_slice(&line);
            raw.extend_from_slice(b"\r\n");
        }
        Ok(raw)
    }

    /// Mark message `sequence` for deletion at QUIT.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fetch`] if the server refuses.
    pub async fn delete(&mut self, sequence: u32) -> Result<()> {
        self.command(&format!("DELE {sequence}")).await?;
        Ok(())
    }

    /// List the maildrop and return a cursor over its messages.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fetch`] if LIST fails.
    pub async fn fetch_all(&mut self, delete_after_retrieve: bool) -> Result<MessageCursor<'_, S>> {
        let pending = self.list().await?;
        debug!("{} message(s) listed", pending.len());
        Ok(MessageCursor {
            session: self,
            pending: pending.into_iter().map(|m| m.sequence).collect(),
            next: 0,
            delete_after_retrieve,
        })
    }

    /// Send QUIT, committing pending deletions, and shut the stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fetch`] if the server answers QUIT with `-ERR`
    /// (deletions may not have been applied).
    pub async fn close(mut self) -> Result<()> {
        let text = self.command("QUIT").await?;
        debug!("QUIT: {}", text);
        self.stream.get_mut().shutdown().await.ok();
        info!("Session closed");
        Ok(())
    }

    // -- private helpers --

    async fn send(&mut self, line: &str) -> Result<()> {
        if line.starts_with("PASS ") {
            debug!("> PASS ********");
        } else {
            debug!("> {}", line);
        }
        let stream = self.stream.get_mut();
        stream
            .write_all(format!("{line}\r\n").as_bytes())
            .await
            .map_err(|e| Error::Fetch(format!("Write failed: {e}")))?;
        stream
            .flush()
            .await
            .map_err(|e| Error::Fetch(format!("Write failed: {e}")))
    }

    /// Send a command and require `+OK`, returning the status text.
    async fn command(&mut self, line: &str) -> Result<String> {
        self.send(line).await?;
        let verb = line.split(' ').next().unwrap_or(line);
        match self.read_status().await? {
            Status::Ok(text) => Ok(text),
            Status::Err(text) => Err(Error::Fetch(format!("{verb} refused: {text}"))),
        }
    }

    async fn read_status(&mut self) -> Result<Status> {
        let line = self.read_line().await.map_err(|e| Error::Fetch(e.to_string()))?;
        parse_status(&line)
    }

    /// One line with the CRLF (or bare LF) removed.
    async fn read_line(&mut self) -> std::io::Result<Vec<u8>> {
        let mut line = Vec::new();
        if self.stream.read_until(b'\n', &mut line).await? == 0 {
            return Err(std::io::ErrorKind::UnexpectedEof.into());
        }
        trim_line_ending(&mut line);
        Ok(line)
    }

    /// Lines up to the terminating `.`, dot-unstuffed.
    async fn read_multiline(&mut self) -> Result<Vec<Vec<u8>>> {
        let mut lines = Vec::new();
        loop {
            let mut line = self
                .read_line()
                .await
                .map_err(|e| Error::Fetch(format!("Multi-line response cut off: {e}")))?;
            if line == b"." {
                return Ok(lines);
            }
            if line.starts_with(b"..") {
                line.remove(0);
            }
            lines.push(line);
        }
    }
}

/// Explicit cursor over the messages listed by [`Pop3Session::fetch_all`].
///
/// Each [`next`](Self::next) retrieves one message, reads its UID and,
/// when requested, marks it for deletion. The cursor cannot be rewound.
pub struct MessageCursor<'a, S> {
    session: &'a mut Pop3Session<S>,
    pending: Vec<u32>,
    next: usize,
    delete_after_retrieve: bool,
}

impl<S: AsyncRead + AsyncWrite + Unpin> MessageCursor<'_, S> {
    /// Whether another message is waiting.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.next < self.pending.len()
    }

    /// Messages not yet yielded.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.pending.len() - self.next
    }

    /// Fetch the next message, or `None` when the listing is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fetch`] if RETR, UIDL or DELE fails.
    pub async fn next(&mut self) -> Result<Option<MessageRecord>> {
        let Some(&sequence) = self.pending.get(self.next) else {
            return Ok(None);
        };
        self.next += 1;

        let raw = self.session.retrieve(sequence).await?;
        let uid = self.session.uid(sequence).await?;
        if self.delete_after_retrieve {
            self.session.delete(sequence).await?;
        }
        Ok(Some(MessageRecord { sequence, uid, raw }))
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Status {
    Ok(String),
    Err(String),
}

fn parse_status(line: &[u8]) -> Result<Status> {
    let line = String::from_utf8_lossy(line);
    let text = |rest: &str| rest.trim_start().to_string();
    if let Some(rest) = line.strip_prefix("+OK") {
        Ok(Status::Ok(text(rest)))
    } else if let Some(rest) = line.strip_prefix("-ERR") {
        Ok(Status::Err(text(rest)))
    } else {
        Err(Error::Fetch(format!("Unexpected response: {line}")))
    }
}

fn parse_field<T: std::str::FromStr>(field: Option<&str>, what: &str) -> Result<T> {
    field
        .and_then(|f| f.parse().ok())
        .ok_or_else(|| Error::Fetch(format!("Malformed {what}")))
}

fn trim_line_ending(line: &mut Vec<u8>) {
    if line.last() == Some(&b'\n') {
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
    }
}
