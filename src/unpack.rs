//! Writing MIME parts to disk
//!
//! Every non-multipart part of a message becomes one file. Parts that
//! declare a filename keep it; the rest are named `part-NNNNN.<ext>`
//! with a counter that starts at 1 for each message and advances on
//! every leaf part.
//!
//! Declared filenames and Subject-derived directory names are used
//! verbatim unless sanitization is switched on, so a crafted message
//! can write outside the destination directory. Sanitization is
//! opt-in to keep the default layout unchanged.

use crate::config::SubdirMode;
use crate::error::{Error, Result};
use crate::message::{MessageRecord, NO_SUBJECT};
use mailparse::ParsedMail;
use mailparse::body::Body;
use serde::{Serialize, Serializer};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Extension used when the content type has no known mapping.
pub const FALLBACK_EXTENSION: &str = "bin";

/// Preferred extensions for types where `mime_guess` lists several.
const PREFERRED_EXTENSIONS: &[(&str, &str)] = &[
    ("text/plain", "txt"),
    ("text/html", "html"),
    ("text/csv", "csv"),
    ("text/calendar", "ics"),
    ("text/xml", "xml"),
    ("application/xml", "xml"),
    ("image/jpeg", "jpg"),
    ("image/tiff", "tiff"),
    ("audio/mpeg", "mp3"),
    ("video/mpeg", "mpeg"),
    ("message/rfc822", "eml"),
    ("application/octet-stream", "bin"),
];

/// What one message produced on disk.
#[derive(Debug, Clone, Serialize)]
pub struct UnpackedMessage {
    pub sequence: u32,
    pub uid: String,
    pub subject: String,
    #[serde(serialize_with = "lossy_path")]
    pub directory: PathBuf,
    #[serde(serialize_with = "lossy_paths")]
    pub files: Vec<PathBuf>,
}

fn lossy_path<S: Serializer>(
    path: &Path,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&path.to_string_lossy())
}

fn lossy_paths<S: Serializer>(
    paths: &[PathBuf],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_seq(paths.iter().map(|path| path.to_string_lossy()))
}

/// A leaf part ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafPart {
    pub filename: String,
    pub content_type: String,
    pub payload: Vec<u8>,
}

/// Writes messages below a destination directory.
#[derive(Debug, Clone)]
pub struct Unpacker {
    base: PathBuf,
    mode: SubdirMode,
    sanitize: bool,
}

impl Unpacker {
    #[must_use]
    pub fn new(base: impl Into<PathBuf>, mode: SubdirMode, sanitize: bool) -> Self {
        Self {
            base: base.into(),
            mode,
            sanitize,
        }
    }

    /// Directory that receives the parts of one message.
    #[must_use]
    pub fn message_directory(&self, uid: &str, subject: &str) -> PathBuf {
        let name = match self.mode {
            SubdirMode::None => return self.base.clone(),
            SubdirMode::ByUid => uid,
            SubdirMode::BySubject => subject,
        };
        if self.sanitize {
            let fallback = match self.mode {
                SubdirMode::BySubject => NO_SUBJECT,
                _ => "unnamed",
            };
            self.base
                .join(sanitize_component(name).unwrap_or_else(|| fallback.to_string()))
        } else {
            self.base.join(name)
        }
    }

    /// Write every leaf part of `mail` and report the files created.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Filesystem`] if a directory or file cannot be
    /// written.
    pub async fn unpack(
        &self,
        record: &MessageRecord,
        mail: &ParsedMail<'_>,
        subject: &str,
    ) -> Result<UnpackedMessage> {
        let directory = self.message_directory(&record.uid, subject);
        let parts = leaf_parts(mail, self.sanitize);

        tokio::fs::create_dir_all(&directory)
            .await
            .map_err(|e| Error::filesystem(&directory, e))?;

        let mut files = Vec::with_capacity(parts.len());
        for part in parts {
            if !self.sanitize && has_path_separator(&part.filename) {
                warn!(
                    "Message {}: filename {:?} contains a path separator",
                    record.uid, part.filename
                );
            }
            let path = directory.join(&part.filename);
            debug!(
                "Writing {} ({}, {} bytes)",
                path.display(),
                part.content_type,
                part.payload.len()
            );
            tokio::fs::write(&path, &part.payload)
                .await
                .map_err(|e| Error::filesystem(&path, e))?;
            files.push(path);
        }

        Ok(UnpackedMessage {
            sequence: record.sequence,
            uid: record.uid.clone(),
            subject: subject.to_string(),
            directory,
            files,
        })
    }
}

/// Walk `mail` depth-first and collect its non-multipart parts with
/// their output filenames and decoded payloads.
///
/// A part whose transfer encoding is broken keeps its undecoded body.
#[must_use]
pub fn leaf_parts(mail: &ParsedMail<'_>, sanitize: bool) -> Vec<LeafPart> {
    let mut leaves = Vec::new();
    collect(mail, sanitize, &mut leaves);
    leaves
}

fn collect(part: &ParsedMail<'_>, sanitize: bool, out: &mut Vec<LeafPart>) {
    let content_type = part.ctype.mimetype.to_ascii_lowercase();
    if maintype(&content_type) == "multipart" {
        for child in &part.subparts {
            collect(child, sanitize, out);
        }
        return;
    }

    let counter = out.len() + 1;
    let declared = declared_filename(part).filter(|name| !name.is_empty());
    let declared = if sanitize {
        declared.and_then(|name| sanitize_component(&name))
    } else {
        declared
    };
    let filename = declared.unwrap_or_else(|| synthesized_name(counter, &content_type));

    let payload = part.get_body_raw().unwrap_or_else(|e| {
        warn!("Cannot decode {} part {:?}, keeping it encoded: {}", content_type, filename, e);
        undecoded_body(part)
    });

    out.push(LeafPart {
        filename,
        content_type,
        payload,
    });
}

fn undecoded_body(part: &ParsedMail<'_>) -> Vec<u8> {
    match part.get_body_encoded() {
        Body::Base64(body) | Body::QuotedPrintable(body) => body.get_raw().to_vec(),
        Body::SevenBit(body) | Body::EightBit(body) => body.get_raw().to_vec(),
        Body::Binary(body) => body.get_raw().to_vec(),
    }
}

/// `filename` from Content-Disposition, else `name` from Content-Type.
fn declared_filename(part: &ParsedMail<'_>) -> Option<String> {
    part.get_content_disposition()
        .params
        .get("filename")
        .or_else(|| part.ctype.params.get("name"))
        .cloned()
}

fn maintype(content_type: &str) -> &str {
    content_type.split('/').next().unwrap_or(content_type)
}

/// `part-00001.png` style name for a part without a declared filename.
#[must_use]
pub fn synthesized_name(counter: usize, content_type: &str) -> String {
    format!("part-{counter:05}.{}", extension_for(content_type))
}

/// Best-effort file extension for a MIME type, `bin` when unknown.
#[must_use]
pub fn extension_for(content_type: &str) -> &'static str {
    let content_type = content_type.trim().to_ascii_lowercase();
    PREFERRED_EXTENSIONS
        .iter()
        .find(|(mime, _)| *mime == content_type)
        .map(|(_, ext)| *ext)
        .or_else(|| {
            mime_guess::get_mime_extensions_str(&content_type)
                .and_then(|exts| exts.first().copied())
        })
        .unwrap_or(FALLBACK_EXTENSION)
}

/// Reduce `name` to a single path component that cannot climb out of
/// its directory. Returns `None` if nothing usable is left.
#[must_use]
pub fn sanitize_component(name: &str) -> Option<String> {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if matches!(c, '/' | '\\' | ':') || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.').trim();
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

fn has_path_separator(name: &str) -> bool {
    name.contains('/') || name.contains(std::path::MAIN_SEPARATOR) || Path::new(name).is_absolute()
}
