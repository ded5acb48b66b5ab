//! Header ingestion
//!
//! Builds [`MessageSummary`] values from raw RFC 822 headers with `mailparse`, for callers
//! that hold messages rather than already-extracted metadata.
//!
//! # Reference Collection
//!
//! - **References**: every message id in header order (oldest first), angle brackets removed
//! - **In-Reply-To**: appended as the newest reference unless it already is the last one
//!
//! Only threading metadata is read; bodies are never decoded.

use std::fs;
use std::path::Path;

use mailparse::{MailHeaderMap, parse_headers};
use thiserror::Error;

use crate::models::MessageSummary;

/// Errors that can be returned while reading message headers.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to parse message headers: {0}")]
    MimeParse(#[from] mailparse::MailParseError),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Remove NUL bytes and surrounding whitespace
fn sanitize_text(text: &str) -> String {
    text.replace('\0', "").trim().to_string()
}

/// Extract message ids from a header value
///
/// Prefers `<...>` delimited ids; a value without brackets is split on whitespace.
fn extract_message_ids(header_value: &str) -> Vec<String> {
    let mut ids = Vec::new();
    let mut rest = header_value;

    while let Some(start) = rest.find('<') {
        let Some(len) = rest[start + 1..].find('>') else {
            break;
        };
        let id = sanitize_text(&rest[start + 1..start + 1 + len]);
        if !id.is_empty() {
            ids.push(id);
        }
        rest = &rest[start + len + 2..];
    }

    if ids.is_empty() && !header_value.contains('<') {
        ids = header_value
            .split_whitespace()
            .map(sanitize_text)
            .filter(|id| !id.is_empty())
            .collect();
    }

    ids
}

impl MessageSummary {
    /// Build a summary from raw message headers
    ///
    /// ## Arguments
    ///
    /// - `uid`: opaque identity of the message in its folder
    /// - `order`: position in the folder's collection
    /// - `raw`: the message (or just its header block)
    pub fn from_headers(
        uid: impl Into<String>,
        order: u64,
        raw: &[u8],
    ) -> Result<Self, IngestError> {
        let (headers, _) = parse_headers(raw).map_err(|e| {
            log::debug!("failed to parse headers: {}", e);
            IngestError::MimeParse(e)
        })?;

        let message_id = headers
            .get_first_value("Message-ID")
            .and_then(|value| extract_message_ids(&value).into_iter().next());

        let subject = headers
            .get_first_value("Subject")
            .map(|value| sanitize_text(&value))
            .unwrap_or_default();

        let mut references = headers
            .get_first_value("References")
            .map(|value| extract_message_ids(&value))
            .unwrap_or_default();

        let in_reply_to = headers
            .get_first_value("In-Reply-To")
            .and_then(|value| extract_message_ids(&value).into_iter().next());
        if let Some(parent) = in_reply_to {
            if references.last() != Some(&parent) {
                references.push(parent);
            }
        }

        let mut summary = MessageSummary::new(uid, order)
            .with_references(references)
            .with_subject(subject);
        summary.message_id = message_id;

        log::trace!(
            "ingested {}: {:?} with {} references",
            summary.uid,
            summary.message_id,
            summary.references.len()
        );
        Ok(summary)
    }
}

/// Read every `*.eml` file of a directory, in file name order
///
/// The file stem becomes the uid and the sorted position the order value.
pub fn load_eml_dir(dir: &Path) -> Result<Vec<MessageSummary>, IngestError> {
    let io_error = |source| IngestError::Io {
        path: dir.display().to_string(),
        source,
    };

    let mut paths: Vec<_> = fs::read_dir(dir)
        .map_err(io_error)?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "eml"))
        .collect();
    paths.sort();

    let mut summaries = Vec::with_capacity(paths.len());
    for (order, path) in paths.iter().enumerate() {
        let raw = fs::read(path).map_err(|source| IngestError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let uid = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| order.to_string());
        summaries.push(MessageSummary::from_headers(uid, order as u64, &raw)?);
    }

    log::info!("loaded {} messages from {}", summaries.len(), dir.display());
    Ok(summaries)
}
