//! Content reader: turn a document on disk into prompt-ready text.
//!
//! Dispatch is by lower-cased file extension. Tabular formats (CSV and
//! spreadsheets) are parsed into a [`Table`](docsmith_shared::Table) and
//! rendered as fixed-width text; plain text is read verbatim.
//!
//! [`read_content`] reports failures as [`DocsmithError`]. The pipeline uses
//! [`read_to_text`], which never fails and folds any error into a
//! descriptive string so one bad document cannot abort a run.

mod tabular;

use std::path::Path;

use docsmith_shared::{DocsmithError, Result};
use tracing::{debug, instrument, warn};

/// Extensions parsed as spreadsheets.
const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "ods"];

/// Extensions read verbatim as UTF-8.
const TEXT_EXTENSIONS: &[&str] = &["txt", "md"];

/// The handler chosen for a file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Csv,
    Spreadsheet,
    Text,
}

impl ContentKind {
    /// Classify a lower-cased extension, or `None` if unsupported.
    pub fn from_extension(ext: &str) -> Option<Self> {
        if ext == "csv" {
            Some(Self::Csv)
        } else if SPREADSHEET_EXTENSIONS.contains(&ext) {
            Some(Self::Spreadsheet)
        } else if TEXT_EXTENSIONS.contains(&ext) {
            Some(Self::Text)
        } else {
            None
        }
    }
}

/// Lower-cased extension of `path`, empty if it has none.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Read a document into text, dispatching on its extension.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn read_content(path: &Path) -> Result<String> {
    let ext = extension_of(path);
    let kind = ContentKind::from_extension(&ext)
        .ok_or_else(|| DocsmithError::UnsupportedFileType(ext.clone()))?;

    debug!(?kind, "reading document");

    match kind {
        ContentKind::Csv => tabular::read_csv(path).map(|t| t.render()),
        ContentKind::Spreadsheet => tabular::read_spreadsheet(path).map(|t| t.render()),
        ContentKind::Text => {
            std::fs::read_to_string(path).map_err(|e| DocsmithError::io(path, e))
        }
    }
}

/// Read a document into text, rendering any failure as a descriptive string.
///
/// - unsupported type: `Unsupported file type: .<ext>`
/// - anything else: `Error reading <path>: <message>`
pub fn read_to_text(path: &Path) -> String {
    match read_content(path) {
        Ok(text) => text,
        Err(DocsmithError::UnsupportedFileType(ext)) => {
            warn!(path = %path.display(), ext, "unsupported file type");
            format!("Unsupported file type: .{ext}")
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read document");
            format!("Error reading {}: {}", path.display(), failure_message(&e))
        }
    }
}

/// The underlying cause, without the error-kind prefix the `Display` impl adds.
fn failure_message(err: &DocsmithError) -> String {
    match err {
        DocsmithError::Io { source, .. } => source.to_string(),
        DocsmithError::Parse { message } => message.clone(),
        other => other.to_string(),
    }
}
