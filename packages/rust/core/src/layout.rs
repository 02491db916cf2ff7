//! On-disk layout of a docsmith working directory.
//!
//! ```text
//! <root>/
//! ├── doc/                      inputs, one output per file
//! ├── template/                 exactly one template used per run
//! ├── result/                   result_<input-filename>.txt
//! ├── background_knowledge.md   optional, read-only
//! └── context_summary.md        optional, append-only
//! ```

use std::path::{Path, PathBuf};

use docsmith_shared::{DocsmithError, Result, WorkspaceConfig};
use tracing::debug;

/// Prefix for every output file name.
pub const RESULT_PREFIX: &str = "result_";

/// Resolved paths for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceLayout {
    pub doc_dir: PathBuf,
    pub template_dir: PathBuf,
    pub result_dir: PathBuf,
    pub background_file: PathBuf,
    pub summary_file: PathBuf,
}

impl WorkspaceLayout {
    /// Resolve `config` against `root`.
    pub fn new(root: &Path, config: &WorkspaceConfig) -> Self {
        Self {
            doc_dir: root.join(&config.doc_dir),
            template_dir: root.join(&config.template_dir),
            result_dir: root.join(&config.result_dir),
            background_file: root.join(&config.background_file),
            summary_file: root.join(&config.summary_file),
        }
    }

    /// Create the input, template and output directories if absent.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.doc_dir, &self.template_dir, &self.result_dir] {
            std::fs::create_dir_all(dir).map_err(|e| DocsmithError::io(dir, e))?;
        }
        Ok(())
    }

    /// Output path for an input named `file_name`.
    pub fn result_path(&self, file_name: &str) -> PathBuf {
        self.result_dir.join(format!("{RESULT_PREFIX}{file_name}.txt"))
    }
}

/// Read a UTF-8 file, or the empty string if it does not exist.
pub fn read_optional(path: &Path) -> Result<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "optional file absent");
            Ok(String::new())
        }
        Err(e) => Err(DocsmithError::io(path, e)),
    }
}

/// Non-hidden regular files in `dir`, sorted by file name.
///
/// Sorting makes the order (and therefore template selection) independent
/// of the platform's directory listing order.
pub fn list_visible_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| DocsmithError::io(dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| DocsmithError::io(dir, e))?;
        let name = entry.file_name();
        if name.to_string_lossy().starts_with('.') {
            continue;
        }
        let file_type = entry
            .file_type()
            .map_err(|e| DocsmithError::io(entry.path(), e))?;
        // Symlinks are followed so linked documents still count.
        if file_type.is_file() || (file_type.is_symlink() && entry.path().is_file()) {
            files.push(entry.path());
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// File name of `path` as UTF-8 (lossy).
pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
