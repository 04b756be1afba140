use crate::fs::FileSystem;
use crate::models::{FileRecord, RenameError, split_extension};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Lists the regular files directly inside `dir`, sorted by path.
///
/// Failing to read the directory itself aborts the listing; entries that
/// vanish or cannot be inspected while listing are skipped.
pub fn list_files<F: FileSystem + ?Sized>(fs: &F, dir: &Path) -> Result<Vec<FileRecord>, RenameError> {
    let entries = fs.read_dir(dir).map_err(|e| RenameError::from_io(dir, e))?;

    let mut records: Vec<FileRecord> = entries
        .into_iter()
        .filter_map(|path| match fs.stat(&path) {
            Ok(stat) if stat.is_file => Some(FileRecord {
                path,
                size: stat.size,
                modified: DateTime::<Local>::from(stat.modified),
            }),
            Ok(_) => None,
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "skipping unreadable entry");
                None
            }
        })
        .collect();

    records.sort_by(|a, b| a.path.cmp(&b.path));
    tracing::debug!(dir = %dir.display(), files = records.len(), "listed directory");
    Ok(records)
}

/// Narrows a listing by extension, size and modification time.
/// Every bound is inclusive; unset bounds match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileFilter {
    pub extensions: Vec<String>,
    pub min_size: Option<u64>,
    pub max_size: Option<u64>,
    pub modified_after: Option<DateTime<Local>>,
    pub modified_before: Option<DateTime<Local>>,
}

impl FileFilter {
    pub fn is_empty(&self) -> bool {
        *self == FileFilter::default()
    }

    pub fn matches(&self, record: &FileRecord) -> bool {
        if !self.extensions.is_empty() {
            let name = record.file_name();
            let ext = split_extension(&name).1.unwrap_or("").to_lowercase();
            let wanted = self
                .extensions
                .iter()
                .map(|e| e.trim().trim_start_matches('.').to_lowercase())
                .any(|e| e == ext);
            if !wanted {
                return false;
            }
        }

        if self.min_size.is_some_and(|min| record.size < min) {
            return false;
        }
        if self.max_size.is_some_and(|max| record.size > max) {
            return false;
        }
        if self.modified_after.is_some_and(|after| record.modified < after) {
            return false;
        }
        if self.modified_before.is_some_and(|before| record.modified > before) {
            return false;
        }
        true
    }

    pub fn apply(&self, records: Vec<FileRecord>) -> Vec<FileRecord> {
        records.into_iter().filter(|r| self.matches(r)).collect()
    }
}

pub fn paths(records: &[FileRecord]) -> Vec<PathBuf> {
    records.iter().map(|r| r.path.clone()).collect()
}
