mod error;
mod rule;

pub use error::*;
pub use rule::*;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

/// A file name split into stem and extension.
///
/// Leading dots belong to the stem, so `.bashrc` has no extension and
/// `archive.tar.gz` splits into `archive.tar` + `gz`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Filename {
    pub base: String,
    pub extension: Option<String>,
}

impl Filename {
    pub fn from_path(path: &Path) -> Result<Self, RenameError> {
        let file_name = path
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| RenameError::InvalidPath { path: path.to_path_buf() })?;

        // Normalize to NFC
        let normalized: String = file_name.nfc().collect();
        Ok(Self::parse(&normalized))
    }

    pub fn parse(name: &str) -> Self {
        let (base, extension) = split_extension(name);
        Filename {
            base: base.to_string(),
            extension: extension.map(|s| s.to_string()),
        }
    }

    /// The extension including its dot, or an empty string.
    pub fn dotted_extension(&self) -> String {
        self.extension
            .as_ref()
            .map(|ext| format!(".{}", ext))
            .unwrap_or_default()
    }
}

impl fmt::Display for Filename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.extension {
            Some(ext) => write!(f, "{}.{}", self.base, ext),
            None => f.write_str(&self.base),
        }
    }
}

/// Splits at the last dot that is not part of the leading run of dots.
pub fn split_extension(name: &str) -> (&str, Option<&str>) {
    let leading = name.len() - name.trim_start_matches('.').len();
    match name[leading..].rfind('.') {
        Some(pos) => {
            let dot = leading + pos;
            (&name[..dot], Some(&name[dot + 1..]))
        }
        None => (name, None),
    }
}

/// Snapshot of one regular file found while listing a directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileRecord {
    pub path: PathBuf,
    pub size: u64,
    pub modified: DateTime<Local>,
}

impl FileRecord {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// A source file paired with the name it should get. `new_name` never
/// contains a directory component.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RenameMapping {
    pub source: PathBuf,
    pub new_name: String,
}

impl RenameMapping {
    pub fn new(source: impl Into<PathBuf>, new_name: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            new_name: new_name.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RenameStep {
    pub from: PathBuf,
    pub to: PathBuf,
}

impl RenameStep {
    pub fn new(from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn inverse(&self) -> Self {
        Self {
            from: self.to.clone(),
            to: self.from.clone(),
        }
    }
}

#[derive(Debug)]
pub struct FailedItem {
    pub source: PathBuf,
    pub error: RenameError,
}

/// Result of running a batch: what went through and what did not.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub succeeded: Vec<RenameStep>,
    pub failed: Vec<FailedItem>,
}

impl BatchOutcome {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("photo.jpg"), ("photo", Some("jpg")));
        assert_eq!(split_extension("archive.tar.gz"), ("archive.tar", Some("gz")));
        assert_eq!(split_extension(".bashrc"), (".bashrc", None));
        assert_eq!(split_extension("..hidden.txt"), ("..hidden", Some("txt")));
        assert_eq!(split_extension("..."), ("...", None));
        assert_eq!(split_extension("README"), ("README", None));
        assert_eq!(split_extension("trailing."), ("trailing", Some("")));
    }

    #[test]
    fn test_filename_round_trips_display() {
        for name in ["a.txt", ".profile", "noext", "x.tar.gz"] {
            assert_eq!(Filename::parse(name).to_string(), name);
        }
    }

    #[test]
    fn test_from_path_normalizes_nfc() {
        // "e" followed by a combining acute accent
        let decomposed = PathBuf::from("/tmp/cafe\u{301}.txt");
        let filename = Filename::from_path(&decomposed).unwrap();
        assert_eq!(filename.base, "caf\u{e9}");
        assert_eq!(filename.dotted_extension(), ".txt");
    }

    #[test]
    fn test_inverse_step_swaps_paths() {
        let step = RenameStep::new("/a/old.txt", "/b/new.txt");
        let inverse = step.inverse();
        assert_eq!(inverse.from, PathBuf::from("/b/new.txt"));
        assert_eq!(inverse.to, PathBuf::from("/a/old.txt"));
        assert_eq!(inverse.inverse(), step);
    }
}
