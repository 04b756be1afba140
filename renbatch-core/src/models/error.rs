use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenameError {
    #[error("invalid regular expression {pattern:?}: {message}")]
    InvalidPattern { pattern: String, message: String },
    #[error("target directory does not exist: {}", path.display())]
    InvalidTargetDirectory { path: PathBuf },
    #[error("not a directory: {}", path.display())]
    NotADirectory { path: PathBuf },
    #[error("another file in this batch is already renamed to {}", path.display())]
    DuplicateTarget { path: PathBuf },
    #[error("target already exists: {}", path.display())]
    TargetExists { path: PathBuf },
    #[error("permission denied: {}", path.display())]
    PermissionDenied { path: PathBuf },
    #[error("no such file: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("file already exists: {}", path.display())]
    AlreadyExists { path: PathBuf },
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("batch cancelled before {} was processed", path.display())]
    Cancelled { path: PathBuf },
    #[error("path has no usable file name: {}", path.display())]
    InvalidPath { path: PathBuf },
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl RenameError {
    /// Maps an I/O error onto the variant matching its kind.
    pub fn from_io(path: impl Into<PathBuf>, err: io::Error) -> Self {
        let path = path.into();
        match err.kind() {
            io::ErrorKind::PermissionDenied => RenameError::PermissionDenied { path },
            io::ErrorKind::NotFound => RenameError::NotFound { path },
            io::ErrorKind::AlreadyExists => RenameError::AlreadyExists { path },
            _ => RenameError::Io { path, source: err },
        }
    }

    /// Errors raised before anything touched the disk.
    pub fn is_planning_error(&self) -> bool {
        matches!(
            self,
            RenameError::InvalidPattern { .. }
                | RenameError::InvalidTargetDirectory { .. }
                | RenameError::NotADirectory { .. }
                | RenameError::DuplicateTarget { .. }
                | RenameError::TargetExists { .. }
        )
    }
}
