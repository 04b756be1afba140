use crate::engine::Engine;
use crate::fs::{CopyError, FileSystem, same_directory, same_path};
use crate::models::{BatchOutcome, FailedItem, RenameError, RenameMapping, RenameStep};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// What to do with the source when the destination is in another directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossDirMode {
    /// Copy with metadata and leave the source where it is.
    #[default]
    Copy,
    /// Copy with metadata, then remove the source.
    Move,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Renamed { from: PathBuf, to: PathBuf },
    Copied { from: PathBuf, to: PathBuf },
    Moved { from: PathBuf, to: PathBuf },
    /// Source and destination were the same file; nothing was done.
    Unchanged { path: PathBuf },
}

impl ApplyOutcome {
    pub fn step(&self) -> RenameStep {
        match self {
            ApplyOutcome::Renamed { from, to }
            | ApplyOutcome::Copied { from, to }
            | ApplyOutcome::Moved { from, to } => RenameStep::new(from.clone(), to.clone()),
            ApplyOutcome::Unchanged { path } => RenameStep::new(path.clone(), path.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    /// Whole percent in `0..=100`.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        (self.completed.min(self.total) * 100 / self.total) as u8
    }
}

pub struct TransactionExecutor<'a, F: FileSystem> {
    fs: &'a F,
    mode: CrossDirMode,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a, F: FileSystem + Sync> TransactionExecutor<'a, F> {
    pub fn new(fs: &'a F) -> Self {
        Self { fs, mode: CrossDirMode::default(), cancel: None }
    }

    pub fn with_mode(mut self, mode: CrossDirMode) -> Self {
        self.mode = mode;
        self
    }

    /// Items not yet started are skipped once the flag is set.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Renames or relocates one file.
    pub fn apply(
        &self,
        source: &Path,
        new_name: &str,
        target_dir: Option<&Path>,
    ) -> Result<ApplyOutcome, RenameError> {
        if let Some(dir) = target_dir {
            if !self.fs.exists(dir) {
                return Err(RenameError::InvalidTargetDirectory { path: dir.to_path_buf() });
            }
            if !self.fs.is_dir(dir) {
                return Err(RenameError::NotADirectory { path: dir.to_path_buf() });
            }
        }

        let source_dir = match source.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let (dest_dir, same_dir) = match target_dir {
            Some(dir) => (dir, same_directory(self.fs, dir, source_dir)),
            None => (source_dir, true),
        };
        let destination = dest_dir.join(new_name);

        if !self.fs.exists(source) {
            return Err(RenameError::NotFound { path: source.to_path_buf() });
        }

        if same_path(self.fs, source, &destination) && source.file_name() == destination.file_name() {
            tracing::debug!(path = %source.display(), "name unchanged, skipping");
            return Ok(ApplyOutcome::Unchanged { path: source.to_path_buf() });
        }

        // A case-only rename on a case-insensitive volume resolves to the
        // source itself, which is fine to rename over.
        if self.fs.exists(&destination) && !same_path(self.fs, source, &destination) {
            return Err(RenameError::AlreadyExists { path: destination });
        }

        if same_dir {
            self.fs
                .rename(source, &destination)
                .map_err(|e| RenameError::from_io(source, e))?;
            tracing::debug!(from = %source.display(), to = %destination.display(), "renamed");
            return Ok(ApplyOutcome::Renamed { from: source.to_path_buf(), to: destination });
        }

        self.fs.copy_with_metadata(source, &destination).map_err(|e| match e {
            CopyError::Source(e) => RenameError::from_io(source, e),
            CopyError::Destination(e) => RenameError::from_io(&destination, e),
        })?;

        match self.mode {
            CrossDirMode::Copy => {
                tracing::debug!(from = %source.display(), to = %destination.display(), "copied");
                Ok(ApplyOutcome::Copied { from: source.to_path_buf(), to: destination })
            }
            CrossDirMode::Move => {
                if let Err(e) = self.fs.remove_file(source) {
                    // A failed item leaves nothing at the destination
                    if let Err(cleanup) = self.fs.remove_file(&destination) {
                        tracing::warn!(
                            path = %destination.display(),
                            error = %cleanup,
                            "could not remove copy after failed move"
                        );
                    }
                    return Err(RenameError::from_io(source, e));
                }
                tracing::debug!(from = %source.display(), to = %destination.display(), "moved");
                Ok(ApplyOutcome::Moved { from: source.to_path_buf(), to: destination })
            }
        }
    }

    /// Plans the batch, then applies every accepted mapping in order.
    ///
    /// Planning errors abort before anything is touched. After that, a
    /// failing item is recorded and the rest of the batch carries on.
    pub fn batch_apply(
        &self,
        mappings: &[RenameMapping],
        target_dir: Option<&Path>,
        mut on_progress: impl FnMut(Progress),
    ) -> Result<BatchOutcome, RenameError> {
        let plan = Engine::new(self.fs).plan(mappings, target_dir)?;

        let mut outcome = BatchOutcome::default();
        for rejection in plan.rejected {
            outcome.failed.push(FailedItem {
                source: rejection.mapping.source,
                error: rejection.conflict.into(),
            });
        }

        let total = plan.accepted.len();
        for (done, planned) in plan.accepted.iter().enumerate() {
            let source = &planned.mapping.source;
            if self.cancelled() {
                outcome.failed.push(FailedItem {
                    source: source.clone(),
                    error: RenameError::Cancelled { path: source.clone() },
                });
                continue;
            }

            match self.apply(source, &planned.mapping.new_name, target_dir) {
                Ok(applied) => outcome.succeeded.push(applied.step()),
                Err(error) => {
                    tracing::warn!(source = %source.display(), %error, "rename failed");
                    outcome.failed.push(FailedItem { source: source.clone(), error });
                }
            }
            on_progress(Progress { completed: done + 1, total });
        }

        tracing::info!(
            succeeded = outcome.succeeded.len(),
            failed = outcome.failed.len(),
            "batch applied"
        );
        Ok(outcome)
    }

    /// Replays explicit path pairs, as handed out by undo and redo.
    pub fn execute_steps(
        &self,
        steps: &[RenameStep],
        mut on_progress: impl FnMut(Progress),
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let total = steps.len();

        for (done, step) in steps.iter().enumerate() {
            if self.cancelled() {
                outcome.failed.push(FailedItem {
                    source: step.from.clone(),
                    error: RenameError::Cancelled { path: step.from.clone() },
                });
                continue;
            }

            let result = step
                .to
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| RenameError::InvalidPath { path: step.to.clone() })
                .and_then(|name| {
                    let target = step.to.parent().filter(|p| !p.as_os_str().is_empty());
                    self.apply(&step.from, name, target)
                });

            match result {
                Ok(applied) => outcome.succeeded.push(applied.step()),
                Err(error) => {
                    tracing::warn!(from = %step.from.display(), %error, "step failed");
                    outcome.failed.push(FailedItem { source: step.from.clone(), error });
                }
            }
            on_progress(Progress { completed: done + 1, total });
        }

        outcome
    }
}
