use crate::fs::FileSystem;
use crate::models::{RenameError, RenameStep};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::path::Path;

pub const DEFAULT_CAPACITY: usize = 50;

/// One committed batch, kept so it can be reversed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Operation {
    pub id: String,
    pub timestamp: DateTime<Local>,
    pub steps: Vec<RenameStep>,
    pub description: String,
}

/// Bounded undo/redo stacks of committed batches.
///
/// Both stacks drop their oldest entry when a push would exceed the
/// capacity. Recording a new batch empties the redo stack; undo and redo
/// only shuttle entries between the two.
#[derive(Debug)]
pub struct History {
    undo_stack: VecDeque<Operation>,
    redo_stack: VecDeque<Operation>,
    capacity: usize,
    next_id: u64,
}

impl Default for History {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            undo_stack: VecDeque::with_capacity(capacity),
            redo_stack: VecDeque::with_capacity(capacity),
            capacity,
            next_id: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Remembers a committed batch. Empty batches are ignored.
    pub fn record(&mut self, steps: Vec<RenameStep>) -> Option<&Operation> {
        if steps.is_empty() {
            return None;
        }

        let now = Utc::now();
        let id = format!(
            "{}.{:06}_{}",
            now.timestamp(),
            now.timestamp_subsec_micros(),
            self.next_id
        );
        self.next_id += 1;

        let operation = Operation {
            id,
            timestamp: now.with_timezone(&Local),
            description: format!("batch rename {} files", steps.len()),
            steps,
        };
        tracing::info!(id = %operation.id, steps = operation.steps.len(), "recorded operation");

        push_bounded(&mut self.undo_stack, operation, self.capacity);
        self.redo_stack.clear();
        self.undo_stack.back()
    }

    /// Pops the latest batch and returns the steps that reverse it.
    ///
    /// Each step's destination directory is created when missing. Returns
    /// an empty list when there is nothing to undo.
    pub fn undo<F: FileSystem + ?Sized>(&mut self, fs: &F) -> Result<Vec<RenameStep>, RenameError> {
        let Some(operation) = self.undo_stack.pop_back() else {
            return Ok(Vec::new());
        };

        let inverse: Vec<RenameStep> = operation.steps.iter().map(RenameStep::inverse).collect();
        if let Err(err) = ensure_parents(fs, &inverse) {
            self.undo_stack.push_back(operation);
            return Err(err);
        }

        tracing::info!(id = %operation.id, "undo");
        push_bounded(&mut self.redo_stack, operation, self.capacity);
        Ok(inverse)
    }

    /// Pops the latest undone batch and returns its original steps.
    pub fn redo<F: FileSystem + ?Sized>(&mut self, fs: &F) -> Result<Vec<RenameStep>, RenameError> {
        let Some(operation) = self.redo_stack.pop_back() else {
            return Ok(Vec::new());
        };

        let forward = operation.steps.clone();
        if let Err(err) = ensure_parents(fs, &forward) {
            self.redo_stack.push_back(operation);
            return Err(err);
        }

        tracing::info!(id = %operation.id, "redo");
        push_bounded(&mut self.undo_stack, operation, self.capacity);
        Ok(forward)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.back().map(|op| op.description.as_str())
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.back().map(|op| op.description.as_str())
    }

    /// Undo entries, oldest first.
    pub fn undo_entries(&self) -> impl Iterator<Item = &Operation> {
        self.undo_stack.iter()
    }

    /// Redo entries, oldest first.
    pub fn redo_entries(&self) -> impl Iterator<Item = &Operation> {
        self.redo_stack.iter()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.next_id = 0;
    }
}

fn push_bounded(stack: &mut VecDeque<Operation>, operation: Operation, capacity: usize) {
    while stack.len() >= capacity {
        if let Some(evicted) = stack.pop_front() {
            tracing::debug!(id = %evicted.id, "evicted oldest history entry");
        }
    }
    stack.push_back(operation);
}

fn ensure_parents<F: FileSystem + ?Sized>(fs: &F, steps: &[RenameStep]) -> Result<(), RenameError> {
    let mut seen: HashSet<&Path> = HashSet::new();
    for step in steps {
        let Some(parent) = step.to.parent() else { continue };
        if parent.as_os_str().is_empty() || !seen.insert(parent) || fs.exists(parent) {
            continue;
        }
        tracing::debug!(dir = %parent.display(), "recreating directory");
        fs.create_dir_all(parent)
            .map_err(|source| RenameError::Io { path: parent.to_path_buf(), source })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::RealFileSystem;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn steps(dir: &Path, pairs: &[(&str, &str)]) -> Vec<RenameStep> {
        pairs
            .iter()
            .map(|(from, to)| RenameStep::new(dir.join(from), dir.join(to)))
            .collect()
    }

    #[test]
    fn test_record_empty_is_noop() {
        let mut history = History::new();
        assert!(history.record(Vec::new()).is_none());
        assert!(!history.can_undo());
    }

    #[test]
    fn test_undo_returns_inverse_and_redo_returns_forward() {
        let dir = TempDir::new().unwrap();
        let fs = RealFileSystem::new();
        let mut history = History::new();
        let batch = steps(dir.path(), &[("a.txt", "x.txt"), ("b.txt", "y.txt")]);

        history.record(batch.clone());
        assert_eq!(history.undo_description(), Some("batch rename 2 files"));

        let undo = history.undo(&fs).unwrap();
        assert_eq!(undo, vec![
            RenameStep::new(dir.path().join("x.txt"), dir.path().join("a.txt")),
            RenameStep::new(dir.path().join("y.txt"), dir.path().join("b.txt")),
        ]);
        assert!(!history.can_undo());
        assert!(history.can_redo());
        assert_eq!(history.redo_description(), Some("batch rename 2 files"));

        let redo = history.redo(&fs).unwrap();
        assert_eq!(redo, batch);
        assert!(history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn test_empty_stacks_return_nothing() {
        let fs = RealFileSystem::new();
        let mut history = History::new();
        assert!(history.undo(&fs).unwrap().is_empty());
        assert!(history.redo(&fs).unwrap().is_empty());
        assert_eq!(history.undo_description(), None);
    }

    #[test]
    fn test_record_clears_redo() {
        let dir = TempDir::new().unwrap();
        let fs = RealFileSystem::new();
        let mut history = History::new();

        history.record(steps(dir.path(), &[("a", "b")]));
        history.undo(&fs).unwrap();
        assert!(history.can_redo());

        history.record(steps(dir.path(), &[("c", "d")]));
        assert!(!history.can_redo());
        assert!(history.redo(&fs).unwrap().is_empty());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let dir = TempDir::new().unwrap();
        let fs = RealFileSystem::new();
        let mut history = History::with_capacity(3);
        for i in 0..5 {
            let (from, to) = (format!("f{i}"), format!("g{i}"));
            history.record(steps(dir.path(), &[(from.as_str(), to.as_str())]));
        }

        let remaining: Vec<PathBuf> = history.undo_entries().map(|op| op.steps[0].from.clone()).collect();
        assert_eq!(remaining, vec![dir.path().join("f2"), dir.path().join("f3"), dir.path().join("f4")]);

        for _ in 0..3 {
            assert!(!history.undo(&fs).unwrap().is_empty());
        }
        // f0 and f1 were evicted
        assert!(history.undo(&fs).unwrap().is_empty());
    }

    #[test]
    fn test_ids_are_unique_and_reset_on_clear() {
        let mut history = History::new();
        let first = history.record(vec![RenameStep::new("/a", "/b")]).unwrap().id.clone();
        let second = history.record(vec![RenameStep::new("/c", "/d")]).unwrap().id.clone();
        assert_ne!(first, second);
        assert!(first.ends_with("_0"));
        assert!(second.ends_with("_1"));

        history.clear();
        assert!(!history.can_undo());
        let third = history.record(vec![RenameStep::new("/e", "/f")]).unwrap().id.clone();
        assert!(third.ends_with("_0"));
    }

    #[test]
    fn test_undo_recreates_missing_source_directory() {
        let dir = TempDir::new().unwrap();
        let fs = RealFileSystem::new();
        let mut history = History::new();
        let gone = dir.path().join("gone").join("deeper");
        history.record(vec![RenameStep::new(gone.join("a.txt"), dir.path().join("a.txt"))]);

        let undo = history.undo(&fs).unwrap();
        assert_eq!(undo[0].to, gone.join("a.txt"));
        assert!(gone.is_dir());
    }
}
