use crate::fs::{FileSystem, comparable_path, same_path};
use crate::models::{Context, FailedItem, Filename, Pipeline, RenameError, RenameMapping};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Why the planner refused a mapping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Conflict {
    /// An earlier mapping in the same batch already claimed this destination.
    DuplicateTarget { path: PathBuf },
    /// Something unrelated already lives at the destination.
    TargetExists { path: PathBuf },
}

impl From<Conflict> for RenameError {
    fn from(conflict: Conflict) -> Self {
        match conflict {
            Conflict::DuplicateTarget { path } => RenameError::DuplicateTarget { path },
            Conflict::TargetExists { path } => RenameError::TargetExists { path },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlannedRename {
    pub index: usize,
    pub mapping: RenameMapping,
    pub destination: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rejection {
    pub index: usize,
    pub mapping: RenameMapping,
    pub destination: PathBuf,
    pub conflict: Conflict,
}

/// The planner's verdict on a batch. Both halves keep input order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Plan {
    pub accepted: Vec<PlannedRename>,
    pub rejected: Vec<Rejection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewItem {
    pub original_path: PathBuf,
    pub new_path: PathBuf,
    pub conflicts: Vec<Conflict>,
}

impl Plan {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }

    /// Merges accepted and rejected entries back into input order.
    pub fn preview_items(&self) -> Vec<PreviewItem> {
        let mut items: Vec<(usize, PreviewItem)> = self
            .accepted
            .iter()
            .map(|p| {
                (p.index, PreviewItem {
                    original_path: p.mapping.source.clone(),
                    new_path: p.destination.clone(),
                    conflicts: Vec::new(),
                })
            })
            .chain(self.rejected.iter().map(|r| {
                (r.index, PreviewItem {
                    original_path: r.mapping.source.clone(),
                    new_path: r.destination.clone(),
                    conflicts: vec![r.conflict.clone()],
                })
            }))
            .collect();
        items.sort_by_key(|(index, _)| *index);
        items.into_iter().map(|(_, item)| item).collect()
    }
}

/// Where `new_name` lands: inside `target_dir` if given, else next to the source.
pub fn destination_for(source: &Path, new_name: &str, target_dir: Option<&Path>) -> PathBuf {
    match target_dir {
        Some(dir) => dir.join(new_name),
        None => source.with_file_name(new_name),
    }
}

/// Proposed names for a batch, plus the files that could not be named.
#[derive(Debug, Default)]
pub struct Transformed {
    pub mappings: Vec<RenameMapping>,
    pub skipped: Vec<FailedItem>,
}

pub struct Engine<'a, F: FileSystem> {
    fs: &'a F,
}

impl<'a, F: FileSystem + Sync> Engine<'a, F> {
    pub fn new(fs: &'a F) -> Self {
        Self { fs }
    }

    /// Computes the proposed name of every file, in input order.
    ///
    /// The pipeline is compiled once up front so an invalid pattern fails
    /// the whole request instead of each file. Files whose names are not
    /// valid UTF-8 are skipped and numbering continues over the rest.
    pub fn transform(
        &self,
        files: &[PathBuf],
        pipeline: &Pipeline,
    ) -> Result<Transformed, RenameError> {
        let compiled = pipeline.compile()?;

        let mut named = Vec::with_capacity(files.len());
        let mut skipped = Vec::new();
        for path in files {
            match Filename::from_path(path) {
                Ok(filename) => named.push((path, filename.to_string())),
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "skipping file");
                    skipped.push(FailedItem { source: path.clone(), error });
                }
            }
        }

        let mappings = named
            .par_iter()
            .enumerate()
            .map(|(index, (path, normalized))| {
                let new_name = compiled.apply(normalized, &Context { index });
                // A name the rules left alone keeps its on-disk form
                let new_name = match path.file_name().and_then(|n| n.to_str()) {
                    Some(raw) if new_name == *normalized => raw.to_string(),
                    _ => new_name,
                };
                RenameMapping::new((*path).clone(), new_name)
            })
            .collect();

        Ok(Transformed { mappings, skipped })
    }

    /// Checks a whole batch for conflicts without touching the disk.
    pub fn plan(
        &self,
        mappings: &[RenameMapping],
        target_dir: Option<&Path>,
    ) -> Result<Plan, RenameError> {
        if let Some(dir) = target_dir {
            if !self.fs.is_dir(dir) {
                return Err(RenameError::InvalidTargetDirectory { path: dir.to_path_buf() });
            }
        }

        let mut claimed: HashSet<PathBuf> = HashSet::new();
        let mut plan = Plan::default();

        for (index, mapping) in mappings.iter().enumerate() {
            let destination = destination_for(&mapping.source, &mapping.new_name, target_dir);
            let key = comparable_path(self.fs, &destination);

            let conflict = if claimed.contains(&key) {
                Some(Conflict::DuplicateTarget { path: destination.clone() })
            } else if self.fs.exists(&destination)
                && !same_path(self.fs, &destination, &mapping.source)
            {
                Some(Conflict::TargetExists { path: destination.clone() })
            } else {
                None
            };

            match conflict {
                Some(conflict) => {
                    tracing::debug!(source = %mapping.source.display(), ?conflict, "mapping rejected");
                    plan.rejected.push(Rejection {
                        index,
                        mapping: mapping.clone(),
                        destination,
                        conflict,
                    });
                }
                None => {
                    claimed.insert(key);
                    plan.accepted.push(PlannedRename {
                        index,
                        mapping: mapping.clone(),
                        destination,
                    });
                }
            }
        }

        tracing::info!(
            accepted = plan.accepted.len(),
            rejected = plan.rejected.len(),
            "batch planned"
        );
        Ok(plan)
    }
}
