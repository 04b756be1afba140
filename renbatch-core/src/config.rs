use crate::fs::platform_case_insensitive;
use crate::history::DEFAULT_CAPACITY;
use crate::models::RenameError;
use crate::scan::FileFilter;
use crate::transaction::CrossDirMode;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings loaded from a JSON file. Missing fields keep their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How many batches each of the undo and redo stacks keeps.
    pub max_history: usize,
    pub cross_dir_mode: CrossDirMode,
    /// Compare names ignoring case when checking for collisions.
    pub case_insensitive: bool,
    pub filter: FileFilter,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_history: DEFAULT_CAPACITY,
            cross_dir_mode: CrossDirMode::default(),
            case_insensitive: platform_case_insensitive(),
            filter: FileFilter::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, RenameError> {
        let content = std::fs::read_to_string(path).map_err(|e| RenameError::from_io(path, e))?;
        Self::from_json(&content)
    }

    pub fn from_json(text: &str) -> Result<Self, RenameError> {
        let config: Config = serde_json::from_str(text)
            .map_err(|e| RenameError::Config { message: e.to_string() })?;
        if config.max_history == 0 {
            return Err(RenameError::Config {
                message: "max_history must be at least 1".to_string(),
            });
        }
        Ok(config)
    }
}
