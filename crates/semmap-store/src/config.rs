//! Workspace configuration read from `semmap.toml`.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use semmap_engine::{DEFAULT_BACKEND, MAPPING_BATCH_SIZE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, WorkspaceError};

/// File name of the configuration at the workspace root.
pub const CONFIG_FILENAME: &str = "semmap.toml";

/// Settings of one workspace. Every key is optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SemmapConfig {
    /// Source rows mapped and written per batch.
    pub batch_size: usize,
    /// Backend assigned to entity types that declare none.
    pub default_backend: String,
    /// Directory holding one JSON file per mapping project.
    pub rules_dir: PathBuf,
    pub catalog_file: PathBuf,
    /// Directory holding one CSV file per entity type.
    pub data_dir: PathBuf,
}

impl Default for SemmapConfig {
    fn default() -> Self {
        Self {
            batch_size: MAPPING_BATCH_SIZE,
            default_backend: DEFAULT_BACKEND.to_string(),
            rules_dir: PathBuf::from("rules"),
            catalog_file: PathBuf::from("catalog.json"),
            data_dir: PathBuf::from("data"),
        }
    }
}

impl SemmapConfig {
    /// Reads `semmap.toml` under `root`, falling back to defaults when the file
    /// does not exist.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILENAME);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no configuration file, using defaults");
                return Ok(Self::default());
            }
            Err(err) => return Err(WorkspaceError::io(&path, err)),
        };
        Self::parse(&content, &path)
    }

    /// Parses configuration text; `path` is only used in error messages.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|source| WorkspaceError::Toml {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate(path)?;
        Ok(config)
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn validate(&self, path: &Path) -> Result<()> {
        let invalid = |message: &str| WorkspaceError::InvalidConfig {
            path: path.to_path_buf(),
            message: message.to_string(),
        };
        if self.batch_size == 0 {
            return Err(invalid("batch_size must be at least 1"));
        }
        if self.default_backend.trim().is_empty() {
            return Err(invalid("default_backend must not be empty"));
        }
        Ok(())
    }

    pub fn rules_path(&self, root: &Path) -> PathBuf {
        root.join(&self.rules_dir)
    }

    pub fn catalog_path(&self, root: &Path) -> PathBuf {
        root.join(&self.catalog_file)
    }

    pub fn data_path(&self, root: &Path) -> PathBuf {
        root.join(&self.data_dir)
    }
}
