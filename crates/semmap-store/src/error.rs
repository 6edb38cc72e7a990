//! Error types for file-backed stores.

use std::path::{Path, PathBuf};

use semmap_engine::StoreError;
use semmap_model::ValueError;
use thiserror::Error;

/// Errors raised while reading or writing workspace files.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WorkspaceError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse JSON {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read CSV {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to parse TOML {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration in {path}: {message}")]
    InvalidConfig { path: PathBuf, message: String },

    #[error("invalid value for {attribute} in {path} row {row}: {source}")]
    Value {
        path: PathBuf,
        attribute: String,
        row: usize,
        #[source]
        source: ValueError,
    },

    #[error("CSV {path} has column {column} unknown to entity type {entity_type}")]
    UnknownColumn {
        path: PathBuf,
        entity_type: String,
        column: String,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WorkspaceError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn json(path: &Path, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn csv(path: &Path, source: csv::Error) -> Self {
        Self::Csv {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl From<WorkspaceError> for StoreError {
    fn from(err: WorkspaceError) -> Self {
        match err {
            WorkspaceError::Store(inner) => inner,
            other => StoreError::backend(other.to_string()),
        }
    }
}

/// Result type for workspace operations.
pub type Result<T> = std::result::Result<T, WorkspaceError>;
