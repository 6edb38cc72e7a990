//! File-backed collaborators for the mapping engine.
//!
//! A workspace directory holds `semmap.toml`, the entity type catalog, one CSV
//! file of rows per entity type and one JSON file per mapping project.

pub mod config;
pub mod error;
pub mod rules;
pub mod workspace;

pub use config::{CONFIG_FILENAME, SemmapConfig};
pub use error::{Result, WorkspaceError};
pub use rules::JsonRuleStore;
pub use workspace::{CatalogFile, Workspace, read_csv_rows, write_csv_rows};
