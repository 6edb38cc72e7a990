//! Mapping projects persisted as JSON files.
//!
//! Each project is stored as `{identifier}.json` in the rules directory.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use semmap_engine::{RuleStore, StoreError};
use semmap_model::{MappingProject, generate_identifier};
use tracing::{debug, warn};

use crate::error::{Result, WorkspaceError};

/// File-system [`RuleStore`].
#[derive(Debug, Clone)]
pub struct JsonRuleStore {
    base_dir: PathBuf,
}

impl JsonRuleStore {
    /// Opens a store at `base_dir`, creating the directory if needed.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir).map_err(|err| WorkspaceError::io(&base_dir, err))?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn project_path(&self, identifier: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", normalize_id(identifier)))
    }

    fn write(&self, project: &MappingProject) -> Result<()> {
        let identifier = project
            .identifier()
            .ok_or(StoreError::MissingProjectIdentifier)?;
        let path = self.project_path(identifier);
        let json =
            serde_json::to_string_pretty(project).map_err(|err| WorkspaceError::json(&path, err))?;
        fs::write(&path, json).map_err(|err| WorkspaceError::io(&path, err))?;
        debug!(path = %path.display(), project = %project.name(), "wrote mapping project");
        Ok(())
    }

    fn read(&self, path: &Path) -> Result<Option<MappingProject>> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(WorkspaceError::io(path, err)),
        };
        let project = serde_json::from_str(&contents).map_err(|err| WorkspaceError::json(path, err))?;
        Ok(Some(project))
    }

    fn read_all(&self) -> Result<Vec<MappingProject>> {
        let entries =
            fs::read_dir(&self.base_dir).map_err(|err| WorkspaceError::io(&self.base_dir, err))?;
        let mut projects = Vec::new();
        for entry in entries {
            let path = entry.map_err(|err| WorkspaceError::io(&self.base_dir, err))?.path();
            if !path.is_file() || path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            match self.read(&path)? {
                Some(project) => projects.push(project),
                None => warn!(path = %path.display(), "mapping project vanished while listing"),
            }
        }
        projects.sort_by(|a, b| a.name().cmp(b.name()).then_with(|| a.identifier().cmp(&b.identifier())));
        Ok(projects)
    }
}

impl RuleStore for JsonRuleStore {
    fn add(&self, mut project: MappingProject) -> std::result::Result<MappingProject, StoreError> {
        project.assign_identifiers(generate_identifier);
        self.write(&project)?;
        Ok(project)
    }

    fn update(&self, project: &MappingProject) -> std::result::Result<(), StoreError> {
        let identifier = project
            .identifier()
            .ok_or(StoreError::MissingProjectIdentifier)?;
        if !self.project_path(identifier).is_file() {
            return Err(StoreError::UnknownProject(identifier.to_string()));
        }
        let mut project = project.clone();
        project.assign_identifiers(generate_identifier);
        self.write(&project)?;
        Ok(())
    }

    fn get(&self, identifier: &str) -> std::result::Result<Option<MappingProject>, StoreError> {
        Ok(self.read(&self.project_path(identifier))?)
    }

    fn get_all(&self) -> std::result::Result<Vec<MappingProject>, StoreError> {
        Ok(self.read_all()?)
    }

    fn delete(&self, identifier: &str) -> std::result::Result<bool, StoreError> {
        let path = self.project_path(identifier);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(WorkspaceError::io(&path, err).into()),
        }
    }
}

/// Keeps identifiers usable as file names.
fn normalize_id(id: &str) -> String {
    id.trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_become_safe_file_names() {
        assert_eq!(normalize_id("ab12"), "ab12");
        assert_eq!(normalize_id("../etc/passwd"), "___etc_passwd");
        assert_eq!(normalize_id(" a b "), "a_b");
    }
}
