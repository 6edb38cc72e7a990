//! The mapping service facade.

use std::sync::Arc;

use semmap_model::{EntityType, MappingProject, MappingTarget};
use tracing::{debug, info};

use crate::builder;
use crate::compatibility::check_compatible;
use crate::error::{MappingError, Result};
use crate::memory::{DefaultRowConstructor, NoPermissions};
use crate::progress::{MAPPING_BATCH_SIZE, estimate_units};
use crate::references::self_referencing_attributes;
use crate::traits::{
    ExpressionEvaluator, PermissionGranter, RowConstructor, RuleStore, SchemaCatalog,
};

/// Manages mapping projects and applies them to target repositories.
///
/// All collaborators are passed in explicitly.
pub struct MappingService {
    pub(crate) rules: Arc<dyn RuleStore>,
    pub(crate) catalog: Arc<dyn SchemaCatalog>,
    pub(crate) evaluator: Arc<dyn ExpressionEvaluator>,
    pub(crate) constructor: Arc<dyn RowConstructor>,
    pub(crate) permissions: Arc<dyn PermissionGranter>,
    pub(crate) batch_size: usize,
}

impl MappingService {
    pub fn new(
        rules: Arc<dyn RuleStore>,
        catalog: Arc<dyn SchemaCatalog>,
        evaluator: Arc<dyn ExpressionEvaluator>,
    ) -> Self {
        Self {
            rules,
            catalog,
            evaluator,
            constructor: Arc::new(DefaultRowConstructor),
            permissions: Arc::new(NoPermissions),
            batch_size: MAPPING_BATCH_SIZE,
        }
    }

    #[must_use]
    pub fn with_row_constructor(mut self, constructor: Arc<dyn RowConstructor>) -> Self {
        self.constructor = constructor;
        self
    }

    #[must_use]
    pub fn with_permissions(mut self, permissions: Arc<dyn PermissionGranter>) -> Self {
        self.permissions = permissions;
        self
    }

    /// Sets the number of source rows per batch; zero is treated as one.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn catalog(&self) -> &dyn SchemaCatalog {
        self.catalog.as_ref()
    }

    /// Creates and stores a project with a single target.
    pub fn add_mapping_project(
        &self,
        name: &str,
        target_id: &str,
        depth: u32,
    ) -> Result<MappingProject> {
        let target = self.require_entity_type(target_id)?;
        let mut project = MappingProject::new(name, depth);
        project.add_target(target)?;
        let stored = self.rules.add(project)?;
        info!(
            project = %stored.name(),
            id = stored.identifier().unwrap_or_default(),
            target = target_id,
            "added mapping project"
        );
        Ok(stored)
    }

    pub fn get_mapping_project(&self, identifier: &str) -> Result<Option<MappingProject>> {
        Ok(self.rules.get(identifier)?)
    }

    pub fn get_all_mapping_projects(&self) -> Result<Vec<MappingProject>> {
        Ok(self.rules.get_all()?)
    }

    pub fn update_mapping_project(&self, project: &MappingProject) -> Result<()> {
        self.rules.update(project)?;
        Ok(())
    }

    pub fn delete_mapping_project(&self, identifier: &str) -> Result<()> {
        if !self.rules.delete(identifier)? {
            return Err(MappingError::UnknownProject(identifier.to_string()));
        }
        info!(id = identifier, "deleted mapping project");
        Ok(())
    }

    /// Stores an independent copy of a project under fresh identifiers.
    pub fn clone_mapping_project(&self, identifier: &str) -> Result<MappingProject> {
        let mut project = self.require_project(identifier)?;
        project.remove_identifiers();
        Ok(self.rules.add(project)?)
    }

    /// Like [`clone_mapping_project`](Self::clone_mapping_project), renaming
    /// the copy.
    pub fn clone_mapping_project_as(&self, identifier: &str, name: &str) -> Result<MappingProject> {
        let mut project = self.require_project(identifier)?;
        project.remove_identifiers();
        project.set_name(name);
        Ok(self.rules.add(project)?)
    }

    /// Adds a target to a stored project. A target for the same entity type
    /// is a schema conflict.
    pub fn add_target(&self, project_id: &str, target_id: &str) -> Result<MappingProject> {
        let mut project = self.require_project(project_id)?;
        let target = self.require_entity_type(target_id)?;
        project.add_target(target)?;
        self.rules.update(&project)?;
        self.require_project(project_id)
    }

    /// Derives the entity type of a new target repository, see
    /// [`builder::create_target_metadata`].
    pub fn create_target_metadata(
        &self,
        mapping_target: &MappingTarget,
        id: &str,
        package_id: Option<&str>,
        label: Option<&str>,
        add_source_attribute: bool,
    ) -> Result<EntityType> {
        builder::create_target_metadata(
            self.catalog.as_ref(),
            mapping_target,
            id,
            package_id,
            label,
            add_source_attribute,
        )
    }

    /// Number of work units a run of `mapping_target` reports: one per batch
    /// per source, at least one per source, doubled for self-referencing
    /// targets.
    pub fn calculate_max_progress(&self, mapping_target: &MappingTarget, depth: u32) -> Result<u64> {
        let mut row_counts = Vec::with_capacity(mapping_target.entity_mappings().len());
        for entity_mapping in mapping_target.entity_mappings() {
            let source = self
                .catalog
                .repository(entity_mapping.name())
                .ok_or_else(|| MappingError::UnknownEntityType(entity_mapping.name().to_string()))?;
            row_counts.push(source.count()?);
        }
        let self_referencing =
            !self_referencing_attributes(mapping_target.target(), self.catalog.as_ref(), depth)
                .is_empty();
        let units = estimate_units(row_counts, self.batch_size, self_referencing);
        debug!(target = mapping_target.name(), units, self_referencing, "estimated progress");
        Ok(units)
    }

    /// Non-abstract catalog entity types `schema` can be mapped into. The
    /// schema itself is always part of the result.
    pub fn get_compatible_entity_types(&self, schema: &EntityType) -> Vec<EntityType> {
        let mut compatible: Vec<EntityType> = self
            .catalog
            .entity_types()
            .into_iter()
            .filter(|candidate| !candidate.is_abstract)
            .filter(|candidate| check_compatible(candidate, schema).is_ok())
            .collect();
        if !compatible.iter().any(|candidate| candidate.id == schema.id) {
            compatible.insert(0, schema.clone());
        }
        compatible
    }

    pub(crate) fn require_project(&self, identifier: &str) -> Result<MappingProject> {
        self.rules
            .get(identifier)?
            .ok_or_else(|| MappingError::UnknownProject(identifier.to_string()))
    }

    fn require_entity_type(&self, id: &str) -> Result<EntityType> {
        self.catalog
            .entity_type(id)
            .ok_or_else(|| MappingError::UnknownEntityType(id.to_string()))
    }
}
