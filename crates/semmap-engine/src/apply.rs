//! Applying a mapping project to a target repository.
//!
//! A run resolves (or creates) the target repository, validates it against the
//! mapping target, reports the progress ceiling and then streams every source
//! in batches. Each batch is written with a single insert or upsert call and
//! reported as one unit of progress. When the target references itself, the
//! referencing attributes are left empty in the first pass and patched onto the
//! stored rows in a second pass.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;

use semmap_model::{
    Attribute, AttributeMapping, EntityMapping, EntityType, MappingTarget, ModelError, Row, Value,
};
use tracing::{debug, info, info_span, warn};

use crate::builder::{SOURCE_ATTRIBUTE, source_attribute};
use crate::compatibility::check_compatible;
use crate::error::{EvaluationError, MappingError, Result, StoreError};
use crate::references::self_referencing_attributes;
use crate::service::MappingService;
use crate::traits::{ProgressSink, RowStore};

/// Parameters of one mapping run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyRequest {
    pub project_id: String,
    /// Identifier of the target repository to write to.
    pub target_id: String,
    pub create_new: bool,
    pub package_id: Option<String>,
    pub label: Option<String>,
    /// `None` adds the provenance attribute to new targets fed by more than
    /// one source.
    pub add_source_attribute: Option<bool>,
    /// Mapping target to apply; the first one of the project when unset.
    pub mapping_target: Option<String>,
}

impl ApplyRequest {
    pub fn new(project_id: impl Into<String>, target_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            target_id: target_id.into(),
            create_new: false,
            package_id: None,
            label: None,
            add_source_attribute: None,
            mapping_target: None,
        }
    }

    #[must_use]
    pub fn with_create_new(mut self, create_new: bool) -> Self {
        self.create_new = create_new;
        self
    }

    #[must_use]
    pub fn with_package(mut self, package_id: impl Into<String>) -> Self {
        self.package_id = Some(package_id.into());
        self
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn with_source_attribute(mut self, add: bool) -> Self {
        self.add_source_attribute = Some(add);
        self
    }

    #[must_use]
    pub fn with_mapping_target(mut self, target: impl Into<String>) -> Self {
        self.mapping_target = Some(target.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    Insert,
    Upsert,
}

impl MappingService {
    /// Applies a project's mapping target to a target repository and returns
    /// the number of source rows mapped.
    pub fn apply_mappings(&self, request: &ApplyRequest, progress: &dyn ProgressSink) -> Result<u64> {
        let project = self.require_project(&request.project_id)?;
        let mapping_target = match request.mapping_target.as_deref() {
            Some(id) => project.mapping_target(id),
            None => project.mapping_targets().first(),
        }
        .ok_or_else(|| MappingError::NoMappingTarget {
            project: project.name().to_string(),
            target: request.mapping_target.clone(),
        })?;

        let span = info_span!(
            "apply_mappings",
            project = %project.name(),
            target = %request.target_id
        );
        let _guard = span.enter();
        let started = Instant::now();
        let depth = project.depth();

        progress.status(&format!(
            "Checking target repository [{}]...",
            request.target_id
        ));
        let target_store = self.resolve_target(mapping_target, request)?;
        let target_schema = target_store.entity_type();

        let max = self.calculate_max_progress(mapping_target, depth)?;
        progress.set_max(max);

        let deferred =
            self_referencing_attributes(mapping_target.target(), self.catalog.as_ref(), depth);
        let target_name = mapping_target.name();
        progress.status(&format!("Applying mappings to repository [{target_name}]"));

        let mut total = 0;
        for entity_mapping in mapping_target.entity_mappings() {
            total += self.map_source(
                entity_mapping,
                target_store.as_ref(),
                &target_schema,
                progress,
                depth,
                &deferred,
            )?;
        }

        if !deferred.is_empty() {
            progress.status(
                "Self reference found, applying the mapping for a second time to set references",
            );
            for entity_mapping in mapping_target.entity_mappings() {
                self.resolve_references(
                    entity_mapping,
                    target_store.as_ref(),
                    &target_schema,
                    progress,
                    depth,
                    &deferred,
                )?;
            }
        }

        progress.status(&format!(
            "Done applying mappings to repository [{target_name}]"
        ));
        info!(
            rows = total,
            sources = mapping_target.entity_mappings().len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "applied mappings"
        );
        Ok(total)
    }

    /// Maps every row of one source into `target_store` and returns the
    /// number of rows mapped.
    pub fn apply_mapping_to_repo(
        &self,
        entity_mapping: &EntityMapping,
        target_store: &dyn RowStore,
        progress: &dyn ProgressSink,
        depth: u32,
    ) -> Result<u64> {
        let target_schema = target_store.entity_type();
        self.map_source(
            entity_mapping,
            target_store,
            &target_schema,
            progress,
            depth,
            &BTreeSet::new(),
        )
    }

    /// Transforms one source row into a row of `target_schema`.
    pub fn apply_mapping_to_entity(
        &self,
        entity_mapping: &EntityMapping,
        source_row: &Row,
        target_schema: &EntityType,
        depth: u32,
    ) -> Result<Row> {
        self.map_row(entity_mapping, source_row, target_schema, depth, &BTreeSet::new())
    }

    fn resolve_target(
        &self,
        mapping_target: &MappingTarget,
        request: &ApplyRequest,
    ) -> Result<Arc<dyn RowStore>> {
        let target_id = request.target_id.as_str();
        if request.create_new {
            if self.catalog.has_repository(target_id) {
                return Err(MappingError::TargetExists(target_id.to_string()));
            }
            let add_source = request
                .add_source_attribute
                .unwrap_or(mapping_target.entity_mappings().len() > 1);
            let schema = self.create_target_metadata(
                mapping_target,
                target_id,
                request.package_id.as_deref(),
                request.label.as_deref(),
                add_source,
            )?;
            let store = self.catalog.create_repository(schema)?;
            self.permissions.grant_write_metadata(&store.entity_type())?;
            info!(target = target_id, add_source, "created target repository");
            return Ok(store);
        }

        let store = self
            .catalog
            .repository(target_id)
            .ok_or_else(|| MappingError::UnknownEntityType(target_id.to_string()))?;
        check_compatible(&store.entity_type(), mapping_target.target())?;

        let has_source = store.entity_type().has_attribute(SOURCE_ATTRIBUTE);
        match request.add_source_attribute {
            Some(true) if !has_source => {
                self.catalog.add_attribute(target_id, source_attribute())?;
                info!(target = target_id, "added provenance attribute");
            }
            Some(false) if has_source => {
                self.catalog.remove_attribute(target_id, SOURCE_ATTRIBUTE)?;
                warn!(target = target_id, "removed provenance attribute and its values");
            }
            _ => {}
        }
        Ok(store)
    }

    fn map_source(
        &self,
        entity_mapping: &EntityMapping,
        target_store: &dyn RowStore,
        target_schema: &EntityType,
        progress: &dyn ProgressSink,
        depth: u32,
        deferred: &BTreeSet<String>,
    ) -> Result<u64> {
        let source_store = self.source_store(entity_mapping)?;
        let label = entity_mapping.label();
        progress.status(&format!("Mapping source [{label}]..."));

        let mut mode = None;
        let mut count = 0u64;
        for batch in source_store.batches(self.batch_size) {
            let batch = batch?;
            let rows = batch
                .iter()
                .map(|row| self.map_row(entity_mapping, row, target_schema, depth, deferred))
                .collect::<Result<Vec<_>>>()?;

            let write_mode = match mode {
                Some(mode) => mode,
                None => {
                    let decided = if target_store.count()? == 0 {
                        WriteMode::Insert
                    } else {
                        WriteMode::Upsert
                    };
                    mode = Some(decided);
                    decided
                }
            };
            count += rows.len() as u64;
            debug!(
                source = entity_mapping.name(),
                rows = rows.len(),
                mode = ?write_mode,
                "writing batch"
            );
            match write_mode {
                WriteMode::Insert => {
                    target_store.add(rows)?;
                }
                WriteMode::Upsert => target_store.upsert_batch(rows)?,
            }
            progress.increment(1);
        }

        progress.status(&format!("Mapped {count} [{label}] entities."));
        Ok(count)
    }

    /// Second pass for self-referencing targets: re-evaluates the deferred
    /// attributes and patches them onto the stored rows by identity.
    fn resolve_references(
        &self,
        entity_mapping: &EntityMapping,
        target_store: &dyn RowStore,
        target_schema: &EntityType,
        progress: &dyn ProgressSink,
        depth: u32,
        deferred: &BTreeSet<String>,
    ) -> Result<u64> {
        let source_store = self.source_store(entity_mapping)?;
        let label = entity_mapping.label();
        let patched: Vec<&AttributeMapping> = entity_mapping
            .attribute_mappings()
            .iter()
            .filter(|mapping| deferred.contains(&mapping.target_attribute))
            .collect();
        progress.status(&format!("Resolving references from source [{label}]..."));

        let mut count = 0u64;
        for batch in source_store.batches(self.batch_size) {
            let batch = batch?;
            count += batch.len() as u64;
            if patched.is_empty() {
                progress.increment(1);
                continue;
            }

            let mut updates = Vec::with_capacity(batch.len());
            for source_row in &batch {
                let mapped = self.map_row(
                    entity_mapping,
                    source_row,
                    target_schema,
                    depth,
                    &BTreeSet::new(),
                )?;
                let id = mapped.id_value(target_schema).cloned().ok_or_else(|| {
                    StoreError::MissingIdentity {
                        entity_type: target_schema.id.clone(),
                    }
                })?;
                updates.push((id, mapped));
            }

            let ids: Vec<Value> = updates.iter().map(|(id, _)| id.clone()).collect();
            let mut stored: HashMap<String, Row> = target_store
                .find_by_ids(&ids)?
                .into_iter()
                .filter_map(|row| {
                    let key = row.id_value(target_schema)?.key();
                    Some((key, row))
                })
                .collect();

            let rows: Vec<Row> = updates
                .into_iter()
                .map(|(id, mapped)| match stored.remove(&id.key()) {
                    Some(mut row) => {
                        for mapping in &patched {
                            let name = mapping.target_attribute.as_str();
                            row.set(name, mapped.value(name).clone());
                        }
                        row
                    }
                    None => mapped,
                })
                .collect();
            debug!(
                source = entity_mapping.name(),
                rows = rows.len(),
                "patching self references"
            );
            target_store.upsert_batch(rows)?;
            progress.increment(1);
        }

        progress.status(&format!("Resolved references for {count} [{label}] entities."));
        Ok(count)
    }

    fn map_row(
        &self,
        entity_mapping: &EntityMapping,
        source_row: &Row,
        target_schema: &EntityType,
        depth: u32,
        deferred: &BTreeSet<String>,
    ) -> Result<Row> {
        let mut row = self
            .constructor
            .create(target_schema)
            .map_err(|source| MappingError::InvalidDefault {
                entity_type: target_schema.id.clone(),
                source,
            })?;
        if target_schema.has_attribute(SOURCE_ATTRIBUTE) {
            row.set(SOURCE_ATTRIBUTE, entity_mapping.name());
        }

        for mapping in entity_mapping.attribute_mappings() {
            let attribute = target_schema
                .attribute(&mapping.target_attribute)
                .ok_or_else(|| ModelError::UnknownAttribute {
                    entity_type: target_schema.id.clone(),
                    attribute: mapping.target_attribute.clone(),
                })?;
            let value = if deferred.contains(&attribute.name) {
                Value::Null
            } else {
                self.evaluate(entity_mapping, mapping, attribute, source_row, depth)?
            };
            row.set(attribute.name.clone(), value);
        }
        Ok(row)
    }

    fn evaluate(
        &self,
        entity_mapping: &EntityMapping,
        mapping: &AttributeMapping,
        attribute: &Attribute,
        source_row: &Row,
        depth: u32,
    ) -> Result<Value> {
        self.evaluator
            .evaluate(mapping, source_row, entity_mapping.source(), depth)
            .and_then(|value| {
                value
                    .coerce_to(attribute.data_type)
                    .map_err(EvaluationError::from)
            })
            .map_err(|source| MappingError::Evaluation {
                attribute: attribute.name.clone(),
                source_entity: entity_mapping.name().to_string(),
                source,
            })
    }

    fn source_store(&self, entity_mapping: &EntityMapping) -> Result<Arc<dyn RowStore>> {
        self.catalog
            .repository(entity_mapping.name())
            .ok_or_else(|| MappingError::UnknownEntityType(entity_mapping.name().to_string()))
    }
}
