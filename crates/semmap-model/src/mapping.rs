//! The mapping rule model: projects, targets, entity mappings and attribute
//! mappings.
//!
//! A [`MappingProject`] owns one [`MappingTarget`] per target entity type. Each
//! target owns one [`EntityMapping`] per source entity type, and each entity
//! mapping owns one [`AttributeMapping`] per mapped target attribute.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::schema::EntityType;

/// Curation state of an attribute mapping algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlgorithmState {
    Curated,
    GeneratedHigh,
    GeneratedLow,
    Discuss,
}

/// How one target attribute is computed from a source row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeMapping {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    pub target_attribute: String,
    #[serde(default)]
    pub algorithm: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm_state: Option<AlgorithmState>,
    /// Source attributes the algorithm reads. Informational only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_attributes: Vec<String>,
}

impl AttributeMapping {
    pub fn new(target_attribute: impl Into<String>) -> Self {
        Self {
            identifier: None,
            target_attribute: target_attribute.into(),
            algorithm: String::new(),
            algorithm_state: None,
            source_attributes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.algorithm = algorithm.into();
        self
    }

    pub fn set_algorithm(&mut self, algorithm: impl Into<String>) -> &mut Self {
        self.algorithm = algorithm.into();
        self
    }

    pub fn set_algorithm_state(&mut self, state: AlgorithmState) -> &mut Self {
        self.algorithm_state = Some(state);
        self
    }

    pub fn set_source_attributes<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source_attributes = names.into_iter().map(Into::into).collect();
        self
    }
}

/// The rules mapping one source entity type onto a target entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMapping {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    source: EntityType,
    target: EntityType,
    #[serde(default)]
    attribute_mappings: Vec<AttributeMapping>,
}

impl EntityMapping {
    pub fn new(source: EntityType, target: EntityType) -> Self {
        Self {
            identifier: None,
            source,
            target,
            attribute_mappings: Vec::new(),
        }
    }

    /// Source entity type id.
    pub fn name(&self) -> &str {
        &self.source.id
    }

    /// Source entity type label.
    pub fn label(&self) -> &str {
        &self.source.label
    }

    pub fn source(&self) -> &EntityType {
        &self.source
    }

    pub fn target(&self) -> &EntityType {
        &self.target
    }

    pub fn attribute_mappings(&self) -> &[AttributeMapping] {
        &self.attribute_mappings
    }

    pub fn attribute_mapping(&self, target_attribute: &str) -> Option<&AttributeMapping> {
        self.attribute_mappings
            .iter()
            .find(|m| m.target_attribute == target_attribute)
    }

    pub fn attribute_mapping_mut(&mut self, target_attribute: &str) -> Option<&mut AttributeMapping> {
        self.attribute_mappings
            .iter_mut()
            .find(|m| m.target_attribute == target_attribute)
    }

    /// Adds a mapping for `target_attribute`, which must be an attribute of
    /// the target entity type and not yet mapped.
    pub fn add_attribute_mapping(&mut self, target_attribute: &str) -> Result<&mut AttributeMapping> {
        if !self.target.has_attribute(target_attribute) {
            return Err(ModelError::UnknownAttribute {
                entity_type: self.target.id.clone(),
                attribute: target_attribute.to_string(),
            });
        }
        if self.attribute_mapping(target_attribute).is_some() {
            return Err(ModelError::AttributeAlreadyMapped {
                entity_type: self.target.id.clone(),
                attribute: target_attribute.to_string(),
            });
        }
        self.attribute_mappings
            .push(AttributeMapping::new(target_attribute));
        let index = self.attribute_mappings.len() - 1;
        Ok(&mut self.attribute_mappings[index])
    }

    pub fn remove_attribute_mapping(&mut self, target_attribute: &str) -> Option<AttributeMapping> {
        let index = self
            .attribute_mappings
            .iter()
            .position(|m| m.target_attribute == target_attribute)?;
        Some(self.attribute_mappings.remove(index))
    }

    fn remove_identifiers(&mut self) {
        self.identifier = None;
        for mapping in &mut self.attribute_mappings {
            mapping.identifier = None;
        }
    }

    fn assign_identifiers(&mut self, generate: &mut dyn FnMut() -> String) {
        self.identifier.get_or_insert_with(&mut *generate);
        for mapping in &mut self.attribute_mappings {
            mapping.identifier.get_or_insert_with(&mut *generate);
        }
    }
}

/// All entity mappings that feed one target entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    target: EntityType,
    #[serde(default)]
    entity_mappings: Vec<EntityMapping>,
}

impl MappingTarget {
    pub fn new(target: EntityType) -> Self {
        Self {
            identifier: None,
            target,
            entity_mappings: Vec::new(),
        }
    }

    pub fn target(&self) -> &EntityType {
        &self.target
    }

    /// Target entity type id.
    pub fn name(&self) -> &str {
        &self.target.id
    }

    pub fn entity_mappings(&self) -> &[EntityMapping] {
        &self.entity_mappings
    }

    pub fn entity_mappings_mut(&mut self) -> &mut [EntityMapping] {
        &mut self.entity_mappings
    }

    pub fn mapping_for_source(&self, source_id: &str) -> Option<&EntityMapping> {
        self.entity_mappings.iter().find(|m| m.name() == source_id)
    }

    pub fn mapping_for_source_mut(&mut self, source_id: &str) -> Option<&mut EntityMapping> {
        self.entity_mappings.iter_mut().find(|m| m.name() == source_id)
    }

    pub fn add_source(&mut self, source: EntityType) -> Result<&mut EntityMapping> {
        if self.mapping_for_source(&source.id).is_some() {
            return Err(ModelError::SourceAlreadyExists {
                target: self.target.id.clone(),
                source_entity: source.id,
            });
        }
        self.entity_mappings
            .push(EntityMapping::new(source, self.target.clone()));
        let index = self.entity_mappings.len() - 1;
        Ok(&mut self.entity_mappings[index])
    }

    pub fn remove_source(&mut self, source_id: &str) -> Option<EntityMapping> {
        let index = self
            .entity_mappings
            .iter()
            .position(|m| m.name() == source_id)?;
        Some(self.entity_mappings.remove(index))
    }

    /// True when the target entity type references itself directly.
    pub fn has_direct_self_references(&self) -> bool {
        self.target.has_direct_self_reference()
    }

    pub fn remove_identifiers(&mut self) {
        self.identifier = None;
        for mapping in &mut self.entity_mappings {
            mapping.remove_identifiers();
        }
    }

    fn assign_identifiers(&mut self, generate: &mut dyn FnMut() -> String) {
        self.identifier.get_or_insert_with(&mut *generate);
        for mapping in &mut self.entity_mappings {
            mapping.assign_identifiers(generate);
        }
    }
}

/// A named set of mapping targets, evaluated to a reference depth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingProject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    identifier: Option<String>,
    name: String,
    #[serde(default)]
    depth: u32,
    #[serde(default)]
    targets: Vec<MappingTarget>,
}

impl MappingProject {
    pub fn new(name: impl Into<String>, depth: u32) -> Self {
        Self {
            identifier: None,
            name: name.into(),
            depth,
            targets: Vec::new(),
        }
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    pub fn set_identifier(&mut self, identifier: impl Into<String>) {
        self.identifier = Some(identifier.into());
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn set_depth(&mut self, depth: u32) {
        self.depth = depth;
    }

    /// Adds a target for `target`. An existing target for the same entity
    /// type is never overwritten.
    pub fn add_target(&mut self, target: EntityType) -> Result<&mut MappingTarget> {
        if self.mapping_target(&target.id).is_some() {
            return Err(ModelError::TargetAlreadyExists { target: target.id });
        }
        self.targets.push(MappingTarget::new(target));
        let index = self.targets.len() - 1;
        Ok(&mut self.targets[index])
    }

    pub fn remove_target(&mut self, target_id: &str) -> Option<MappingTarget> {
        let index = self.targets.iter().position(|t| t.name() == target_id)?;
        Some(self.targets.remove(index))
    }

    pub fn mapping_target(&self, target_id: &str) -> Option<&MappingTarget> {
        self.targets.iter().find(|t| t.name() == target_id)
    }

    pub fn mapping_target_mut(&mut self, target_id: &str) -> Option<&mut MappingTarget> {
        self.targets.iter_mut().find(|t| t.name() == target_id)
    }

    pub fn mapping_targets(&self) -> &[MappingTarget] {
        &self.targets
    }

    pub fn mapping_targets_mut(&mut self) -> &mut [MappingTarget] {
        &mut self.targets
    }

    /// Clears every identifier in the project tree, so that storing the
    /// project again creates a copy.
    pub fn remove_identifiers(&mut self) {
        self.identifier = None;
        for target in &mut self.targets {
            target.remove_identifiers();
        }
    }

    /// Fills every missing identifier in the project tree.
    pub fn assign_identifiers(&mut self, mut generate: impl FnMut() -> String) {
        let generate: &mut dyn FnMut() -> String = &mut generate;
        self.identifier.get_or_insert_with(&mut *generate);
        for target in &mut self.targets {
            target.assign_identifiers(generate);
        }
    }
}
