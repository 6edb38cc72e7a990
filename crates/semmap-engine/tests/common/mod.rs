#![allow(dead_code)]

use std::sync::Arc;

use semmap_engine::{
    AttributeReferenceEvaluator, MappingService, MemoryCatalog, MemoryRowStore, MemoryRuleStore,
    RecordingPermissions, SchemaCatalog,
};
use semmap_model::{Attribute, AttributeType, EntityType, MappingProject, Row};

pub struct Fixture {
    pub catalog: Arc<MemoryCatalog>,
    pub rules: Arc<MemoryRuleStore>,
    pub permissions: Arc<RecordingPermissions>,
    pub service: MappingService,
}

impl Fixture {
    pub fn new(batch_size: usize) -> Self {
        let catalog = Arc::new(MemoryCatalog::new().with_package("base"));
        let rules = Arc::new(MemoryRuleStore::new());
        let permissions = Arc::new(RecordingPermissions::new());
        let service = MappingService::new(
            rules.clone(),
            catalog.clone(),
            Arc::new(AttributeReferenceEvaluator),
        )
        .with_permissions(permissions.clone())
        .with_batch_size(batch_size);
        Self {
            catalog,
            rules,
            permissions,
            service,
        }
    }

    pub fn add_repository(&self, schema: EntityType, rows: Vec<Row>) -> Arc<MemoryRowStore> {
        self.catalog
            .add_repository(schema, rows)
            .expect("register repository")
    }

    /// Stores a project mapping `source` into `target` with the given
    /// `(target attribute, expression)` pairs.
    pub fn project(
        &self,
        target: &str,
        sources: &[(&str, &[(&str, &str)])],
        depth: u32,
    ) -> MappingProject {
        let mut project = self
            .service
            .add_mapping_project("TestRun", target, depth)
            .expect("add project");
        let mapping_target = project.mapping_target_mut(target).expect("target");
        for (source, mappings) in sources {
            let source_type = self.catalog_entity_type(source);
            let entity_mapping = mapping_target.add_source(source_type).expect("add source");
            for (attribute, expression) in *mappings {
                entity_mapping
                    .add_attribute_mapping(attribute)
                    .expect("add attribute mapping")
                    .set_algorithm(*expression);
            }
        }
        self.service
            .update_mapping_project(&project)
            .expect("update project");
        let id = project.identifier().expect("project identifier");
        self.service
            .get_mapping_project(id)
            .expect("load project")
            .expect("stored project")
    }

    fn catalog_entity_type(&self, id: &str) -> EntityType {
        self.catalog.entity_type(id).expect("source entity type")
    }
}

pub fn gene_schema() -> EntityType {
    EntityType::new("Gene")
        .with_label("Genes")
        .with_id_attribute("id")
        .with_attribute(Attribute::new("id", AttributeType::String).with_nillable(false))
        .with_attribute(Attribute::new("length", AttributeType::Long))
}

pub fn exon_schema() -> EntityType {
    EntityType::new("Exon")
        .with_label("Exons")
        .with_id_attribute("id")
        .with_attribute(Attribute::new("id", AttributeType::String).with_nillable(false))
        .with_attribute(Attribute::new("length", AttributeType::Long))
}

pub fn hop_schema() -> EntityType {
    EntityType::new("HopEntity")
        .with_package("base")
        .with_id_attribute("identifier")
        .with_attribute(Attribute::new("identifier", AttributeType::String).with_nillable(false))
        .with_attribute(Attribute::new("height", AttributeType::Int))
}

pub fn source_rows(ids: &[(&str, i64)]) -> Vec<Row> {
    ids.iter()
        .map(|(id, length)| Row::new().with("id", *id).with("length", *length))
        .collect()
}

pub fn hop_rows(ids: &[(&str, i64)]) -> Vec<Row> {
    ids.iter()
        .map(|(id, height)| Row::new().with("identifier", *id).with("height", *height))
        .collect()
}

pub const GENE_TO_HOP: &[(&str, &str)] = &[("identifier", "id"), ("height", "length")];
