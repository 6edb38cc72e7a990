//! Collaborator interfaces the mapping service is composed from.
//!
//! Every collaborator takes `&self`; implementations that hold state use
//! interior mutability and are shared behind `Arc`.

use std::sync::Arc;

use semmap_model::{Attribute, AttributeMapping, EntityType, MappingProject, Row, Value, ValueError};

use crate::error::{EvaluationError, StoreError};

/// Lazily produced groups of rows. Each item is at most `batch_size` rows.
pub type RowBatches<'a> = Box<dyn Iterator<Item = Result<Vec<Row>, StoreError>> + 'a>;

/// Persistence of mapping projects.
pub trait RuleStore: Send + Sync {
    /// Stores a new project, assigning identifiers to every node lacking
    /// one, and returns the stored project.
    fn add(&self, project: MappingProject) -> Result<MappingProject, StoreError>;

    fn update(&self, project: &MappingProject) -> Result<(), StoreError>;

    fn get(&self, identifier: &str) -> Result<Option<MappingProject>, StoreError>;

    fn get_all(&self) -> Result<Vec<MappingProject>, StoreError>;

    /// Returns false when no project has the identifier.
    fn delete(&self, identifier: &str) -> Result<bool, StoreError>;
}

/// Registry of entity types, packages and their row stores.
pub trait SchemaCatalog: Send + Sync {
    fn entity_type(&self, id: &str) -> Option<EntityType>;

    fn entity_types(&self) -> Vec<EntityType>;

    fn has_package(&self, id: &str) -> bool;

    fn has_repository(&self, id: &str) -> bool;

    fn repository(&self, id: &str) -> Option<Arc<dyn RowStore>>;

    /// Creates an empty row store for `schema` on the schema's backend.
    fn create_repository(&self, schema: EntityType) -> Result<Arc<dyn RowStore>, StoreError>;

    fn delete_repository(&self, id: &str) -> Result<(), StoreError>;

    fn add_attribute(&self, entity_type: &str, attribute: Attribute) -> Result<(), StoreError>;

    fn remove_attribute(&self, entity_type: &str, attribute: &str) -> Result<(), StoreError>;
}

/// Rows of one entity type.
pub trait RowStore: Send + Sync {
    fn entity_type(&self) -> EntityType;

    fn count(&self) -> Result<u64, StoreError>;

    /// Streams every row in groups of `batch_size`. Each call starts from the
    /// first row.
    fn batches(&self, batch_size: usize) -> RowBatches<'_>;

    /// Rows whose identity matches one of `ids`, in store order.
    fn find_by_ids(&self, ids: &[Value]) -> Result<Vec<Row>, StoreError>;

    /// Appends rows and returns how many were written.
    fn add(&self, rows: Vec<Row>) -> Result<usize, StoreError>;

    /// Inserts rows, replacing existing rows with the same identity.
    fn upsert_batch(&self, rows: Vec<Row>) -> Result<(), StoreError>;
}

/// Evaluates one attribute mapping against one source row.
pub trait ExpressionEvaluator: Send + Sync {
    fn evaluate(
        &self,
        mapping: &AttributeMapping,
        source_row: &Row,
        source_type: &EntityType,
        depth: u32,
    ) -> Result<Value, EvaluationError>;
}

/// Creates an empty target row with declared defaults populated.
pub trait RowConstructor: Send + Sync {
    fn create(&self, schema: &EntityType) -> Result<Row, ValueError>;
}

/// Grants the invoking principal write access on newly created metadata.
pub trait PermissionGranter: Send + Sync {
    fn grant_write_metadata(&self, schema: &EntityType) -> Result<(), StoreError>;
}

/// Push-style progress reporting for a single run.
pub trait ProgressSink {
    fn set_max(&self, max: u64);

    fn status(&self, message: &str);

    fn increment(&self, units: u64);
}
