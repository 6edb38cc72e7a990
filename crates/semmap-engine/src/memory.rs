//! In-memory collaborators.
//!
//! These back the tests and the command line workspace, which loads files into
//! a [`MemoryCatalog`] and writes them back after a run.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use semmap_model::{
    Attribute, EntityType, MappingProject, ModelError, Row, Value, ValueError, generate_identifier,
};

use crate::error::StoreError;
use crate::traits::{
    PermissionGranter, RowBatches, RowConstructor, RowStore, RuleStore, SchemaCatalog,
};

/// Name of the backend used when an entity type declares none.
pub const DEFAULT_BACKEND: &str = "memory";

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Mapping projects kept in a map keyed by identifier.
#[derive(Debug, Default)]
pub struct MemoryRuleStore {
    projects: RwLock<BTreeMap<String, MappingProject>>,
}

impl MemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RuleStore for MemoryRuleStore {
    fn add(&self, mut project: MappingProject) -> Result<MappingProject, StoreError> {
        project.assign_identifiers(generate_identifier);
        let id = project
            .identifier()
            .ok_or(StoreError::MissingProjectIdentifier)?
            .to_string();
        write(&self.projects).insert(id, project.clone());
        Ok(project)
    }

    fn update(&self, project: &MappingProject) -> Result<(), StoreError> {
        let id = project
            .identifier()
            .ok_or(StoreError::MissingProjectIdentifier)?;
        let mut projects = write(&self.projects);
        let Some(stored) = projects.get_mut(id) else {
            return Err(StoreError::UnknownProject(id.to_string()));
        };
        let mut project = project.clone();
        project.assign_identifiers(generate_identifier);
        *stored = project;
        Ok(())
    }

    fn get(&self, identifier: &str) -> Result<Option<MappingProject>, StoreError> {
        Ok(read(&self.projects).get(identifier).cloned())
    }

    fn get_all(&self) -> Result<Vec<MappingProject>, StoreError> {
        let mut projects: Vec<MappingProject> = read(&self.projects).values().cloned().collect();
        projects.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(projects)
    }

    fn delete(&self, identifier: &str) -> Result<bool, StoreError> {
        Ok(write(&self.projects).remove(identifier).is_some())
    }
}

/// A write call observed by a [`MemoryRowStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteCall {
    Add(usize),
    Upsert(usize),
}

/// Rows of one entity type held in insertion order.
#[derive(Debug)]
pub struct MemoryRowStore {
    schema: RwLock<EntityType>,
    rows: RwLock<Vec<Row>>,
    writes: Mutex<Vec<WriteCall>>,
    modified: AtomicBool,
}

impl MemoryRowStore {
    pub fn new(schema: EntityType) -> Self {
        Self {
            schema: RwLock::new(schema),
            rows: RwLock::new(Vec::new()),
            writes: Mutex::new(Vec::new()),
            modified: AtomicBool::new(false),
        }
    }

    /// Seeds the store without recording a write call.
    #[must_use]
    pub fn with_rows(self, rows: Vec<Row>) -> Self {
        *write(&self.rows) = rows;
        self
    }

    pub fn id(&self) -> String {
        read(&self.schema).id.clone()
    }

    /// Snapshot of the stored rows.
    pub fn rows(&self) -> Vec<Row> {
        read(&self.rows).clone()
    }

    pub fn write_calls(&self) -> Vec<WriteCall> {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// True once rows were written or the schema was edited after seeding.
    pub fn is_modified(&self) -> bool {
        self.modified.load(Ordering::Acquire)
    }

    fn record(&self, call: WriteCall) {
        self.modified.store(true, Ordering::Release);
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    fn identity_key(schema: &EntityType, row: &Row) -> Option<String> {
        row.id_value(schema).map(Value::key)
    }

    fn update_schema(
        &self,
        edit: impl FnOnce(&mut EntityType) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        edit(&mut *write(&self.schema))?;
        self.modified.store(true, Ordering::Release);
        Ok(())
    }
}

impl RowStore for MemoryRowStore {
    fn entity_type(&self) -> EntityType {
        read(&self.schema).clone()
    }

    fn count(&self) -> Result<u64, StoreError> {
        Ok(read(&self.rows).len() as u64)
    }

    fn batches(&self, batch_size: usize) -> RowBatches<'_> {
        let batch_size = batch_size.max(1);
        let mut offset = 0;
        Box::new(std::iter::from_fn(move || {
            let rows = read(&self.rows);
            if offset >= rows.len() {
                return None;
            }
            let end = (offset + batch_size).min(rows.len());
            let batch = rows[offset..end].to_vec();
            offset = end;
            Some(Ok(batch))
        }))
    }

    fn find_by_ids(&self, ids: &[Value]) -> Result<Vec<Row>, StoreError> {
        let schema = read(&self.schema);
        let wanted: HashSet<String> = ids.iter().map(Value::key).collect();
        Ok(read(&self.rows)
            .iter()
            .filter(|row| {
                Self::identity_key(&schema, row).is_some_and(|key| wanted.contains(&key))
            })
            .cloned()
            .collect())
    }

    fn add(&self, rows: Vec<Row>) -> Result<usize, StoreError> {
        let schema = read(&self.schema);
        let mut stored = write(&self.rows);
        let mut seen: HashSet<String> = stored
            .iter()
            .filter_map(|row| Self::identity_key(&schema, row))
            .collect();
        for row in &rows {
            if let Some(key) = Self::identity_key(&schema, row)
                && !seen.insert(key.clone())
            {
                return Err(StoreError::DuplicateIdentity {
                    entity_type: schema.id.clone(),
                    id: key,
                });
            }
        }
        let written = rows.len();
        stored.extend(rows);
        self.record(WriteCall::Add(written));
        Ok(written)
    }

    fn upsert_batch(&self, rows: Vec<Row>) -> Result<(), StoreError> {
        let schema = read(&self.schema);
        let mut stored = write(&self.rows);
        let mut positions: BTreeMap<String, usize> = stored
            .iter()
            .enumerate()
            .filter_map(|(index, row)| Self::identity_key(&schema, row).map(|key| (key, index)))
            .collect();
        let written = rows.len();
        for row in rows {
            let Some(key) = Self::identity_key(&schema, &row) else {
                return Err(StoreError::MissingIdentity {
                    entity_type: schema.id.clone(),
                });
            };
            match positions.get(&key) {
                Some(&index) => stored[index] = row,
                None => {
                    positions.insert(key, stored.len());
                    stored.push(row);
                }
            }
        }
        self.record(WriteCall::Upsert(written));
        Ok(())
    }
}

/// Entity types, packages and row stores held in memory.
#[derive(Debug)]
pub struct MemoryCatalog {
    default_backend: String,
    backends: RwLock<BTreeSet<String>>,
    packages: RwLock<BTreeSet<String>>,
    schemas: RwLock<BTreeMap<String, EntityType>>,
    stores: RwLock<BTreeMap<String, Arc<MemoryRowStore>>>,
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self {
            default_backend: DEFAULT_BACKEND.to_string(),
            backends: RwLock::new(BTreeSet::from([DEFAULT_BACKEND.to_string()])),
            packages: RwLock::new(BTreeSet::new()),
            schemas: RwLock::new(BTreeMap::new()),
            stores: RwLock::new(BTreeMap::new()),
        }
    }

    /// Sets the backend assigned to entity types without one. The backend is
    /// registered as well.
    #[must_use]
    pub fn with_default_backend(mut self, backend: impl Into<String>) -> Self {
        let backend = backend.into();
        write(&self.backends).insert(backend.clone());
        self.default_backend = backend;
        self
    }

    #[must_use]
    pub fn with_backend(self, backend: impl Into<String>) -> Self {
        write(&self.backends).insert(backend.into());
        self
    }

    #[must_use]
    pub fn with_package(self, package: impl Into<String>) -> Self {
        write(&self.packages).insert(package.into());
        self
    }

    pub fn default_backend(&self) -> &str {
        &self.default_backend
    }

    pub fn backends(&self) -> Vec<String> {
        read(&self.backends).iter().cloned().collect()
    }

    pub fn packages(&self) -> Vec<String> {
        read(&self.packages).iter().cloned().collect()
    }

    /// Registers an entity type that has no rows of its own, such as an
    /// abstract parent.
    pub fn add_entity_type(&self, schema: EntityType) -> Result<(), StoreError> {
        if self.contains(&schema.id) {
            return Err(StoreError::RepositoryExists(schema.id));
        }
        write(&self.schemas).insert(schema.id.clone(), schema);
        Ok(())
    }

    /// Registers an entity type together with its rows.
    pub fn add_repository(
        &self,
        schema: EntityType,
        rows: Vec<Row>,
    ) -> Result<Arc<MemoryRowStore>, StoreError> {
        let schema = self.assign_backend(schema)?;
        if self.contains(&schema.id) {
            return Err(StoreError::RepositoryExists(schema.id));
        }
        let store = Arc::new(MemoryRowStore::new(schema).with_rows(rows));
        write(&self.stores).insert(store.id(), Arc::clone(&store));
        Ok(store)
    }

    /// The concrete store for `id`.
    pub fn store(&self, id: &str) -> Option<Arc<MemoryRowStore>> {
        read(&self.stores).get(id).cloned()
    }

    pub fn stores(&self) -> Vec<Arc<MemoryRowStore>> {
        read(&self.stores).values().cloned().collect()
    }

    fn contains(&self, id: &str) -> bool {
        read(&self.schemas).contains_key(id) || read(&self.stores).contains_key(id)
    }

    fn assign_backend(&self, mut schema: EntityType) -> Result<EntityType, StoreError> {
        let backend = schema
            .backend
            .get_or_insert_with(|| self.default_backend.clone());
        if !read(&self.backends).contains(backend.as_str()) {
            return Err(StoreError::UnknownBackend(backend.clone()));
        }
        Ok(schema)
    }

    fn edit_entity_type(
        &self,
        id: &str,
        edit: impl FnOnce(&mut EntityType) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        if let Some(store) = self.store(id) {
            return store.update_schema(edit);
        }
        match write(&self.schemas).get_mut(id) {
            Some(schema) => edit(schema),
            None => Err(StoreError::UnknownRepository(id.to_string())),
        }
    }
}

impl SchemaCatalog for MemoryCatalog {
    fn entity_type(&self, id: &str) -> Option<EntityType> {
        if let Some(store) = self.store(id) {
            return Some(store.entity_type());
        }
        read(&self.schemas).get(id).cloned()
    }

    fn entity_types(&self) -> Vec<EntityType> {
        let mut all: Vec<EntityType> = read(&self.stores)
            .values()
            .map(|store| store.entity_type())
            .chain(read(&self.schemas).values().cloned())
            .collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    fn has_package(&self, id: &str) -> bool {
        read(&self.packages).contains(id)
    }

    fn has_repository(&self, id: &str) -> bool {
        read(&self.stores).contains_key(id)
    }

    fn repository(&self, id: &str) -> Option<Arc<dyn RowStore>> {
        self.store(id).map(|store| store as Arc<dyn RowStore>)
    }

    fn create_repository(&self, schema: EntityType) -> Result<Arc<dyn RowStore>, StoreError> {
        let store = self.add_repository(schema, Vec::new())?;
        Ok(store as Arc<dyn RowStore>)
    }

    fn delete_repository(&self, id: &str) -> Result<(), StoreError> {
        match write(&self.stores).remove(id) {
            Some(_) => Ok(()),
            None => Err(StoreError::UnknownRepository(id.to_string())),
        }
    }

    fn add_attribute(&self, entity_type: &str, attribute: Attribute) -> Result<(), StoreError> {
        self.edit_entity_type(entity_type, |schema| {
            schema.add_attribute(attribute).map_err(StoreError::from)
        })
    }

    fn remove_attribute(&self, entity_type: &str, attribute: &str) -> Result<(), StoreError> {
        self.edit_entity_type(entity_type, |schema| {
            schema.remove_attribute(attribute).map(|_| ()).ok_or_else(|| {
                StoreError::Model(ModelError::UnknownAttribute {
                    entity_type: schema.id.clone(),
                    attribute: attribute.to_string(),
                })
            })
        })
    }
}

/// Builds rows with every atomic attribute present, set to its parsed
/// default or `Null`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRowConstructor;

impl RowConstructor for DefaultRowConstructor {
    fn create(&self, schema: &EntityType) -> Result<Row, ValueError> {
        let mut row = Row::new();
        for attribute in schema.atomic_attributes() {
            let value = match attribute.default_value.as_deref() {
                Some(text) => Value::parse(text, attribute.data_type)?,
                None => Value::Null,
            };
            row.set(attribute.name.clone(), value);
        }
        Ok(row)
    }
}

/// Grants nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPermissions;

impl PermissionGranter for NoPermissions {
    fn grant_write_metadata(&self, _schema: &EntityType) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Remembers the entity types write access was granted on.
#[derive(Debug, Default)]
pub struct RecordingPermissions {
    granted: Mutex<Vec<String>>,
}

impl RecordingPermissions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn granted(&self) -> Vec<String> {
        self.granted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl PermissionGranter for RecordingPermissions {
    fn grant_write_metadata(&self, schema: &EntityType) -> Result<(), StoreError> {
        self.granted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(schema.id.clone());
        Ok(())
    }
}
