//! A directory of entity types and their rows.
//!
//! `catalog.json` lists packages, backends and entity types. Rows of each
//! non-abstract entity type live in `{data_dir}/{id}.csv`, one column per
//! atomic attribute. Loading fills a [`MemoryCatalog`]; [`Workspace::save`]
//! writes back the repositories a run changed or created.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use semmap_engine::{MemoryCatalog, RowStore, SchemaCatalog};
use semmap_model::{EntityType, Row, Value};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::SemmapConfig;
use crate::error::{Result, WorkspaceError};
use crate::rules::JsonRuleStore;

/// Serialized form of `catalog.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub packages: Vec<String>,
    #[serde(default)]
    pub backends: Vec<String>,
    #[serde(default)]
    pub entity_types: Vec<EntityType>,
}

#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    config: SemmapConfig,
    catalog: Arc<MemoryCatalog>,
}

impl Workspace {
    /// Opens the workspace at `root` using its `semmap.toml`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let config = SemmapConfig::load(&root)?;
        Self::open_with_config(root, config)
    }

    /// Opens the workspace at `root` with an explicit configuration. A missing
    /// catalog file yields an empty catalog.
    pub fn open_with_config(root: impl Into<PathBuf>, config: SemmapConfig) -> Result<Self> {
        let root = root.into();
        let catalog_path = config.catalog_path(&root);
        let file = read_catalog_file(&catalog_path)?;

        let mut catalog = MemoryCatalog::new().with_default_backend(config.default_backend.clone());
        for backend in &file.backends {
            catalog = catalog.with_backend(backend.clone());
        }
        for package in &file.packages {
            catalog = catalog.with_package(package.clone());
        }

        let data_dir = config.data_path(&root);
        let mut rows_loaded = 0;
        for schema in file.entity_types {
            if schema.is_abstract {
                catalog.add_entity_type(schema)?;
                continue;
            }
            let path = data_file(&data_dir, &schema.id);
            let rows = if path.is_file() {
                read_csv_rows(&path, &schema)?
            } else {
                Vec::new()
            };
            rows_loaded += rows.len();
            catalog.add_repository(schema, rows)?;
        }

        info!(
            root = %root.display(),
            entity_types = catalog.entity_types().len(),
            rows = rows_loaded,
            "opened workspace"
        );
        Ok(Self {
            root,
            config,
            catalog: Arc::new(catalog),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &SemmapConfig {
        &self.config
    }

    pub fn catalog(&self) -> Arc<MemoryCatalog> {
        Arc::clone(&self.catalog)
    }

    /// The project store of this workspace.
    pub fn rule_store(&self) -> Result<JsonRuleStore> {
        JsonRuleStore::new(self.config.rules_path(&self.root))
    }

    /// Writes the catalog file and the CSV files of repositories that were
    /// written to, edited, or have no file yet.
    pub fn save(&self) -> Result<()> {
        let file = CatalogFile {
            packages: self.catalog.packages(),
            backends: self.catalog.backends(),
            entity_types: self.catalog.entity_types(),
        };
        let catalog_path = self.config.catalog_path(&self.root);
        if let Some(parent) = catalog_path.parent() {
            fs::create_dir_all(parent).map_err(|err| WorkspaceError::io(parent, err))?;
        }
        let json = serde_json::to_string_pretty(&file)
            .map_err(|err| WorkspaceError::json(&catalog_path, err))?;
        fs::write(&catalog_path, json).map_err(|err| WorkspaceError::io(&catalog_path, err))?;

        let data_dir = self.config.data_path(&self.root);
        fs::create_dir_all(&data_dir).map_err(|err| WorkspaceError::io(&data_dir, err))?;
        for store in self.catalog.stores() {
            let schema = store.entity_type();
            let path = data_file(&data_dir, &schema.id);
            if !store.is_modified() && path.is_file() {
                debug!(path = %path.display(), "unchanged, not rewritten");
                continue;
            }
            write_csv_rows(&path, &schema, &store.rows())?;
        }
        info!(root = %self.root.display(), "saved workspace");
        Ok(())
    }
}

fn read_catalog_file(path: &Path) -> Result<CatalogFile> {
    match fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents).map_err(|err| WorkspaceError::json(path, err)),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "no catalog file, starting empty");
            Ok(CatalogFile::default())
        }
        Err(err) => Err(WorkspaceError::io(path, err)),
    }
}

fn data_file(data_dir: &Path, id: &str) -> PathBuf {
    let stem: String = id
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    data_dir.join(format!("{stem}.csv"))
}

/// Reads rows of `schema` from a CSV file with a header line.
///
/// Every column must name an attribute of `schema`; atomic attributes without
/// a column are `Null`. Cells are parsed with [`Value::parse`].
pub fn read_csv_rows(path: &Path, schema: &EntityType) -> Result<Vec<Row>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|err| WorkspaceError::csv(path, err))?;
    let headers = reader
        .headers()
        .map_err(|err| WorkspaceError::csv(path, err))?
        .clone();

    let mut columns = Vec::with_capacity(headers.len());
    for header in &headers {
        let attribute = schema
            .attribute(header.trim())
            .ok_or_else(|| WorkspaceError::UnknownColumn {
                path: path.to_path_buf(),
                entity_type: schema.id.clone(),
                column: header.to_string(),
            })?;
        columns.push(attribute);
    }

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|err| WorkspaceError::csv(path, err))?;
        let mut row: Row = schema
            .atomic_attributes()
            .map(|attribute| (attribute.name.clone(), Value::Null))
            .collect();
        for (attribute, cell) in columns.iter().zip(record.iter()) {
            let value = Value::parse(cell, attribute.data_type).map_err(|source| {
                WorkspaceError::Value {
                    path: path.to_path_buf(),
                    attribute: attribute.name.clone(),
                    row: index + 1,
                    source,
                }
            })?;
            row.set(attribute.name.clone(), value);
        }
        rows.push(row);
    }
    debug!(path = %path.display(), rows = rows.len(), "read rows");
    Ok(rows)
}

/// Writes `rows` as CSV with one column per atomic attribute of `schema`, in
/// declaration order. `Null` is written as an empty cell.
pub fn write_csv_rows(path: &Path, schema: &EntityType, rows: &[Row]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).map_err(|err| WorkspaceError::csv(path, err))?;
    let names: Vec<&str> = schema
        .atomic_attributes()
        .map(|attribute| attribute.name.as_str())
        .collect();
    writer
        .write_record(&names)
        .map_err(|err| WorkspaceError::csv(path, err))?;
    for row in rows {
        writer
            .write_record(names.iter().map(|name| row.value(name).to_string()))
            .map_err(|err| WorkspaceError::csv(path, err))?;
    }
    writer.flush().map_err(|err| WorkspaceError::io(path, err))?;
    debug!(path = %path.display(), rows = rows.len(), "wrote rows");
    Ok(())
}
