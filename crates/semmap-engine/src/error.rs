//! Error types for the mapping engine and its collaborators.

use semmap_model::{AttributeType, ModelError, ValueError};
use thiserror::Error;

/// A candidate target schema is not structurally assignable from a mapping
/// target. Messages are user facing and stable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompatibilityError {
    #[error("Target repository does not contain the following attribute: {attribute}")]
    MissingAttribute { attribute: String },

    #[error(
        "attribute {attribute} in the mapping target is type {expected} while attribute \
         {attribute} in the target repository is type {actual}. Please make sure the types \
         are the same"
    )]
    TypeMismatch {
        attribute: String,
        expected: AttributeType,
        actual: AttributeType,
    },

    #[error(
        "In the mapping target, attribute {attribute} of type {data_type} has reference \
         entity {expected} while in the target repository attribute {attribute} of type \
         {data_type} has reference entity {actual}. Please make sure the reference entities \
         of your mapping target are pointing towards the same reference entities as your \
         target repository"
    )]
    ReferenceMismatch {
        attribute: String,
        data_type: AttributeType,
        expected: String,
        actual: String,
    },
}

/// Failure evaluating one attribute mapping against one source row.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluationError {
    #[error("unknown source attribute: {0}")]
    UnknownSourceAttribute(String),

    #[error("invalid expression '{expression}': {reason}")]
    InvalidExpression { expression: String, reason: String },

    #[error(transparent)]
    Value(#[from] ValueError),

    #[error("{0}")]
    Custom(String),
}

/// Errors raised by rule stores, schema catalogs and row stores.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("unknown backend: {0}")]
    UnknownBackend(String),

    #[error("unknown repository: {0}")]
    UnknownRepository(String),

    #[error("repository already exists: {0}")]
    RepositoryExists(String),

    #[error("unknown mapping project: {0}")]
    UnknownProject(String),

    #[error("mapping project has no identifier")]
    MissingProjectIdentifier,

    #[error("entity type {entity_type} has no usable row identity")]
    MissingIdentity { entity_type: String },

    #[error("duplicate identity {id} in {entity_type}")]
    DuplicateIdentity { entity_type: String, id: String },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("{message}")]
    Backend { message: String },
}

impl StoreError {
    pub fn backend(message: impl Into<String>) -> Self {
        StoreError::Backend {
            message: message.into(),
        }
    }
}

/// Coarse classification of a [`MappingError`] for callers that only need to
/// decide how to report it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    SchemaConflict,
    CompatibilityViolation,
    UnknownBackend,
    EvaluationFailure,
    NotFound,
    Storage,
}

/// Errors surfaced by the mapping service.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MappingError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Incompatible(#[from] CompatibilityError),

    #[error("unknown backend: {backend}")]
    UnknownBackend { backend: String },

    #[error("unknown mapping project: {0}")]
    UnknownProject(String),

    #[error("unknown entity type: {0}")]
    UnknownEntityType(String),

    #[error("unknown package: {0}")]
    UnknownPackage(String),

    #[error("mapping project {project} has no mapping target{}", for_target(.target))]
    NoMappingTarget {
        project: String,
        target: Option<String>,
    },

    #[error("target repository {0} already exists")]
    TargetExists(String),

    #[error("failed to map attribute {attribute} from source {source_entity}: {source}")]
    Evaluation {
        attribute: String,
        source_entity: String,
        #[source]
        source: EvaluationError,
    },

    #[error("invalid default value in entity type {entity_type}: {source}")]
    InvalidDefault {
        entity_type: String,
        #[source]
        source: ValueError,
    },

    #[error(transparent)]
    Store(StoreError),
}

fn for_target(target: &Option<String>) -> String {
    target
        .as_deref()
        .map(|t| format!(" for {t}"))
        .unwrap_or_default()
}

impl From<StoreError> for MappingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UnknownBackend(backend) => MappingError::UnknownBackend { backend },
            StoreError::UnknownProject(id) => MappingError::UnknownProject(id),
            other => MappingError::Store(other),
        }
    }
}

impl MappingError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            MappingError::Model(err) => match err {
                ModelError::UnknownAttribute { .. } | ModelError::UnknownAttributeType(_) => {
                    ErrorCategory::NotFound
                }
                _ => ErrorCategory::SchemaConflict,
            },
            MappingError::TargetExists(_) => ErrorCategory::SchemaConflict,
            MappingError::Incompatible(_) => ErrorCategory::CompatibilityViolation,
            MappingError::UnknownBackend { .. } => ErrorCategory::UnknownBackend,
            MappingError::Evaluation { .. } | MappingError::InvalidDefault { .. } => {
                ErrorCategory::EvaluationFailure
            }
            MappingError::UnknownProject(_)
            | MappingError::UnknownEntityType(_)
            | MappingError::UnknownPackage(_)
            | MappingError::NoMappingTarget { .. } => ErrorCategory::NotFound,
            MappingError::Store(err) => match err {
                StoreError::RepositoryExists(_) | StoreError::DuplicateIdentity { .. } => {
                    ErrorCategory::SchemaConflict
                }
                StoreError::UnknownRepository(_) => ErrorCategory::NotFound,
                _ => ErrorCategory::Storage,
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, MappingError>;
