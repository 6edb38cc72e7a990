use thiserror::Error;

use crate::schema::AttributeType;

/// Structural errors raised while editing the mapping rule model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ModelError {
    #[error("mapping project already contains a mapping target for entity type {target}")]
    TargetAlreadyExists { target: String },

    #[error("mapping target {target} already contains a mapping for source {source_entity}")]
    SourceAlreadyExists {
        target: String,
        source_entity: String,
    },

    #[error("entity type {entity_type} has no attribute named {attribute}")]
    UnknownAttribute {
        entity_type: String,
        attribute: String,
    },

    #[error("attribute {attribute} of {entity_type} is already mapped")]
    AttributeAlreadyMapped {
        entity_type: String,
        attribute: String,
    },

    #[error("entity type {entity_type} already declares attribute {attribute}")]
    DuplicateAttribute {
        entity_type: String,
        attribute: String,
    },

    #[error("unknown attribute type: {0}")]
    UnknownAttributeType(String),
}

/// A value could not be converted to, or parsed as, an attribute type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("value '{value}' is not compatible with type {data_type}")]
    Incompatible {
        data_type: AttributeType,
        value: String,
    },

    #[error("cannot parse '{text}' as {data_type}")]
    Unparseable {
        data_type: AttributeType,
        text: String,
    },

    #[error("value {value} is out of range for type {data_type}")]
    OutOfRange {
        data_type: AttributeType,
        value: String,
    },
}

pub type Result<T> = std::result::Result<T, ModelError>;
