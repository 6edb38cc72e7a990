use semmap_model::{Attribute, AttributeType, EntityType, MappingTarget};

use crate::error::{MappingError, Result};
use crate::traits::SchemaCatalog;

/// Provenance attribute recording which source entity type produced a row.
pub const SOURCE_ATTRIBUTE: &str = "source";

/// The provenance attribute appended to merged targets.
pub fn source_attribute() -> Attribute {
    Attribute::new(SOURCE_ATTRIBUTE, AttributeType::String).with_nillable(true)
}

/// Derives the entity type of a new target repository from a mapping target.
///
/// The label defaults to `id` and the package to the mapping target's own
/// package. References from the mapping target to itself are pointed at
/// `id`. The provenance attribute is appended only when requested.
pub fn create_target_metadata(
    catalog: &dyn SchemaCatalog,
    mapping_target: &MappingTarget,
    id: &str,
    package_id: Option<&str>,
    label: Option<&str>,
    add_source_attribute: bool,
) -> Result<EntityType> {
    let mut schema = mapping_target.target().clone();
    schema.id = id.to_string();
    schema.label = label.unwrap_or(id).to_string();
    schema.is_abstract = false;

    if let Some(package) = package_id {
        if !catalog.has_package(package) {
            return Err(MappingError::UnknownPackage(package.to_string()));
        }
        schema.package = Some(package.to_string());
    }

    let self_references: Vec<String> = mapping_target
        .target()
        .direct_self_references()
        .map(|attribute| attribute.name.clone())
        .collect();
    for name in &self_references {
        if let Some(attribute) = schema.attribute_mut(name) {
            attribute.ref_entity = Some(id.to_string());
        }
    }

    if add_source_attribute && !schema.has_attribute(SOURCE_ATTRIBUTE) {
        schema.add_attribute(source_attribute())?;
    }
    Ok(schema)
}
