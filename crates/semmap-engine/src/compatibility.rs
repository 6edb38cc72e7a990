use semmap_model::EntityType;

use crate::error::CompatibilityError;

/// Checks that `candidate` can receive rows shaped like `mapping_target`.
///
/// Attributes of the mapping target are visited in declaration order and the
/// first violation is returned. A reference from the mapping target to itself
/// matches a reference from the candidate to itself.
pub fn check_compatible(
    candidate: &EntityType,
    mapping_target: &EntityType,
) -> Result<(), CompatibilityError> {
    for expected in mapping_target.atomic_attributes() {
        let Some(actual) = candidate.attribute(&expected.name) else {
            return Err(CompatibilityError::MissingAttribute {
                attribute: expected.name.clone(),
            });
        };

        if expected.data_type != actual.data_type {
            return Err(CompatibilityError::TypeMismatch {
                attribute: expected.name.clone(),
                expected: expected.data_type,
                actual: actual.data_type,
            });
        }

        if !expected.data_type.is_reference() {
            continue;
        }
        let expected_ref = expected.ref_entity.as_deref().unwrap_or_default();
        let actual_ref = actual.ref_entity.as_deref().unwrap_or_default();
        let both_self = expected_ref == mapping_target.id && actual_ref == candidate.id;
        if expected_ref != actual_ref && !both_self {
            return Err(CompatibilityError::ReferenceMismatch {
                attribute: expected.name.clone(),
                data_type: expected.data_type,
                expected: expected_ref.to_string(),
                actual: actual_ref.to_string(),
            });
        }
    }
    Ok(())
}
