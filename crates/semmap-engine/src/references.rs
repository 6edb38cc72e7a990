use std::collections::BTreeSet;

use semmap_model::{Attribute, EntityType};

use crate::traits::SchemaCatalog;

/// Names of the attributes of `schema` whose reference chain leads back to
/// `schema`, either directly or through other catalog entity types within
/// `max(depth, 1)` hops.
///
/// Rows of such a target can only be linked once every row exists, so these
/// attributes are written in a second pass.
pub fn self_referencing_attributes(
    schema: &EntityType,
    catalog: &dyn SchemaCatalog,
    depth: u32,
) -> BTreeSet<String> {
    let extra_hops = depth.max(1) - 1;
    schema
        .atomic_attributes()
        .filter_map(|attribute| attribute.reference().map(|target| (attribute, target)))
        .filter(|(_, target)| reaches(&schema.id, target, catalog, extra_hops))
        .map(|(attribute, _)| attribute.name.clone())
        .collect()
}

fn reaches(goal: &str, start: &str, catalog: &dyn SchemaCatalog, extra_hops: u32) -> bool {
    if start == goal {
        return true;
    }
    let mut seen = BTreeSet::from([start.to_string()]);
    let mut frontier = vec![start.to_string()];
    for _ in 0..extra_hops {
        let mut next = Vec::new();
        for id in &frontier {
            let Some(entity_type) = catalog.entity_type(id) else {
                continue;
            };
            for target in entity_type.atomic_attributes().filter_map(Attribute::reference) {
                if target == goal {
                    return true;
                }
                if seen.insert(target.to_string()) {
                    next.push(target.to_string());
                }
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }
    false
}
