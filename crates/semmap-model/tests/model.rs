use semmap_model::{
    AlgorithmState, Attribute, AttributeType, EntityType, MappingProject, ModelError, Row, Value,
};

fn gene() -> EntityType {
    EntityType::new("Gene")
        .with_label("Gene")
        .with_package("base")
        .with_id_attribute("identifier")
        .with_attribute(Attribute::new("identifier", AttributeType::String).with_nillable(false))
        .with_attribute(Attribute::new("length", AttributeType::Long))
}

#[test]
fn duplicate_target_is_rejected_without_overwrite() {
    let mut project = MappingProject::new("genes", 3);
    project
        .add_target(gene())
        .expect("first target")
        .add_source(EntityType::new("HopEntity"))
        .expect("source");

    let err = project.add_target(gene()).unwrap_err();
    assert_eq!(
        err,
        ModelError::TargetAlreadyExists {
            target: "Gene".to_string()
        }
    );
    let target = project.mapping_target("Gene").expect("target kept");
    assert_eq!(target.entity_mappings().len(), 1);
}

#[test]
fn duplicate_source_is_rejected() {
    let mut project = MappingProject::new("genes", 0);
    let target = project.add_target(gene()).expect("target");
    target.add_source(EntityType::new("HopEntity")).expect("source");
    let err = target.add_source(EntityType::new("HopEntity")).unwrap_err();
    assert!(matches!(err, ModelError::SourceAlreadyExists { .. }));
}

#[test]
fn entity_mapping_name_and_label_come_from_source() {
    let mut project = MappingProject::new("genes", 0);
    let mapping = project
        .add_target(gene())
        .expect("target")
        .add_source(EntityType::new("hop_entity").with_label("Hop Entity"))
        .expect("source");
    assert_eq!(mapping.name(), "hop_entity");
    assert_eq!(mapping.label(), "Hop Entity");
    assert_eq!(mapping.target().id, "Gene");
}

#[test]
fn project_serializes_round_trip() {
    let mut project = MappingProject::new("genes", 2);
    project.set_identifier("p1");
    let entity = project
        .add_target(gene())
        .expect("target")
        .add_source(EntityType::new("HopEntity"))
        .expect("source");
    entity
        .add_attribute_mapping("length")
        .expect("mapping")
        .set_algorithm("$('len').value()")
        .set_algorithm_state(AlgorithmState::Curated)
        .set_source_attributes(["len"]);

    let json = serde_json::to_string_pretty(&project).expect("serialize project");
    assert!(json.contains("\"CURATED\""));
    assert!(json.contains("\"LONG\""));
    let round: MappingProject = serde_json::from_str(&json).expect("deserialize project");
    assert_eq!(round, project);
}

#[test]
fn values_serialize_with_type_tags() {
    let row = Row::new()
        .with("identifier", "g1")
        .with("length", 12_i64)
        .with("tags", Value::List(vec![Value::text("a")]));
    let json = serde_json::to_value(&row).expect("serialize row");
    assert_eq!(json["length"]["type"], "int");
    assert_eq!(json["length"]["value"], 12);
    assert_eq!(json["tags"]["type"], "list");
    let round: Row = serde_json::from_value(json).expect("deserialize row");
    assert_eq!(round, row);
}

#[test]
fn entity_type_defaults_when_deserializing() {
    let ty: EntityType = serde_json::from_str(
        r#"{"id":"Country","label":"Country","attributes":[{"name":"code","data_type":"STRING"}]}"#,
    )
    .expect("deserialize entity type");
    assert!(!ty.is_abstract);
    assert!(ty.attribute("code").expect("code").nillable);
    assert_eq!(ty.package, None);
}
