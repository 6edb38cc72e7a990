mod common;

use common::{
    Fixture, GENE_TO_HOP, exon_schema, gene_schema, hop_rows, hop_schema, source_rows,
};
use semmap_engine::{
    ApplyRequest, ErrorCategory, MappingError, ProgressEvent, RecordingProgress, RowStore,
    SchemaCatalog, WriteCall,
};
use semmap_model::{Attribute, AttributeType, EntityType, ModelError, Row, Value};

fn project_id(project: &semmap_model::MappingProject) -> String {
    project.identifier().expect("stored project").to_string()
}

#[test]
fn inserts_into_empty_target() {
    let fx = Fixture::new(2);
    fx.add_repository(gene_schema(), source_rows(&[("0", 0), ("1", 2)]));
    let hop = fx.add_repository(hop_schema(), Vec::new());
    let project = fx.project("HopEntity", &[("Gene", GENE_TO_HOP)], 3);

    let progress = RecordingProgress::new();
    let mapped = fx
        .service
        .apply_mappings(&ApplyRequest::new(project_id(&project), "HopEntity"), &progress)
        .expect("apply");

    assert_eq!(mapped, 2);
    assert_eq!(hop.write_calls(), vec![WriteCall::Add(2)]);
    assert_eq!(hop.rows(), hop_rows(&[("0", 0), ("1", 2)]));
    insta::assert_snapshot!(progress.transcript(), @r"
    status Checking target repository [HopEntity]...
    max 1
    status Applying mappings to repository [HopEntity]
    status Mapping source [Genes]...
    increment 1
    status Mapped 2 [Genes] entities.
    status Done applying mappings to repository [HopEntity]
    ");
}

#[test]
fn upserts_into_non_empty_target() {
    let fx = Fixture::new(2);
    fx.add_repository(gene_schema(), source_rows(&[("0", 0), ("1", 2)]));
    let hop = fx.add_repository(hop_schema(), hop_rows(&[("0", 5), ("1", 5)]));
    let project = fx.project("HopEntity", &[("Gene", GENE_TO_HOP)], 3);

    let progress = RecordingProgress::new();
    let mapped = fx
        .service
        .apply_mappings(&ApplyRequest::new(project_id(&project), "HopEntity"), &progress)
        .expect("apply");

    assert_eq!(mapped, 2);
    assert_eq!(hop.write_calls(), vec![WriteCall::Upsert(2)]);
    assert_eq!(hop.rows(), hop_rows(&[("0", 0), ("1", 2)]));
    assert!(
        progress
            .statuses()
            .iter()
            .any(|status| status.contains("Mapped 2"))
    );
}

#[test]
fn re_running_converges_without_duplicates() {
    let fx = Fixture::new(2);
    fx.add_repository(gene_schema(), source_rows(&[("0", 0), ("1", 2), ("2", 4)]));
    let hop = fx.add_repository(hop_schema(), Vec::new());
    let project = fx.project("HopEntity", &[("Gene", GENE_TO_HOP)], 0);
    let request = ApplyRequest::new(project_id(&project), "HopEntity");

    fx.service
        .apply_mappings(&request, &RecordingProgress::new())
        .expect("first run");
    let after_first = hop.rows();
    fx.service
        .apply_mappings(&request, &RecordingProgress::new())
        .expect("second run");

    assert_eq!(hop.rows(), after_first);
    assert_eq!(hop.count().unwrap(), 3);
    assert_eq!(
        hop.write_calls(),
        vec![
            WriteCall::Add(2),
            WriteCall::Add(1),
            WriteCall::Upsert(2),
            WriteCall::Upsert(1)
        ]
    );
}

#[test]
fn write_mode_is_decided_once_per_source() {
    let fx = Fixture::new(1);
    fx.add_repository(gene_schema(), source_rows(&[("a", 1), ("b", 2), ("c", 3)]));
    let hop = fx.add_repository(hop_schema(), Vec::new());
    let project = fx.project("HopEntity", &[("Gene", GENE_TO_HOP)], 0);
    let entity_mapping = project.mapping_targets()[0].entity_mappings()[0].clone();

    let progress = RecordingProgress::new();
    let mapped = fx
        .service
        .apply_mapping_to_repo(&entity_mapping, hop.as_ref(), &progress, 3)
        .expect("apply to repo");

    assert_eq!(mapped, 3);
    assert_eq!(hop.write_calls(), vec![WriteCall::Add(1); 3]);
    insta::assert_snapshot!(progress.transcript(), @r"
    status Mapping source [Genes]...
    increment 1
    increment 1
    increment 1
    status Mapped 3 [Genes] entities.
    ");
}

#[test]
fn apply_to_repo_upserts_when_target_has_rows() {
    let fx = Fixture::new(2);
    fx.add_repository(
        gene_schema(),
        source_rows(&[("a", 1), ("b", 2), ("c", 3), ("d", 4)]),
    );
    let hop = fx.add_repository(hop_schema(), hop_rows(&[("x", 0), ("y", 0), ("z", 0)]));
    let project = fx.project("HopEntity", &[("Gene", GENE_TO_HOP)], 0);
    let entity_mapping = project.mapping_targets()[0].entity_mappings()[0].clone();

    let progress = RecordingProgress::new();
    let mapped = fx
        .service
        .apply_mapping_to_repo(&entity_mapping, hop.as_ref(), &progress, 3)
        .expect("apply to repo");

    assert_eq!(mapped, 4);
    assert_eq!(hop.write_calls(), vec![WriteCall::Upsert(2), WriteCall::Upsert(2)]);
    assert_eq!(hop.count().unwrap(), 7);
    assert_eq!(progress.completed(), 2);
    assert_eq!(
        progress.statuses(),
        vec![
            "Mapping source [Genes]...".to_string(),
            "Mapped 4 [Genes] entities.".to_string()
        ]
    );
}

#[test]
fn create_new_builds_target_and_grants_permission() {
    let fx = Fixture::new(1000);
    fx.add_repository(
        gene_schema(),
        source_rows(&[("0", 0), ("1", 1), ("2", 2), ("3", 3)]),
    );
    fx.add_repository(hop_schema(), Vec::new());
    let project = fx.project("HopEntity", &[("Gene", GENE_TO_HOP)], 3);

    let progress = RecordingProgress::new();
    let request = ApplyRequest::new(project_id(&project), "addEntity")
        .with_create_new(true)
        .with_package("base")
        .with_label("label");
    let mapped = fx.service.apply_mappings(&request, &progress).expect("apply");

    assert_eq!(mapped, 4);
    assert_eq!(fx.permissions.granted(), vec!["addEntity".to_string()]);
    let created = fx.catalog.store("addEntity").expect("created store");
    let schema = created.entity_type();
    assert_eq!(schema.label, "label");
    assert_eq!(schema.package.as_deref(), Some("base"));
    assert!(!schema.has_attribute("source"));
    assert_eq!(created.write_calls(), vec![WriteCall::Add(4)]);

    let events = progress.events();
    assert_eq!(
        events.first(),
        Some(&ProgressEvent::Status(
            "Checking target repository [addEntity]...".to_string()
        ))
    );
    assert!(events.contains(&ProgressEvent::SetMax(1)));
    assert_eq!(
        progress.statuses(),
        vec![
            "Checking target repository [addEntity]...".to_string(),
            "Applying mappings to repository [HopEntity]".to_string(),
            "Mapping source [Genes]...".to_string(),
            "Mapped 4 [Genes] entities.".to_string(),
            "Done applying mappings to repository [HopEntity]".to_string(),
        ]
    );
}

#[test]
fn create_new_over_existing_repository_is_a_conflict() {
    let fx = Fixture::new(10);
    fx.add_repository(gene_schema(), source_rows(&[("0", 0)]));
    let hop = fx.add_repository(hop_schema(), Vec::new());
    let project = fx.project("HopEntity", &[("Gene", GENE_TO_HOP)], 0);

    let progress = RecordingProgress::new();
    let request = ApplyRequest::new(project_id(&project), "HopEntity").with_create_new(true);
    let err = fx.service.apply_mappings(&request, &progress).unwrap_err();

    assert!(matches!(err, MappingError::TargetExists(_)));
    assert_eq!(err.category(), ErrorCategory::SchemaConflict);
    assert!(hop.write_calls().is_empty());
    assert_eq!(progress.completed(), 0);
}

#[test]
fn multiple_sources_get_provenance_and_share_the_target() {
    let fx = Fixture::new(10);
    fx.add_repository(gene_schema(), source_rows(&[("g1", 1), ("g2", 2)]));
    fx.add_repository(exon_schema(), source_rows(&[("e1", 3), ("e2", 4)]));
    fx.add_repository(hop_schema(), Vec::new());
    let project = fx.project(
        "HopEntity",
        &[("Gene", GENE_TO_HOP), ("Exon", GENE_TO_HOP)],
        0,
    );

    let progress = RecordingProgress::new();
    let request = ApplyRequest::new(project_id(&project), "merged").with_create_new(true);
    let mapped = fx.service.apply_mappings(&request, &progress).expect("apply");

    assert_eq!(mapped, 4);
    let merged = fx.catalog.store("merged").expect("merged store");
    assert!(merged.entity_type().has_attribute("source"));
    assert_eq!(merged.write_calls(), vec![WriteCall::Add(2), WriteCall::Upsert(2)]);
    let sources: Vec<String> = merged
        .rows()
        .iter()
        .map(|row| row.value("source").key())
        .collect();
    assert_eq!(sources, vec!["Gene", "Gene", "Exon", "Exon"]);
    assert_eq!(progress.completed(), 2);
}

#[test]
fn explicit_source_attribute_is_added_to_existing_target() {
    let fx = Fixture::new(10);
    fx.add_repository(gene_schema(), source_rows(&[("g1", 1)]));
    let hop = fx.add_repository(hop_schema(), Vec::new());
    let project = fx.project("HopEntity", &[("Gene", GENE_TO_HOP)], 0);

    let request =
        ApplyRequest::new(project_id(&project), "HopEntity").with_source_attribute(true);
    fx.service
        .apply_mappings(&request, &RecordingProgress::new())
        .expect("apply");

    assert!(hop.entity_type().has_attribute("source"));
    assert_eq!(hop.rows()[0].value("source"), &Value::text("Gene"));
}

#[test]
fn incompatible_target_aborts_before_writes() {
    let fx = Fixture::new(10);
    fx.add_repository(gene_schema(), source_rows(&[("0", 0)]));
    fx.add_repository(hop_schema(), Vec::new());
    let narrow = fx.add_repository(
        EntityType::new("Narrow")
            .with_id_attribute("identifier")
            .with_attribute(Attribute::new("identifier", AttributeType::String)),
        Vec::new(),
    );
    let project = fx.project("HopEntity", &[("Gene", GENE_TO_HOP)], 0);

    let progress = RecordingProgress::new();
    let err = fx
        .service
        .apply_mappings(&ApplyRequest::new(project_id(&project), "Narrow"), &progress)
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::CompatibilityViolation);
    assert_eq!(
        err.to_string(),
        "Target repository does not contain the following attribute: height"
    );
    assert!(narrow.write_calls().is_empty());
    assert_eq!(
        progress.events(),
        vec![ProgressEvent::Status(
            "Checking target repository [Narrow]...".to_string()
        )]
    );
}

#[test]
fn unknown_backend_aborts_before_writes() {
    let fx = Fixture::new(10);
    fx.add_repository(gene_schema(), source_rows(&[("0", 0)]));
    fx.catalog
        .add_entity_type(
            EntityType::new("GraphTarget")
                .with_backend("graph")
                .with_id_attribute("identifier")
                .with_attribute(Attribute::new("identifier", AttributeType::String))
                .with_attribute(Attribute::new("height", AttributeType::Int)),
        )
        .expect("register entity type");
    let project = fx.project("GraphTarget", &[("Gene", GENE_TO_HOP)], 0);

    let progress = RecordingProgress::new();
    let request = ApplyRequest::new(project_id(&project), "graphCopy").with_create_new(true);
    let err = fx.service.apply_mappings(&request, &progress).unwrap_err();

    assert!(matches!(err, MappingError::UnknownBackend { ref backend } if backend == "graph"));
    assert_eq!(err.category(), ErrorCategory::UnknownBackend);
    assert!(!fx.catalog.has_repository("graphCopy"));
    assert!(fx.permissions.granted().is_empty());
    assert_eq!(progress.completed(), 0);
}

#[test]
fn evaluation_failure_aborts_the_batch() {
    let fx = Fixture::new(10);
    fx.add_repository(gene_schema(), source_rows(&[("0", 0), ("1", 1)]));
    let hop = fx.add_repository(hop_schema(), Vec::new());
    let project = fx.project(
        "HopEntity",
        &[("Gene", &[("identifier", "id"), ("height", "$('width').value()")])],
        0,
    );

    let err = fx
        .service
        .apply_mappings(
            &ApplyRequest::new(project_id(&project), "HopEntity"),
            &RecordingProgress::new(),
        )
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::EvaluationFailure);
    assert!(matches!(
        err,
        MappingError::Evaluation { ref attribute, ref source_entity, .. }
            if attribute == "height" && source_entity == "Gene"
    ));
    assert!(hop.write_calls().is_empty());
}

#[test]
fn type_incompatible_value_is_an_evaluation_failure() {
    let fx = Fixture::new(10);
    fx.add_repository(gene_schema(), source_rows(&[("not-a-number", 0)]));
    let hop = fx.add_repository(hop_schema(), Vec::new());
    let project = fx.project(
        "HopEntity",
        &[("Gene", &[("identifier", "id"), ("height", "id")])],
        0,
    );

    let err = fx
        .service
        .apply_mappings(
            &ApplyRequest::new(project_id(&project), "HopEntity"),
            &RecordingProgress::new(),
        )
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::EvaluationFailure);
    assert!(hop.rows().is_empty());
}

#[test]
fn unknown_project_and_mapping_target() {
    let fx = Fixture::new(10);
    fx.add_repository(gene_schema(), Vec::new());
    fx.add_repository(hop_schema(), Vec::new());
    let err = fx
        .service
        .apply_mappings(&ApplyRequest::new("missing", "HopEntity"), &RecordingProgress::new())
        .unwrap_err();
    assert!(matches!(err, MappingError::UnknownProject(_)));

    let project = fx.project("HopEntity", &[("Gene", GENE_TO_HOP)], 0);
    let request =
        ApplyRequest::new(project_id(&project), "HopEntity").with_mapping_target("Nope");
    let err = fx
        .service
        .apply_mappings(&request, &RecordingProgress::new())
        .unwrap_err();
    assert!(matches!(err, MappingError::NoMappingTarget { .. }));
    assert_eq!(err.category(), ErrorCategory::NotFound);
}

#[test]
fn apply_mapping_to_entity_sets_provenance_when_present() {
    let fx = Fixture::new(10);
    fx.add_repository(gene_schema(), Vec::new());
    fx.add_repository(hop_schema(), Vec::new());
    let project = fx.project("HopEntity", &[("Gene", GENE_TO_HOP)], 0);
    let entity_mapping = &project.mapping_targets()[0].entity_mappings()[0];
    let source_row = Row::new().with("id", "g7").with("length", 7_i64);

    let plain = fx
        .service
        .apply_mapping_to_entity(entity_mapping, &source_row, &hop_schema(), 0)
        .expect("map row");
    assert_eq!(plain.value("identifier"), &Value::text("g7"));
    assert_eq!(plain.value("height"), &Value::Int(7));
    assert!(!plain.contains("source"));

    let with_source =
        hop_schema().with_attribute(Attribute::new("source", AttributeType::String));
    let row = fx
        .service
        .apply_mapping_to_entity(entity_mapping, &source_row, &with_source, 0)
        .expect("map row");
    assert_eq!(row.value("source"), &Value::text("Gene"));
}

#[test]
fn schema_drift_surfaces_unknown_attribute() {
    let fx = Fixture::new(10);
    fx.add_repository(gene_schema(), Vec::new());
    fx.add_repository(hop_schema(), Vec::new());
    let project = fx.project("HopEntity", &[("Gene", GENE_TO_HOP)], 0);
    let entity_mapping = &project.mapping_targets()[0].entity_mappings()[0];
    let drifted = EntityType::new("HopEntity")
        .with_attribute(Attribute::new("identifier", AttributeType::String));

    let err = fx
        .service
        .apply_mapping_to_entity(
            entity_mapping,
            &Row::new().with("id", "g1").with("length", 1_i64),
            &drifted,
            0,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        MappingError::Model(ModelError::UnknownAttribute { ref attribute, .. }) if attribute == "height"
    ));
}

fn person_schema() -> EntityType {
    EntityType::new("Person")
        .with_label("Person")
        .with_id_attribute("id")
        .with_attribute(Attribute::new("id", AttributeType::String).with_nillable(false))
        .with_attribute(Attribute::new("name", AttributeType::String))
        .with_attribute(Attribute::new("parent", AttributeType::Xref).with_ref_entity("Person"))
}

fn people_schema() -> EntityType {
    EntityType::new("People")
        .with_id_attribute("pid")
        .with_attribute(Attribute::new("pid", AttributeType::String))
        .with_attribute(Attribute::new("pname", AttributeType::String))
        .with_attribute(Attribute::new("pparent", AttributeType::String))
}

#[test]
fn self_references_are_resolved_in_a_second_pass() {
    let fx = Fixture::new(2);
    fx.add_repository(
        people_schema(),
        vec![
            Row::new().with("pid", "p1").with("pname", "Alice").with("pparent", Value::Null),
            Row::new().with("pid", "p2").with("pname", "Bob").with("pparent", "p1"),
            Row::new().with("pid", "p3").with("pname", "Carol").with("pparent", "p2"),
        ],
    );
    fx.add_repository(person_schema(), Vec::new());
    let project = fx.project(
        "Person",
        &[(
            "People",
            &[("id", "pid"), ("name", "pname"), ("parent", "$('pparent').value()")],
        )],
        1,
    );

    let progress = RecordingProgress::new();
    let request = ApplyRequest::new(project_id(&project), "PersonCopy").with_create_new(true);
    let mapped = fx.service.apply_mappings(&request, &progress).expect("apply");

    assert_eq!(mapped, 3);
    let copy = fx.catalog.store("PersonCopy").expect("copy store");
    assert_eq!(
        copy.entity_type().attribute("parent").unwrap().ref_entity.as_deref(),
        Some("PersonCopy")
    );
    assert_eq!(
        copy.write_calls(),
        vec![
            WriteCall::Add(2),
            WriteCall::Add(1),
            WriteCall::Upsert(2),
            WriteCall::Upsert(1)
        ]
    );
    let parents: Vec<(String, String)> = copy
        .rows()
        .iter()
        .map(|row| (row.value("id").key(), row.value("parent").key()))
        .collect();
    assert_eq!(
        parents,
        vec![
            ("p1".to_string(), String::new()),
            ("p2".to_string(), "p1".to_string()),
            ("p3".to_string(), "p2".to_string()),
        ]
    );
    insta::assert_snapshot!(progress.transcript(), @r"
    status Checking target repository [PersonCopy]...
    max 4
    status Applying mappings to repository [Person]
    status Mapping source [People]...
    increment 1
    increment 1
    status Mapped 3 [People] entities.
    status Self reference found, applying the mapping for a second time to set references
    status Resolving references from source [People]...
    increment 1
    increment 1
    status Resolved references for 3 [People] entities.
    status Done applying mappings to repository [Person]
    ");
}

#[test]
fn self_references_are_patched_into_a_non_empty_target() {
    let fx = Fixture::new(2);
    fx.add_repository(
        people_schema(),
        vec![
            Row::new().with("pid", "p1").with("pname", "Alice").with("pparent", Value::Null),
            Row::new().with("pid", "p2").with("pname", "Bob").with("pparent", "p1"),
            Row::new().with("pid", "p3").with("pname", "Carol").with("pparent", "p2"),
        ],
    );
    let person = fx.add_repository(
        person_schema(),
        vec![
            Row::new().with("id", "p1").with("name", "Old").with("parent", "p2"),
            Row::new().with("id", "p9").with("name", "Dave").with("parent", "p1"),
        ],
    );
    let project = fx.project(
        "Person",
        &[(
            "People",
            &[("id", "pid"), ("name", "pname"), ("parent", "$('pparent').value()")],
        )],
        1,
    );

    let progress = RecordingProgress::new();
    let mapped = fx
        .service
        .apply_mappings(&ApplyRequest::new(project_id(&project), "Person"), &progress)
        .expect("apply");

    assert_eq!(mapped, 3);
    assert_eq!(
        person.write_calls(),
        vec![
            WriteCall::Upsert(2),
            WriteCall::Upsert(1),
            WriteCall::Upsert(2),
            WriteCall::Upsert(1)
        ]
    );
    let rows: Vec<(String, String, String)> = person
        .rows()
        .iter()
        .map(|row| {
            (
                row.value("id").key(),
                row.value("name").key(),
                row.value("parent").key(),
            )
        })
        .collect();
    assert_eq!(
        rows,
        vec![
            ("p1".to_string(), "Alice".to_string(), String::new()),
            ("p9".to_string(), "Dave".to_string(), "p1".to_string()),
            ("p2".to_string(), "Bob".to_string(), "p1".to_string()),
            ("p3".to_string(), "Carol".to_string(), "p2".to_string()),
        ]
    );
    insta::assert_snapshot!(progress.transcript(), @r"
    status Checking target repository [Person]...
    max 4
    status Applying mappings to repository [Person]
    status Mapping source [People]...
    increment 1
    increment 1
    status Mapped 3 [People] entities.
    status Self reference found, applying the mapping for a second time to set references
    status Resolving references from source [People]...
    increment 1
    increment 1
    status Resolved references for 3 [People] entities.
    status Done applying mappings to repository [Person]
    ");
}

#[test]
fn empty_source_maps_nothing_but_counts_one_unit() {
    let fx = Fixture::new(2);
    fx.add_repository(gene_schema(), Vec::new());
    let hop = fx.add_repository(hop_schema(), Vec::new());
    let project = fx.project("HopEntity", &[("Gene", GENE_TO_HOP)], 3);

    let estimate = fx
        .service
        .calculate_max_progress(&project.mapping_targets()[0], project.depth())
        .expect("estimate");
    assert_eq!(estimate, 1);

    let progress = RecordingProgress::new();
    let mapped = fx
        .service
        .apply_mappings(&ApplyRequest::new(project_id(&project), "HopEntity"), &progress)
        .expect("apply");

    assert_eq!(mapped, 0);
    assert!(hop.write_calls().is_empty());
    assert_eq!(hop.count().unwrap(), 0);
    insta::assert_snapshot!(progress.transcript(), @r"
    status Checking target repository [HopEntity]...
    max 1
    status Applying mappings to repository [HopEntity]
    status Mapping source [Genes]...
    status Mapped 0 [Genes] entities.
    status Done applying mappings to repository [HopEntity]
    ");
}
