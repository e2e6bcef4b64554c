mod common;

use common::{FlakyConnector, Fixture, HOSPITALS};
use hospital_etl::graph_db::StoreOp;
use hospital_etl::models::{NodeKind, PropertyValue, RelationshipKind};
use hospital_etl::{EtlError, InMemoryGraph, JobRunner, JobState};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;

fn runner(fixture: &Fixture, graph: &InMemoryGraph, max_attempts: u32) -> JobRunner {
    JobRunner::new(fixture.config(max_attempts), Arc::new(graph.clone()))
}

#[tokio::test]
async fn test_full_load_builds_graph() {
    let fixture = Fixture::new();
    let graph = InMemoryGraph::new();

    let report = runner(&fixture, &graph, 3).run_full_load().await.unwrap();

    assert_eq!(report.attempts, 1);
    assert_eq!(report.constraints, 6);
    assert_eq!(report.statistics.nodes[&NodeKind::Hospital], 3);
    assert_eq!(report.statistics.nodes[&NodeKind::Payer], 2);
    assert_eq!(report.statistics.nodes[&NodeKind::Physician], 2);
    assert_eq!(report.statistics.nodes[&NodeKind::Patient], 2);
    assert_eq!(report.statistics.nodes[&NodeKind::Visit], 3);
    assert_eq!(report.statistics.nodes[&NodeKind::Review], 2);

    assert_eq!(report.statistics.relationships[&RelationshipKind::Has], 2);
    assert_eq!(report.statistics.relationships[&RelationshipKind::At], 3);
    assert_eq!(report.statistics.relationships[&RelationshipKind::Treats], 3);
    assert_eq!(report.statistics.relationships[&RelationshipKind::CoveredBy], 3);
    assert_eq!(report.statistics.relationships[&RelationshipKind::Writes], 1);
    assert_eq!(report.statistics.relationships[&RelationshipKind::Employs], 2);
    assert_eq!(report.inferred, 2);

    for kind in NodeKind::ALL {
        assert!(graph.has_constraint(kind, "id"), "{} should be unique on id", kind);
    }
    assert_eq!(graph.open_sessions(), 0);
}

#[tokio::test]
async fn test_node_attributes_use_store_names() {
    let fixture = Fixture::new();
    let graph = InMemoryGraph::new();

    runner(&fixture, &graph, 1).run_full_load().await.unwrap();

    let hospital = graph.node(NodeKind::Hospital, 9).unwrap();
    assert_eq!(hospital.get("name").and_then(|v| v.as_text()), Some("Wallace-Hamilton"));
    assert_eq!(hospital.get("state_name").and_then(|v| v.as_text()), Some("CO"));

    let physician = graph.node(NodeKind::Physician, 3).unwrap();
    assert_eq!(
        physician.get("school").and_then(|v| v.as_text()),
        Some("Johns Hopkins University School of Medicine")
    );
    assert!(physician.get("salary").is_none());

    let visit = graph.node(NodeKind::Visit, 500).unwrap();
    assert_eq!(visit.get("room_number"), Some(&PropertyValue::Integer(146)));
    assert_eq!(visit.get("admission_date").and_then(|v| v.as_text()), Some("2022-11-17"));
    assert_eq!(visit.get("status").and_then(|v| v.as_text()), Some("DISCHARGED"));

    let review = graph.node(NodeKind::Review, 700).unwrap();
    assert_eq!(
        review.get("text").and_then(|v| v.as_text()),
        Some("The staff were attentive and kind.")
    );
}

#[tokio::test]
async fn test_repeated_load_is_idempotent() {
    let fixture = Fixture::new();
    let graph = InMemoryGraph::new();
    let runner = runner(&fixture, &graph, 1);

    let first = runner.run_full_load().await.unwrap();
    let second = runner.run_full_load().await.unwrap();

    assert_eq!(first.statistics, second.statistics);
    assert_ne!(first.run_id, second.run_id);
    assert_eq!(runner.state(), JobState::Done);
}

#[tokio::test]
async fn test_duplicate_source_identifiers_merge() {
    let fixture = Fixture::new();
    fixture.write("payers.csv", "payer_id,payer_name\n1,Medicaid\n2,UnitedHealthcare\n1,Medicaid\n");
    let graph = InMemoryGraph::new();

    let report = runner(&fixture, &graph, 1).run_full_load().await.unwrap();

    assert_eq!(report.nodes[&NodeKind::Payer].records, 3);
    assert_eq!(graph.node_count(NodeKind::Payer), 2);
}

#[tokio::test]
async fn test_changed_attributes_overwrite() {
    let fixture = Fixture::new();
    let graph = InMemoryGraph::new();
    let runner = runner(&fixture, &graph, 1);
    runner.run_full_load().await.unwrap();

    fixture.write("hospitals.csv", &HOSPITALS.replace("Burke Ltd,NC", "Burke Regional,SC"));
    runner.run_full_load().await.unwrap();

    let hospital = graph.node(NodeKind::Hospital, 18).unwrap();
    assert_eq!(graph.node_count(NodeKind::Hospital), 3);
    assert_eq!(hospital.get("name").and_then(|v| v.as_text()), Some("Burke Regional"));
    assert_eq!(hospital.get("state_name").and_then(|v| v.as_text()), Some("SC"));
}

#[tokio::test]
async fn test_unresolved_endpoints_do_not_fail_load() {
    let fixture = Fixture::new();
    let graph = InMemoryGraph::new();

    let report = runner(&fixture, &graph, 1).run_full_load().await.unwrap();

    let has = report.relationships[&RelationshipKind::Has];
    assert_eq!(has.records, 3);
    assert_eq!(has.merged, 2);
    assert_eq!(has.skipped_endpoints, 1);
    assert_eq!(report.relationships[&RelationshipKind::Writes].skipped_endpoints, 1);
    assert_eq!(report.skipped_records(), 2);

    assert!(graph.relationship(RelationshipKind::Has, 999, 502).is_none());
    assert!(graph.node(NodeKind::Patient, 999).is_none());
}

#[tokio::test]
async fn test_covered_by_billing() {
    let fixture = Fixture::new();
    let graph = InMemoryGraph::new();

    let report = runner(&fixture, &graph, 1).run_full_load().await.unwrap();

    let billed = graph.relationship(RelationshipKind::CoveredBy, 500, 1).unwrap();
    assert_eq!(
        billed.get("billing_amount").and_then(|v| v.as_decimal()),
        Some(Decimal::from_str("1250.50").unwrap())
    );
    assert_eq!(billed.get("service_date").and_then(|v| v.as_text()), Some("2022-12-01"));

    let unbilled = graph.relationship(RelationshipKind::CoveredBy, 501, 2).unwrap();
    assert!(unbilled.get("billing_amount").is_none());
    assert_eq!(report.relationships[&RelationshipKind::CoveredBy].skipped_attributes, 1);
}

#[tokio::test]
async fn test_employs_follows_identifier_rule() {
    let fixture = Fixture::new();
    let graph = InMemoryGraph::new();

    runner(&fixture, &graph, 1).run_full_load().await.unwrap();

    assert_eq!(
        graph.relationship_pairs(RelationshipKind::Employs),
        vec![(3, 27), (12, 18)]
    );
}

#[tokio::test]
async fn test_stages_run_in_order() {
    let fixture = Fixture::new();
    let graph = InMemoryGraph::new();

    runner(&fixture, &graph, 1).run_full_load().await.unwrap();

    let ops = graph.operations();
    let last_constraint = ops.iter().rposition(|op| matches!(op, StoreOp::EnsureUniqueness(_))).unwrap();
    let first_node = ops.iter().position(|op| matches!(op, StoreOp::MergeNodes(..))).unwrap();
    let last_node = ops.iter().rposition(|op| matches!(op, StoreOp::MergeNodes(..))).unwrap();
    let first_edge = ops.iter().position(|op| matches!(op, StoreOp::MergeRelationships(..))).unwrap();
    let last_edge = ops.iter().rposition(|op| matches!(op, StoreOp::MergeRelationships(..))).unwrap();

    assert!(last_constraint < first_node);
    assert!(last_node < first_edge);
    assert_eq!(ops.last(), Some(&StoreOp::MergeInferred(RelationshipKind::Employs)));
    assert!(last_edge < ops.len() - 1);
}

#[tokio::test]
async fn test_state_history_of_successful_run() {
    let fixture = Fixture::new();
    let graph = InMemoryGraph::new();
    let runner = runner(&fixture, &graph, 1);

    runner.run_full_load().await.unwrap();

    assert_eq!(
        runner.history(),
        vec![
            JobState::Idle,
            JobState::ConstraintsPending,
            JobState::NodesPending,
            JobState::RelationshipsPending,
            JobState::InferencePending,
            JobState::Done,
        ]
    );
}

#[tokio::test]
async fn test_retry_succeeds_on_third_attempt() {
    let fixture = Fixture::new();
    let graph = InMemoryGraph::new();
    let connector = Arc::new(FlakyConnector::new(graph.clone(), 2));
    let runner = JobRunner::new(fixture.config(3), connector.clone());

    let report = runner.run_full_load().await.unwrap();

    assert_eq!(report.attempts, 3);
    assert_eq!(connector.connects(), 3);
    assert_eq!(graph.node_count(NodeKind::Hospital), 3);
    assert_eq!(runner.state(), JobState::Done);
}

#[tokio::test]
async fn test_retry_gives_up_after_max_attempts() {
    let fixture = Fixture::new();
    let graph = InMemoryGraph::new();
    let connector = Arc::new(FlakyConnector::new(graph.clone(), 3));
    let runner = JobRunner::new(fixture.config(3), connector.clone());

    let err = runner.run_full_load().await.unwrap_err();

    assert!(matches!(err, EtlError::RetriesExhausted { attempts: 3, .. }));
    assert!(matches!(err.last_cause(), EtlError::StoreUnavailable(_)));
    assert_eq!(connector.connects(), 3);
    assert_eq!(runner.state(), JobState::Failed);
    assert_eq!(graph.node_count(NodeKind::Hospital), 0);
}

#[tokio::test]
async fn test_session_failure_restarts_run() {
    let fixture = Fixture::new();
    let graph = InMemoryGraph::new();
    graph.fail_next_session_opens(1);

    let report = runner(&fixture, &graph, 3).run_full_load().await.unwrap();

    assert_eq!(report.attempts, 2);
    assert_eq!(graph.open_sessions(), 0);
}

#[tokio::test]
async fn test_invalid_identifier_fails_run() {
    let fixture = Fixture::new();
    fixture.write("patients.csv", "patient_id,patient_name,patient_sex,patient_dob,patient_blood_type\nP-1,Ann,Female,1990-01-01,A+\n");
    let graph = InMemoryGraph::new();

    let err = runner(&fixture, &graph, 2).run_full_load().await.unwrap_err();

    assert!(matches!(err, EtlError::RetriesExhausted { attempts: 2, .. }));
    assert!(matches!(
        err.last_cause(),
        EtlError::InvalidIdentifier { value, .. } if value == "P-1"
    ));
    assert_eq!(graph.node_count(NodeKind::Patient), 0);
    assert_eq!(graph.open_sessions(), 0);
}

#[tokio::test]
async fn test_missing_column_fails_run() {
    let fixture = Fixture::new();
    fixture.write("payers.csv", "payer_id\n1\n");
    let graph = InMemoryGraph::new();

    let err = runner(&fixture, &graph, 1).run_full_load().await.unwrap_err();

    assert!(matches!(err.last_cause(), EtlError::MalformedRecord { .. }));
}
