//! Runs against a live Neo4j. Set NEO4J_URI, NEO4J_USERNAME, NEO4J_PASSWORD
//! and NEO4J_DATABASE, then run with `--ignored`.

mod common;

use common::Fixture;
use hospital_config::StoreConfig;
use hospital_etl::models::{NodeKind, RelationshipKind};
use hospital_etl::{JobRunner, Neo4jConnector};
use std::sync::Arc;

#[tokio::test]
#[ignore]
async fn test_full_load_against_neo4j() {
    let fixture = Fixture::new();
    let mut config = fixture.config(1);
    config.store = StoreConfig::from_env().expect("Neo4j settings must be set");
    let connector = Arc::new(Neo4jConnector::new(config.store.clone()));
    let runner = JobRunner::new(config, connector);

    let first = runner.run_full_load().await.unwrap();
    let second = runner.run_full_load().await.unwrap();

    assert_eq!(first.statistics, second.statistics);
    assert!(first.statistics.nodes[&NodeKind::Hospital] >= 3);
    assert!(first.statistics.relationships[&RelationshipKind::Employs] >= 2);
}
