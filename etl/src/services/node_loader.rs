use futures::{Stream, StreamExt};
use hospital_observability::{log_skip, log_store};
use serde::Serialize;

use super::read_attributes;
use crate::errors::{EtlError, EtlResult};
use crate::graph_db::GraphSession;
use crate::models::{parse_identifier, NodeRow, NodeSpec};
use crate::sources::SourceRecord;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NodeLoadOutcome {
    /// Records read from the source
    pub records: usize,
    /// Rows merged into the store
    pub merged: usize,
    pub skipped_attributes: usize,
}

/// Streams source records into node merges, one statement per batch.
#[derive(Debug, Clone, Copy)]
pub struct NodeLoader {
    batch_size: usize,
}

impl NodeLoader {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    pub async fn upsert_nodes<S>(
        &self,
        session: &mut dyn GraphSession,
        spec: &NodeSpec,
        mut records: S,
    ) -> EtlResult<NodeLoadOutcome>
    where
        S: Stream<Item = EtlResult<SourceRecord>> + Unpin + Send,
    {
        let mut outcome = NodeLoadOutcome::default();
        let mut batch = Vec::with_capacity(self.batch_size);

        while let Some(record) = records.next().await {
            let record = record?;
            outcome.records += 1;

            let (row, skipped) = node_row(spec, &record)?;
            outcome.skipped_attributes += skipped;
            batch.push(row);

            if batch.len() >= self.batch_size {
                outcome.merged += self.flush(session, spec, &mut batch).await?;
            }
        }
        outcome.merged += self.flush(session, spec, &mut batch).await?;

        tracing::info!(
            label = spec.kind.as_str(),
            records = outcome.records,
            merged = outcome.merged,
            "Nodes upserted"
        );
        Ok(outcome)
    }

    async fn flush(
        &self,
        session: &mut dyn GraphSession,
        spec: &NodeSpec,
        batch: &mut Vec<NodeRow>,
    ) -> EtlResult<usize> {
        if batch.is_empty() {
            return Ok(0);
        }
        log_store!("merge_nodes", spec.kind.as_str(), batch.len());
        let merged = session.merge_nodes(spec.kind, batch).await?;
        batch.clear();
        Ok(merged)
    }
}

fn node_row(spec: &NodeSpec, record: &SourceRecord) -> EtlResult<(NodeRow, usize)> {
    let raw_id = record.get(spec.id_column)?;
    let id = parse_identifier(raw_id).ok_or_else(|| EtlError::InvalidIdentifier {
        kind: spec.kind.to_string(),
        position: record.position(),
        value: raw_id.to_string(),
    })?;

    let (properties, skipped) = read_attributes(spec.attributes, record)?;
    for err in &skipped {
        log_skip!(spec.kind.as_str(), record.position(), err);
    }
    Ok((NodeRow { id, properties }, skipped.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph_db::{GraphStore, InMemoryGraph, StoreOp};
    use crate::models::{node_spec, NodeKind, PropertyValue};
    use crate::sources::CsvSource;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    async fn load(graph: &InMemoryGraph, loader: NodeLoader, kind: NodeKind, file: &NamedTempFile) -> EtlResult<NodeLoadOutcome> {
        let source = CsvSource::new(kind, file.path().to_string_lossy());
        let mut session = graph.open_session().await.unwrap();
        let outcome = loader
            .upsert_nodes(session.as_mut(), node_spec(kind), source.stream(16))
            .await;
        crate::graph_db::finish_session(session, outcome).await
    }

    #[tokio::test]
    async fn test_upsert_is_keyed_by_identifier() {
        let graph = InMemoryGraph::new();
        let file = write_csv(
            "hospital_id,hospital_name,hospital_state\n1,Wallace-Hamilton,CO\n2,Burke Ltd,NC\n1,Wallace-Hamilton,TX\n",
        );

        let outcome = load(&graph, NodeLoader::new(1000), NodeKind::Hospital, &file).await.unwrap();

        assert_eq!(outcome.records, 3);
        assert_eq!(graph.node_count(NodeKind::Hospital), 2);
        let hospital = graph.node(NodeKind::Hospital, 1).unwrap();
        assert_eq!(hospital.get("state_name").and_then(|v| v.as_text()), Some("TX"));
    }

    #[tokio::test]
    async fn test_batches_split_statements() {
        let graph = InMemoryGraph::new();
        let file = write_csv("payer_id,payer_name\n1,Medicaid\n2,Aetna\n3,Cigna\n4,Humana\n5,Blue Cross\n");

        let outcome = load(&graph, NodeLoader::new(2), NodeKind::Payer, &file).await.unwrap();

        assert_eq!(outcome.merged, 5);
        assert_eq!(
            graph.operations(),
            vec![
                StoreOp::MergeNodes(NodeKind::Payer, 2),
                StoreOp::MergeNodes(NodeKind::Payer, 2),
                StoreOp::MergeNodes(NodeKind::Payer, 1),
            ]
        );
    }

    #[tokio::test]
    async fn test_room_number_is_integer() {
        let graph = InMemoryGraph::new();
        let file = write_csv(
            "visit_id,room_number,admission_type,date_of_admission,test_results,chief_complaint,\
             treatment_description,primary_diagnosis,discharge_date,visit_status\n\
             10,304,Emergency,2022-11-02,Normal,,,,2022-11-06,DISCHARGED\n",
        );

        load(&graph, NodeLoader::new(1000), NodeKind::Visit, &file).await.unwrap();

        let visit = graph.node(NodeKind::Visit, 10).unwrap();
        assert_eq!(visit.get("room_number"), Some(&PropertyValue::Integer(304)));
        assert_eq!(visit.get("status").and_then(|v| v.as_text()), Some("DISCHARGED"));
        assert!(visit.get("chief_complaint").is_none());
    }

    #[tokio::test]
    async fn test_invalid_identifier_fails_whole_load() {
        let graph = InMemoryGraph::new();
        let file = write_csv("payer_id,payer_name\n1,Medicaid\nabc,Aetna\n");

        let err = load(&graph, NodeLoader::new(1), NodeKind::Payer, &file).await.unwrap_err();

        assert!(matches!(
            err,
            EtlError::InvalidIdentifier { position: 3, ref value, .. } if value == "abc"
        ));
        assert_eq!(graph.node_count(NodeKind::Payer), 0);
        assert_eq!(graph.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_missing_attribute_column_is_fatal() {
        let graph = InMemoryGraph::new();
        let file = write_csv("payer_id\n1\n");

        let err = load(&graph, NodeLoader::new(1000), NodeKind::Payer, &file).await.unwrap_err();
        assert!(matches!(err, EtlError::MalformedRecord { .. }));
    }
}
