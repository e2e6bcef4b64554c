use futures::{Stream, StreamExt};
use hospital_observability::{log_skip, log_store};
use serde::Serialize;

use super::read_attributes;
use crate::errors::{EtlError, EtlResult};
use crate::graph_db::GraphSession;
use crate::models::{parse_identifier, EdgeRow, RelationshipSpec};
use crate::sources::SourceRecord;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RelationshipLoadOutcome {
    pub records: usize,
    pub merged: usize,
    /// Records whose endpoints did not both resolve to stored nodes
    pub skipped_endpoints: usize,
    /// Attributes left unset on merged edges because their value could not be coerced
    pub skipped_attributes: usize,
}

impl RelationshipLoadOutcome {
    pub fn skipped(&self) -> usize {
        self.skipped_endpoints + self.skipped_attributes
    }
}

/// Rows waiting for the next merge statement, with the attribute errors of
/// each row kept until the store says whether the edge was written.
#[derive(Default)]
struct PendingBatch {
    rows: Vec<EdgeRow>,
    skipped: Vec<(u64, Vec<EtlError>)>,
}

impl PendingBatch {
    fn push(&mut self, row: EdgeRow, position: u64, skipped: Vec<EtlError>) {
        self.rows.push(row);
        self.skipped.push((position, skipped));
    }

    fn len(&self) -> usize {
        self.rows.len()
    }

    fn clear(&mut self) {
        self.rows.clear();
        self.skipped.clear();
    }
}

/// Streams source records into edge merges between existing nodes.
#[derive(Debug, Clone, Copy)]
pub struct RelationshipLoader {
    batch_size: usize,
}

impl RelationshipLoader {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    pub async fn upsert_relationships<S>(
        &self,
        session: &mut dyn GraphSession,
        spec: &RelationshipSpec,
        mut records: S,
    ) -> EtlResult<RelationshipLoadOutcome>
    where
        S: Stream<Item = EtlResult<SourceRecord>> + Unpin + Send,
    {
        let label = spec.kind.as_str();
        let mut outcome = RelationshipLoadOutcome::default();
        let mut batch = PendingBatch::default();

        while let Some(record) = records.next().await {
            let record = record?;
            outcome.records += 1;

            let from_raw = record.get(spec.from.column)?;
            let to_raw = record.get(spec.to.column)?;

            match (parse_identifier(from_raw), parse_identifier(to_raw)) {
                (Some(from), Some(to)) => {
                    let (properties, skipped) = read_attributes(spec.attributes, &record)?;
                    batch.push(EdgeRow { from, to, properties }, record.position(), skipped);
                }
                _ => {
                    let err = EtlError::EndpointNotFound {
                        relationship: label.to_string(),
                        position: record.position(),
                    };
                    log_skip!(label, record.position(), err);
                    outcome.skipped_endpoints += 1;
                }
            }

            if batch.len() >= self.batch_size {
                self.flush(session, spec, &mut batch, &mut outcome).await?;
            }
        }
        self.flush(session, spec, &mut batch, &mut outcome).await?;

        if outcome.skipped_endpoints > 0 {
            tracing::warn!(
                label,
                skipped = outcome.skipped_endpoints,
                "Relationship records without both endpoints were skipped"
            );
        }
        tracing::info!(
            label,
            records = outcome.records,
            merged = outcome.merged,
            "Relationships upserted"
        );
        Ok(outcome)
    }

    async fn flush(
        &self,
        session: &mut dyn GraphSession,
        spec: &RelationshipSpec,
        batch: &mut PendingBatch,
        outcome: &mut RelationshipLoadOutcome,
    ) -> EtlResult<()> {
        if batch.rows.is_empty() {
            return Ok(());
        }
        let label = spec.kind.as_str();
        log_store!("merge_relationships", label, batch.len());
        let merged = session
            .merge_relationships(spec.kind, spec.from.kind, spec.to.kind, &batch.rows)
            .await?;

        for &idx in &merged {
            if let Some((position, skipped)) = batch.skipped.get(idx) {
                for err in skipped {
                    log_skip!(label, *position, err);
                }
                outcome.skipped_attributes += skipped.len();
            }
        }
        outcome.merged += merged.len();
        outcome.skipped_endpoints += batch.len().saturating_sub(merged.len());
        batch.clear();
        Ok(())
    }
}
