//! Full-load orchestration.
//!
//! One run is a sequence of attempts. Each attempt connects to the store and
//! walks constraints, nodes, relationships and inference in that order; any
//! error fails the attempt and the whole run starts over after the retry delay.
//! CSV decoding for each kind runs on the blocking pool and feeds its loader
//! through a bounded channel.

use futures::stream::{self, StreamExt};
use hospital_config::EtlConfig;
use hospital_observability::{
    log_attempt_failed, log_job_completed, log_job_failed, log_retry, log_stage_completed,
    log_timed, EventCategory,
};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use super::{JobState, RetryPolicy};
use crate::errors::{EtlError, EtlResult};
use crate::graph_db::{finish_session, read_statistics, GraphStatistics, GraphStore, StoreConnector};
use crate::models::{NodeKind, NodeSpec, RelationshipKind, RelationshipSpec, NODE_SPECS, RELATIONSHIP_SPECS};
use crate::services::{
    ConstraintManager, InferenceEngine, NodeLoadOutcome, NodeLoader, RelationshipLoadOutcome,
    RelationshipLoader,
};
use crate::sources::SourceSet;
use crate::SERVICE_NAME;

/// Summary of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub run_id: Uuid,
    /// Attempts used, including the successful one
    pub attempts: u32,
    pub constraints: usize,
    pub nodes: BTreeMap<NodeKind, NodeLoadOutcome>,
    pub relationships: BTreeMap<RelationshipKind, RelationshipLoadOutcome>,
    pub inferred: usize,
    /// Counts read back from the store after inference
    pub statistics: GraphStatistics,
    pub duration_ms: u64,
}

impl LoadReport {
    pub fn skipped_records(&self) -> usize {
        self.relationships.values().map(|o| o.skipped_endpoints).sum()
    }
}

#[derive(Debug)]
struct JobStatus {
    current: JobState,
    history: Vec<JobState>,
}

pub struct JobRunner {
    config: EtlConfig,
    connector: Arc<dyn StoreConnector>,
    sources: SourceSet,
    retry: RetryPolicy,
    constraints: ConstraintManager,
    node_loader: NodeLoader,
    relationship_loader: RelationshipLoader,
    inference: InferenceEngine,
    status: Mutex<JobStatus>,
}

impl JobRunner {
    pub fn new(config: EtlConfig, connector: Arc<dyn StoreConnector>) -> Self {
        Self {
            sources: SourceSet::new(config.sources.clone()),
            retry: RetryPolicy::from(config.retry.clone()),
            constraints: ConstraintManager::new(),
            node_loader: NodeLoader::new(config.batch_size),
            relationship_loader: RelationshipLoader::new(config.batch_size),
            inference: InferenceEngine::default(),
            status: Mutex::new(JobStatus {
                current: JobState::Idle,
                history: vec![JobState::Idle],
            }),
            config,
            connector,
        }
    }

    pub fn state(&self) -> JobState {
        self.status.lock().current
    }

    /// Every state entered so far, starting with the initial `Idle`.
    pub fn history(&self) -> Vec<JobState> {
        self.status.lock().history.clone()
    }

    /// Run the full load, retrying the whole run on any failure.
    pub async fn run_full_load(&self) -> EtlResult<LoadReport> {
        let run_id = Uuid::new_v4();
        let started = Instant::now();
        let max_attempts = self.retry.max_attempts;

        tracing::info!(%run_id, max_attempts, "Starting full load");

        let mut attempt = 0;
        loop {
            attempt += 1;
            let attempt_started = Instant::now();
            let span = tracing::info_span!("full_load", %run_id, attempt);

            match self.run_attempt(run_id, attempt).instrument(span).await {
                Ok(mut report) => {
                    report.attempts = attempt;
                    report.duration_ms = elapsed_ms(started);
                    log_job_completed(
                        SERVICE_NAME,
                        run_id,
                        attempt,
                        report.duration_ms,
                        serde_json::json!({
                            "nodes": report.statistics.total_nodes(),
                            "relationships": report.statistics.total_relationships(),
                            "inferred": report.inferred,
                            "skipped_records": report.skipped_records(),
                        }),
                    );
                    return Ok(report);
                }
                Err(err) => {
                    self.mark_failed();
                    tracing::error!(%run_id, attempt, max_attempts, error = %err, "Load attempt failed");
                    log_attempt_failed(
                        SERVICE_NAME,
                        run_id,
                        attempt,
                        max_attempts,
                        &err.to_string(),
                        elapsed_ms(attempt_started),
                    );

                    match self.retry.delay_after(attempt) {
                        Some(delay) => {
                            log_retry!("full_load", attempt + 1, max_attempts, err);
                            tokio::time::sleep(delay).await;
                        }
                        None => {
                            log_job_failed(
                                SERVICE_NAME,
                                run_id,
                                attempt,
                                &err.to_string(),
                                elapsed_ms(started),
                            );
                            return Err(EtlError::RetriesExhausted {
                                attempts: attempt,
                                last: Box::new(err),
                            });
                        }
                    }
                }
            }
        }
    }

    async fn run_attempt(&self, run_id: Uuid, attempt: u32) -> EtlResult<LoadReport> {
        if self.state() != JobState::Idle {
            self.transition(JobState::Idle)?;
        }

        let store = self.connector.connect().await?;
        let store = store.as_ref();

        self.transition(JobState::ConstraintsPending)?;
        let constraints = self.create_constraints(store, run_id, attempt).await?;

        self.transition(JobState::NodesPending)?;
        let nodes = self.load_nodes(store, run_id, attempt).await?;

        self.transition(JobState::RelationshipsPending)?;
        let relationships = self.load_relationships(store, run_id, attempt).await?;

        self.transition(JobState::InferencePending)?;
        let inferred = self.infer_relationships(store, run_id, attempt).await?;

        let statistics = log_timed!("read_statistics", read_statistics(store).await)?;
        self.transition(JobState::Done)?;

        tracing::info!(
            nodes = statistics.total_nodes(),
            relationships = statistics.total_relationships(),
            "Full load completed"
        );

        Ok(LoadReport {
            run_id,
            attempts: attempt,
            constraints,
            nodes,
            relationships,
            inferred,
            statistics,
            duration_ms: 0,
        })
    }

    async fn create_constraints(
        &self,
        store: &dyn GraphStore,
        run_id: Uuid,
        attempt: u32,
    ) -> EtlResult<usize> {
        let started = Instant::now();
        let mut session = store.open_session().await?;
        let outcome = self.constraints.ensure_all(session.as_mut()).await;
        let count = finish_session(session, outcome).await?;

        log_stage_completed(
            SERVICE_NAME,
            run_id,
            attempt,
            EventCategory::Constraint,
            "all",
            0,
            elapsed_ms(started),
            serde_json::json!({ "constraints": count }),
        );
        Ok(count)
    }

    async fn load_nodes(
        &self,
        store: &dyn GraphStore,
        run_id: Uuid,
        attempt: u32,
    ) -> EtlResult<BTreeMap<NodeKind, NodeLoadOutcome>> {
        let results: Vec<EtlResult<(NodeKind, NodeLoadOutcome)>> = stream::iter(NODE_SPECS.iter())
            .map(|spec| self.load_node_kind(store, spec, run_id, attempt))
            .buffer_unordered(self.config.stage_concurrency.max(1))
            .collect()
            .await;

        results.into_iter().collect()
    }

    async fn load_node_kind(
        &self,
        store: &dyn GraphStore,
        spec: &'static NodeSpec,
        run_id: Uuid,
        attempt: u32,
    ) -> EtlResult<(NodeKind, NodeLoadOutcome)> {
        let started = Instant::now();
        let records = self.sources.source(spec.kind).stream(self.config.batch_size);

        let mut session = store.open_session().await?;
        let outcome = self
            .node_loader
            .upsert_nodes(session.as_mut(), spec, records)
            .await;
        let outcome = finish_session(session, outcome).await?;

        log_stage_completed(
            SERVICE_NAME,
            run_id,
            attempt,
            EventCategory::NodeLoad,
            spec.kind.as_str(),
            outcome.skipped_attributes,
            elapsed_ms(started),
            serde_json::json!({ "records": outcome.records, "merged": outcome.merged }),
        );
        Ok((spec.kind, outcome))
    }

    async fn load_relationships(
        &self,
        store: &dyn GraphStore,
        run_id: Uuid,
        attempt: u32,
    ) -> EtlResult<BTreeMap<RelationshipKind, RelationshipLoadOutcome>> {
        let results: Vec<EtlResult<(RelationshipKind, RelationshipLoadOutcome)>> =
            stream::iter(RELATIONSHIP_SPECS.iter())
                .map(|spec| self.load_relationship_kind(store, spec, run_id, attempt))
                .buffer_unordered(self.config.stage_concurrency.max(1))
                .collect()
                .await;

        results.into_iter().collect()
    }

    async fn load_relationship_kind(
        &self,
        store: &dyn GraphStore,
        spec: &'static RelationshipSpec,
        run_id: Uuid,
        attempt: u32,
    ) -> EtlResult<(RelationshipKind, RelationshipLoadOutcome)> {
        let started = Instant::now();
        let records = self.sources.source(spec.source).stream(self.config.batch_size);

        let mut session = store.open_session().await?;
        let outcome = self
            .relationship_loader
            .upsert_relationships(session.as_mut(), spec, records)
            .await;
        let outcome = finish_session(session, outcome).await?;

        log_stage_completed(
            SERVICE_NAME,
            run_id,
            attempt,
            EventCategory::RelationshipLoad,
            spec.kind.as_str(),
            outcome.skipped(),
            elapsed_ms(started),
            serde_json::json!({
                "records": outcome.records,
                "merged": outcome.merged,
                "skipped_endpoints": outcome.skipped_endpoints,
                "skipped_attributes": outcome.skipped_attributes,
            }),
        );
        Ok((spec.kind, outcome))
    }

    async fn infer_relationships(
        &self,
        store: &dyn GraphStore,
        run_id: Uuid,
        attempt: u32,
    ) -> EtlResult<usize> {
        let started = Instant::now();
        let mut session = store.open_session().await?;
        let outcome = self.inference.infer(session.as_mut()).await;
        let merged = finish_session(session, outcome).await?;

        log_stage_completed(
            SERVICE_NAME,
            run_id,
            attempt,
            EventCategory::Inference,
            self.inference.rule().kind.as_str(),
            0,
            elapsed_ms(started),
            serde_json::json!({ "merged": merged, "modulus": self.inference.rule().modulus }),
        );
        Ok(merged)
    }

    fn transition(&self, next: JobState) -> EtlResult<()> {
        let mut status = self.status.lock();
        if !status.current.can_transition_to(next) {
            return Err(EtlError::InvalidTransition {
                from: status.current,
                to: next,
            });
        }
        tracing::debug!(from = %status.current, to = %next, "Job state transition");
        status.current = next;
        status.history.push(next);
        Ok(())
    }

    fn mark_failed(&self) {
        if let Err(err) = self.transition(JobState::Failed) {
            tracing::warn!(error = %err, "Could not record failed state");
        }
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}
