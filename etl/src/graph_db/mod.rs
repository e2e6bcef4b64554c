pub mod memory;
pub mod neo4j_client;

pub use memory::{InMemoryGraph, StoreOp};
pub use neo4j_client::{Neo4jConnector, Neo4jStore};

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::errors::{EtlError, EtlResult};
use crate::models::{EdgeRow, InferenceRule, NodeKind, NodeRow, RelationshipKind};

/// Opens a store for one load attempt. Connection failures surface here and
/// are retried at job level.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self) -> EtlResult<Arc<dyn GraphStore>>;
}

/// A connected graph store handing out sessions.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Acquire a session for one unit of stage work.
    async fn open_session(&self) -> EtlResult<Box<dyn GraphSession>>;
}

/// Match-or-create operations against the store, scoped to one unit of work.
///
/// Callers must end every session with [`GraphSession::release`], which
/// [`finish_session`] does on both the success and the failure path.
#[async_trait]
pub trait GraphSession: Send {
    /// Declare `property` unique for `kind`. Declaring it again is a no-op.
    async fn ensure_uniqueness(&mut self, kind: NodeKind, property: &str) -> EtlResult<()>;

    /// Merge nodes keyed by identifier and overwrite their attributes.
    /// Returns the number of rows merged.
    async fn merge_nodes(&mut self, kind: NodeKind, rows: &[NodeRow]) -> EtlResult<usize>;

    /// Merge one edge per row whose two endpoints both exist.
    /// Returns the indices into `rows` of the rows that were merged.
    async fn merge_relationships(
        &mut self,
        kind: RelationshipKind,
        from: NodeKind,
        to: NodeKind,
        rows: &[EdgeRow],
    ) -> EtlResult<Vec<usize>>;

    /// Merge every edge the rule implies over the currently stored nodes, as
    /// one store-side statement. Returns the number of edges matched.
    async fn merge_inferred(&mut self, rule: &InferenceRule) -> EtlResult<usize>;

    async fn count_nodes(&mut self, kind: NodeKind) -> EtlResult<usize>;

    async fn count_relationships(&mut self, kind: RelationshipKind) -> EtlResult<usize>;

    /// End the session, committing its work when `commit` is true and
    /// discarding it otherwise.
    async fn release(self: Box<Self>, commit: bool) -> EtlResult<()>;
}

/// Release `session` according to `outcome` and pass the outcome through.
///
/// A failed outcome always wins over a failed rollback.
pub async fn finish_session<T>(session: Box<dyn GraphSession>, outcome: EtlResult<T>) -> EtlResult<T> {
    match outcome {
        Ok(value) => {
            session.release(true).await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(release_err) = session.release(false).await {
                tracing::warn!(error = %release_err, "Failed to roll back store session");
            }
            Err(err)
        }
    }
}

/// Node and relationship counts per kind, read back from the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphStatistics {
    pub nodes: BTreeMap<NodeKind, usize>,
    pub relationships: BTreeMap<RelationshipKind, usize>,
}

impl GraphStatistics {
    pub async fn collect(session: &mut dyn GraphSession) -> EtlResult<Self> {
        let mut stats = Self::default();
        for kind in NodeKind::ALL {
            stats.nodes.insert(kind, session.count_nodes(kind).await?);
        }
        for kind in RelationshipKind::ALL {
            stats
                .relationships
                .insert(kind, session.count_relationships(kind).await?);
        }
        Ok(stats)
    }

    pub fn total_nodes(&self) -> usize {
        self.nodes.values().sum()
    }

    pub fn total_relationships(&self) -> usize {
        self.relationships.values().sum()
    }
}

/// Read the current statistics through a fresh session.
pub async fn read_statistics(store: &dyn GraphStore) -> EtlResult<GraphStatistics> {
    let mut session = store.open_session().await?;
    let outcome = GraphStatistics::collect(session.as_mut()).await;
    finish_session(session, outcome).await
}

pub(crate) fn store_unavailable(err: impl std::fmt::Display) -> EtlError {
    EtlError::StoreUnavailable(err.to_string())
}
