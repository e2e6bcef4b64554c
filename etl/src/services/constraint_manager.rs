use hospital_observability::log_store;

use crate::errors::EtlResult;
use crate::graph_db::GraphSession;
use crate::models::{NodeKind, ID_PROPERTY};

/// Declares identifier uniqueness for node kinds.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstraintManager;

impl ConstraintManager {
    pub fn new() -> Self {
        Self
    }

    pub async fn ensure_uniqueness(
        &self,
        session: &mut dyn GraphSession,
        kind: NodeKind,
        property: &str,
    ) -> EtlResult<()> {
        log_store!("ensure_uniqueness", kind.as_str());
        session.ensure_uniqueness(kind, property).await
    }

    /// Uniqueness on the identifier property of every node kind.
    pub async fn ensure_all(&self, session: &mut dyn GraphSession) -> EtlResult<usize> {
        for kind in NodeKind::ALL {
            self.ensure_uniqueness(session, kind, ID_PROPERTY).await?;
        }
        tracing::info!(count = NodeKind::ALL.len(), "Uniqueness constraints ensured");
        Ok(NodeKind::ALL.len())
    }
}
