use hospital_observability::log_store;

use crate::errors::EtlResult;
use crate::graph_db::GraphSession;
use crate::models::{InferenceRule, EMPLOYS_RULE};

/// Derives relationships from the identifiers of already stored nodes.
#[derive(Debug, Clone, Copy)]
pub struct InferenceEngine {
    rule: InferenceRule,
}

impl Default for InferenceEngine {
    fn default() -> Self {
        Self::new(EMPLOYS_RULE)
    }
}

impl InferenceEngine {
    pub fn new(rule: InferenceRule) -> Self {
        Self { rule }
    }

    pub fn rule(&self) -> &InferenceRule {
        &self.rule
    }

    /// Merge every edge the rule implies in one bulk statement.
    pub async fn infer(&self, session: &mut dyn GraphSession) -> EtlResult<usize> {
        log_store!("merge_inferred", self.rule.kind.as_str());
        let merged = session.merge_inferred(&self.rule).await?;
        tracing::info!(
            label = self.rule.kind.as_str(),
            from = self.rule.from.as_str(),
            to = self.rule.to.as_str(),
            merged,
            "Inferred relationships merged"
        );
        Ok(merged)
    }
}
