pub mod retry;
pub mod runner;

pub use retry::RetryPolicy;
pub use runner::{JobRunner, LoadReport};

use serde::Serialize;

/// Lifecycle of one full load attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobState {
    Idle,
    ConstraintsPending,
    NodesPending,
    RelationshipsPending,
    InferencePending,
    Done,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }

    /// Stages advance strictly in order. Any non-terminal state may fail, and
    /// only a terminal state may go back to `Idle` for a new attempt.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        use JobState::*;
        match (self, next) {
            (Idle, ConstraintsPending)
            | (ConstraintsPending, NodesPending)
            | (NodesPending, RelationshipsPending)
            | (RelationshipsPending, InferencePending)
            | (InferencePending, Done)
            | (Done, Idle)
            | (Failed, Idle) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobState::Idle => "idle",
            JobState::ConstraintsPending => "constraints_pending",
            JobState::NodesPending => "nodes_pending",
            JobState::RelationshipsPending => "relationships_pending",
            JobState::InferencePending => "inference_pending",
            JobState::Done => "done",
            JobState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}
