//! In-process graph store.
//!
//! Mirrors the match-or-create semantics of the Neo4j statements: nodes keyed
//! by (label, id), edges keyed by (type, from id, to id), `SET +=` property
//! overwrite with null removing a property. Session writes are staged and only
//! applied on commit. Every statement is appended to an operation log so the
//! order of a load can be inspected.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use super::{GraphSession, GraphStore, StoreConnector};
use crate::errors::{EtlError, EtlResult};
use crate::models::{EdgeRow, InferenceRule, NodeKind, NodeRow, Properties, RelationshipKind};

/// A statement as seen by the store, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    EnsureUniqueness(NodeKind),
    MergeNodes(NodeKind, usize),
    MergeRelationships(RelationshipKind, usize),
    MergeInferred(RelationshipKind),
}

#[derive(Debug, Default)]
struct GraphState {
    constraints: BTreeSet<(NodeKind, String)>,
    nodes: BTreeMap<(NodeKind, i64), Properties>,
    edges: BTreeMap<(RelationshipKind, i64, i64), Properties>,
    log: Vec<StoreOp>,
    open_sessions: usize,
    failing_opens: usize,
}

impl GraphState {
    fn apply(&mut self, write: PendingWrite) {
        match write {
            PendingWrite::Constraint(kind, property) => {
                self.constraints.insert((kind, property));
            }
            PendingWrite::Node(kind, row) => {
                let props = self.nodes.entry((kind, row.id)).or_default();
                set_properties(props, row.properties);
            }
            PendingWrite::Edge(kind, from, to, properties) => {
                let props = self.edges.entry((kind, from, to)).or_default();
                set_properties(props, properties);
            }
        }
    }

    fn node_ids(&self, kind: NodeKind) -> Vec<i64> {
        self.nodes
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, id)| *id)
            .collect()
    }
}

/// `SET n += props`: null removes, anything else overwrites.
fn set_properties(target: &mut Properties, update: Properties) {
    for (name, value) in update {
        if value.is_null() {
            target.remove(name);
        } else {
            target.insert(name, value);
        }
    }
}

#[derive(Debug)]
enum PendingWrite {
    Constraint(NodeKind, String),
    Node(NodeKind, NodeRow),
    Edge(RelationshipKind, i64, i64, Properties),
}

/// Shared-state graph; clones see the same data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGraph {
    state: Arc<Mutex<GraphState>>,
}

impl InMemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` session opens fail with a transient store error.
    pub fn fail_next_session_opens(&self, count: usize) {
        self.state.lock().failing_opens = count;
    }

    pub fn node(&self, kind: NodeKind, id: i64) -> Option<Properties> {
        self.state.lock().nodes.get(&(kind, id)).cloned()
    }

    pub fn node_ids(&self, kind: NodeKind) -> Vec<i64> {
        self.state.lock().node_ids(kind)
    }

    pub fn node_count(&self, kind: NodeKind) -> usize {
        self.state.lock().node_ids(kind).len()
    }

    pub fn relationship(&self, kind: RelationshipKind, from: i64, to: i64) -> Option<Properties> {
        self.state.lock().edges.get(&(kind, from, to)).cloned()
    }

    pub fn relationship_pairs(&self, kind: RelationshipKind) -> Vec<(i64, i64)> {
        self.state
            .lock()
            .edges
            .keys()
            .filter(|(k, _, _)| *k == kind)
            .map(|(_, from, to)| (*from, *to))
            .collect()
    }

    pub fn relationship_count(&self, kind: RelationshipKind) -> usize {
        self.relationship_pairs(kind).len()
    }

    pub fn has_constraint(&self, kind: NodeKind, property: &str) -> bool {
        self.state
            .lock()
            .constraints
            .contains(&(kind, property.to_string()))
    }

    pub fn operations(&self) -> Vec<StoreOp> {
        self.state.lock().log.clone()
    }

    /// Sessions opened and not yet released.
    pub fn open_sessions(&self) -> usize {
        self.state.lock().open_sessions
    }
}

#[async_trait]
impl StoreConnector for InMemoryGraph {
    async fn connect(&self) -> EtlResult<Arc<dyn GraphStore>> {
        Ok(Arc::new(self.clone()))
    }
}

#[async_trait]
impl GraphStore for InMemoryGraph {
    async fn open_session(&self) -> EtlResult<Box<dyn GraphSession>> {
        let mut state = self.state.lock();
        if state.failing_opens > 0 {
            state.failing_opens -= 1;
            return Err(EtlError::TransientStore(
                "injected session failure".to_string(),
            ));
        }
        state.open_sessions += 1;

        Ok(Box::new(InMemorySession {
            state: Arc::clone(&self.state),
            pending: Vec::new(),
        }))
    }
}

struct InMemorySession {
    state: Arc<Mutex<GraphState>>,
    pending: Vec<PendingWrite>,
}

#[async_trait]
impl GraphSession for InMemorySession {
    async fn ensure_uniqueness(&mut self, kind: NodeKind, property: &str) -> EtlResult<()> {
        self.state.lock().log.push(StoreOp::EnsureUniqueness(kind));
        self.pending
            .push(PendingWrite::Constraint(kind, property.to_string()));
        Ok(())
    }

    async fn merge_nodes(&mut self, kind: NodeKind, rows: &[NodeRow]) -> EtlResult<usize> {
        self.state
            .lock()
            .log
            .push(StoreOp::MergeNodes(kind, rows.len()));
        self.pending
            .extend(rows.iter().cloned().map(|row| PendingWrite::Node(kind, row)));
        Ok(rows.len())
    }

    async fn merge_relationships(
        &mut self,
        kind: RelationshipKind,
        from: NodeKind,
        to: NodeKind,
        rows: &[EdgeRow],
    ) -> EtlResult<Vec<usize>> {
        let mut state = self.state.lock();
        state.log.push(StoreOp::MergeRelationships(kind, rows.len()));

        let mut merged = Vec::new();
        for (idx, row) in rows.iter().enumerate() {
            if state.nodes.contains_key(&(from, row.from)) && state.nodes.contains_key(&(to, row.to)) {
                self.pending.push(PendingWrite::Edge(
                    kind,
                    row.from,
                    row.to,
                    row.properties.clone(),
                ));
                merged.push(idx);
            }
        }
        Ok(merged)
    }

    async fn merge_inferred(&mut self, rule: &InferenceRule) -> EtlResult<usize> {
        let mut state = self.state.lock();
        state.log.push(StoreOp::MergeInferred(rule.kind));

        let pairs = rule.pairs(&state.node_ids(rule.from), &state.node_ids(rule.to));
        let merged = pairs.len();
        self.pending.extend(
            pairs
                .into_iter()
                .map(|(from, to)| PendingWrite::Edge(rule.kind, from, to, Properties::new())),
        );
        Ok(merged)
    }

    async fn count_nodes(&mut self, kind: NodeKind) -> EtlResult<usize> {
        Ok(self.state.lock().node_ids(kind).len())
    }

    async fn count_relationships(&mut self, kind: RelationshipKind) -> EtlResult<usize> {
        Ok(self
            .state
            .lock()
            .edges
            .keys()
            .filter(|(k, _, _)| *k == kind)
            .count())
    }

    async fn release(self: Box<Self>, commit: bool) -> EtlResult<()> {
        let InMemorySession { state, pending } = *self;
        let mut state = state.lock();
        state.open_sessions = state.open_sessions.saturating_sub(1);
        if commit {
            for write in pending {
                state.apply(write);
            }
        }
        Ok(())
    }
}
