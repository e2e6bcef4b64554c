//! Bulk loader that builds the hospital property graph from CSV sources.
//!
//! A run declares identifier uniqueness, merges six node kinds, merges the
//! sourced relationships between them and finally infers EMPLOYS edges.
//! Every write is a match-or-create keyed on natural identifiers, so a run can
//! be repeated over the same sources without creating duplicates.

pub mod errors;
pub mod graph_db;
pub mod jobs;
pub mod models;
pub mod services;
pub mod sources;

pub use errors::{EtlError, EtlResult};
pub use graph_db::{GraphSession, GraphStatistics, GraphStore, InMemoryGraph, Neo4jConnector, StoreConnector};
pub use jobs::{JobRunner, JobState, LoadReport, RetryPolicy};

/// Service name attached to logs and domain events.
pub const SERVICE_NAME: &str = "hospital-etl";
