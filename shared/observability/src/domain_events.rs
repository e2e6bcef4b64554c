//! Domain event logging for load runs.
//!
//! Provides structured logging for load stages and job attempts with a consistent schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Result of a domain operation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum OperationResult {
    Success,
    Failure,
    Partial,
}

impl std::fmt::Display for OperationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
            Self::Partial => write!(f, "partial"),
        }
    }
}

/// Categories of domain events, one per pipeline stage plus the job itself
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Constraint,
    NodeLoad,
    RelationshipLoad,
    Inference,
    Job,
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Constraint => write!(f, "constraint"),
            Self::NodeLoad => write!(f, "node_load"),
            Self::RelationshipLoad => write!(f, "relationship_load"),
            Self::Inference => write!(f, "inference"),
            Self::Job => write!(f, "job"),
        }
    }
}

/// A structured domain event for logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    pub timestamp: DateTime<Utc>,
    pub category: EventCategory,
    /// Specific event type (e.g., "stage_completed", "attempt_failed")
    pub event_type: String,
    /// Load run this event belongs to
    pub run_id: Option<Uuid>,
    /// Kind being operated on (e.g., "node", "relationship")
    pub entity_type: Option<String>,
    /// Label of the kind (e.g., "Hospital", "COVERED_BY")
    pub entity_id: Option<String>,
    pub result: OperationResult,
    pub duration_ms: Option<u64>,
    /// Attempt number for retries
    pub attempt: Option<u32>,
    pub error: Option<String>,
    /// Service that emitted the event
    pub service: String,
    /// Additional structured metadata
    pub metadata: Option<serde_json::Value>,
}

impl DomainEvent {
    /// Create a new domain event builder
    pub fn new(service: impl Into<String>, category: EventCategory, event_type: impl Into<String>) -> DomainEventBuilder {
        DomainEventBuilder {
            service: service.into(),
            category,
            event_type: event_type.into(),
            run_id: None,
            entity_type: None,
            entity_id: None,
            result: OperationResult::Success,
            duration_ms: None,
            attempt: None,
            error: None,
            metadata: None,
        }
    }
}

/// Builder for constructing domain events
pub struct DomainEventBuilder {
    service: String,
    category: EventCategory,
    event_type: String,
    run_id: Option<Uuid>,
    entity_type: Option<String>,
    entity_id: Option<String>,
    result: OperationResult,
    duration_ms: Option<u64>,
    attempt: Option<u32>,
    error: Option<String>,
    metadata: Option<serde_json::Value>,
}

impl DomainEventBuilder {
    pub fn run(mut self, run_id: Uuid) -> Self {
        self.run_id = Some(run_id);
        self
    }

    pub fn entity(mut self, entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn result(mut self, result: OperationResult) -> Self {
        self.result = result;
        self
    }

    pub fn success(mut self) -> Self {
        self.result = OperationResult::Success;
        self
    }

    pub fn failure(mut self, error: impl Into<String>) -> Self {
        self.result = OperationResult::Failure;
        self.error = Some(error.into());
        self
    }

    pub fn duration_ms(mut self, ms: u64) -> Self {
        self.duration_ms = Some(ms);
        self
    }

    pub fn attempt(mut self, attempt: u32) -> Self {
        self.attempt = Some(attempt);
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Build and emit the event as a log
    pub fn emit(self) {
        let event = self.build();
        let json = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());

        match event.result {
            OperationResult::Success => tracing::info!(
                target: "domain_event",
                category = %event.category,
                event_type = %event.event_type,
                result = "success",
                "DomainEvent: {}", json
            ),
            OperationResult::Failure => tracing::error!(
                target: "domain_event",
                category = %event.category,
                event_type = %event.event_type,
                result = "failure",
                error = ?event.error,
                "DomainEvent: {}", json
            ),
            OperationResult::Partial => tracing::warn!(
                target: "domain_event",
                category = %event.category,
                event_type = %event.event_type,
                result = "partial",
                "DomainEvent: {}", json
            ),
        }
    }

    /// Build the event without emitting
    pub fn build(self) -> DomainEvent {
        DomainEvent {
            timestamp: Utc::now(),
            category: self.category,
            event_type: self.event_type,
            run_id: self.run_id,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            result: self.result,
            duration_ms: self.duration_ms,
            attempt: self.attempt,
            error: self.error,
            service: self.service,
            metadata: self.metadata,
        }
    }
}

// ============================================================================
// Convenience functions for common load events
// ============================================================================

/// Log completion of one unit of work inside a stage.
///
/// A stage that skipped records is reported as partial.
#[allow(clippy::too_many_arguments)]
pub fn log_stage_completed(
    service: &str,
    run_id: Uuid,
    attempt: u32,
    category: EventCategory,
    label: &str,
    skipped: usize,
    duration_ms: u64,
    metadata: serde_json::Value,
) {
    let entity_type = match category {
        EventCategory::NodeLoad | EventCategory::Constraint => "node",
        _ => "relationship",
    };
    let result = if skipped > 0 {
        OperationResult::Partial
    } else {
        OperationResult::Success
    };

    DomainEvent::new(service, category, "stage_completed")
        .run(run_id)
        .attempt(attempt)
        .entity(entity_type, label)
        .duration_ms(duration_ms)
        .metadata(metadata)
        .result(result)
        .emit();
}

/// Log a failed load attempt
pub fn log_attempt_failed(service: &str, run_id: Uuid, attempt: u32, max_attempts: u32, error: &str, duration_ms: u64) {
    DomainEvent::new(service, EventCategory::Job, "attempt_failed")
        .run(run_id)
        .attempt(attempt)
        .duration_ms(duration_ms)
        .metadata(serde_json::json!({ "max_attempts": max_attempts }))
        .failure(error)
        .emit();
}

/// Log a successful load run
pub fn log_job_completed(service: &str, run_id: Uuid, attempts: u32, duration_ms: u64, metadata: serde_json::Value) {
    DomainEvent::new(service, EventCategory::Job, "job_completed")
        .run(run_id)
        .attempt(attempts)
        .duration_ms(duration_ms)
        .metadata(metadata)
        .success()
        .emit();
}

/// Log the terminal failure of a load run after all attempts
pub fn log_job_failed(service: &str, run_id: Uuid, attempts: u32, error: &str, duration_ms: u64) {
    DomainEvent::new(service, EventCategory::Job, "job_failed")
        .run(run_id)
        .attempt(attempts)
        .duration_ms(duration_ms)
        .failure(error)
        .emit();
}
