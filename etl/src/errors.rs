use thiserror::Error;

use crate::jobs::JobState;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Source unavailable: {location}: {reason}")]
    SourceUnavailable { location: String, reason: String },

    #[error("Malformed record in {source_name} at line {position}: {reason}")]
    MalformedRecord {
        source_name: String,
        position: u64,
        reason: String,
    },

    #[error("Invalid identifier {value:?} for {kind} at line {position}")]
    InvalidIdentifier {
        kind: String,
        position: u64,
        value: String,
    },

    #[error("Invalid amount {value:?} in column {column} at line {position}")]
    InvalidAmount {
        column: String,
        position: u64,
        value: String,
    },

    #[error("Endpoint not found for {relationship} at line {position}")]
    EndpointNotFound { relationship: String, position: u64 },

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Store error: {0}")]
    TransientStore(String),

    #[error("Invalid job transition from {from:?} to {to:?}")]
    InvalidTransition { from: JobState, to: JobState },

    #[error("Configuration error: {0}")]
    Configuration(#[from] hospital_config::ConfigError),

    #[error("Load cancelled")]
    Cancelled,

    #[error("Load failed after {attempts} attempt(s): {last}")]
    RetriesExhausted { attempts: u32, last: Box<EtlError> },
}

impl EtlError {
    /// Record-local conditions are swallowed by the loaders with a recorded skip.
    pub fn is_record_local(&self) -> bool {
        matches!(
            self,
            EtlError::InvalidAmount { .. } | EtlError::EndpointNotFound { .. }
        )
    }

    /// The error of the final attempt, looking through `RetriesExhausted`.
    pub fn last_cause(&self) -> &EtlError {
        match self {
            EtlError::RetriesExhausted { last, .. } => last.last_cause(),
            other => other,
        }
    }
}

impl From<neo4rs::Error> for EtlError {
    fn from(err: neo4rs::Error) -> Self {
        EtlError::TransientStore(err.to_string())
    }
}

pub type EtlResult<T> = Result<T, EtlError>;
