//! Observability for the hospital graph ETL.
//!
//! Provides:
//! - Tracing subscriber setup driven by `RUST_LOG` and `LOG_FORMAT`
//! - Structured domain events for load stages and job attempts
//! - Logging macros for recurring patterns (timing, store statements, retries, skips)

pub mod domain_events;
pub mod init;
pub mod macros;

pub use domain_events::*;
pub use init::init_tracing_for;
