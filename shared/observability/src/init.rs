//! Tracing initialization for the ETL binary.
//!
//! `RUST_LOG` sets the filter (default `info`); `LOG_FORMAT=json` switches
//! from pretty output to one JSON object per line.

use std::env;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Pretty,
    Json,
}

fn log_format(value: Option<&str>) -> LogFormat {
    match value {
        Some(v) if v.trim().eq_ignore_ascii_case("json") => LogFormat::Json,
        _ => LogFormat::Pretty,
    }
}

/// Install the global subscriber for a service
pub fn init_tracing_for(service_name: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let format = log_format(env::var("LOG_FORMAT").ok().as_deref());

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_current_span(true).with_target(true))
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init(),
    }

    tracing::info!(service = %service_name, format = ?format, "Tracing initialized");
}
