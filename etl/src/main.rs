use anyhow::{Context, Result};
use hospital_config::EtlConfig;
use hospital_etl::{EtlError, JobRunner, Neo4jConnector, SERVICE_NAME};
use hospital_observability::init_tracing_for;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing_for(SERVICE_NAME);

    tracing::info!("Starting hospital graph ETL");

    let config = EtlConfig::from_env().context("Failed to load ETL configuration")?;
    tracing::info!(
        uri = %config.store.uri,
        database = %config.store.database,
        batch_size = config.batch_size,
        stage_concurrency = config.stage_concurrency,
        "Configuration loaded"
    );

    let connector = Arc::new(Neo4jConnector::new(config.store.clone()));
    let runner = JobRunner::new(config, connector);

    let report = tokio::select! {
        result = runner.run_full_load() => result.context("Hospital graph load failed")?,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!(state = %runner.state(), "Interrupted, abandoning load");
            return Err(EtlError::Cancelled).context("Hospital graph load interrupted");
        }
    };

    tracing::info!(
        run_id = %report.run_id,
        attempts = report.attempts,
        nodes = report.statistics.total_nodes(),
        relationships = report.statistics.total_relationships(),
        inferred = report.inferred,
        skipped_records = report.skipped_records(),
        duration_ms = report.duration_ms,
        "Hospital graph load finished"
    );
    match serde_json::to_string(&report) {
        Ok(json) => tracing::debug!(report = %json, "Load report"),
        Err(e) => tracing::warn!(error = %e, "Could not serialize load report"),
    }

    Ok(())
}
