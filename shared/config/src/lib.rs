pub mod store;

pub use store::StoreConfig;

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(String),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: String, value: String },

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Location of each of the six tabular sources, one per node kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceLocations {
    pub hospitals: String,
    pub payers: String,
    pub physicians: String,
    pub patients: String,
    pub visits: String,
    pub reviews: String,
}

impl SourceLocations {
    pub fn from_env() -> ConfigResult<Self> {
        Ok(Self {
            hospitals: required("HOSPITALS_CSV_PATH")?,
            payers: required("PAYERS_CSV_PATH")?,
            physicians: required("PHYSICIANS_CSV_PATH")?,
            patients: required("PATIENTS_CSV_PATH")?,
            visits: required("VISITS_CSV_PATH")?,
            reviews: required("REVIEWS_CSV_PATH")?,
        })
    }
}

/// Job-granular retry: a fixed number of attempts separated by a fixed delay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    pub fn from_env() -> ConfigResult<Self> {
        let defaults = Self::default();
        Ok(Self {
            max_attempts: parsed_or("ETL_RETRY_ATTEMPTS", defaults.max_attempts)?,
            delay: Duration::from_secs(parsed_or(
                "ETL_RETRY_DELAY_SECS",
                defaults.delay.as_secs(),
            )?),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtlConfig {
    pub sources: SourceLocations,
    pub store: StoreConfig,
    pub retry: RetryConfig,
    /// Rows sent to the store per statement.
    pub batch_size: usize,
    /// Upper bound on units of work running at once inside one stage.
    pub stage_concurrency: usize,
}

impl EtlConfig {
    pub const DEFAULT_BATCH_SIZE: usize = 1000;
    pub const DEFAULT_STAGE_CONCURRENCY: usize = 4;

    pub fn new(sources: SourceLocations, store: StoreConfig) -> Self {
        Self {
            sources,
            store,
            retry: RetryConfig::default(),
            batch_size: Self::DEFAULT_BATCH_SIZE,
            stage_concurrency: Self::DEFAULT_STAGE_CONCURRENCY,
        }
    }

    /// Build the configuration from the process environment, reading `.env` first if present.
    pub fn from_env() -> ConfigResult<Self> {
        dotenv::dotenv().ok();

        let config = Self {
            sources: SourceLocations::from_env()?,
            store: StoreConfig::from_env()?,
            retry: RetryConfig::from_env()?,
            batch_size: parsed_or("ETL_BATCH_SIZE", Self::DEFAULT_BATCH_SIZE)?,
            stage_concurrency: parsed_or(
                "ETL_STAGE_CONCURRENCY",
                Self::DEFAULT_STAGE_CONCURRENCY,
            )?,
        };
        config.validate()?;

        tracing::debug!(
            uri = %config.store.uri,
            database = %config.store.database,
            attempts = config.retry.max_attempts,
            "Loaded ETL configuration"
        );

        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "retry attempts must be at least 1".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Validation(
                "batch size must be at least 1".to_string(),
            ));
        }
        if self.stage_concurrency == 0 {
            return Err(ConfigError::Validation(
                "stage concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

pub(crate) fn required(key: &str) -> ConfigResult<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(key.to_string())),
    }
}

pub(crate) fn parsed_or<T: std::str::FromStr>(key: &str, default: T) -> ConfigResult<T> {
    match env::var(key) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            key: key.to_string(),
            value,
        }),
        Err(_) => Ok(default),
    }
}
