use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{parsed_or, required, ConfigResult};

/// Connection settings for the target Neo4j database.
#[derive(Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Bolt URI, e.g. `bolt://localhost:7687` or `neo4j+s://xxxx.databases.neo4j.io`
    pub uri: String,
    pub user: String,
    #[serde(skip_serializing)]
    pub password: String,
    /// Named logical database
    pub database: String,
    pub max_connections: usize,
    pub fetch_size: usize,
}

impl StoreConfig {
    pub const DEFAULT_MAX_CONNECTIONS: usize = 10;
    pub const DEFAULT_FETCH_SIZE: usize = 500;

    pub fn new(
        uri: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            uri: uri.into(),
            user: user.into(),
            password: password.into(),
            database: database.into(),
            max_connections: Self::DEFAULT_MAX_CONNECTIONS,
            fetch_size: Self::DEFAULT_FETCH_SIZE,
        }
    }

    pub fn from_env() -> ConfigResult<Self> {
        Ok(Self {
            uri: required("NEO4J_URI")?,
            user: required("NEO4J_USERNAME")?,
            password: required("NEO4J_PASSWORD")?,
            database: required("NEO4J_DATABASE")?,
            max_connections: parsed_or("NEO4J_MAX_CONNECTIONS", Self::DEFAULT_MAX_CONNECTIONS)?,
            fetch_size: parsed_or("NEO4J_FETCH_SIZE", Self::DEFAULT_FETCH_SIZE)?,
        })
    }

    /// Check if the URI points at a hosted AuraDB instance
    pub fn is_aura(&self) -> bool {
        self.uri.contains("neo4j.io")
            || self.uri.starts_with("neo4j+s://")
            || self.uri.starts_with("neo4j+ssc://")
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("uri", &self.uri)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("max_connections", &self.max_connections)
            .field("fetch_size", &self.fetch_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_password() {
        let config = StoreConfig::new("bolt://localhost:7687", "neo4j", "hunter2", "neo4j");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_serialized_config_omits_password() {
        let config = StoreConfig::new("bolt://localhost:7687", "neo4j", "hunter2", "neo4j");
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(!json.contains("password"));
        assert!(json.contains("bolt://localhost:7687"));
    }

    #[test]
    fn test_is_aura() {
        assert!(StoreConfig::new("neo4j+s://abc.databases.neo4j.io", "u", "p", "neo4j").is_aura());
        assert!(!StoreConfig::new("bolt://localhost:7687", "u", "p", "neo4j").is_aura());
    }
}
