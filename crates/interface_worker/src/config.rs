//! Worker configuration

use serde::Deserialize;

/// Worker configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// Database URL
    pub database_url: String,
    /// Name stamped into modified_by and queue audit columns
    pub worker_name: String,
    /// Seconds between queue polls
    pub poll_interval_secs: u64,
    /// Seconds between full lookup-cache refreshes
    pub cache_refresh_interval_secs: u64,
    /// Maximum database connections
    pub max_connections: u32,
    /// Log level
    pub log_level: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/portfolio".to_string(),
            worker_name: "transaction-worker".to_string(),
            poll_interval_secs: 30,
            cache_refresh_interval_secs: 900,
            max_connections: 10,
            log_level: "info".to_string(),
        }
    }
}

impl WorkerConfig {
    /// Loads configuration from environment
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix("WORKER"))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.poll_interval_secs, 30);
        assert_eq!(config.cache_refresh_interval_secs, 900);
        assert_eq!(config.worker_name, "transaction-worker");
    }
}
