//! Configuration for riskd

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskDaemonConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Scheduler configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Listing limits
    #[serde(default)]
    pub query: QueryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    pub listen_addr: SocketAddr,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub enable_cors: bool,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8090)),
            enable_cors: true,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory risk store (for development/testing)
    Memory {
        /// JSON snapshot document re-read on every run; empty portfolio if unset
        #[serde(default, skip_serializing_if = "Option::is_none")]
        snapshot_path: Option<PathBuf>,
    },

    /// PostgreSQL storage for both snapshots and risks
    Postgres {
        /// Connection URL
        url: String,

        /// Maximum connections in pool
        #[serde(default = "default_pool_size")]
        max_connections: u32,

        /// Connection timeout in seconds
        #[serde(default = "default_connection_timeout")]
        connect_timeout_secs: u64,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Memory {
            snapshot_path: None,
        }
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Run analysis periodically
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Analysis interval in seconds
    #[serde(default = "default_analysis_interval")]
    pub interval_secs: u64,

    /// Upper bound for a single run in seconds
    #[serde(default = "default_run_timeout")]
    pub run_timeout_secs: u64,

    /// Run once immediately when the scheduler starts
    #[serde(default = "default_true")]
    pub run_on_startup: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_analysis_interval(),
            run_timeout_secs: default_run_timeout(),
            run_on_startup: true,
        }
    }
}

/// Listing limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Limit applied when a request does not specify one
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// Largest limit a request may ask for
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}

impl QueryConfig {
    /// Resolve a requested limit against the configured bounds.
    pub fn effective_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_limit)
            .clamp(1, self.max_limit.max(1))
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_request_timeout() -> u64 {
    30
}

fn default_pool_size() -> u32 {
    10
}

fn default_connection_timeout() -> u64 {
    5
}

fn default_analysis_interval() -> u64 {
    900
}

fn default_run_timeout() -> u64 {
    120
}

fn default_limit() -> usize {
    50
}

fn default_max_limit() -> usize {
    500
}

fn default_log_level() -> String {
    "info".to_string()
}

impl RiskDaemonConfig {
    /// Load configuration: defaults, then the optional file, then `RISK_`
    /// environment variables (`RISK_SCHEDULER__INTERVAL_SECS=60`).
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&RiskDaemonConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("RISK")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config() {
        let config = RiskDaemonConfig::default();
        assert_eq!(config.server.listen_addr.port(), 8090);
        assert!(matches!(
            config.storage,
            StorageConfig::Memory {
                snapshot_path: None
            }
        ));
        assert!(config.scheduler.enabled);
        assert_eq!(config.scheduler.interval_secs, 900);
        assert_eq!(config.query.default_limit, 50);
    }

    #[test]
    fn effective_limit_is_bounded() {
        let query = QueryConfig {
            default_limit: 20,
            max_limit: 100,
        };
        assert_eq!(query.effective_limit(None), 20);
        assert_eq!(query.effective_limit(Some(0)), 1);
        assert_eq!(query.effective_limit(Some(5000)), 100);
    }

    #[test]
    fn loads_file_over_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
[server]
listen_addr = "0.0.0.0:9000"

[storage]
type = "postgres"
url = "postgres://risk@localhost/roadmap"

[scheduler]
interval_secs = 60
run_on_startup = false
"#
        )
        .unwrap();

        let config = RiskDaemonConfig::load(file.path().to_str()).unwrap();
        assert_eq!(config.server.listen_addr.port(), 9000);
        assert_eq!(config.scheduler.interval_secs, 60);
        assert!(!config.scheduler.run_on_startup);
        assert_eq!(config.scheduler.run_timeout_secs, 120);
        match config.storage {
            StorageConfig::Postgres {
                url,
                max_connections,
                ..
            } => {
                assert_eq!(url, "postgres://risk@localhost/roadmap");
                assert_eq!(max_connections, 10);
            }
            other => panic!("unexpected storage {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(RiskDaemonConfig::load(Some("/nonexistent/riskd.toml")).is_err());
    }
}
