//! Application state for API handlers

use crate::config::QueryConfig;
use crate::scheduler::Scheduler;
use risk_engine::RiskEngine;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Risk engine
    pub engine: Arc<RiskEngine>,

    /// Scheduler handle
    pub scheduler: Arc<Scheduler>,

    /// Listing limits
    pub query: QueryConfig,

    /// Daemon version
    pub version: String,

    /// Daemon start time
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    /// Create new application state
    pub fn new(engine: Arc<RiskEngine>, scheduler: Arc<Scheduler>, query: QueryConfig) -> Self {
        Self {
            engine,
            scheduler,
            query,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: chrono::Utc::now(),
        }
    }

    /// Human-readable uptime
    pub fn uptime(&self) -> String {
        let secs = (chrono::Utc::now() - self.started_at).num_seconds();

        if secs < 60 {
            format!("{}s", secs)
        } else if secs < 3600 {
            format!("{}m {}s", secs / 60, secs % 60)
        } else if secs < 86400 {
            format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
        } else {
            format!("{}d {}h", secs / 86400, (secs % 86400) / 3600)
        }
    }
}
