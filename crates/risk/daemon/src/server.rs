//! Server setup and lifecycle management

use crate::api::create_router;
use crate::api::rest::state::AppState;
use crate::config::{RiskDaemonConfig, StorageConfig};
use crate::error::{DaemonError, DaemonResult};
use crate::scheduler::Scheduler;
use risk_engine::RiskEngine;
use risk_storage::{
    InMemoryRiskRepository, InMemorySnapshotProvider, JsonFileSnapshotProvider, SnapshotProvider,
};
use risk_types::ScopeFilter;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Risk daemon server
pub struct Server {
    config: RiskDaemonConfig,
    engine: Arc<RiskEngine>,
    scheduler: Arc<Scheduler>,
    trigger_rx: mpsc::Receiver<ScopeFilter>,
}

impl Server {
    /// Create a new server, connecting the configured storage
    pub async fn new(config: RiskDaemonConfig) -> DaemonResult<Self> {
        let engine = build_engine(&config.storage).await?;
        let (scheduler, trigger_rx) = Scheduler::new(config.scheduler.clone(), engine.clone());

        Ok(Self {
            config,
            engine,
            scheduler,
            trigger_rx,
        })
    }

    /// Run the server until a shutdown signal arrives
    pub async fn run(self) -> DaemonResult<()> {
        let addr = self.config.server.listen_addr;

        let state = AppState::new(
            self.engine.clone(),
            self.scheduler.clone(),
            self.config.query.clone(),
        );
        let app = create_router(state, &self.config.server);

        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Risk daemon listening on {}", addr);

        let scheduler = self.scheduler.clone();
        let trigger_rx = self.trigger_rx;
        let scheduler_task = tokio::spawn(async move {
            scheduler.start(trigger_rx).await;
        });

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| DaemonError::Server(e.to_string()))?;

        tracing::info!("Risk daemon shutting down");
        self.scheduler.stop().await;
        if let Err(e) = scheduler_task.await {
            tracing::warn!(error = %e, "Scheduler task ended abnormally");
        }

        Ok(())
    }
}

/// Wire the engine to the configured snapshot source and risk store
pub async fn build_engine(storage: &StorageConfig) -> DaemonResult<Arc<RiskEngine>> {
    match storage {
        StorageConfig::Memory { snapshot_path } => {
            let snapshots: Arc<dyn SnapshotProvider> = match snapshot_path {
                Some(path) => {
                    tracing::info!(path = %path.display(), "Using JSON snapshot file");
                    Arc::new(JsonFileSnapshotProvider::new(path))
                }
                None => {
                    tracing::warn!("No snapshot source configured; runs will see an empty portfolio");
                    Arc::new(InMemorySnapshotProvider::default())
                }
            };
            tracing::info!("Using in-memory risk storage");
            Ok(Arc::new(RiskEngine::new(
                snapshots,
                Arc::new(InMemoryRiskRepository::new()),
            )))
        }
        #[cfg(feature = "postgres")]
        StorageConfig::Postgres {
            url,
            max_connections,
            connect_timeout_secs,
        } => {
            let store = Arc::new(
                risk_storage::postgres::PostgresRiskStore::connect_with_options(
                    url,
                    *max_connections,
                    *connect_timeout_secs,
                )
                .await?,
            );
            tracing::info!(max_connections, "Using PostgreSQL storage");
            Ok(Arc::new(RiskEngine::new(store.clone(), store)))
        }
        #[cfg(not(feature = "postgres"))]
        StorageConfig::Postgres { .. } => Err(DaemonError::Config(
            "riskd was built without the `postgres` feature".to_string(),
        )),
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use risk_types::{Milestone, MilestoneId, MilestoneStatus, Snapshot};
    use std::io::Write;

    #[tokio::test]
    async fn memory_storage_reads_snapshot_file() {
        let snapshot = Snapshot {
            milestones: vec![Milestone {
                id: MilestoneId::new("ms-1"),
                title: "Search".to_string(),
                vision_title: None,
                progress_percent: 0,
                status: MilestoneStatus::Blocked,
                risk_level: None,
                target_start: None,
                target_end: None,
                quarter: None,
                depends_on: vec![],
            }],
            ..Default::default()
        };
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string(&snapshot).unwrap().as_bytes())
            .unwrap();

        let engine = build_engine(&StorageConfig::Memory {
            snapshot_path: Some(file.path().to_path_buf()),
        })
        .await
        .unwrap();
        let report = engine.run_analysis(&ScopeFilter::all()).await.unwrap();
        assert_eq!(report.analyzed_milestones, 1);
        assert_eq!(report.inserted, 1);
    }

    #[tokio::test]
    async fn memory_storage_without_snapshot_is_empty() {
        let engine = build_engine(&StorageConfig::default()).await.unwrap();
        let report = engine.run_analysis(&ScopeFilter::all()).await.unwrap();
        assert_eq!(report.analyzed_milestones, 0);
        assert_eq!(report.detected_risks, 0);
    }
}
