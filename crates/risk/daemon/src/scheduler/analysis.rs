//! Periodic and on-demand analysis runs

use crate::config::SchedulerConfig;
use crate::error::{DaemonError, DaemonResult};
use risk_engine::RiskEngine;
use risk_types::{RunReport, ScopeFilter};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::time::{interval, timeout, Duration, MissedTickBehavior};

/// Runs the engine on a timer and on request.
///
/// Every run is bounded by the configured timeout. A run that times out or
/// fails is logged and the next tick tries again; per-key reconciliation makes
/// retries converge.
pub struct Scheduler {
    config: SchedulerConfig,
    engine: Arc<RiskEngine>,
    trigger_tx: mpsc::Sender<ScopeFilter>,
    shutdown_tx: watch::Sender<bool>,
    running: Arc<RwLock<bool>>,
    last_report: RwLock<Option<RunReport>>,
}

impl Scheduler {
    /// Create a new scheduler and the receiver its loop consumes
    pub fn new(
        config: SchedulerConfig,
        engine: Arc<RiskEngine>,
    ) -> (Arc<Self>, mpsc::Receiver<ScopeFilter>) {
        let (trigger_tx, trigger_rx) = mpsc::channel(16);
        let (shutdown_tx, _) = watch::channel(false);

        let scheduler = Arc::new(Self {
            config,
            engine,
            trigger_tx,
            shutdown_tx,
            running: Arc::new(RwLock::new(false)),
            last_report: RwLock::new(None),
        });

        (scheduler, trigger_rx)
    }

    /// Queue a run for the background loop. Returns false if the queue is full
    /// or the loop has stopped.
    pub fn trigger_analysis(&self, scope: ScopeFilter) -> bool {
        self.trigger_tx.try_send(scope).is_ok()
    }

    /// Run analysis now, bounded by the run timeout.
    pub async fn run_analysis(&self, scope: &ScopeFilter) -> DaemonResult<RunReport> {
        let budget = Duration::from_secs(self.config.run_timeout_secs);
        let report = timeout(budget, self.engine.run_analysis(scope))
            .await
            .map_err(|_| DaemonError::Timeout(self.config.run_timeout_secs))??;

        *self.last_report.write().await = Some(report.clone());
        Ok(report)
    }

    /// Report of the most recent successful run
    pub async fn last_report(&self) -> Option<RunReport> {
        self.last_report.read().await.clone()
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Run the scheduling loop until [`Scheduler::stop`] is called
    pub async fn start(self: Arc<Self>, mut trigger_rx: mpsc::Receiver<ScopeFilter>) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        {
            let mut running = self.running.write().await;
            *running = true;
        }

        let mut ticker = interval(Duration::from_secs(self.config.interval_secs.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        if !self.config.run_on_startup {
            // the first tick completes immediately
            ticker.tick().await;
        }

        tracing::info!(
            enabled = self.config.enabled,
            interval_secs = self.config.interval_secs,
            "Scheduler started"
        );

        loop {
            let stopped = *shutdown_rx.borrow_and_update();
            if stopped {
                break;
            }
            tokio::select! {
                _ = shutdown_rx.changed() => continue,
                _ = ticker.tick(), if self.config.enabled => {
                    self.run_logged(&ScopeFilter::all(), "scheduled").await;
                }
                Some(scope) = trigger_rx.recv() => {
                    self.run_logged(&scope, "triggered").await;
                }
            }
        }

        *self.running.write().await = false;
        tracing::info!("Scheduler stopped");
    }

    /// Stop the scheduler. A run in progress finishes first.
    pub async fn stop(&self) {
        self.shutdown_tx.send_replace(true);
    }

    async fn run_logged(&self, scope: &ScopeFilter, source: &'static str) {
        match self.run_analysis(scope).await {
            Ok(report) => tracing::info!(
                source,
                run_id = %report.run_id,
                inserted = report.inserted,
                updated = report.updated,
                auto_resolved = report.auto_resolved,
                failed = report.failed,
                "Analysis run finished"
            ),
            Err(e) => tracing::error!(source, error = %e, "Analysis run failed"),
        }
    }
}
