//! Engine facade wiring the loader, rules, reconciler, lifecycle and queries.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use risk_storage::{RiskRepository, SnapshotProvider};
use risk_types::{
    Risk, RiskFilter, RiskHistoryEntry, RiskId, RiskListing, RiskStatus, RunReport, ScopeFilter,
};
use tracing::{error, info, info_span, Instrument};

use crate::error::{EngineError, EngineResult};
use crate::lifecycle::LifecycleController;
use crate::query::QuerySurface;
use crate::reconciler::Reconciler;
use crate::rules::RuleSet;

/// Entry point for analysis runs, listings and manual transitions.
pub struct RiskEngine {
    snapshots: Arc<dyn SnapshotProvider>,
    rules: RuleSet,
    reconciler: Reconciler,
    lifecycle: LifecycleController,
    query: QuerySurface,
}

impl RiskEngine {
    pub fn new(
        snapshots: Arc<dyn SnapshotProvider>,
        repository: Arc<dyn RiskRepository>,
    ) -> Self {
        Self {
            snapshots,
            rules: RuleSet::standard(),
            reconciler: Reconciler::new(repository.clone()),
            lifecycle: LifecycleController::new(repository.clone()),
            query: QuerySurface::new(repository),
        }
    }

    /// Replace the rule set evaluated on each pass.
    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.rules = rules;
        self
    }

    pub async fn run_analysis(&self, scope: &ScopeFilter) -> EngineResult<RunReport> {
        self.run_analysis_at(scope, Utc::now()).await
    }

    /// Run one analysis pass as of `now`.
    ///
    /// The snapshot is fully loaded before anything is written; a loader
    /// failure aborts the run with no writes.
    pub async fn run_analysis_at(
        &self,
        scope: &ScopeFilter,
        now: DateTime<Utc>,
    ) -> EngineResult<RunReport> {
        let mut report = RunReport::begin(now);
        let span = info_span!("risk_analysis", run_id = %report.run_id);

        async move {
            info!(
                scoped = !scope.is_unscoped(),
                milestones = scope.milestone_ids.len(),
                "Starting risk analysis"
            );

            let snapshot = self.snapshots.load_snapshot(scope).await.map_err(|e| {
                error!(error = %e, "Snapshot load failed, aborting run");
                EngineError::Snapshot(e)
            })?;
            report.analyzed_milestones = snapshot.milestones.len();
            report.analyzed_epics = snapshot.epic_stats.len();

            let candidates = self.rules.evaluate(&snapshot, now);
            let outcome = self.reconciler.reconcile(candidates, scope, now).await?;

            report.detected_risks = outcome.detected;
            report.inserted = outcome.inserted;
            report.updated = outcome.updated;
            report.auto_resolved = outcome.auto_resolved;
            report.failed = outcome.failed;
            report.finished_at = Utc::now().max(now);

            info!(
                analyzed_milestones = report.analyzed_milestones,
                analyzed_epics = report.analyzed_epics,
                detected = report.detected_risks,
                inserted = report.inserted,
                updated = report.updated,
                auto_resolved = report.auto_resolved,
                failed = report.failed,
                "Risk analysis completed"
            );
            Ok::<_, EngineError>(report)
        }
        .instrument(span)
        .await
    }

    pub async fn get_risks(&self, filter: &RiskFilter, limit: usize) -> EngineResult<RiskListing> {
        self.query.list(filter, limit).await
    }

    pub async fn get_risk(&self, id: RiskId) -> EngineResult<Risk> {
        self.query.get(id).await
    }

    pub async fn risk_history(&self, id: RiskId) -> EngineResult<Vec<RiskHistoryEntry>> {
        self.query.history(id).await
    }

    pub async fn set_risk_status(
        &self,
        id: RiskId,
        status: RiskStatus,
        note: Option<String>,
        actor: &str,
    ) -> EngineResult<Risk> {
        self.set_risk_status_at(id, status, note, actor, Utc::now())
            .await
    }

    pub async fn set_risk_status_at(
        &self,
        id: RiskId,
        status: RiskStatus,
        note: Option<String>,
        actor: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<Risk> {
        self.lifecycle.set_status(id, status, note, actor, now).await
    }
}
