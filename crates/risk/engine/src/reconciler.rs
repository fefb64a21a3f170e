//! Reconciliation of rule candidates against stored open risks.
//!
//! For each dedup key that fired this pass the open record is refreshed in
//! place, or a new one is inserted. Open records whose key did not fire are
//! auto-resolved, but only after every candidate has been written.
//!
//! Each key is reconciled independently; a failed write is logged, counted
//! and skipped so the rest of the pass still converges.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use risk_storage::{RiskRepository, StatusChange, StorageError};
use risk_types::{DedupKey, RiskCandidate, RiskStatus, ScopeFilter, ENGINE_ACTOR};
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};

/// Resolution note written on auto-resolved risks.
pub const AUTO_RESOLVE_NOTE: &str = "condition no longer detected";

/// Counts produced by one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Distinct dedup keys among the candidates.
    pub detected: usize,
    pub inserted: usize,
    pub updated: usize,
    pub auto_resolved: usize,
    pub failed: usize,
}

/// Collapse candidates sharing a dedup key, keeping first-seen order.
///
/// The most severe candidate wins; ties go to the more confident one, then to
/// the earlier one.
pub fn collapse(candidates: Vec<RiskCandidate>) -> Vec<RiskCandidate> {
    let mut positions: HashMap<DedupKey, usize> = HashMap::new();
    let mut kept: Vec<RiskCandidate> = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        match positions.get(&candidate.dedup_key()) {
            Some(&pos) => {
                let current = &kept[pos];
                let stronger = candidate.severity > current.severity
                    || (candidate.severity == current.severity
                        && candidate.confidence_score > current.confidence_score);
                if stronger {
                    kept[pos] = candidate;
                }
            }
            None => {
                positions.insert(candidate.dedup_key(), kept.len());
                kept.push(candidate);
            }
        }
    }
    kept
}

/// Diffs candidates against the repository.
pub struct Reconciler {
    repository: Arc<dyn RiskRepository>,
}

impl Reconciler {
    pub fn new(repository: Arc<dyn RiskRepository>) -> Self {
        Self { repository }
    }

    /// Reconcile one pass worth of candidates.
    ///
    /// Only open risks whose milestone is within `scope` are candidates for
    /// auto-resolution. Fails only if the open risks cannot be listed, in
    /// which case nothing has been written.
    pub async fn reconcile(
        &self,
        candidates: Vec<RiskCandidate>,
        scope: &ScopeFilter,
        now: DateTime<Utc>,
    ) -> EngineResult<ReconcileOutcome> {
        let stored_open = self
            .repository
            .list_open(scope)
            .await
            .map_err(EngineError::Storage)?;

        let candidates = collapse(candidates);
        let fired: HashSet<DedupKey> = candidates.iter().map(|c| c.dedup_key()).collect();
        let mut outcome = ReconcileOutcome {
            detected: candidates.len(),
            ..Default::default()
        };

        info!(
            candidates = candidates.len(),
            stored_open = stored_open.len(),
            "Starting risk reconciliation"
        );

        for candidate in candidates {
            let key = candidate.dedup_key();
            match self.repository.upsert_open(candidate, now).await {
                Ok(result) => {
                    debug!(
                        key = %key,
                        risk_id = %result.risk().id,
                        inserted = result.is_insert(),
                        "Risk upserted"
                    );
                    if result.is_insert() {
                        outcome.inserted += 1;
                    } else {
                        outcome.updated += 1;
                    }
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Failed to upsert risk");
                    outcome.failed += 1;
                }
            }
        }

        for stale in stored_open
            .into_iter()
            .filter(|risk| !fired.contains(&risk.dedup_key()))
        {
            let change = StatusChange {
                risk_id: stale.id,
                expected: Some(RiskStatus::Open),
                new_status: RiskStatus::Resolved,
                note: Some(AUTO_RESOLVE_NOTE.to_string()),
                actor: ENGINE_ACTOR.to_string(),
                at: now,
            };
            match self.repository.apply_status_change(change).await {
                Ok(_) => {
                    info!(risk_id = %stale.id, key = %stale.dedup_key(), "Risk auto-resolved");
                    outcome.auto_resolved += 1;
                }
                Err(StorageError::Conflict(_)) | Err(StorageError::NotFound(_)) => {
                    debug!(risk_id = %stale.id, "Risk changed concurrently, skipping auto-resolve");
                }
                Err(e) => {
                    warn!(risk_id = %stale.id, error = %e, "Failed to auto-resolve risk");
                    outcome.failed += 1;
                }
            }
        }

        info!(
            detected = outcome.detected,
            inserted = outcome.inserted,
            updated = outcome.updated,
            auto_resolved = outcome.auto_resolved,
            failed = outcome.failed,
            "Risk reconciliation completed"
        );

        Ok(outcome)
    }
}
