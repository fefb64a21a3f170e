use crate::StorageResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use risk_types::{
    Risk, RiskCandidate, RiskFilter, RiskHistoryEntry, RiskId, RiskStatus, ScopeFilter, Snapshot,
};

/// Read boundary to the externally maintained delivery state.
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    /// Load open (non-completed) milestones within `scope`, their epic
    /// statistics and the dependency index.
    async fn load_snapshot(&self, scope: &ScopeFilter) -> StorageResult<Snapshot>;
}

/// Result of an atomic per-key upsert.
#[derive(Debug, Clone)]
pub enum UpsertOutcome {
    Inserted(Risk),
    Updated(Risk),
}

impl UpsertOutcome {
    pub fn risk(&self) -> &Risk {
        match self {
            UpsertOutcome::Inserted(risk) | UpsertOutcome::Updated(risk) => risk,
        }
    }

    pub fn is_insert(&self) -> bool {
        matches!(self, UpsertOutcome::Inserted(_))
    }
}

/// A requested lifecycle change, applied together with its history entry.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub risk_id: RiskId,
    /// Only apply when the record is currently in this status.
    pub expected: Option<RiskStatus>,
    pub new_status: RiskStatus,
    pub note: Option<String>,
    pub actor: String,
    pub at: DateTime<Utc>,
}

/// Durable store of risk records.
#[async_trait]
pub trait RiskRepository: Send + Sync {
    /// Refresh the open risk sharing the candidate's dedup key, or insert a
    /// new open risk if none exists. Must be atomic per dedup key so that
    /// concurrent callers converge on a single open record.
    async fn upsert_open(
        &self,
        candidate: RiskCandidate,
        detected_at: DateTime<Utc>,
    ) -> StorageResult<UpsertOutcome>;

    /// All open risks whose milestone falls within `scope`.
    async fn list_open(&self, scope: &ScopeFilter) -> StorageResult<Vec<Risk>>;

    async fn get_risk(&self, id: &RiskId) -> StorageResult<Option<Risk>>;

    /// Risks matching `filter`, most severe first, then newest detection
    /// first. A `limit` of 0 means unbounded.
    async fn list_risks(&self, filter: &RiskFilter, limit: usize) -> StorageResult<Vec<Risk>>;

    /// Apply a status change and append its history entry.
    ///
    /// Fails with `NotFound` for unknown ids and `Conflict` when `expected`
    /// does not match the current status.
    async fn apply_status_change(&self, change: StatusChange) -> StorageResult<Risk>;

    /// Audit trail for one risk, oldest first.
    async fn history(&self, id: &RiskId) -> StorageResult<Vec<RiskHistoryEntry>>;
}
