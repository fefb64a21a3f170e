//! In-memory reference implementations of the storage traits.
//!
//! Deterministic and test-friendly. A single lock guards records, the open
//! dedup index and the history log, which makes every per-key write atomic.

use crate::traits::{RiskRepository, SnapshotProvider, StatusChange, UpsertOutcome};
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use risk_types::{
    DedupKey, HistoryAction, Milestone, MilestoneId, Risk, RiskCandidate, RiskFilter,
    RiskHistoryEntry, RiskId, RiskStatus, ScopeFilter, Snapshot, ENGINE_ACTOR,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

/// Snapshot provider backed by a mutable in-process snapshot.
#[derive(Default)]
pub struct InMemorySnapshotProvider {
    snapshot: RwLock<Snapshot>,
    unavailable: AtomicBool,
}

impl InMemorySnapshotProvider {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Replace the whole snapshot.
    pub fn replace(&self, snapshot: Snapshot) -> StorageResult<()> {
        let mut guard = self
            .snapshot
            .write()
            .map_err(|_| StorageError::Backend("snapshot lock poisoned".to_string()))?;
        *guard = snapshot;
        Ok(())
    }

    /// Mutate one milestone in place. Returns false if it is unknown.
    pub fn update_milestone(
        &self,
        id: &MilestoneId,
        update: impl FnOnce(&mut Milestone),
    ) -> StorageResult<bool> {
        let mut guard = self
            .snapshot
            .write()
            .map_err(|_| StorageError::Backend("snapshot lock poisoned".to_string()))?;
        match guard.milestones.iter_mut().find(|m| &m.id == id) {
            Some(milestone) => {
                update(milestone);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Simulate an unreachable upstream source.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl SnapshotProvider for InMemorySnapshotProvider {
    async fn load_snapshot(&self, scope: &ScopeFilter) -> StorageResult<Snapshot> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(
                "in-memory snapshot marked unavailable".to_string(),
            ));
        }
        let guard = self
            .snapshot
            .read()
            .map_err(|_| StorageError::Backend("snapshot lock poisoned".to_string()))?;
        Ok(guard.clone().normalized(scope))
    }
}

#[derive(Default)]
struct RepositoryState {
    risks: HashMap<RiskId, Risk>,
    open_index: HashMap<DedupKey, RiskId>,
    history: Vec<RiskHistoryEntry>,
}

/// In-memory risk repository.
#[derive(Default)]
pub struct InMemoryRiskRepository {
    state: RwLock<RepositoryState>,
}

impl InMemoryRiskRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored record regardless of status, unordered.
    pub fn all_risks(&self) -> StorageResult<Vec<Risk>> {
        let guard = self
            .state
            .read()
            .map_err(|_| StorageError::Backend("risk lock poisoned".to_string()))?;
        Ok(guard.risks.values().cloned().collect())
    }
}

#[async_trait]
impl RiskRepository for InMemoryRiskRepository {
    async fn upsert_open(
        &self,
        candidate: RiskCandidate,
        detected_at: DateTime<Utc>,
    ) -> StorageResult<UpsertOutcome> {
        let mut guard = self
            .state
            .write()
            .map_err(|_| StorageError::Backend("risk lock poisoned".to_string()))?;
        let state = &mut *guard;
        let key = candidate.dedup_key();

        if let Some(id) = state.open_index.get(&key).copied() {
            let risk = state.risks.get_mut(&id).ok_or_else(|| {
                StorageError::Backend(format!("open index points at missing risk {id}"))
            })?;
            risk.refresh_from(candidate, detected_at);
            return Ok(UpsertOutcome::Updated(risk.clone()));
        }

        let risk = candidate.into_open_risk(RiskId::generate(), detected_at);
        state.history.push(RiskHistoryEntry {
            risk_id: risk.id,
            action: HistoryAction::Detected,
            new_status: RiskStatus::Open,
            note: None,
            actor: ENGINE_ACTOR.to_string(),
            timestamp: detected_at,
        });
        state.open_index.insert(key, risk.id);
        state.risks.insert(risk.id, risk.clone());
        Ok(UpsertOutcome::Inserted(risk))
    }

    async fn list_open(&self, scope: &ScopeFilter) -> StorageResult<Vec<Risk>> {
        let guard = self
            .state
            .read()
            .map_err(|_| StorageError::Backend("risk lock poisoned".to_string()))?;
        Ok(guard
            .risks
            .values()
            .filter(|risk| risk.is_open() && scope.includes(&risk.milestone_id))
            .cloned()
            .collect())
    }

    async fn get_risk(&self, id: &RiskId) -> StorageResult<Option<Risk>> {
        let guard = self
            .state
            .read()
            .map_err(|_| StorageError::Backend("risk lock poisoned".to_string()))?;
        Ok(guard.risks.get(id).cloned())
    }

    async fn list_risks(&self, filter: &RiskFilter, limit: usize) -> StorageResult<Vec<Risk>> {
        let guard = self
            .state
            .read()
            .map_err(|_| StorageError::Backend("risk lock poisoned".to_string()))?;
        let mut values = guard
            .risks
            .values()
            .filter(|risk| filter.matches(risk))
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by(Risk::listing_order);
        if limit > 0 {
            values.truncate(limit);
        }
        Ok(values)
    }

    async fn apply_status_change(&self, change: StatusChange) -> StorageResult<Risk> {
        let mut guard = self
            .state
            .write()
            .map_err(|_| StorageError::Backend("risk lock poisoned".to_string()))?;
        let state = &mut *guard;
        let risk = state
            .risks
            .get_mut(&change.risk_id)
            .ok_or_else(|| StorageError::NotFound(format!("risk {} not found", change.risk_id)))?;

        if let Some(expected) = change.expected {
            if risk.status != expected {
                return Err(StorageError::Conflict(format!(
                    "risk {} is {}, expected {}",
                    risk.id, risk.status, expected
                )));
            }
        }

        let was_open = risk.is_open();
        risk.apply_status(change.new_status, change.note.clone(), change.at);
        if was_open && !risk.is_open() {
            let key = risk.dedup_key();
            if state.open_index.get(&key) == Some(&risk.id) {
                state.open_index.remove(&key);
            }
        }

        state.history.push(RiskHistoryEntry {
            risk_id: risk.id,
            action: HistoryAction::StatusChanged,
            new_status: change.new_status,
            note: change.note,
            actor: change.actor,
            timestamp: change.at,
        });
        Ok(risk.clone())
    }

    async fn history(&self, id: &RiskId) -> StorageResult<Vec<RiskHistoryEntry>> {
        let guard = self
            .state
            .read()
            .map_err(|_| StorageError::Backend("risk lock poisoned".to_string()))?;
        Ok(guard
            .history
            .iter()
            .filter(|entry| &entry.risk_id == id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use risk_types::{MilestoneStatus, Severity, TriggerData};

    fn blocker(milestone: &str) -> RiskCandidate {
        RiskCandidate {
            milestone_id: MilestoneId::new(milestone),
            stream_id: None,
            epic_key: None,
            severity: Severity::Critical,
            title: format!("{milestone} is blocked"),
            description: "blocked".to_string(),
            suggested_action: "unblock".to_string(),
            confidence_score: 1.0,
            trigger_data: TriggerData::MilestoneBlocked {
                status: MilestoneStatus::Blocked,
            },
        }
    }

    fn change(id: RiskId, to: RiskStatus, expected: Option<RiskStatus>) -> StatusChange {
        StatusChange {
            risk_id: id,
            expected,
            new_status: to,
            note: None,
            actor: "tester".to_string(),
            at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn upsert_refreshes_existing_open_record() {
        let repo = InMemoryRiskRepository::new();
        let first = repo.upsert_open(blocker("ms-1"), Utc::now()).await.unwrap();
        let later = Utc::now() + Duration::minutes(5);
        let second = repo.upsert_open(blocker("ms-1"), later).await.unwrap();

        assert!(first.is_insert());
        assert!(!second.is_insert());
        assert_eq!(first.risk().id, second.risk().id);
        assert_eq!(second.risk().detected_at, later);
        assert_eq!(repo.all_risks().unwrap().len(), 1);
        assert_eq!(repo.history(&first.risk().id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn closed_record_frees_the_dedup_key() {
        let repo = InMemoryRiskRepository::new();
        let first = repo.upsert_open(blocker("ms-1"), Utc::now()).await.unwrap();
        repo.apply_status_change(change(first.risk().id, RiskStatus::Resolved, None))
            .await
            .unwrap();

        let again = repo.upsert_open(blocker("ms-1"), Utc::now()).await.unwrap();
        assert!(again.is_insert());
        assert_ne!(again.risk().id, first.risk().id);
        assert_eq!(repo.all_risks().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn expected_status_mismatch_is_a_conflict() {
        let repo = InMemoryRiskRepository::new();
        let risk = repo.upsert_open(blocker("ms-1"), Utc::now()).await.unwrap();
        let id = risk.risk().id;
        repo.apply_status_change(change(id, RiskStatus::Acknowledged, None))
            .await
            .unwrap();

        let result = repo
            .apply_status_change(change(id, RiskStatus::Resolved, Some(RiskStatus::Open)))
            .await;
        assert!(matches!(result, Err(StorageError::Conflict(_))));
        assert_eq!(repo.history(&id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unknown_risk_is_not_found() {
        let repo = InMemoryRiskRepository::new();
        let result = repo
            .apply_status_change(change(RiskId::generate(), RiskStatus::Resolved, None))
            .await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn list_open_respects_scope() {
        let repo = InMemoryRiskRepository::new();
        repo.upsert_open(blocker("ms-1"), Utc::now()).await.unwrap();
        repo.upsert_open(blocker("ms-2"), Utc::now()).await.unwrap();

        let scoped = repo
            .list_open(&ScopeFilter::milestones([MilestoneId::new("ms-2")]))
            .await
            .unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].milestone_id.as_str(), "ms-2");
        assert_eq!(repo.list_open(&ScopeFilter::all()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unavailable_provider_fails_load() {
        let provider = InMemorySnapshotProvider::default();
        provider.set_unavailable(true);
        let result = provider.load_snapshot(&ScopeFilter::all()).await;
        assert!(matches!(result, Err(StorageError::Unavailable(_))));
    }
}
