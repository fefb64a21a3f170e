//! Manual status transitions.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use risk_storage::{RiskRepository, StatusChange, StorageError};
use risk_types::{Risk, RiskId, RiskStatus};
use tracing::info;

use crate::error::{EngineError, EngineResult};

/// Applies human-requested transitions and records who made them.
///
/// Any status other than `open` may be requested from any current status.
/// Reopening happens only through re-detection, which creates a new record.
pub struct LifecycleController {
    repository: Arc<dyn RiskRepository>,
}

impl LifecycleController {
    pub fn new(repository: Arc<dyn RiskRepository>) -> Self {
        Self { repository }
    }

    pub async fn set_status(
        &self,
        id: RiskId,
        status: RiskStatus,
        note: Option<String>,
        actor: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<Risk> {
        if !status.is_manual_target() {
            return Err(EngineError::InvalidTransition { to: status });
        }

        let change = StatusChange {
            risk_id: id,
            expected: None,
            new_status: status,
            note,
            actor: actor.to_string(),
            at: now,
        };

        let risk = self
            .repository
            .apply_status_change(change)
            .await
            .map_err(|e| match e {
                StorageError::NotFound(_) => EngineError::NotFound(id),
                other => EngineError::Storage(other),
            })?;

        info!(risk_id = %id, status = %status, actor, "Risk status changed");
        Ok(risk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use risk_storage::{InMemoryRiskRepository, RiskRepository};
    use risk_types::{HistoryAction, MilestoneId, RiskCandidate, Severity, TriggerData};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap()
    }

    async fn seeded() -> (Arc<InMemoryRiskRepository>, RiskId) {
        let repo = Arc::new(InMemoryRiskRepository::new());
        let outcome = repo
            .upsert_open(
                RiskCandidate {
                    milestone_id: MilestoneId::new("ms-1"),
                    stream_id: None,
                    epic_key: None,
                    severity: Severity::Critical,
                    title: "blocked".to_string(),
                    description: String::new(),
                    suggested_action: String::new(),
                    confidence_score: 1.0,
                    trigger_data: TriggerData::MilestoneBlocked {
                        status: risk_types::MilestoneStatus::Blocked,
                    },
                },
                now(),
            )
            .await
            .unwrap();
        let id = outcome.risk().id;
        (repo, id)
    }

    #[tokio::test]
    async fn acknowledge_keeps_resolved_at_unset() {
        let (repo, id) = seeded().await;
        let controller = LifecycleController::new(repo.clone());

        let risk = controller
            .set_status(id, RiskStatus::Acknowledged, None, "alice", now())
            .await
            .unwrap();
        assert_eq!(risk.status, RiskStatus::Acknowledged);
        assert_eq!(risk.resolved_at, None);

        let history = repo.history(&id).await.unwrap();
        let last = history.last().unwrap();
        assert_eq!(last.action, HistoryAction::StatusChanged);
        assert_eq!(last.actor, "alice");
    }

    #[tokio::test]
    async fn terminal_statuses_stamp_resolved_at() {
        for status in [
            RiskStatus::Resolved,
            RiskStatus::Mitigated,
            RiskStatus::FalsePositive,
        ] {
            let (repo, id) = seeded().await;
            let controller = LifecycleController::new(repo);
            let risk = controller
                .set_status(id, status, Some("handled".to_string()), "bob", now())
                .await
                .unwrap();
            assert_eq!(risk.status, status);
            assert_eq!(risk.resolved_at, Some(now()));
            assert_eq!(risk.resolution_note.as_deref(), Some("handled"));
        }
    }

    #[tokio::test]
    async fn reopening_is_rejected_without_write() {
        let (repo, id) = seeded().await;
        let controller = LifecycleController::new(repo.clone());

        let err = controller
            .set_status(id, RiskStatus::Open, None, "alice", now())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
        assert_eq!(repo.history(&id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let (repo, _) = seeded().await;
        let controller = LifecycleController::new(repo);
        let missing = RiskId::generate();

        let err = controller
            .set_status(missing, RiskStatus::Resolved, None, "alice", now())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(id) if id == missing));
    }
}
