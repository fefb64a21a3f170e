//! Milestones explicitly marked blocked.

use super::RiskRule;
use chrono::{DateTime, Utc};
use risk_types::{MilestoneStatus, RiskCandidate, Severity, Snapshot, TriggerData};

const CONFIDENCE: f64 = 1.0;

const REMEDIATION: &str = "Identify the blocking issue and escalate to whoever can clear it. \
    Record the unblock plan on the milestone.";

/// Fires for every milestone whose status is `blocked`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MilestoneBlockedRule;

impl RiskRule for MilestoneBlockedRule {
    fn name(&self) -> &'static str {
        "milestone_blocked"
    }

    fn evaluate(&self, snapshot: &Snapshot, _now: DateTime<Utc>) -> Vec<RiskCandidate> {
        snapshot
            .milestones
            .iter()
            .filter(|m| m.status == MilestoneStatus::Blocked)
            .map(|m| RiskCandidate {
                milestone_id: m.id.clone(),
                stream_id: None,
                epic_key: None,
                severity: Severity::Critical,
                title: format!("{} is blocked", m.title),
                description: format!(
                    "Milestone is marked blocked at {}% progress.",
                    m.progress_percent
                ),
                suggested_action: REMEDIATION.to_string(),
                confidence_score: CONFIDENCE,
                trigger_data: TriggerData::MilestoneBlocked { status: m.status },
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use risk_types::RiskType;

    #[test]
    fn blocked_is_always_critical() {
        let snapshot = Snapshot {
            milestones: vec![
                milestone("ms-1", MilestoneStatus::Blocked),
                milestone("ms-2", MilestoneStatus::InProgress),
            ],
            ..Default::default()
        };
        let candidates = MilestoneBlockedRule.evaluate(&snapshot, now());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].milestone_id.as_str(), "ms-1");
        assert_eq!(candidates[0].severity, Severity::Critical);
        assert_eq!(candidates[0].confidence_score, 1.0);
        assert_eq!(candidates[0].risk_type(), RiskType::Blocker);
    }
}
