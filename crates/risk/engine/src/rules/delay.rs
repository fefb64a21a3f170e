//! Missed target end dates.

use super::RiskRule;
use chrono::{DateTime, NaiveDate, Utc};
use risk_types::{Milestone, RiskCandidate, Severity, Snapshot, TriggerData};

const CONFIDENCE: f64 = 0.95;

const REMEDIATION: &str = "Agree a revised target date with the milestone owner, \
    then descope or add capacity to hit it. Notify teams that depend on this milestone.";

/// Severity for a number of days past the target end; `None` when not overdue.
pub fn delay_severity(days_overdue: i64) -> Option<Severity> {
    match days_overdue {
        d if d > 14 => Some(Severity::Critical),
        d if d > 7 => Some(Severity::High),
        d if d > 0 => Some(Severity::Medium),
        _ => None,
    }
}

/// Fires when today is past a milestone's target end.
#[derive(Debug, Clone, Copy, Default)]
pub struct DelayRule;

impl RiskRule for DelayRule {
    fn name(&self) -> &'static str {
        "delay"
    }

    fn evaluate(&self, snapshot: &Snapshot, now: DateTime<Utc>) -> Vec<RiskCandidate> {
        let today = now.date_naive();
        snapshot
            .milestones
            .iter()
            .filter_map(|m| check(m, today))
            .collect()
    }
}

fn check(milestone: &Milestone, today: NaiveDate) -> Option<RiskCandidate> {
    if milestone.status.is_completed() {
        return None;
    }
    let target_end = milestone.target_end?;
    let days_overdue = (today - target_end).num_days();
    let severity = delay_severity(days_overdue)?;

    Some(RiskCandidate {
        milestone_id: milestone.id.clone(),
        stream_id: None,
        epic_key: None,
        severity,
        title: format!("{} is {} days overdue", milestone.title, days_overdue),
        description: format!(
            "Target end date {} passed {} days ago with progress at {}%.",
            target_end, days_overdue, milestone.progress_percent
        ),
        suggested_action: REMEDIATION.to_string(),
        confidence_score: CONFIDENCE,
        trigger_data: TriggerData::Delay {
            target_end,
            days_overdue,
            progress_percent: milestone.progress_percent,
        },
    })
}
