//! Milestone progress trailing elapsed schedule time.

use super::RiskRule;
use chrono::{DateTime, NaiveDate, Utc};
use risk_types::{Milestone, MilestoneStatus, RiskCandidate, Severity, Snapshot, TriggerData};

const CONFIDENCE: f64 = 0.85;

const REMEDIATION: &str = "Review scope against remaining time. Remove blockers slowing \
    the team, or re-baseline the schedule if the plan no longer holds.";

/// Percentage of the scheduled window elapsed by `today`, clamped to `[0, 100]`.
///
/// Day granularity. Returns `None` for empty or inverted windows.
pub fn time_progress(start: NaiveDate, end: NaiveDate, today: NaiveDate) -> Option<f64> {
    let total = (end - start).num_days();
    if total <= 0 {
        return None;
    }
    let elapsed = (today - start).num_days();
    Some((elapsed as f64 / total as f64 * 100.0).clamp(0.0, 100.0))
}

/// Severity for a gap (in percentage points) between time and progress.
pub fn velocity_severity(gap: f64) -> Option<Severity> {
    if gap > 40.0 {
        Some(Severity::High)
    } else if gap > 20.0 {
        Some(Severity::Medium)
    } else {
        None
    }
}

/// Fires when an in-progress milestone lags its schedule.
#[derive(Debug, Clone, Copy, Default)]
pub struct MilestoneVelocityRule;

impl RiskRule for MilestoneVelocityRule {
    fn name(&self) -> &'static str {
        "milestone_velocity"
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
    if milestone.status != MilestoneStatus::InProgress {
        return None;
    }
    let (start, end) = (milestone.target_start?, milestone.target_end?);
    let time_progress = time_progress(start, end, today)?;
    let actual_progress = f64::from(milestone.progress_percent);
    let gap = time_progress - actual_progress;
    let severity = velocity_severity(gap)?;

    Some(RiskCandidate {
        milestone_id: milestone.id.clone(),
        stream_id: None,
        epic_key: None,
        severity,
        title: format!("{} is behind schedule", milestone.title),
        description: format!(
            "{:.0}% of the schedule has elapsed but progress is {:.0}% ({:.0} points behind).",
            time_progress, actual_progress, gap
        ),
        suggested_action: REMEDIATION.to_string(),
        confidence_score: CONFIDENCE,
        trigger_data: TriggerData::MilestoneVelocity {
            time_progress,
            actual_progress,
            gap,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use risk_types::RiskType;

    fn scheduled(progress: u8, started_days_ago: i64, ends_in_days: i64) -> Snapshot {
        let mut m = milestone("ms-1", MilestoneStatus::InProgress);
        m.progress_percent = progress;
        m.target_start = Some(days_ago(started_days_ago));
        m.target_end = Some(days_ago(-ends_in_days));
        Snapshot {
            milestones: vec![m],
            ..Default::default()
        }
    }

    #[test]
    fn time_progress_clamps() {
        let start = days_ago(10);
        let end = days_ago(-10);
        assert_eq!(time_progress(start, end, days_ago(0)), Some(50.0));
        assert_eq!(time_progress(start, end, days_ago(30)), Some(0.0));
        assert_eq!(time_progress(start, end, days_ago(-30)), Some(100.0));
        assert_eq!(time_progress(end, start, days_ago(0)), None);
        assert_eq!(time_progress(start, start, days_ago(0)), None);
    }

    #[test]
    fn large_gap_is_high() {
        // 80% elapsed, 10% done
        let candidates = MilestoneVelocityRule.evaluate(&scheduled(10, 8, 2), now());
        assert_eq!(candidates.len(), 1);
        let c = &candidates[0];
        assert_eq!(c.severity, Severity::High);
        assert_eq!(c.risk_type(), RiskType::VelocityDrop);
        assert_eq!(c.confidence_score, 0.85);
        match c.trigger_data {
            TriggerData::MilestoneVelocity { gap, .. } => assert!((gap - 70.0).abs() < 1e-9),
            ref other => panic!("unexpected evidence {other:?}"),
        }
    }

    #[test]
    fn moderate_gap_is_medium() {
        // 50% elapsed, 25% done
        let candidates = MilestoneVelocityRule.evaluate(&scheduled(25, 5, 5), now());
        assert_eq!(candidates[0].severity, Severity::Medium);
    }

    #[test]
    fn small_gap_does_not_fire() {
        assert!(MilestoneVelocityRule
            .evaluate(&scheduled(40, 5, 5), now())
            .is_empty());
    }

    #[test]
    fn only_in_progress_milestones() {
        let mut snapshot = scheduled(0, 9, 1);
        snapshot.milestones[0].status = MilestoneStatus::Planned;
        assert!(MilestoneVelocityRule.evaluate(&snapshot, now()).is_empty());
    }

    #[test]
    fn inverted_window_is_skipped() {
        let mut snapshot = scheduled(0, 5, 5);
        let m = &mut snapshot.milestones[0];
        std::mem::swap(&mut m.target_start, &mut m.target_end);
        assert!(MilestoneVelocityRule.evaluate(&snapshot, now()).is_empty());
    }
}
