//! Rule evaluators.
//!
//! Every rule is a pure, deterministic function of `(snapshot, now)`. Rules
//! never read the system clock and never touch storage, so each one can be
//! tested against a hand-built [`Snapshot`].

mod blocker;
mod delay;
mod dependency;
mod epic;
mod velocity;

pub use blocker::MilestoneBlockedRule;
pub use delay::{delay_severity, DelayRule};
pub use dependency::DependencyBlockRule;
pub use epic::{epic_blocker_severity, EpicBlockerRule, EpicStallRule};
pub use velocity::{time_progress, velocity_severity, MilestoneVelocityRule};

use chrono::{DateTime, Utc};
use risk_types::{RiskCandidate, Snapshot};
use tracing::debug;

/// A single detection rule.
pub trait RiskRule: Send + Sync {
    /// Stable name used in logs.
    fn name(&self) -> &'static str;

    /// Emit zero or more candidates for the snapshot as of `now`.
    fn evaluate(&self, snapshot: &Snapshot, now: DateTime<Utc>) -> Vec<RiskCandidate>;
}

/// Ordered collection of rules evaluated on every pass.
pub struct RuleSet {
    rules: Vec<Box<dyn RiskRule>>,
}

impl RuleSet {
    /// The six built-in rules.
    pub fn standard() -> Self {
        Self {
            rules: vec![
                Box::new(DelayRule),
                Box::new(MilestoneVelocityRule),
                Box::new(MilestoneBlockedRule),
                Box::new(DependencyBlockRule),
                Box::new(EpicBlockerRule),
                Box::new(EpicStallRule),
            ],
        }
    }

    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with_rule(mut self, rule: impl RiskRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Run every rule and concatenate their candidates.
    pub fn evaluate(&self, snapshot: &Snapshot, now: DateTime<Utc>) -> Vec<RiskCandidate> {
        let mut candidates = Vec::new();
        for rule in &self.rules {
            let found = rule.evaluate(snapshot, now);
            debug!(rule = rule.name(), candidates = found.len(), "Rule evaluated");
            candidates.extend(found);
        }
        candidates
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.rules.iter().map(|rule| rule.name()))
            .finish()
    }
}

/// Evaluate the standard rule set.
pub fn evaluate_all(snapshot: &Snapshot, now: DateTime<Utc>) -> Vec<RiskCandidate> {
    RuleSet::standard().evaluate(snapshot, now)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use risk_types::{EpicStat, Milestone, MilestoneId, MilestoneStatus};

    pub fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap()
    }

    pub fn days_ago(days: i64) -> NaiveDate {
        now().date_naive() - chrono::Duration::days(days)
    }

    pub fn milestone(id: &str, status: MilestoneStatus) -> Milestone {
        Milestone {
            id: MilestoneId::new(id),
            title: format!("Milestone {id}"),
            vision_title: None,
            progress_percent: 0,
            status,
            risk_level: None,
            target_start: None,
            target_end: None,
            quarter: None,
            depends_on: vec![],
        }
    }

    pub fn epic(
        milestone_id: &str,
        key: &str,
        total: u32,
        done: u32,
        blocked: u32,
        in_progress: u32,
    ) -> EpicStat {
        EpicStat {
            milestone_id: MilestoneId::new(milestone_id),
            epic_key: key.to_string(),
            stream_id: None,
            total_issues: total,
            done_issues: done,
            blocked_issues: blocked,
            in_progress_issues: in_progress,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use risk_types::{MilestoneStatus, RiskType};

    #[test]
    fn standard_set_has_every_rule() {
        let rules = RuleSet::standard();
        assert_eq!(rules.len(), 6);
        assert_eq!(
            format!("{rules:?}"),
            r#"["delay", "milestone_velocity", "milestone_blocked", "dependency_block", "epic_blocker", "epic_stall"]"#
        );
    }

    #[test]
    fn blocked_overdue_milestone_fires_two_rules() {
        let mut m = milestone("ms-1", MilestoneStatus::Blocked);
        m.target_end = Some(days_ago(3));
        let snapshot = Snapshot {
            milestones: vec![m],
            ..Default::default()
        };

        let mut types: Vec<RiskType> = evaluate_all(&snapshot, now())
            .iter()
            .map(|c| c.risk_type())
            .collect();
        types.sort();
        assert_eq!(types, vec![RiskType::Delay, RiskType::Blocker]);
    }

    #[test]
    fn empty_rule_set_emits_nothing() {
        let snapshot = Snapshot {
            milestones: vec![milestone("ms-1", MilestoneStatus::Blocked)],
            ..Default::default()
        };
        assert!(RuleSet::empty().evaluate(&snapshot, now()).is_empty());
    }
}
