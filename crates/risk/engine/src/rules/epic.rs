//! Epic-level rules, keyed additionally by epic key.

use super::RiskRule;
use chrono::{DateTime, Utc};
use risk_types::{EpicStat, RiskCandidate, Severity, Snapshot, TriggerData};

const BLOCKER_CONFIDENCE: f64 = 0.88;
const STALL_CONFIDENCE: f64 = 0.75;

/// Epics smaller than this are never considered stalled.
const STALL_MIN_ISSUES: u32 = 5;

const BLOCKER_REMEDIATION: &str = "Triage the blocked issues in this epic. Unblock or reassign \
    them, and escalate external blockers to their owners.";

const STALL_REMEDIATION: &str = "Limit work in progress. Finish started issues before \
    picking up new ones and check whether reviews or hand-offs are piling up.";

/// Share of an epic's issues that are blocked. Zero-size epics count as fully
/// blocked; overlapping counters are capped at 1.
pub fn block_ratio(stat: &EpicStat) -> f64 {
    if stat.total_issues == 0 {
        1.0
    } else {
        (f64::from(stat.blocked_issues) / f64::from(stat.total_issues)).min(1.0)
    }
}

pub fn epic_blocker_severity(ratio: f64) -> Severity {
    if ratio > 0.3 {
        Severity::Critical
    } else if ratio > 0.1 {
        Severity::High
    } else {
        Severity::Medium
    }
}

/// Fires for every epic with at least one blocked issue.
#[derive(Debug, Clone, Copy, Default)]
pub struct EpicBlockerRule;

impl RiskRule for EpicBlockerRule {
    fn name(&self) -> &'static str {
        "epic_blocker"
    }

    fn evaluate(&self, snapshot: &Snapshot, _now: DateTime<Utc>) -> Vec<RiskCandidate> {
        snapshot
            .epic_stats
            .iter()
            .filter(|stat| stat.blocked_issues > 0)
            .map(|stat| {
                let ratio = block_ratio(stat);
                RiskCandidate {
                    milestone_id: stat.milestone_id.clone(),
                    stream_id: stat.stream_id.clone(),
                    epic_key: Some(stat.epic_key.clone()),
                    severity: epic_blocker_severity(ratio),
                    title: format!(
                        "{} has {} blocked issue{}",
                        stat.epic_key,
                        stat.blocked_issues,
                        if stat.blocked_issues == 1 { "" } else { "s" }
                    ),
                    description: format!(
                        "{} of {} issues are blocked ({:.0}%).",
                        stat.blocked_issues,
                        stat.total_issues,
                        ratio * 100.0
                    ),
                    suggested_action: BLOCKER_REMEDIATION.to_string(),
                    confidence_score: BLOCKER_CONFIDENCE,
                    trigger_data: TriggerData::EpicBlocked {
                        total_issues: stat.total_issues,
                        blocked_issues: stat.blocked_issues,
                        block_ratio: ratio,
                    },
                }
            })
            .collect()
    }
}

/// Fires when an epic has far more work started than finished.
#[derive(Debug, Clone, Copy, Default)]
pub struct EpicStallRule;

fn is_stalled(stat: &EpicStat) -> bool {
    stat.total_issues >= STALL_MIN_ISSUES
        && u64::from(stat.in_progress_issues) > 2 * u64::from(stat.done_issues)
}

impl RiskRule for EpicStallRule {
    fn name(&self) -> &'static str {
        "epic_stall"
    }

    fn evaluate(&self, snapshot: &Snapshot, _now: DateTime<Utc>) -> Vec<RiskCandidate> {
        snapshot
            .epic_stats
            .iter()
            .filter(|stat| is_stalled(stat))
            .map(|stat| RiskCandidate {
                milestone_id: stat.milestone_id.clone(),
                stream_id: stat.stream_id.clone(),
                epic_key: Some(stat.epic_key.clone()),
                severity: Severity::Medium,
                title: format!("{} is stalling", stat.epic_key),
                description: format!(
                    "{} issues in progress against {} done out of {}.",
                    stat.in_progress_issues, stat.done_issues, stat.total_issues
                ),
                suggested_action: STALL_REMEDIATION.to_string(),
                confidence_score: STALL_CONFIDENCE,
                trigger_data: TriggerData::EpicStall {
                    in_progress_issues: stat.in_progress_issues,
                    done_issues: stat.done_issues,
                    total_issues: stat.total_issues,
                },
            })
            .collect()
    }
}
