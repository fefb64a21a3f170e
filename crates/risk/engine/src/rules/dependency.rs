//! In-progress milestones waiting on unfinished dependencies.

use super::RiskRule;
use chrono::{DateTime, Utc};
use risk_types::{
    BlockingDependency, DependencyRef, Milestone, MilestoneId, MilestoneStatus, RiskCandidate,
    Severity, Snapshot, TriggerData,
};
use std::collections::{HashMap, HashSet};

const CONFIDENCE: f64 = 0.90;

const REMEDIATION: &str = "Coordinate with the owners of the blocking milestones on a delivery \
    date, or re-sequence work so this milestone can progress without them.";

/// Fires when an in-progress milestone has at least one direct dependency
/// that is not completed.
///
/// Only direct links are inspected, so cycles in the dependency graph are
/// harmless. Links to unknown milestones and self-links are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct DependencyBlockRule;

impl RiskRule for DependencyBlockRule {
    fn name(&self) -> &'static str {
        "dependency_block"
    }

    fn evaluate(&self, snapshot: &Snapshot, _now: DateTime<Utc>) -> Vec<RiskCandidate> {
        let index = snapshot.dependency_index();
        snapshot
            .milestones
            .iter()
            .filter_map(|m| check(m, &index))
            .collect()
    }
}

fn check(
    milestone: &Milestone,
    index: &HashMap<&MilestoneId, DependencyRef>,
) -> Option<RiskCandidate> {
    if milestone.status != MilestoneStatus::InProgress || milestone.depends_on.is_empty() {
        return None;
    }

    let mut seen = HashSet::new();
    let blocking: Vec<BlockingDependency> = milestone
        .depends_on
        .iter()
        .filter(|id| **id != milestone.id && seen.insert(*id))
        .filter_map(|id| index.get(id))
        .filter(|dep| !dep.status.is_completed())
        .map(|dep| BlockingDependency {
            id: dep.id.clone(),
            title: dep.title.clone(),
            status: dep.status,
        })
        .collect();

    if blocking.is_empty() {
        return None;
    }

    let names = blocking
        .iter()
        .map(|dep| format!("{} ({})", dep.title, dep.status))
        .collect::<Vec<_>>()
        .join(", ");

    Some(RiskCandidate {
        milestone_id: milestone.id.clone(),
        stream_id: None,
        epic_key: None,
        severity: Severity::High,
        title: format!(
            "{} is waiting on {} unfinished dependenc{}",
            milestone.title,
            blocking.len(),
            if blocking.len() == 1 { "y" } else { "ies" }
        ),
        description: format!("In progress while depending on: {names}."),
        suggested_action: REMEDIATION.to_string(),
        confidence_score: CONFIDENCE,
        trigger_data: TriggerData::DependencyBlock { blocking },
    })
}
