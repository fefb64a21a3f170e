//! Point-in-time snapshot of delivery state
//!
//! Snapshots are produced by a snapshot provider from data maintained by the
//! tracker synchronization pipelines. The engine never mutates them.

use crate::ids::MilestoneId;
use crate::risk::{ParseEnumError, Severity};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Milestone delivery status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneStatus {
    Planned,
    InProgress,
    Completed,
    Delayed,
    Blocked,
}

impl MilestoneStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MilestoneStatus::Planned => "planned",
            MilestoneStatus::InProgress => "in_progress",
            MilestoneStatus::Completed => "completed",
            MilestoneStatus::Delayed => "delayed",
            MilestoneStatus::Blocked => "blocked",
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, MilestoneStatus::Completed)
    }
}

impl fmt::Display for MilestoneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MilestoneStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planned" => Ok(MilestoneStatus::Planned),
            "in_progress" => Ok(MilestoneStatus::InProgress),
            "completed" => Ok(MilestoneStatus::Completed),
            "delayed" => Ok(MilestoneStatus::Delayed),
            "blocked" => Ok(MilestoneStatus::Blocked),
            other => Err(ParseEnumError::new("milestone status", other)),
        }
    }
}

/// Milestone record as seen by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: MilestoneId,
    pub title: String,

    /// Title of the vision that owns this milestone
    #[serde(default)]
    pub vision_title: Option<String>,

    /// Reported progress, 0-100
    pub progress_percent: u8,

    pub status: MilestoneStatus,

    /// Informational risk level written by earlier tooling; never read by rules
    #[serde(default)]
    pub risk_level: Option<Severity>,

    #[serde(default)]
    pub target_start: Option<NaiveDate>,

    #[serde(default)]
    pub target_end: Option<NaiveDate>,

    #[serde(default)]
    pub quarter: Option<String>,

    /// Direct dependencies. May contain cycles; only direct links are inspected.
    #[serde(default)]
    pub depends_on: Vec<MilestoneId>,
}

/// Aggregate issue counters for one epic linked to a milestone.
///
/// The counters come from independent tracker categorizations and may overlap,
/// so `done + blocked + in_progress <= total` is not guaranteed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpicStat {
    pub milestone_id: MilestoneId,
    pub epic_key: String,

    /// Work stream the epic belongs to, when the tracker links one
    #[serde(default)]
    pub stream_id: Option<String>,

    pub total_issues: u32,
    pub done_issues: u32,
    pub blocked_issues: u32,
    pub in_progress_issues: u32,
}

/// Title and status of a milestone referenced by a `depends_on` link.
///
/// Dependencies are indexed separately because completed milestones are not
/// part of the snapshot's milestone list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRef {
    pub id: MilestoneId,
    pub title: String,
    pub status: MilestoneStatus,
}

impl From<&Milestone> for DependencyRef {
    fn from(milestone: &Milestone) -> Self {
        Self {
            id: milestone.id.clone(),
            title: milestone.title.clone(),
            status: milestone.status,
        }
    }
}

/// Restricts a run to a subset of milestones. Empty means the whole portfolio.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeFilter {
    #[serde(default)]
    pub milestone_ids: Vec<MilestoneId>,
}

impl ScopeFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn milestones(ids: impl IntoIterator<Item = MilestoneId>) -> Self {
        Self {
            milestone_ids: ids.into_iter().collect(),
        }
    }

    pub fn is_unscoped(&self) -> bool {
        self.milestone_ids.is_empty()
    }

    pub fn includes(&self, milestone_id: &MilestoneId) -> bool {
        self.is_unscoped() || self.milestone_ids.contains(milestone_id)
    }
}

/// Point-in-time view of open milestones and their epic statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Milestones whose status is not `completed`
    #[serde(default)]
    pub milestones: Vec<Milestone>,

    /// Epic counters scoped to the milestones above
    #[serde(default)]
    pub epic_stats: Vec<EpicStat>,

    /// Every milestone referenced by a `depends_on` link, completed ones included
    #[serde(default)]
    pub dependencies: Vec<DependencyRef>,
}

impl Snapshot {
    /// Look-up table for dependency links.
    ///
    /// Snapshot milestones take precedence over entries in `dependencies`.
    pub fn dependency_index(&self) -> HashMap<&MilestoneId, DependencyRef> {
        let mut index: HashMap<&MilestoneId, DependencyRef> = self
            .dependencies
            .iter()
            .map(|dep| (&dep.id, dep.clone()))
            .collect();
        for milestone in &self.milestones {
            index.insert(&milestone.id, DependencyRef::from(milestone));
        }
        index
    }

    /// Drop completed milestones, out-of-scope milestones, and epic rows whose
    /// milestone is no longer present.
    ///
    /// Dropped milestones that a kept milestone depends on move into
    /// `dependencies` so dependency links still resolve.
    pub fn normalized(self, scope: &ScopeFilter) -> Self {
        let (milestones, dropped): (Vec<Milestone>, Vec<Milestone>) = self
            .milestones
            .into_iter()
            .partition(|m| !m.status.is_completed() && scope.includes(&m.id));

        let referenced: HashSet<&MilestoneId> = milestones
            .iter()
            .flat_map(|m| m.depends_on.iter())
            .collect();
        let mut dependencies = self.dependencies;
        for milestone in dropped.iter().filter(|m| referenced.contains(&m.id)) {
            match dependencies.iter_mut().find(|dep| dep.id == milestone.id) {
                Some(existing) => *existing = DependencyRef::from(milestone),
                None => dependencies.push(DependencyRef::from(milestone)),
            }
        }

        let kept: HashSet<&MilestoneId> = milestones.iter().map(|m| &m.id).collect();
        let epic_stats = self
            .epic_stats
            .into_iter()
            .filter(|stat| kept.contains(&stat.milestone_id))
            .collect();
        Self {
            milestones,
            epic_stats,
            dependencies,
        }
    }
}
