//! Typed evidence captured when a rule fires
//!
//! Each variant has a fixed shape so consumers never dig through an untyped blob.
//! The serialized form is tagged by `rule`.

use crate::ids::MilestoneId;
use crate::risk::RiskType;
use crate::snapshot::MilestoneStatus;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A dependency that is holding a milestone back
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockingDependency {
    pub id: MilestoneId,
    pub title: String,
    pub status: MilestoneStatus,
}

/// Evidence payload, one variant per rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum TriggerData {
    /// Milestone is past its target end date.
    Delay {
        target_end: NaiveDate,
        days_overdue: i64,
        progress_percent: u8,
    },

    /// Milestone progress trails elapsed schedule time.
    MilestoneVelocity {
        time_progress: f64,
        actual_progress: f64,
        gap: f64,
    },

    /// Milestone itself is marked blocked.
    MilestoneBlocked { status: MilestoneStatus },

    /// In-progress milestone waits on unfinished dependencies.
    DependencyBlock { blocking: Vec<BlockingDependency> },

    /// Epic carries blocked issues.
    EpicBlocked {
        total_issues: u32,
        blocked_issues: u32,
        block_ratio: f64,
    },

    /// Epic has far more work started than finished.
    EpicStall {
        in_progress_issues: u32,
        done_issues: u32,
        total_issues: u32,
    },
}

impl TriggerData {
    pub fn risk_type(&self) -> RiskType {
        match self {
            TriggerData::Delay { .. } => RiskType::Delay,
            TriggerData::MilestoneVelocity { .. } | TriggerData::EpicStall { .. } => {
                RiskType::VelocityDrop
            }
            TriggerData::MilestoneBlocked { .. } | TriggerData::EpicBlocked { .. } => {
                RiskType::Blocker
            }
            TriggerData::DependencyBlock { .. } => RiskType::DependencyBlock,
        }
    }
}
