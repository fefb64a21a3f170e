//! Outcome of one analysis run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Counts reported back to whoever triggered a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub analyzed_milestones: usize,
    pub analyzed_epics: usize,
    /// Distinct dedup keys that fired this pass
    pub detected_risks: usize,
    pub inserted: usize,
    pub updated: usize,
    pub auto_resolved: usize,
    /// Per-key writes that failed; the run continued past them
    pub failed: usize,
}

impl RunReport {
    pub fn begin(started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at,
            finished_at: started_at,
            analyzed_milestones: 0,
            analyzed_epics: 0,
            detected_risks: 0,
            inserted: 0,
            updated: 0,
            auto_resolved: 0,
            failed: 0,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}
