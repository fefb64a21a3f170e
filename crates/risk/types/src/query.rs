//! Listing filters and summaries

use crate::ids::MilestoneId;
use crate::risk::{Risk, RiskStatus, RiskType, Severity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Filters for risk listings. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskFilter {
    #[serde(default)]
    pub milestone_id: Option<MilestoneId>,
    #[serde(default)]
    pub status: Option<RiskStatus>,
    #[serde(default)]
    pub severity: Option<Severity>,
}

impl RiskFilter {
    pub fn open() -> Self {
        Self {
            status: Some(RiskStatus::Open),
            ..Default::default()
        }
    }

    pub fn matches(&self, risk: &Risk) -> bool {
        self.milestone_id
            .as_ref()
            .map_or(true, |id| &risk.milestone_id == id)
            && self.status.map_or(true, |status| risk.status == status)
            && self.severity.map_or(true, |severity| risk.severity == severity)
    }
}

/// Counts over open risks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskSummary {
    pub total_open: usize,
    pub counts_by_severity: BTreeMap<Severity, usize>,
    pub counts_by_type: BTreeMap<RiskType, usize>,
}

impl RiskSummary {
    /// Summarize the open risks among `risks`; other statuses are ignored.
    pub fn from_risks<'a>(risks: impl IntoIterator<Item = &'a Risk>) -> Self {
        let mut summary = Self::default();
        for risk in risks.into_iter().filter(|r| r.is_open()) {
            summary.total_open += 1;
            *summary.counts_by_severity.entry(risk.severity).or_default() += 1;
            *summary.counts_by_type.entry(risk.risk_type).or_default() += 1;
        }
        summary
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.counts_by_severity.get(&severity).copied().unwrap_or(0)
    }
}

/// Result of a listing query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskListing {
    pub risks: Vec<Risk>,
    pub summary: RiskSummary,
}
