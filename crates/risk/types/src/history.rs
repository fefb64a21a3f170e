//! Append-only audit trail of risk lifecycle changes

use crate::ids::RiskId;
use crate::risk::{ParseEnumError, RiskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Actor recorded on entries written by the reconciler.
pub const ENGINE_ACTOR: &str = "risk-engine";

/// What happened to a risk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    /// Record created by a reconciliation pass
    Detected,
    /// Status changed, either manually or by auto-resolution
    StatusChanged,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryAction::Detected => "detected",
            HistoryAction::StatusChanged => "status_changed",
        }
    }
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistoryAction {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "detected" => Ok(HistoryAction::Detected),
            "status_changed" => Ok(HistoryAction::StatusChanged),
            other => Err(ParseEnumError::new("history action", other)),
        }
    }
}

/// One audit entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskHistoryEntry {
    pub risk_id: RiskId,
    pub action: HistoryAction,
    pub new_status: RiskStatus,
    pub note: Option<String>,
    pub actor: String,
    pub timestamp: DateTime<Utc>,
}
