//! Risk records, statuses and the dedup key

use crate::evidence::TriggerData;
use crate::ids::{MilestoneId, RiskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Failure to parse one of the wire-level enum names
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} `{value}`")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Kind of anomaly a risk describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskType {
    Delay,
    VelocityDrop,
    Blocker,
    DependencyBlock,
}

impl RiskType {
    pub const ALL: [RiskType; 4] = [
        RiskType::Delay,
        RiskType::VelocityDrop,
        RiskType::Blocker,
        RiskType::DependencyBlock,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskType::Delay => "delay",
            RiskType::VelocityDrop => "velocity_drop",
            RiskType::Blocker => "blocker",
            RiskType::DependencyBlock => "dependency_block",
        }
    }
}

impl fmt::Display for RiskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "delay" => Ok(RiskType::Delay),
            "velocity_drop" => Ok(RiskType::VelocityDrop),
            "blocker" => Ok(RiskType::Blocker),
            "dependency_block" => Ok(RiskType::DependencyBlock),
            other => Err(ParseEnumError::new("risk type", other)),
        }
    }
}

/// Risk severity. Declaration order is the escalation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Most severe first, the order used by listings and summaries.
    pub const DESCENDING: [Severity; 4] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(ParseEnumError::new("severity", other)),
        }
    }
}

/// Lifecycle status of a risk record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskStatus {
    Open,
    Acknowledged,
    Resolved,
    Mitigated,
    FalsePositive,
}

impl RiskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskStatus::Open => "open",
            RiskStatus::Acknowledged => "acknowledged",
            RiskStatus::Resolved => "resolved",
            RiskStatus::Mitigated => "mitigated",
            RiskStatus::FalsePositive => "false_positive",
        }
    }

    /// Terminal statuses end a record's life and stamp `resolved_at`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RiskStatus::Resolved | RiskStatus::Mitigated | RiskStatus::FalsePositive
        )
    }

    /// Statuses a caller may request through a manual transition.
    pub fn is_manual_target(&self) -> bool {
        !matches!(self, RiskStatus::Open)
    }
}

impl fmt::Display for RiskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(RiskStatus::Open),
            "acknowledged" => Ok(RiskStatus::Acknowledged),
            "resolved" => Ok(RiskStatus::Resolved),
            "mitigated" => Ok(RiskStatus::Mitigated),
            "false_positive" => Ok(RiskStatus::FalsePositive),
            other => Err(ParseEnumError::new("risk status", other)),
        }
    }
}

/// Identity of an underlying condition: `(milestone_id, risk_type, epic_key)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DedupKey {
    pub milestone_id: MilestoneId,
    pub risk_type: RiskType,
    pub epic_key: Option<String>,
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.epic_key {
            Some(epic) => write!(f, "{}/{}/{}", self.milestone_id, self.risk_type, epic),
            None => write!(f, "{}/{}", self.milestone_id, self.risk_type),
        }
    }
}

/// Clamp a confidence score into `[0, 1]`; non-finite values become 0.
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// A risk emitted by a rule evaluator for the current pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskCandidate {
    pub milestone_id: MilestoneId,
    pub stream_id: Option<String>,
    pub epic_key: Option<String>,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub suggested_action: String,
    pub confidence_score: f64,
    pub trigger_data: TriggerData,
}

impl RiskCandidate {
    pub fn risk_type(&self) -> RiskType {
        self.trigger_data.risk_type()
    }

    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            milestone_id: self.milestone_id.clone(),
            risk_type: self.risk_type(),
            epic_key: self.epic_key.clone(),
        }
    }

    /// Materialize a fresh open record for this candidate.
    pub fn into_open_risk(self, id: RiskId, detected_at: DateTime<Utc>) -> Risk {
        Risk {
            id,
            risk_type: self.risk_type(),
            milestone_id: self.milestone_id,
            stream_id: self.stream_id,
            epic_key: self.epic_key,
            severity: self.severity,
            title: self.title,
            description: self.description,
            suggested_action: self.suggested_action,
            confidence_score: clamp_confidence(self.confidence_score),
            trigger_data: self.trigger_data,
            status: RiskStatus::Open,
            detected_at,
            resolved_at: None,
            resolution_note: None,
        }
    }
}

/// Persistent risk record, owned by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Risk {
    pub id: RiskId,
    pub milestone_id: MilestoneId,
    pub stream_id: Option<String>,
    pub epic_key: Option<String>,
    pub risk_type: RiskType,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub suggested_action: String,
    pub confidence_score: f64,
    pub trigger_data: TriggerData,
    pub status: RiskStatus,
    pub detected_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution_note: Option<String>,
}

impl Risk {
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            milestone_id: self.milestone_id.clone(),
            risk_type: self.risk_type,
            epic_key: self.epic_key.clone(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == RiskStatus::Open
    }

    /// Overwrite the fields a re-detection refreshes.
    pub fn refresh_from(&mut self, candidate: RiskCandidate, detected_at: DateTime<Utc>) {
        self.severity = candidate.severity;
        self.title = candidate.title;
        self.description = candidate.description;
        self.suggested_action = candidate.suggested_action;
        self.confidence_score = clamp_confidence(candidate.confidence_score);
        self.trigger_data = candidate.trigger_data;
        self.stream_id = candidate.stream_id;
        self.detected_at = detected_at;
    }

    /// Apply a status change. Terminal statuses stamp `resolved_at`; leaving a
    /// terminal status clears it.
    pub fn apply_status(&mut self, status: RiskStatus, note: Option<String>, at: DateTime<Utc>) {
        self.status = status;
        self.resolved_at = status.is_terminal().then_some(at);
        if note.is_some() {
            self.resolution_note = note;
        }
    }

    /// Listing order: most severe first, then most recently detected.
    pub fn listing_order(a: &Risk, b: &Risk) -> Ordering {
        (Reverse(a.severity), Reverse(a.detected_at))
            .cmp(&(Reverse(b.severity), Reverse(b.detected_at)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn candidate(severity: Severity) -> RiskCandidate {
        RiskCandidate {
            milestone_id: MilestoneId::new("ms-1"),
            stream_id: None,
            epic_key: None,
            severity,
            title: "t".to_string(),
            description: "d".to_string(),
            suggested_action: "s".to_string(),
            confidence_score: 1.7,
            trigger_data: TriggerData::Delay {
                target_end: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                days_overdue: 3,
                progress_percent: 50,
            },
        }
    }

    #[test]
    fn severity_orders_by_escalation() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn open_risk_clamps_confidence() {
        let risk = candidate(Severity::Medium).into_open_risk(RiskId::generate(), Utc::now());
        assert_eq!(risk.confidence_score, 1.0);
        assert_eq!(risk.status, RiskStatus::Open);
        assert_eq!(risk.risk_type, RiskType::Delay);
    }

    #[test]
    fn clamp_confidence_rejects_nan() {
        assert_eq!(clamp_confidence(f64::NAN), 0.0);
        assert_eq!(clamp_confidence(-0.2), 0.0);
        assert_eq!(clamp_confidence(0.88), 0.88);
    }

    #[test]
    fn acknowledged_does_not_stamp_resolved_at() {
        let now = Utc::now();
        let mut risk = candidate(Severity::High).into_open_risk(RiskId::generate(), now);
        risk.apply_status(RiskStatus::Acknowledged, None, now);
        assert!(risk.resolved_at.is_none());
        risk.apply_status(RiskStatus::Mitigated, Some("fixed".into()), now);
        assert_eq!(risk.resolved_at, Some(now));
        risk.apply_status(RiskStatus::Acknowledged, None, now);
        assert!(risk.resolved_at.is_none());
        assert_eq!(risk.resolution_note.as_deref(), Some("fixed"));
    }

    #[test]
    fn listing_order_is_severity_then_recency() {
        let now = Utc::now();
        let old_critical =
            candidate(Severity::Critical).into_open_risk(RiskId::generate(), now - Duration::days(3));
        let new_high = candidate(Severity::High).into_open_risk(RiskId::generate(), now);
        let old_high =
            candidate(Severity::High).into_open_risk(RiskId::generate(), now - Duration::days(1));

        let mut risks = vec![old_high.clone(), new_high.clone(), old_critical.clone()];
        risks.sort_by(Risk::listing_order);
        assert_eq!(risks[0].id, old_critical.id);
        assert_eq!(risks[1].id, new_high.id);
        assert_eq!(risks[2].id, old_high.id);
    }

    #[test]
    fn status_names_round_trip() {
        for status in [
            RiskStatus::Open,
            RiskStatus::Acknowledged,
            RiskStatus::Resolved,
            RiskStatus::Mitigated,
            RiskStatus::FalsePositive,
        ] {
            assert_eq!(status.as_str().parse::<RiskStatus>().unwrap(), status);
        }
    }
}
