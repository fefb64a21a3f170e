//! Roadmap Risk Types - data model for the risk detection engine
//!
//! The engine reads a point-in-time [`Snapshot`] of delivery state and owns a
//! set of [`Risk`] records derived from it.
//!
//! ## Key Concepts
//!
//! - **Milestone**: a tracked delivery unit with progress, status, optional
//!   target dates and direct dependencies
//! - **EpicStat**: aggregate issue counters for an epic linked to a milestone
//! - **Risk**: an engine-generated alert with severity, confidence and a
//!   lifecycle status
//! - **DedupKey**: `(milestone_id, risk_type, epic_key)`; at most one risk per
//!   key may be `open` at a time
//! - **TriggerData**: typed evidence captured when a rule fires

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

pub mod evidence;
pub mod history;
pub mod ids;
pub mod query;
pub mod report;
pub mod risk;
pub mod snapshot;

pub use evidence::{BlockingDependency, TriggerData};
pub use history::{HistoryAction, RiskHistoryEntry, ENGINE_ACTOR};
pub use ids::{MilestoneId, RiskId};
pub use query::{RiskFilter, RiskListing, RiskSummary};
pub use report::RunReport;
pub use risk::{
    clamp_confidence, DedupKey, ParseEnumError, Risk, RiskCandidate, RiskStatus, RiskType,
    Severity,
};
pub use snapshot::{DependencyRef, EpicStat, Milestone, MilestoneStatus, ScopeFilter, Snapshot};
