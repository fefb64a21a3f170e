//! Roadmap Risk Engine - rule evaluation, deduplication and lifecycle
//!
//! A run loads a [`Snapshot`](risk_types::Snapshot) through a
//! [`SnapshotProvider`](risk_storage::SnapshotProvider), evaluates every rule
//! against it, and reconciles the resulting candidates with the open risks held
//! by a [`RiskRepository`](risk_storage::RiskRepository):
//!
//! ```text
//! trigger -> load snapshot -> evaluate rules -> reconcile -> RunReport
//! ```
//!
//! Reconciliation refreshes open risks whose condition still fires, inserts
//! risks for new conditions, and auto-resolves open risks whose condition has
//! cleared. Auto-resolution only starts once every candidate of the pass has
//! been computed and written.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

mod engine;
mod error;
pub mod lifecycle;
pub mod query;
pub mod reconciler;
pub mod rules;

pub use engine::RiskEngine;
pub use error::{EngineError, EngineResult};
pub use lifecycle::LifecycleController;
pub use query::QuerySurface;
pub use reconciler::{ReconcileOutcome, Reconciler, AUTO_RESOLVE_NOTE};
pub use rules::{RiskRule, RuleSet};
