//! Roadmap risk storage abstractions.
//!
//! The engine talks to two injected seams:
//! - [`SnapshotProvider`]: read-only access to milestone and epic state
//!   maintained by the tracker synchronization pipelines
//! - [`RiskRepository`]: the durable keyed store that owns risk records and
//!   their audit trail
//!
//! Design stance:
//! - Per-key writes are atomic. Upserting a candidate either refreshes the
//!   single open record for its dedup key or inserts one, never both.
//! - History entries are written in the same atomic step as the mutation
//!   they describe.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

mod error;
pub mod file;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
mod traits;

pub use error::{StorageError, StorageResult};
pub use file::JsonFileSnapshotProvider;
pub use memory::{InMemoryRiskRepository, InMemorySnapshotProvider};
pub use traits::{RiskRepository, SnapshotProvider, StatusChange, UpsertOutcome};
