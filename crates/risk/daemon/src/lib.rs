//! Roadmap risk daemon library
//!
//! Components of `riskd`:
//! - Configuration loading
//! - Scheduler for periodic and on-demand analysis runs
//! - REST API over the engine's trigger, list and transition operations
//! - Server lifecycle management

pub mod api;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod server;

pub use config::RiskDaemonConfig;
pub use error::{ApiError, DaemonError};
pub use scheduler::Scheduler;
pub use server::Server;
