//! Scheduling of analysis runs

mod analysis;

pub use analysis::Scheduler;
