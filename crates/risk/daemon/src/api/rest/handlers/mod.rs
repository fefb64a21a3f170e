//! API request handlers

mod analysis;
mod health;
mod risks;

pub use analysis::*;
pub use health::*;
pub use risks::*;
