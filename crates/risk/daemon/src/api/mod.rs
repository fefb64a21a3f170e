//! API layer for riskd

pub mod rest;

pub use rest::create_router;
