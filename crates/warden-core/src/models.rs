//! Domain models for Warden.
//!
//! These are the core types shared across all crates.

pub mod audit;
pub mod organization;
pub mod rate_limit;
pub mod refresh_token;
pub mod tenant;
pub mod user;
