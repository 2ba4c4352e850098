//! Warden Core: domain models, error types and the repository traits
//! that separate the session logic from the store.

pub mod error;
pub mod models;
pub mod repository;

pub use error::{WardenError, WardenResult};
