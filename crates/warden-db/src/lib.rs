//! Warden Database: SurrealDB connection management, schema migrations
//! and repository implementations for the `warden-core` traits.
//!
//! - Connection management ([`DbManager`], [`DbConfig`])
//! - Schema migrations ([`run_migrations`])
//! - Error types ([`DbError`])
//! - Repositories ([`repository`])

mod connection;
mod error;
pub mod repository;
mod schema;

pub use connection::{DbConfig, DbManager};
pub use error::DbError;
pub use schema::{latest_version, run_migrations};
