//! Tenant domain model.
//!
//! Tenants are the root of isolation. Every other entity carries a
//! `tenant_id` and all lookups and uniqueness checks are scoped by it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    /// Human-readable name.
    pub name: String,
    /// URL-safe identifier, unique across tenants ignoring case.
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create a new tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTenant {
    pub name: String,
    pub slug: String,
}

/// Normalized form of a slug used for case-insensitive uniqueness.
pub fn slug_key(slug: &str) -> String {
    slug.trim().to_lowercase()
}
