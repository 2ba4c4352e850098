//! User domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role assigned to users created without an explicit one.
pub const DEFAULT_ROLE: &str = "authenticated";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub email: String,
    /// Argon2id PHC string.
    pub password_hash: String,
    pub role: String,
    pub email_confirmed_at: Option<DateTime<Utc>>,
    pub confirmation_token: Option<String>,
    pub recovery_token: Option<String>,
    pub last_sign_in_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_confirmed(&self) -> bool {
        self.email_confirmed_at.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub tenant_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub email: String,
    /// Raw password (hashed with Argon2id before storage).
    pub password: String,
    /// Defaults to [`DEFAULT_ROLE`].
    pub role: Option<String>,
    /// Mark the address as confirmed at creation time.
    pub email_confirmed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateUser {
    pub role: Option<String>,
    pub email_confirmed_at: Option<DateTime<Utc>>,
    /// `Some(Some(val))` = set, `Some(None)` = clear, `None` = no change.
    pub confirmation_token: Option<Option<String>>,
    /// `Some(Some(val))` = set, `Some(None)` = clear, `None` = no change.
    pub recovery_token: Option<Option<String>>,
}

/// Normalized form of an email address used for case-insensitive
/// uniqueness within a tenant.
pub fn email_key(email: &str) -> String {
    email.trim().to_lowercase()
}
