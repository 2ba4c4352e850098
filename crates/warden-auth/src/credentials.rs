//! Tenant resolution and password authentication.

use std::sync::Arc;

use tracing::{debug, error};
use uuid::Uuid;
use warden_core::error::WardenError;
use warden_core::models::tenant::Tenant;
use warden_core::models::user::User;
use warden_core::repository::{TenantRepository, UserRepository};

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::password;

/// A user whose password checked out.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
    /// The email address was never confirmed. Whether that blocks the
    /// sign-in is up to the caller.
    pub unconfirmed: bool,
}

/// Slug to look up for a tenant identifier.
///
/// Anything containing `.` or `:` is treated as a host: the port is
/// dropped and the leftmost label is the slug.
pub fn tenant_slug(identifier: &str) -> &str {
    let identifier = identifier.trim();
    if !identifier.contains(['.', ':']) {
        return identifier;
    }
    let host = identifier.split(':').next().unwrap_or_default();
    host.split('.').next().unwrap_or_default()
}

/// Verifies credentials against the user store.
#[derive(Clone)]
pub struct CredentialStore<T: TenantRepository, U: UserRepository> {
    tenants: T,
    users: U,
    config: Arc<AuthConfig>,
}

impl<T: TenantRepository, U: UserRepository> CredentialStore<T, U> {
    pub fn new(tenants: T, users: U, config: Arc<AuthConfig>) -> Self {
        Self {
            tenants,
            users,
            config,
        }
    }

    /// Resolve a tenant from its slug or from a host name.
    pub async fn resolve_tenant(&self, identifier: &str) -> Result<Tenant, AuthError> {
        let slug = tenant_slug(identifier);
        if slug.is_empty() {
            debug!(identifier, "Empty tenant identifier");
            return Err(AuthError::TenantNotFound);
        }
        match self.tenants.get_by_slug(slug).await {
            Ok(tenant) => Ok(tenant),
            Err(WardenError::NotFound { .. }) => {
                debug!(slug, "Unknown tenant");
                Err(AuthError::TenantNotFound)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Check `email` and `password` within the tenant.
    ///
    /// An unknown email and a wrong password both come back as
    /// `InvalidCredentials` after the same amount of hashing work.
    pub async fn authenticate(
        &self,
        tenant_id: Uuid,
        email: &str,
        password: &str,
    ) -> Result<AuthenticatedUser, AuthError> {
        let pepper = self.config.pepper.as_deref();

        let user = match self.users.get_by_email(tenant_id, email).await {
            Ok(user) => user,
            Err(WardenError::NotFound { .. }) => {
                password::equalize_timing(password, pepper);
                debug!(tenant_id = %tenant_id, reason = "unknown email", "Authentication failed");
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        };

        let valid = password::verify_password(password, &user.password_hash, pepper).map_err(|e| {
            error!(tenant_id = %tenant_id, user_id = %user.id, error = %e, "Stored password hash is unusable");
            e
        })?;

        if !valid {
            debug!(tenant_id = %tenant_id, user_id = %user.id, reason = "wrong password", "Authentication failed");
            return Err(AuthError::InvalidCredentials);
        }

        let unconfirmed = !user.is_confirmed();
        Ok(AuthenticatedUser { user, unconfirmed })
    }
}
