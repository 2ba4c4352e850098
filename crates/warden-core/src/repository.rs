//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Tenant-scoped repositories
//! require a `tenant_id` parameter to enforce data isolation.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::WardenResult;
use crate::models::{
    audit::{AuditLogEntry, CreateAuditLogEntry},
    organization::{CreateOrganization, Organization},
    rate_limit::{RateLimitAction, RateLimitBucket},
    refresh_token::{CreateRefreshToken, RefreshToken, RevocationReason, RotationOutcome},
    tenant::{CreateTenant, Tenant},
    user::{CreateUser, UpdateUser, User},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Tenant (global scope)
// ---------------------------------------------------------------------------

pub trait TenantRepository: Send + Sync {
    fn create(&self, input: CreateTenant) -> impl Future<Output = WardenResult<Tenant>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = WardenResult<Tenant>> + Send;
    /// Case-insensitive slug lookup.
    fn get_by_slug(&self, slug: &str) -> impl Future<Output = WardenResult<Tenant>> + Send;
    /// Deletes the tenant and, by cascade, everything scoped to it.
    fn delete(&self, id: Uuid) -> impl Future<Output = WardenResult<()>> + Send;
}

// ---------------------------------------------------------------------------
// Tenant-scoped repositories
// ---------------------------------------------------------------------------

pub trait OrganizationRepository: Send + Sync {
    fn create(
        &self,
        input: CreateOrganization,
    ) -> impl Future<Output = WardenResult<Organization>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = WardenResult<Organization>> + Send;
    fn list(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = WardenResult<PaginatedResult<Organization>>> + Send;
    /// Deletes the organization and, by cascade, its users.
    fn delete(&self, tenant_id: Uuid, id: Uuid) -> impl Future<Output = WardenResult<()>> + Send;
}

pub trait UserRepository: Send + Sync {
    /// Fails with `AlreadyExists` when the email is taken in the tenant,
    /// ignoring case.
    fn create(&self, input: CreateUser) -> impl Future<Output = WardenResult<User>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = WardenResult<User>> + Send;
    /// Case-insensitive email lookup within the tenant.
    fn get_by_email(
        &self,
        tenant_id: Uuid,
        email: &str,
    ) -> impl Future<Output = WardenResult<User>> + Send;
    fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdateUser,
    ) -> impl Future<Output = WardenResult<User>> + Send;
    fn record_sign_in(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> impl Future<Output = WardenResult<()>> + Send;
    /// Hard delete; refresh tokens of the user go with it.
    fn delete(&self, tenant_id: Uuid, id: Uuid) -> impl Future<Output = WardenResult<()>> + Send;
}

// ---------------------------------------------------------------------------
// Refresh tokens (tenant-scoped)
// ---------------------------------------------------------------------------

pub trait RefreshTokenRepository: Send + Sync {
    fn create(
        &self,
        input: CreateRefreshToken,
    ) -> impl Future<Output = WardenResult<RefreshToken>> + Send;
    fn get_by_token(
        &self,
        tenant_id: Uuid,
        token: &str,
    ) -> impl Future<Output = WardenResult<RefreshToken>> + Send;
    /// The token whose `parent` is `parent_token`, if any.
    fn get_child(
        &self,
        tenant_id: Uuid,
        parent_token: &str,
    ) -> impl Future<Output = WardenResult<Option<RefreshToken>>> + Send;
    /// The first token of a session (the one without a parent).
    fn get_session_root(
        &self,
        tenant_id: Uuid,
        session_id: Uuid,
    ) -> impl Future<Output = WardenResult<Option<RefreshToken>>> + Send;
    /// Atomically claim `presented` (only if it is neither revoked nor
    /// already has a child) and insert `child`. Either both writes happen
    /// or neither does.
    fn rotate(
        &self,
        tenant_id: Uuid,
        presented: &str,
        child: CreateRefreshToken,
    ) -> impl Future<Output = WardenResult<RotationOutcome>> + Send;
    /// Revoke every live token of the session. Returns how many tokens
    /// were newly revoked; revoking an already dead session returns 0.
    fn revoke_session(
        &self,
        tenant_id: Uuid,
        session_id: Uuid,
        reason: RevocationReason,
    ) -> impl Future<Output = WardenResult<u64>> + Send;
    fn list_by_session(
        &self,
        tenant_id: Uuid,
        session_id: Uuid,
    ) -> impl Future<Output = WardenResult<Vec<RefreshToken>>> + Send;
}

// ---------------------------------------------------------------------------
// Audit (append-only, tenant recorded in payload)
// ---------------------------------------------------------------------------

/// Query filters for audit log entries.
#[derive(Debug, Clone, Default)]
pub struct AuditLogFilter {
    /// Matches `payload.action`.
    pub action: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

pub trait AuditLogRepository: Send + Sync {
    /// Append a new audit log entry. No update or delete operations exist.
    fn append(
        &self,
        input: CreateAuditLogEntry,
    ) -> impl Future<Output = WardenResult<AuditLogEntry>> + Send;
    fn list(
        &self,
        tenant_id: Uuid,
        filter: AuditLogFilter,
        pagination: Pagination,
    ) -> impl Future<Output = WardenResult<PaginatedResult<AuditLogEntry>>> + Send;
}

// ---------------------------------------------------------------------------
// Rate limit buckets
// ---------------------------------------------------------------------------

pub trait RateLimitRepository: Send + Sync {
    /// Atomically count one call against the bucket for
    /// `(tenant_id, action, window_start)` and return the bucket after
    /// the increment.
    fn hit(
        &self,
        tenant_id: Uuid,
        action: RateLimitAction,
        window_start: DateTime<Utc>,
    ) -> impl Future<Output = WardenResult<RateLimitBucket>> + Send;
    /// Delete buckets whose window started before `before`.
    fn purge_expired(&self, before: DateTime<Utc>) -> impl Future<Output = WardenResult<u64>> + Send;
}
