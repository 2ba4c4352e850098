//! Session authority: sign-in, refresh and sign-out orchestration.

use std::sync::Arc;

use chrono::Utc;
use tracing::error;
use uuid::Uuid;
use warden_core::error::WardenResult;
use warden_core::models::audit::AuditEvent;
use warden_core::models::rate_limit::RateLimitAction;
use warden_core::repository::{
    AuditLogRepository, RateLimitRepository, RefreshTokenRepository, TenantRepository,
    UserRepository,
};

use crate::config::AuthConfig;
use crate::credentials::CredentialStore;
use crate::rate_limit::RateLimiter;
use crate::rotation::TokenRotationEngine;
use crate::token::{self, ValidatedClaims};

/// Input for the password sign-in flow.
#[derive(Debug)]
pub struct SignInInput {
    /// Tenant slug or host name.
    pub tenant: String,
    pub email: String,
    pub password: String,
}

/// Successful sign-in result.
#[derive(Debug)]
pub struct SignInOutput {
    /// Signed JWT access token.
    pub access_token: String,
    /// Raw opaque refresh token (return to client, not stored).
    pub refresh_token: String,
    pub session_id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
    /// The user's email address is not confirmed yet.
    pub unconfirmed: bool,
}

/// Input for the refresh token rotation flow.
#[derive(Debug)]
pub struct RefreshInput {
    pub tenant_id: Uuid,
    pub refresh_token: String,
}

/// Successful refresh result (new token pair).
#[derive(Debug)]
pub struct RefreshOutput {
    pub access_token: String,
    /// Replaces the presented refresh token, which is now consumed.
    pub refresh_token: String,
    pub session_id: Uuid,
    pub expires_in: u64,
}

/// Entry point tying credentials, rotation and rate limiting together.
///
/// Generic over repository implementations so that the auth layer has
/// no dependency on the database crate.
pub struct SessionAuthority<T, U, R, A, B>
where
    T: TenantRepository,
    U: UserRepository + Clone,
    R: RefreshTokenRepository,
    A: AuditLogRepository + Clone,
    B: RateLimitRepository,
{
    credentials: CredentialStore<T, U>,
    rotation: TokenRotationEngine<R, U, A>,
    limiter: RateLimiter<B, A>,
    users: U,
    audit: A,
    config: Arc<AuthConfig>,
}

impl<T, U, R, A, B> SessionAuthority<T, U, R, A, B>
where
    T: TenantRepository,
    U: UserRepository + Clone,
    R: RefreshTokenRepository,
    A: AuditLogRepository + Clone,
    B: RateLimitRepository,
{
    pub fn new(
        tenants: T,
        users: U,
        tokens: R,
        audit: A,
        buckets: B,
        config: Arc<AuthConfig>,
    ) -> Self {
        Self {
            credentials: CredentialStore::new(tenants, users.clone(), config.clone()),
            rotation: TokenRotationEngine::new(tokens, users.clone(), audit.clone(), config.clone()),
            limiter: RateLimiter::new(buckets, audit.clone(), config.clone()),
            users,
            audit,
            config,
        }
    }

    pub fn credentials(&self) -> &CredentialStore<T, U> {
        &self.credentials
    }

    pub fn rotation(&self) -> &TokenRotationEngine<R, U, A> {
        &self.rotation
    }

    pub fn limiter(&self) -> &RateLimiter<B, A> {
        &self.limiter
    }

    /// Authenticate with email and password and start a session.
    pub async fn sign_in(&self, input: SignInInput) -> WardenResult<SignInOutput> {
        let tenant = self.credentials.resolve_tenant(&input.tenant).await?;

        self.limiter
            .enforce(tenant.id, RateLimitAction::SignIn)
            .await?;

        let authenticated = self
            .credentials
            .authenticate(tenant.id, &input.email, &input.password)
            .await?;
        let user = authenticated.user;

        let session = self.rotation.issue_session(&user).await?;

        if let Err(e) = self.users.record_sign_in(tenant.id, user.id, Utc::now()).await {
            error!(tenant_id = %tenant.id, user_id = %user.id, error = %e, "Failed to record sign-in time");
        }

        self.record(AuditEvent::SignedIn {
            tenant_id: tenant.id,
            user_id: user.id,
            session_id: session.session_id,
            unconfirmed: authenticated.unconfirmed,
        })
        .await;

        Ok(SignInOutput {
            access_token: session.access_token,
            refresh_token: session.refresh_token,
            session_id: session.session_id,
            tenant_id: tenant.id,
            user_id: user.id,
            expires_in: session.expires_in,
            unconfirmed: authenticated.unconfirmed,
        })
    }

    /// Rotate a refresh token.
    ///
    /// A replayed token fails with `SessionCompromised` after the whole
    /// session has been revoked.
    pub async fn refresh(&self, input: RefreshInput) -> WardenResult<RefreshOutput> {
        self.limiter
            .enforce(input.tenant_id, RateLimitAction::TokenRefresh)
            .await?;

        let rotated = self
            .rotation
            .rotate(input.tenant_id, &input.refresh_token)
            .await?;

        self.record(AuditEvent::TokenRefreshed {
            tenant_id: input.tenant_id,
            user_id: rotated.user_id,
            session_id: rotated.session_id,
        })
        .await;

        Ok(RefreshOutput {
            access_token: rotated.access_token,
            refresh_token: rotated.refresh_token,
            session_id: rotated.session_id,
            expires_in: rotated.expires_in,
        })
    }

    /// End a session. Idempotent; returns how many tokens were revoked.
    pub async fn sign_out(&self, tenant_id: Uuid, session_id: Uuid) -> WardenResult<u64> {
        let revoked = self.rotation.revoke_session(tenant_id, session_id).await?;

        self.record(AuditEvent::SessionRevoked {
            tenant_id,
            session_id,
            revoked_tokens: revoked,
        })
        .await;

        Ok(revoked)
    }

    /// Verify a bearer access token issued by this authority.
    pub fn verify_access_token(&self, access_token: &str) -> WardenResult<ValidatedClaims> {
        Ok(token::validate_access_token(access_token, &self.config)?)
    }

    async fn record(&self, event: AuditEvent) {
        if let Err(e) = self.audit.append(event.to_entry()).await {
            error!(tenant_id = %event.tenant_id(), error = %e, "Failed to write audit entry");
        }
    }
}
