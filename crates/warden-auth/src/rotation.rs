//! Refresh token rotation with reuse detection.
//!
//! Every session is a chain of refresh tokens linked through `parent`.
//! Exchanging the head of the chain revokes it and appends a child in one
//! store statement. Presenting any token that was already exchanged or
//! revoked is treated as theft: the whole session is revoked and the
//! event is audited.

use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;
use warden_core::error::WardenError;
use warden_core::models::audit::AuditEvent;
use warden_core::models::refresh_token::{
    CreateRefreshToken, RefreshToken, RevocationReason, RotationOutcome,
};
use warden_core::models::user::User;
use warden_core::repository::{AuditLogRepository, RefreshTokenRepository, UserRepository};

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::token;

/// Attempts made when the store reports a transient failure.
const MAX_ROTATION_ATTEMPTS: u32 = 3;

/// Tokens handed to the client when a session starts or is refreshed.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    /// Signed JWT access token.
    pub access_token: String,
    /// Raw opaque refresh token. Only its digest is stored.
    pub refresh_token: String,
    pub session_id: Uuid,
    pub user_id: Uuid,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

/// Result of a successful rotation; same shape as a fresh session.
pub type RotatedTokens = IssuedSession;

pub struct TokenRotationEngine<R, U, A>
where
    R: RefreshTokenRepository,
    U: UserRepository,
    A: AuditLogRepository,
{
    tokens: R,
    users: U,
    audit: A,
    config: Arc<AuthConfig>,
}

impl<R, U, A> TokenRotationEngine<R, U, A>
where
    R: RefreshTokenRepository,
    U: UserRepository,
    A: AuditLogRepository,
{
    pub fn new(tokens: R, users: U, audit: A, config: Arc<AuthConfig>) -> Self {
        Self {
            tokens,
            users,
            audit,
            config,
        }
    }

    /// Start a new session for `user` with a root refresh token.
    pub async fn issue_session(&self, user: &User) -> Result<IssuedSession, AuthError> {
        let session_id = Uuid::new_v4();
        let raw_refresh = token::generate_refresh_token();

        self.tokens
            .create(CreateRefreshToken {
                tenant_id: user.tenant_id,
                session_id,
                user_id: user.id,
                token: token::hash_refresh_token(&raw_refresh),
                parent: None,
            })
            .await?;

        let access_token = token::issue_access_token(user, session_id, &self.config)?;

        info!(
            tenant_id = %user.tenant_id,
            user_id = %user.id,
            session_id = %session_id,
            "Session issued"
        );

        Ok(IssuedSession {
            access_token,
            refresh_token: raw_refresh,
            session_id,
            user_id: user.id,
            expires_in: self.config.access_token_lifetime_secs,
        })
    }

    /// Exchange `presented` for a new token pair.
    ///
    /// Fails with `TokenNotFound` for unknown tokens, `RefreshTokenReused`
    /// (after revoking the session) for consumed ones and `TokenExpired`
    /// for live tokens past their lifetime.
    ///
    /// Everything fallible happens before the claim commits, so a
    /// retryable error always leaves the presented token usable.
    pub async fn rotate(
        &self,
        tenant_id: Uuid,
        presented: &str,
    ) -> Result<RotatedTokens, AuthError> {
        let digest = token::hash_refresh_token(presented);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let current = match self.tokens.get_by_token(tenant_id, &digest).await {
                Ok(current) => current,
                Err(WardenError::NotFound { .. }) => return Err(AuthError::TokenNotFound),
                Err(e) if e.is_retryable() && attempt < MAX_ROTATION_ATTEMPTS => {
                    warn!(tenant_id = %tenant_id, attempt, error = %e, "Retrying token lookup");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            if current.is_consumed() {
                return Err(self.respond_to_reuse(current).await);
            }

            if self.is_expired(&current) {
                return Err(AuthError::TokenExpired);
            }

            let user = self.users.get_by_id(tenant_id, current.user_id).await?;
            let access_token = token::issue_access_token(&user, current.session_id, &self.config)?;

            let raw_child = token::generate_refresh_token();
            let child_digest = token::hash_refresh_token(&raw_child);
            let child = CreateRefreshToken {
                tenant_id,
                session_id: current.session_id,
                user_id: current.user_id,
                token: child_digest.clone(),
                parent: Some(digest.clone()),
            };
            let issued = IssuedSession {
                access_token,
                refresh_token: raw_child,
                session_id: current.session_id,
                user_id: current.user_id,
                expires_in: self.config.access_token_lifetime_secs,
            };

            let failure = match self.tokens.rotate(tenant_id, &digest, child).await {
                Ok(RotationOutcome::Rotated(_)) => return Ok(self.rotated(issued, tenant_id)),
                // Lost the race; the next lookup sees the consumed token.
                Ok(RotationOutcome::AlreadyConsumed) => None,
                Err(e) => Some(e),
            };

            if let Some(e) = failure {
                // The statement may have committed before the failure was
                // reported. Our own child means it did.
                match self.tokens.get_child(tenant_id, &digest).await {
                    Ok(Some(stored)) if stored.token == child_digest => {
                        return Ok(self.rotated(issued, tenant_id));
                    }
                    Ok(Some(_)) => {
                        let reread = self.tokens.get_by_token(tenant_id, &digest).await?;
                        return Err(self.respond_to_reuse(reread).await);
                    }
                    Ok(None) | Err(_) if e.is_retryable() && attempt < MAX_ROTATION_ATTEMPTS => {
                        warn!(tenant_id = %tenant_id, attempt, error = %e, "Retrying rotation");
                    }
                    _ => return Err(e.into()),
                }
            } else if attempt >= MAX_ROTATION_ATTEMPTS {
                return Err(WardenError::Unavailable(
                    "refresh token rotation did not settle".into(),
                )
                .into());
            }
        }
    }

    fn is_expired(&self, current: &RefreshToken) -> bool {
        let expires_at = i64::try_from(self.config.refresh_token_lifetime_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .and_then(|lifetime| current.created_at.checked_add_signed(lifetime));
        match expires_at {
            Some(expires_at) => expires_at <= Utc::now(),
            // Past the end of the calendar.
            None => false,
        }
    }

    fn rotated(&self, issued: IssuedSession, tenant_id: Uuid) -> RotatedTokens {
        info!(
            tenant_id = %tenant_id,
            user_id = %issued.user_id,
            session_id = %issued.session_id,
            "Refresh token rotated"
        );
        issued
    }

    /// Revoke the whole session of a replayed token and audit it.
    ///
    /// Returns the error to surface. If the revocation itself fails, that
    /// store error is returned instead so the caller retries and lands
    /// here again.
    async fn respond_to_reuse(&self, presented: RefreshToken) -> AuthError {
        let tenant_id = presented.tenant_id;
        let session_id = presented.session_id;

        let revoked = match self
            .tokens
            .revoke_session(tenant_id, session_id, RevocationReason::ReuseDetected)
            .await
        {
            Ok(revoked) => revoked,
            Err(e) => {
                error!(
                    tenant_id = %tenant_id,
                    session_id = %session_id,
                    error = %e,
                    "Failed to revoke session after refresh token reuse"
                );
                return e.into();
            }
        };

        let chain = match self.chain(tenant_id, session_id).collect_ids().await {
            Ok(chain) => chain,
            Err(e) => {
                error!(session_id = %session_id, error = %e, "Failed to read token chain");
                Vec::new()
            }
        };

        error!(
            tenant_id = %tenant_id,
            user_id = %presented.user_id,
            session_id = %session_id,
            token_id = %presented.id,
            revoked,
            "Refresh token reuse detected; session revoked"
        );

        let event = AuditEvent::TokenReuseDetected {
            tenant_id,
            user_id: presented.user_id,
            session_id,
            presented_token_id: presented.id,
            presented_state: format!("{:?}", presented.state()),
            revoked_tokens: revoked,
            chain,
        };
        if let Err(e) = self.audit.append(event.to_entry()).await {
            error!(session_id = %session_id, error = %e, "Failed to audit refresh token reuse");
        }

        AuthError::RefreshTokenReused { session_id }
    }

    /// Revoke every live token of the session. Returns how many were
    /// newly revoked.
    pub async fn revoke_session(&self, tenant_id: Uuid, session_id: Uuid) -> Result<u64, AuthError> {
        let revoked = self
            .tokens
            .revoke_session(tenant_id, session_id, RevocationReason::SignedOut)
            .await?;
        info!(tenant_id = %tenant_id, session_id = %session_id, revoked, "Session revoked");
        Ok(revoked)
    }

    /// Walk the session's tokens from the root.
    pub fn chain(&self, tenant_id: Uuid, session_id: Uuid) -> TokenChain<'_, R> {
        TokenChain {
            tokens: &self.tokens,
            tenant_id,
            session_id,
            cursor: Cursor::Start,
        }
    }
}

enum Cursor {
    Start,
    After(String),
    Done,
}

/// Lazy cursor over one session's refresh tokens, root first. Each step
/// is one store lookup.
pub struct TokenChain<'a, R: RefreshTokenRepository> {
    tokens: &'a R,
    tenant_id: Uuid,
    session_id: Uuid,
    cursor: Cursor,
}

impl<R: RefreshTokenRepository> TokenChain<'_, R> {
    pub async fn next(&mut self) -> Result<Option<RefreshToken>, AuthError> {
        let found = match &self.cursor {
            Cursor::Start => {
                self.tokens
                    .get_session_root(self.tenant_id, self.session_id)
                    .await?
            }
            Cursor::After(parent) => self.tokens.get_child(self.tenant_id, parent).await?,
            Cursor::Done => return Ok(None),
        };

        self.cursor = match &found {
            Some(token) => Cursor::After(token.token.clone()),
            None => Cursor::Done,
        };
        Ok(found)
    }

    /// Start over from the root.
    pub fn rewind(&mut self) {
        self.cursor = Cursor::Start;
    }

    pub async fn collect_ids(mut self) -> Result<Vec<Uuid>, AuthError> {
        let mut ids = Vec::new();
        while let Some(token) = self.next().await? {
            ids.push(token.id);
        }
        Ok(ids)
    }
}
