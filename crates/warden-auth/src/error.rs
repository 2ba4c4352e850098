//! Authentication error types.

use thiserror::Error;
use uuid::Uuid;
use warden_core::error::WardenError;
use warden_core::models::rate_limit::RateLimitAction;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("tenant not found")]
    TenantNotFound,

    #[error("refresh token not found")]
    TokenNotFound,

    #[error("token has expired")]
    TokenExpired,

    #[error("invalid token: {0}")]
    TokenInvalid(String),

    /// A consumed refresh token was presented again. The session has
    /// already been revoked when this is returned.
    #[error("refresh token reused; session {session_id} revoked")]
    RefreshTokenReused { session_id: Uuid },

    #[error("rate limit exceeded for {action}")]
    RateLimited {
        action: RateLimitAction,
        retry_after_secs: u64,
    },

    #[error("malformed webhook secret: {0}")]
    MalformedSecret(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("cryptography error: {0}")]
    Crypto(String),

    #[error(transparent)]
    Store(#[from] WardenError),
}

impl From<AuthError> for WardenError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials
            | AuthError::TokenExpired
            | AuthError::TokenInvalid(_) => WardenError::AuthenticationFailed {
                reason: err.to_string(),
            },
            AuthError::TenantNotFound => WardenError::not_found("tenant", "<unresolved>"),
            AuthError::TokenNotFound => WardenError::not_found("refresh_token", "<redacted>"),
            AuthError::RefreshTokenReused { session_id } => {
                WardenError::SessionCompromised { session_id }
            }
            AuthError::RateLimited {
                action,
                retry_after_secs,
            } => WardenError::RateLimited {
                action: action.to_string(),
                retry_after_secs,
            },
            AuthError::MalformedSecret(message) | AuthError::Config(message) => {
                WardenError::Validation { message }
            }
            AuthError::Crypto(msg) => WardenError::Crypto(msg),
            AuthError::Store(inner) => inner,
        }
    }
}
