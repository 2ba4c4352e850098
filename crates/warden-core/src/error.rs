//! Error types shared by every Warden crate.

use thiserror::Error;
use uuid::Uuid;

/// Generic message returned to callers outside the trust boundary for
/// every credential, tenant or token lookup failure.
pub const GENERIC_AUTH_FAILURE: &str = "invalid credentials";

#[derive(Debug, Error)]
pub enum WardenError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity}")]
    AlreadyExists { entity: String },

    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    /// A dead refresh token was presented again. The whole session has
    /// already been revoked when this error is returned.
    #[error("Session {session_id} revoked after refresh token reuse")]
    SessionCompromised { session_id: Uuid },

    #[error("Rate limit exceeded for {action}; retry after {retry_after_secs}s")]
    RateLimited {
        action: String,
        retry_after_secs: u64,
    },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Database error: {0}")]
    Database(String),

    /// Transient store failure (timeout, dropped connection, transaction
    /// conflict). Safe to retry the whole operation.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Cryptography error: {0}")]
    Crypto(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WardenError {
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Whether the failed operation may be retried from the top.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// Message safe to hand to callers outside the trust boundary.
    ///
    /// Unknown tenants, users and tokens fold into the same text as a
    /// wrong password so the response never reveals which one failed.
    pub fn public_message(&self) -> String {
        match self {
            Self::NotFound { .. } | Self::AuthenticationFailed { .. } => {
                GENERIC_AUTH_FAILURE.to_string()
            }
            Self::SessionCompromised { .. } => {
                "session revoked; sign in again on every device".to_string()
            }
            Self::RateLimited {
                retry_after_secs, ..
            } => format!("too many requests; retry after {retry_after_secs}s"),
            Self::Validation { message } => message.clone(),
            Self::AlreadyExists { entity } => format!("{entity} already exists"),
            Self::Unavailable(_) => "service temporarily unavailable".to_string(),
            Self::Database(_) | Self::Crypto(_) | Self::Internal(_) => {
                "internal error".to_string()
            }
        }
    }
}

pub type WardenResult<T> = Result<T, WardenError>;
