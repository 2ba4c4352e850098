//! Warden Auth: credential verification, refresh token rotation with
//! reuse detection, per-tenant rate limiting and webhook secrets.

pub mod config;
pub mod credentials;
pub mod error;
pub mod password;
pub mod rate_limit;
pub mod rotation;
pub mod service;
pub mod token;
pub mod webhook;

pub use config::{AuthConfig, Rate, RateLimitConfig};
pub use credentials::{AuthenticatedUser, CredentialStore};
pub use error::AuthError;
pub use rate_limit::RateLimiter;
pub use rotation::{IssuedSession, RotatedTokens, TokenChain, TokenRotationEngine};
pub use service::{RefreshInput, RefreshOutput, SessionAuthority, SignInInput, SignInOutput};
pub use token::{AccessTokenClaims, ValidatedClaims};
pub use webhook::{WebhookSecret, validate_secret};
