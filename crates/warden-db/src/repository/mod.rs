//! SurrealDB repository implementations.

mod audit;
mod organization;
mod rate_limit;
mod refresh_token;
mod tenant;
mod user;

pub use audit::SurrealAuditLogRepository;
pub use organization::SurrealOrganizationRepository;
pub use rate_limit::SurrealRateLimitRepository;
pub use refresh_token::SurrealRefreshTokenRepository;
pub use tenant::SurrealTenantRepository;
pub use user::{SurrealUserRepository, hash_password};
