//! Per-tenant, per-action fixed-window rate limiting.
//!
//! Every check is one atomic increment of the bucket for the current
//! window in the store, so concurrent callers on any number of
//! instances share one counter and the quota is never exceeded.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{error, warn};
use uuid::Uuid;
use warden_core::models::audit::AuditEvent;
use warden_core::models::rate_limit::{RateLimitAction, RateLimitDecision};
use warden_core::repository::{AuditLogRepository, RateLimitRepository};

use crate::config::AuthConfig;
use crate::error::AuthError;

/// Start of the fixed window containing `now`.
pub fn window_start(now: DateTime<Utc>, window_secs: i64) -> DateTime<Utc> {
    let window_secs = window_secs.max(1);
    let ts = now.timestamp();
    let start = ts - ts.rem_euclid(window_secs);
    DateTime::from_timestamp(start, 0).unwrap_or(now)
}

#[derive(Clone)]
pub struct RateLimiter<B: RateLimitRepository, A: AuditLogRepository> {
    buckets: B,
    audit: A,
    config: Arc<AuthConfig>,
}

impl<B: RateLimitRepository, A: AuditLogRepository> RateLimiter<B, A> {
    pub fn new(buckets: B, audit: A, config: Arc<AuthConfig>) -> Self {
        Self {
            buckets,
            audit,
            config,
        }
    }

    /// Count one call of `action` and report whether it is within quota.
    pub async fn check(
        &self,
        tenant_id: Uuid,
        action: RateLimitAction,
    ) -> Result<RateLimitDecision, AuthError> {
        self.check_at(tenant_id, action, Utc::now()).await
    }

    /// [`check`](Self::check) with an explicit clock.
    pub async fn check_at(
        &self,
        tenant_id: Uuid,
        action: RateLimitAction,
        now: DateTime<Utc>,
    ) -> Result<RateLimitDecision, AuthError> {
        let rate = self.config.rate_limits.rate_for(action);
        let window_secs = rate.over.as_secs().max(1) as i64;
        let start = window_start(now, window_secs);
        let limit = rate.limit();

        let bucket = self.buckets.hit(tenant_id, action, start).await?;

        let decision = RateLimitDecision {
            allowed: bucket.hits <= limit,
            limit,
            remaining: limit.saturating_sub(bucket.hits),
            reset_at: start + Duration::seconds(window_secs),
        };

        if !decision.allowed {
            warn!(
                tenant_id = %tenant_id,
                action = %action,
                limit,
                hits = bucket.hits,
                "Rate limit exceeded"
            );
            let event = AuditEvent::RateLimitExceeded {
                tenant_id,
                rate_action: action.to_string(),
                limit,
                window_start: start,
            };
            if let Err(e) = self.audit.append(event.to_entry()).await {
                error!(tenant_id = %tenant_id, action = %action, error = %e, "Failed to audit rate limit denial");
            }
        }

        Ok(decision)
    }

    pub async fn allow(&self, tenant_id: Uuid, action: RateLimitAction) -> Result<bool, AuthError> {
        Ok(self.check(tenant_id, action).await?.allowed)
    }

    /// Like [`check`](Self::check), but a denial becomes
    /// [`AuthError::RateLimited`].
    pub async fn enforce(&self, tenant_id: Uuid, action: RateLimitAction) -> Result<(), AuthError> {
        let now = Utc::now();
        let decision = self.check_at(tenant_id, action, now).await?;
        if decision.allowed {
            Ok(())
        } else {
            Err(AuthError::RateLimited {
                action,
                retry_after_secs: decision.retry_after_secs(now),
            })
        }
    }

    /// Drop buckets whose window started before `before`.
    pub async fn purge_expired(&self, before: DateTime<Utc>) -> Result<u64, AuthError> {
        Ok(self.buckets.purge_expired(before).await?)
    }
}
