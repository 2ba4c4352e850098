//! Rate limit domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Category of sensitive operation with its own quota.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitAction {
    EmailSent,
    SmsSent,
    Verify,
    TokenRefresh,
    Sso,
    AnonymousSignIn,
    Otp,
    SignIn,
}

impl RateLimitAction {
    pub const ALL: [RateLimitAction; 8] = [
        Self::EmailSent,
        Self::SmsSent,
        Self::Verify,
        Self::TokenRefresh,
        Self::Sso,
        Self::AnonymousSignIn,
        Self::Otp,
        Self::SignIn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmailSent => "email_sent",
            Self::SmsSent => "sms_sent",
            Self::Verify => "verify",
            Self::TokenRefresh => "token_refresh",
            Self::Sso => "sso",
            Self::AnonymousSignIn => "anonymous_sign_in",
            Self::Otp => "otp",
            Self::SignIn => "sign_in",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == s)
    }
}

impl std::fmt::Display for RateLimitAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counter for one (tenant, action, fixed window).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitBucket {
    pub tenant_id: Uuid,
    pub action: RateLimitAction,
    pub window_start: DateTime<Utc>,
    /// Calls counted in this window, including the current one.
    pub hits: u64,
}

/// Outcome of one rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    /// When the current window ends.
    pub reset_at: DateTime<Utc>,
}

impl RateLimitDecision {
    /// Whole seconds until the window resets, never below one.
    pub fn retry_after_secs(&self, now: DateTime<Utc>) -> u64 {
        (self.reset_at - now).num_seconds().max(1) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn action_names_are_distinct() {
        let mut names: Vec<_> = RateLimitAction::ALL.iter().map(|a| a.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), RateLimitAction::ALL.len());
    }

    #[test]
    fn parse_accepts_stored_names_only() {
        for action in RateLimitAction::ALL {
            assert_eq!(RateLimitAction::parse(action.as_str()), Some(action));
        }
        assert_eq!(RateLimitAction::parse("TokenRefresh"), None);
    }

    #[test]
    fn retry_after_is_at_least_one_second() {
        let now = Utc::now();
        let decision = RateLimitDecision {
            allowed: false,
            limit: 1,
            remaining: 0,
            reset_at: now,
        };
        assert_eq!(decision.retry_after_secs(now), 1);

        let later = RateLimitDecision {
            reset_at: now + Duration::seconds(90),
            ..decision
        };
        assert_eq!(later.retry_after_secs(now), 90);
    }
}
