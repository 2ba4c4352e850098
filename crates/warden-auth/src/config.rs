//! Authentication configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use warden_core::models::rate_limit::RateLimitAction;

use crate::error::AuthError;
use crate::webhook;

/// Upper bound for both token lifetimes (ten years).
pub const MAX_TOKEN_LIFETIME_SECS: u64 = 10 * 365 * 24 * 3600;

/// A quota: `events` calls per `over`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rate {
    pub events: f64,
    pub over: Duration,
}

impl Rate {
    pub const fn per_hour(events: f64) -> Self {
        Self {
            events,
            over: Duration::from_secs(3600),
        }
    }

    pub const fn per_five_minutes(events: f64) -> Self {
        Self {
            events,
            over: Duration::from_secs(300),
        }
    }

    /// Whole calls allowed per window.
    pub fn limit(&self) -> u64 {
        self.events.max(0.0).floor() as u64
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}s", self.events, self.over.as_secs())
    }
}

/// Parses `"30"` (per hour) or `"<events>/<n><unit>"` with unit `s`,
/// `m` or `h`, e.g. `"150/5m"`. The count before the unit may be
/// omitted: `"10/h"`.
impl FromStr for Rate {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AuthError::Config(format!("invalid rate: {s:?}"));
        let (events, window) = match s.trim().split_once('/') {
            Some((events, window)) => (events.trim(), Some(window.trim())),
            None => (s.trim(), None),
        };

        let events: f64 = events.parse().map_err(|_| invalid())?;
        if !events.is_finite() || events < 0.0 {
            return Err(invalid());
        }

        let over = match window {
            None => Duration::from_secs(3600),
            Some(window) => {
                let unit = window.chars().last().ok_or_else(invalid)?;
                let count = &window[..window.len() - unit.len_utf8()];
                let count: u64 = if count.is_empty() {
                    1
                } else {
                    count.parse().map_err(|_| invalid())?
                };
                let unit_secs = match unit {
                    's' => 1,
                    'm' => 60,
                    'h' => 3600,
                    _ => return Err(invalid()),
                };
                if count == 0 {
                    return Err(invalid());
                }
                Duration::from_secs(count * unit_secs)
            }
        };

        Ok(Self { events, over })
    }
}

/// Per-action quotas.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub email_sent: Rate,
    pub sms_sent: Rate,
    pub verify: Rate,
    pub token_refresh: Rate,
    pub sso: Rate,
    pub anonymous_sign_in: Rate,
    pub otp: Rate,
    pub sign_in: Rate,
}

impl RateLimitConfig {
    pub fn rate_for(&self, action: RateLimitAction) -> Rate {
        match action {
            RateLimitAction::EmailSent => self.email_sent,
            RateLimitAction::SmsSent => self.sms_sent,
            RateLimitAction::Verify => self.verify,
            RateLimitAction::TokenRefresh => self.token_refresh,
            RateLimitAction::Sso => self.sso,
            RateLimitAction::AnonymousSignIn => self.anonymous_sign_in,
            RateLimitAction::Otp => self.otp,
            RateLimitAction::SignIn => self.sign_in,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            email_sent: Rate::per_hour(30.0),
            sms_sent: Rate::per_hour(30.0),
            verify: Rate::per_five_minutes(30.0),
            token_refresh: Rate::per_five_minutes(150.0),
            sso: Rate::per_five_minutes(30.0),
            anonymous_sign_in: Rate::per_hour(30.0),
            otp: Rate::per_five_minutes(30.0),
            sign_in: Rate::per_five_minutes(30.0),
        }
    }
}

/// Configuration for the session core.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Public base URL of the deployment.
    pub external_url: String,
    /// PEM-encoded Ed25519 private key for JWT signing.
    pub jwt_private_key_pem: String,
    /// PEM-encoded Ed25519 public key for JWT verification.
    pub jwt_public_key_pem: String,
    /// JWT issuer (`iss` claim).
    pub jwt_issuer: String,
    /// JWT audience (`aud` claim).
    pub jwt_audience: String,
    /// Access token lifetime in seconds (default: 900 = 15 minutes).
    pub access_token_lifetime_secs: u64,
    /// Refresh token lifetime in seconds (default: 2_592_000 = 30 days).
    pub refresh_token_lifetime_secs: u64,
    /// Optional pepper prepended to passwords before Argon2id verification.
    pub pepper: Option<String>,
    pub factor_expiry_secs: u64,
    pub challenge_expiry_secs: u64,
    pub flow_state_expiry_secs: u64,
    pub rate_limits: RateLimitConfig,
    /// Standard Webhooks secret used to sign outgoing hook payloads.
    pub webhook_secret: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            external_url: "http://localhost:9999".into(),
            jwt_private_key_pem: String::new(),
            jwt_public_key_pem: String::new(),
            jwt_issuer: "warden".into(),
            jwt_audience: "authenticated".into(),
            access_token_lifetime_secs: 900,
            refresh_token_lifetime_secs: 2_592_000,
            pepper: None,
            factor_expiry_secs: 300,
            challenge_expiry_secs: 300,
            flow_state_expiry_secs: 300,
            rate_limits: RateLimitConfig::default(),
            webhook_secret: None,
        }
    }
}

impl AuthConfig {
    /// Reject configurations the core cannot run with.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.jwt_private_key_pem.trim().is_empty() || self.jwt_public_key_pem.trim().is_empty()
        {
            return Err(AuthError::Config("JWT signing keys are required".into()));
        }
        if self.jwt_issuer.is_empty() || self.jwt_audience.is_empty() {
            return Err(AuthError::Config("JWT issuer and audience are required".into()));
        }
        if self.access_token_lifetime_secs == 0 || self.refresh_token_lifetime_secs == 0 {
            return Err(AuthError::Config("token lifetimes must be positive".into()));
        }
        if self.access_token_lifetime_secs > MAX_TOKEN_LIFETIME_SECS
            || self.refresh_token_lifetime_secs > MAX_TOKEN_LIFETIME_SECS
        {
            return Err(AuthError::Config(format!(
                "token lifetimes must not exceed {MAX_TOKEN_LIFETIME_SECS} seconds"
            )));
        }
        for action in RateLimitAction::ALL {
            let rate = self.rate_limits.rate_for(action);
            if rate.over.is_zero() {
                return Err(AuthError::Config(format!("{action} rate has an empty window")));
            }
        }
        if let Some(secret) = &self.webhook_secret {
            webhook::validate_secret(secret)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_number_is_per_hour() {
        let rate: Rate = "30".parse().unwrap();
        assert_eq!(rate, Rate::per_hour(30.0));
        assert_eq!(rate.limit(), 30);
    }

    #[test]
    fn windowed_rates_parse() {
        let cases = [
            ("150/5m", 150.0, 300),
            ("10/h", 10.0, 3600),
            ("2.5/30s", 2.5, 30),
            (" 5 / 2h ", 5.0, 7200),
        ];
        for (input, events, secs) in cases {
            let rate: Rate = input.parse().unwrap();
            assert_eq!(rate.events, events, "{input}");
            assert_eq!(rate.over, Duration::from_secs(secs), "{input}");
        }
    }

    #[test]
    fn malformed_rates_are_rejected() {
        for input in ["", "abc", "-1", "10/", "10/5d", "10/0m", "10/xm", "NaN"] {
            assert!(input.parse::<Rate>().is_err(), "{input:?} should be rejected");
        }
    }

    #[test]
    fn fractional_events_floor() {
        assert_eq!(Rate::per_hour(2.9).limit(), 2);
    }

    #[test]
    fn defaults_match_documented_quotas() {
        let limits = RateLimitConfig::default();
        assert_eq!(limits.email_sent, Rate::per_hour(30.0));
        assert_eq!(limits.token_refresh, Rate::per_five_minutes(150.0));
        assert_eq!(limits.rate_for(RateLimitAction::SignIn).limit(), 30);
    }

    #[test]
    fn validate_requires_keys() {
        assert!(AuthConfig::default().validate().is_err());
    }

    #[test]
    fn validate_bounds_token_lifetimes() {
        let base = AuthConfig {
            jwt_private_key_pem: "private".into(),
            jwt_public_key_pem: "public".into(),
            ..Default::default()
        };
        assert!(base.validate().is_ok());

        let at_cap = AuthConfig {
            refresh_token_lifetime_secs: MAX_TOKEN_LIFETIME_SECS,
            ..base.clone()
        };
        assert!(at_cap.validate().is_ok());

        for config in [
            AuthConfig {
                refresh_token_lifetime_secs: u64::MAX,
                ..base.clone()
            },
            AuthConfig {
                access_token_lifetime_secs: MAX_TOKEN_LIFETIME_SECS + 1,
                ..base.clone()
            },
        ] {
            assert!(matches!(config.validate(), Err(AuthError::Config(_))));
        }
    }

    #[test]
    fn validate_rejects_malformed_webhook_secret() {
        let config = AuthConfig {
            jwt_private_key_pem: "private".into(),
            jwt_public_key_pem: "public".into(),
            webhook_secret: Some("v1,whsec_short".into()),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AuthError::MalformedSecret(_))
        ));
    }
}
