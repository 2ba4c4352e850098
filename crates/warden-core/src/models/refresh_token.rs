//! Refresh token domain model.
//!
//! Refresh tokens of one session form a forward-linked chain through
//! `parent`: every rotation revokes the presented token and inserts a
//! child whose `parent` is the presented token's value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why a refresh token stopped being usable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RevocationReason {
    /// Exchanged for a child token.
    Rotated,
    /// Revoked because a token of the same session was replayed.
    ReuseDetected,
    /// Revoked by an explicit sign-out.
    SignedOut,
}

impl RevocationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rotated => "Rotated",
            Self::ReuseDetected => "ReuseDetected",
            Self::SignedOut => "SignedOut",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Rotated" => Some(Self::Rotated),
            "ReuseDetected" => Some(Self::ReuseDetected),
            "SignedOut" => Some(Self::SignedOut),
            _ => None,
        }
    }
}

/// Lifecycle state derived from the stored flags.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RefreshTokenState {
    /// Not revoked and no child: the head of its session.
    Active,
    /// Revoked with exactly one child.
    Rotated,
    /// Revoked as part of a reuse response.
    RevokedByReuse,
    /// Revoked by sign-out.
    SignedOut,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshToken {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub session_id: Uuid,
    pub user_id: Uuid,
    /// Opaque token value handed to the client.
    pub token: String,
    pub revoked: bool,
    /// Token value of the predecessor; `None` for the first token of a
    /// session.
    pub parent: Option<String>,
    /// Set in the same statement that inserts the child.
    pub has_child: bool,
    pub revoked_reason: Option<RevocationReason>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RefreshToken {
    /// A token that was already exchanged or revoked. Presenting one is
    /// treated as replay.
    pub fn is_consumed(&self) -> bool {
        self.revoked || self.has_child
    }

    pub fn state(&self) -> RefreshTokenState {
        if self.has_child {
            return RefreshTokenState::Rotated;
        }
        match (self.revoked, self.revoked_reason) {
            (false, _) => RefreshTokenState::Active,
            (true, Some(RevocationReason::SignedOut)) => RefreshTokenState::SignedOut,
            (true, _) => RefreshTokenState::RevokedByReuse,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRefreshToken {
    pub tenant_id: Uuid,
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    pub parent: Option<String>,
}

/// Result of an atomic claim-and-insert rotation attempt.
#[derive(Debug, Clone)]
pub enum RotationOutcome {
    /// The presented token was claimed and this child inserted.
    Rotated(RefreshToken),
    /// The presented token was no longer claimable (revoked or already
    /// has a child). Nothing was written.
    AlreadyConsumed,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(revoked: bool, has_child: bool, reason: Option<RevocationReason>) -> RefreshToken {
        RefreshToken {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            token: "t".into(),
            revoked,
            parent: None,
            has_child,
            revoked_reason: reason,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn state_follows_flags() {
        assert_eq!(token(false, false, None).state(), RefreshTokenState::Active);
        assert_eq!(
            token(true, true, Some(RevocationReason::Rotated)).state(),
            RefreshTokenState::Rotated
        );
        assert_eq!(
            token(true, false, Some(RevocationReason::ReuseDetected)).state(),
            RefreshTokenState::RevokedByReuse
        );
        assert_eq!(
            token(true, false, Some(RevocationReason::SignedOut)).state(),
            RefreshTokenState::SignedOut
        );
    }

    #[test]
    fn rotated_token_stays_rotated_after_family_revocation() {
        // Family revocation only touches live tokens, but a rotated token
        // keeps its state even if its reason is overwritten.
        let t = token(true, true, Some(RevocationReason::ReuseDetected));
        assert_eq!(t.state(), RefreshTokenState::Rotated);
        assert!(t.is_consumed());
    }

    #[test]
    fn reason_round_trips_through_str() {
        for reason in [
            RevocationReason::Rotated,
            RevocationReason::ReuseDetected,
            RevocationReason::SignedOut,
        ] {
            assert_eq!(RevocationReason::parse(reason.as_str()), Some(reason));
        }
        assert_eq!(RevocationReason::parse("Expired"), None);
    }
}
