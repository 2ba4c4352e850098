//! Audit log domain model.
//!
//! Entries are append-only and carry their tenant inside the payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    /// Structured event, see [`AuditEvent`].
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAuditLogEntry {
    pub payload: serde_json::Value,
}

/// Security-relevant events recorded by the session core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AuditEvent {
    SignedIn {
        tenant_id: Uuid,
        user_id: Uuid,
        session_id: Uuid,
        unconfirmed: bool,
    },
    TokenRefreshed {
        tenant_id: Uuid,
        user_id: Uuid,
        session_id: Uuid,
    },
    /// A dead refresh token was replayed; the whole session was revoked.
    TokenReuseDetected {
        tenant_id: Uuid,
        user_id: Uuid,
        session_id: Uuid,
        presented_token_id: Uuid,
        /// State of the presented token before the family was revoked.
        presented_state: String,
        /// Number of tokens revoked by this event.
        revoked_tokens: u64,
        /// Token ids of the session, root first.
        chain: Vec<Uuid>,
    },
    SessionRevoked {
        tenant_id: Uuid,
        session_id: Uuid,
        revoked_tokens: u64,
    },
    RateLimitExceeded {
        tenant_id: Uuid,
        rate_action: String,
        limit: u64,
        window_start: DateTime<Utc>,
    },
}

impl AuditEvent {
    pub fn tenant_id(&self) -> Uuid {
        match self {
            Self::SignedIn { tenant_id, .. }
            | Self::TokenRefreshed { tenant_id, .. }
            | Self::TokenReuseDetected { tenant_id, .. }
            | Self::SessionRevoked { tenant_id, .. }
            | Self::RateLimitExceeded { tenant_id, .. } => *tenant_id,
        }
    }

    /// Serialize into an entry ready to append.
    pub fn to_entry(&self) -> CreateAuditLogEntry {
        CreateAuditLogEntry {
            payload: serde_json::to_value(self).unwrap_or_else(|e| {
                serde_json::json!({ "action": "unserializable", "error": e.to_string() })
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_carries_action_and_tenant() {
        let tenant_id = Uuid::new_v4();
        let entry = AuditEvent::SessionRevoked {
            tenant_id,
            session_id: Uuid::new_v4(),
            revoked_tokens: 2,
        }
        .to_entry();

        assert_eq!(entry.payload["action"], "session_revoked");
        assert_eq!(entry.payload["tenant_id"], tenant_id.to_string());
        assert_eq!(entry.payload["revoked_tokens"], 2);
    }

    #[test]
    fn payload_deserializes_back_to_event() {
        let event = AuditEvent::RateLimitExceeded {
            tenant_id: Uuid::new_v4(),
            rate_action: "token_refresh".into(),
            limit: 150,
            window_start: Utc::now(),
        };
        let back: AuditEvent = serde_json::from_value(event.to_entry().payload).unwrap();
        assert_eq!(back, event);
    }
}
