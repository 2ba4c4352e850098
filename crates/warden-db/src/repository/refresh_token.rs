//! SurrealDB implementation of [`RefreshTokenRepository`].
//!
//! Rotation runs as a single `IF` statement so the claim on the
//! presented token and the insert of its child share one transaction.
//! The claim only matches a token that is neither revoked nor already
//! has a child, so of two concurrent rotations of the same token at
//! most one can insert a child.

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;
use warden_core::error::WardenResult;
use warden_core::models::refresh_token::{
    CreateRefreshToken, RefreshToken, RevocationReason, RotationOutcome,
};
use warden_core::repository::RefreshTokenRepository;

use crate::error::{DbError, parse_uuid};

#[derive(Debug, SurrealValue)]
struct RefreshTokenRow {
    record_id: String,
    tenant_id: String,
    session_id: String,
    user_id: String,
    token: String,
    revoked: bool,
    parent: Option<String>,
    has_child: bool,
    revoked_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RefreshTokenRow {
    fn try_into_token(self) -> Result<RefreshToken, DbError> {
        let revoked_reason = match self.revoked_reason.as_deref() {
            None => None,
            Some(s) => Some(
                RevocationReason::parse(s)
                    .ok_or_else(|| DbError::Decode(format!("unknown revocation reason: {s}")))?,
            ),
        };
        Ok(RefreshToken {
            id: parse_uuid("refresh_token", &self.record_id)?,
            tenant_id: parse_uuid("tenant", &self.tenant_id)?,
            session_id: parse_uuid("session", &self.session_id)?,
            user_id: parse_uuid("user", &self.user_id)?,
            token: self.token,
            revoked: self.revoked,
            parent: self.parent,
            has_child: self.has_child,
            revoked_reason,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn first_token(rows: Vec<RefreshTokenRow>) -> Result<Option<RefreshToken>, DbError> {
    rows.into_iter()
        .next()
        .map(RefreshTokenRow::try_into_token)
        .transpose()
}

/// SurrealDB implementation of the refresh token repository.
#[derive(Clone)]
pub struct SurrealRefreshTokenRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealRefreshTokenRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> RefreshTokenRepository for SurrealRefreshTokenRepository<C> {
    // `$token` is reserved by SurrealQL, so token values bind as `$token_value`.
    async fn create(&self, input: CreateRefreshToken) -> WardenResult<RefreshToken> {
        let id_str = Uuid::new_v4().to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('refresh_token', $id) SET \
                 tenant_id = $tenant_id, session_id = $session_id, \
                 user_id = $user_id, token = $token_value, parent = $parent_token, \
                 revoked = false, has_child = false; \
                 SELECT meta::id(id) AS record_id, * \
                 FROM type::record('refresh_token', $id);",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("session_id", input.session_id.to_string()))
            .bind(("user_id", input.user_id.to_string()))
            .bind(("token_value", input.token))
            .bind(("parent_token", input.parent))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::classify("refresh_token", e))?;

        let rows: Vec<RefreshTokenRow> = result.take(1).map_err(DbError::from)?;
        let token = first_token(rows)?.ok_or_else(|| DbError::NotFound {
            entity: "refresh_token".into(),
            id: id_str,
        })?;

        Ok(token)
    }

    async fn get_by_token(&self, tenant_id: Uuid, token: &str) -> WardenResult<RefreshToken> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM refresh_token \
                 WHERE tenant_id = $tenant_id AND token = $token_value",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("token_value", token.to_string()))
            .await
            .map_err(|e| DbError::classify("refresh_token", e))?;

        let rows: Vec<RefreshTokenRow> = result.take(0).map_err(DbError::from)?;
        // The token value itself is a secret; never echo it in errors.
        let token = first_token(rows)?.ok_or_else(|| DbError::NotFound {
            entity: "refresh_token".into(),
            id: "token=<redacted>".into(),
        })?;

        Ok(token)
    }

    async fn get_child(
        &self,
        tenant_id: Uuid,
        parent_token: &str,
    ) -> WardenResult<Option<RefreshToken>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM refresh_token \
                 WHERE tenant_id = $tenant_id AND parent = $parent_token \
                 ORDER BY created_at ASC LIMIT 1",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("parent_token", parent_token.to_string()))
            .await
            .map_err(|e| DbError::classify("refresh_token", e))?;

        let rows: Vec<RefreshTokenRow> = result.take(0).map_err(DbError::from)?;
        Ok(first_token(rows)?)
    }

    async fn get_session_root(
        &self,
        tenant_id: Uuid,
        session_id: Uuid,
    ) -> WardenResult<Option<RefreshToken>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM refresh_token \
                 WHERE tenant_id = $tenant_id AND session_id = $session_id \
                 AND parent = NONE \
                 ORDER BY created_at ASC LIMIT 1",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("session_id", session_id.to_string()))
            .await
            .map_err(|e| DbError::classify("refresh_token", e))?;

        let rows: Vec<RefreshTokenRow> = result.take(0).map_err(DbError::from)?;
        Ok(first_token(rows)?)
    }

    async fn rotate(
        &self,
        tenant_id: Uuid,
        presented: &str,
        child: CreateRefreshToken,
    ) -> WardenResult<RotationOutcome> {
        let child_id = Uuid::new_v4().to_string();

        // Statement 0 claims and inserts atomically. Statement 1 reads the
        // child back and is empty when the claim matched nothing.
        let result = self
            .db
            .query(
                "IF array::len((UPDATE refresh_token SET \
                     revoked = true, has_child = true, \
                     revoked_reason = 'Rotated', updated_at = time::now() \
                     WHERE tenant_id = $tenant_id AND token = $presented \
                     AND revoked = false AND has_child = false \
                     RETURN AFTER)) > 0 { \
                     (CREATE type::record('refresh_token', $child_id) SET \
                      tenant_id = $tenant_id, session_id = $session_id, \
                      user_id = $user_id, token = $token_value, parent = $presented, \
                      revoked = false, has_child = false) \
                 } ELSE { [] }; \
                 SELECT meta::id(id) AS record_id, * \
                 FROM type::record('refresh_token', $child_id);",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("presented", presented.to_string()))
            .bind(("child_id", child_id))
            .bind(("session_id", child.session_id.to_string()))
            .bind(("user_id", child.user_id.to_string()))
            .bind(("token_value", child.token))
            .await
            .map_err(|e| DbError::classify("refresh_token", e))?;

        let mut result = result
            .check()
            .map_err(|e| DbError::classify("refresh_token", e))?;

        let rows: Vec<RefreshTokenRow> = result.take(1).map_err(DbError::from)?;
        Ok(match first_token(rows)? {
            Some(token) => RotationOutcome::Rotated(token),
            None => RotationOutcome::AlreadyConsumed,
        })
    }

    async fn revoke_session(
        &self,
        tenant_id: Uuid,
        session_id: Uuid,
        reason: RevocationReason,
    ) -> WardenResult<u64> {
        let result = self
            .db
            .query(
                "UPDATE refresh_token SET \
                 revoked = true, revoked_reason = $reason, \
                 updated_at = time::now() \
                 WHERE tenant_id = $tenant_id AND session_id = $session_id \
                 AND revoked = false \
                 RETURN AFTER",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("session_id", session_id.to_string()))
            .bind(("reason", reason.as_str().to_string()))
            .await
            .map_err(|e| DbError::classify("refresh_token", e))?;

        let mut result = result
            .check()
            .map_err(|e| DbError::classify("refresh_token", e))?;

        let revoked: Vec<serde_json::Value> = result.take(0).map_err(DbError::from)?;
        Ok(revoked.len() as u64)
    }

    async fn list_by_session(
        &self,
        tenant_id: Uuid,
        session_id: Uuid,
    ) -> WardenResult<Vec<RefreshToken>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM refresh_token \
                 WHERE tenant_id = $tenant_id AND session_id = $session_id \
                 ORDER BY created_at ASC",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("session_id", session_id.to_string()))
            .await
            .map_err(|e| DbError::classify("refresh_token", e))?;

        let rows: Vec<RefreshTokenRow> = result.take(0).map_err(DbError::from)?;
        let tokens = rows
            .into_iter()
            .map(RefreshTokenRow::try_into_token)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(tokens)
    }
}
