//! SurrealDB implementation of [`RateLimitRepository`].
//!
//! One record per (tenant, action, window start). The record key is
//! derived from those three values so concurrent hits on the same
//! window land on the same record and the increment is a single
//! `UPSERT`.

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;
use warden_core::error::WardenResult;
use warden_core::models::rate_limit::{RateLimitAction, RateLimitBucket};
use warden_core::repository::RateLimitRepository;

use crate::error::{DbError, parse_uuid};

#[derive(Debug, SurrealValue)]
struct BucketRow {
    tenant_id: String,
    action: String,
    window_start: DateTime<Utc>,
    hits: u64,
}

impl BucketRow {
    fn try_into_bucket(self) -> Result<RateLimitBucket, DbError> {
        let action = RateLimitAction::parse(&self.action)
            .ok_or_else(|| DbError::Decode(format!("unknown rate limit action: {}", self.action)))?;
        Ok(RateLimitBucket {
            tenant_id: parse_uuid("tenant", &self.tenant_id)?,
            action,
            window_start: self.window_start,
            hits: self.hits,
        })
    }
}

fn bucket_key(tenant_id: Uuid, action: RateLimitAction, window_start: DateTime<Utc>) -> String {
    format!("{tenant_id}:{action}:{}", window_start.timestamp())
}

/// SurrealDB implementation of the rate limit bucket repository.
#[derive(Clone)]
pub struct SurrealRateLimitRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealRateLimitRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> RateLimitRepository for SurrealRateLimitRepository<C> {
    async fn hit(
        &self,
        tenant_id: Uuid,
        action: RateLimitAction,
        window_start: DateTime<Utc>,
    ) -> WardenResult<RateLimitBucket> {
        let key = bucket_key(tenant_id, action, window_start);

        let result = self
            .db
            .query(
                "UPSERT type::record('rate_limit_bucket', $key) SET \
                 tenant_id = $tenant_id, action = $action, \
                 window_start = $window_start, \
                 hits = (hits ?? 0) + 1 \
                 RETURN AFTER",
            )
            .bind(("key", key.clone()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("action", action.as_str().to_string()))
            .bind(("window_start", window_start))
            .await
            .map_err(|e| DbError::classify("rate_limit_bucket", e))?;

        let mut result = result
            .check()
            .map_err(|e| DbError::classify("rate_limit_bucket", e))?;

        let rows: Vec<BucketRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "rate_limit_bucket".into(),
            id: key,
        })?;

        Ok(row.try_into_bucket()?)
    }

    async fn purge_expired(&self, before: DateTime<Utc>) -> WardenResult<u64> {
        let mut result = self
            .db
            .query("DELETE rate_limit_bucket WHERE window_start < $cutoff RETURN BEFORE")
            .bind(("cutoff", before))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::classify("rate_limit_bucket", e))?;

        let deleted: Vec<serde_json::Value> = result.take(0).map_err(DbError::from)?;
        Ok(deleted.len() as u64)
    }
}
