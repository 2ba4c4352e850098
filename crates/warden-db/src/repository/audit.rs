//! SurrealDB implementation of [`AuditLogRepository`].
//!
//! The table denies update and delete at the permission level. Entries
//! are scoped by the `tenant_id` recorded inside the payload.

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;
use warden_core::error::WardenResult;
use warden_core::models::audit::{AuditLogEntry, CreateAuditLogEntry};
use warden_core::repository::{AuditLogFilter, AuditLogRepository, PaginatedResult, Pagination};

use crate::error::{DbError, parse_uuid};

#[derive(Debug, SurrealValue)]
struct AuditLogRow {
    record_id: String,
    payload: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl AuditLogRow {
    fn try_into_entry(self) -> Result<AuditLogEntry, DbError> {
        Ok(AuditLogEntry {
            id: parse_uuid("audit_log_entry", &self.record_id)?,
            payload: self.payload,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// SurrealDB implementation of the audit log repository.
#[derive(Clone)]
pub struct SurrealAuditLogRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAuditLogRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

fn where_clause(filter: &AuditLogFilter) -> String {
    let mut conditions = vec!["payload.tenant_id = $tenant_id"];
    if filter.action.is_some() {
        conditions.push("payload.action = $action");
    }
    if filter.from.is_some() {
        conditions.push("created_at >= $from");
    }
    if filter.to.is_some() {
        conditions.push("created_at <= $to");
    }
    conditions.join(" AND ")
}

impl<C: Connection> AuditLogRepository for SurrealAuditLogRepository<C> {
    async fn append(&self, input: CreateAuditLogEntry) -> WardenResult<AuditLogEntry> {
        let id_str = Uuid::new_v4().to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('audit_log_entry', $id) SET payload = $payload; \
                 SELECT meta::id(id) AS record_id, * \
                 FROM type::record('audit_log_entry', $id);",
            )
            .bind(("id", id_str.clone()))
            .bind(("payload", input.payload))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::classify("audit_log_entry", e))?;

        let rows: Vec<AuditLogRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "audit_log_entry".into(),
            id: id_str,
        })?;

        Ok(row.try_into_entry()?)
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        filter: AuditLogFilter,
        pagination: Pagination,
    ) -> WardenResult<PaginatedResult<AuditLogEntry>> {
        let conditions = where_clause(&filter);
        let query = format!(
            "SELECT count() AS total FROM audit_log_entry \
             WHERE {conditions} GROUP ALL; \
             SELECT meta::id(id) AS record_id, * FROM audit_log_entry \
             WHERE {conditions} \
             ORDER BY created_at ASC \
             LIMIT $limit START $offset;"
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));
        if let Some(action) = filter.action {
            builder = builder.bind(("action", action));
        }
        if let Some(from) = filter.from {
            builder = builder.bind(("from", from));
        }
        if let Some(to) = filter.to {
            builder = builder.bind(("to", to));
        }

        let mut result = builder
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::classify("audit_log_entry", e))?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let rows: Vec<AuditLogRow> = result.take(1).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(AuditLogRow::try_into_entry)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
