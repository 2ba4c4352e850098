//! SurrealDB implementation of [`TenantRepository`].

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;
use warden_core::error::WardenResult;
use warden_core::models::tenant::{CreateTenant, Tenant, slug_key};
use warden_core::repository::TenantRepository;

use crate::error::{DbError, parse_uuid};

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct TenantRow {
    record_id: String,
    name: String,
    slug: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TenantRow {
    fn try_into_tenant(self) -> Result<Tenant, DbError> {
        Ok(Tenant {
            id: parse_uuid("tenant", &self.record_id)?,
            name: self.name,
            slug: self.slug,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the Tenant repository.
#[derive(Clone)]
pub struct SurrealTenantRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealTenantRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> TenantRepository for SurrealTenantRepository<C> {
    async fn create(&self, input: CreateTenant) -> WardenResult<Tenant> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let key = slug_key(&input.slug);
        if key.is_empty() {
            return Err(warden_core::WardenError::validation("tenant slug is empty"));
        }

        let result = self
            .db
            .query(
                "CREATE type::record('tenant', $id) SET \
                 name = $name, slug = $slug, slug_key = $slug_key; \
                 SELECT meta::id(id) AS record_id, * \
                 FROM type::record('tenant', $id);",
            )
            .bind(("id", id_str.clone()))
            .bind(("name", input.name))
            .bind(("slug", input.slug.trim().to_string()))
            .bind(("slug_key", key))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::classify("tenant", e))?;

        // Statement 0 is the CREATE, statement 1 reads it back with its id.
        let rows: Vec<TenantRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "tenant".into(),
            id: id_str,
        })?;

        Ok(row.try_into_tenant()?)
    }

    async fn get_by_id(&self, id: Uuid) -> WardenResult<Tenant> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM type::record('tenant', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TenantRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "tenant".into(),
            id: id_str,
        })?;

        Ok(row.try_into_tenant()?)
    }

    async fn get_by_slug(&self, slug: &str) -> WardenResult<Tenant> {
        let key = slug_key(slug);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM tenant \
                 WHERE slug_key = $slug_key",
            )
            .bind(("slug_key", key.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TenantRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "tenant".into(),
            id: format!("slug={key}"),
        })?;

        Ok(row.try_into_tenant()?)
    }

    async fn delete(&self, id: Uuid) -> WardenResult<()> {
        self.db
            .query("DELETE type::record('tenant', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::classify("tenant", e))?;

        Ok(())
    }
}
