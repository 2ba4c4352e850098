//! SurrealDB implementation of [`UserRepository`].
//!
//! Password hashing uses Argon2id (m=19 MiB, t=2, p=1) with a random
//! salt per hash. An optional pepper (server-side secret) is prepended
//! to the password before hashing and must match the one the credential
//! store verifies with.
//!
//! Emails are unique per tenant ignoring case. The lower-cased
//! `email_key` column carries the unique index; `create` also checks
//! it up front so the common case yields a clean `AlreadyExists`.

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher};
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;
use warden_core::error::{WardenError, WardenResult};
use warden_core::models::user::{CreateUser, DEFAULT_ROLE, UpdateUser, User, email_key};
use warden_core::repository::UserRepository;

use crate::error::{DbError, parse_uuid};

#[derive(Debug, SurrealValue)]
struct UserRow {
    record_id: String,
    tenant_id: String,
    organization_id: Option<String>,
    email: String,
    password_hash: String,
    role: String,
    email_confirmed_at: Option<DateTime<Utc>>,
    confirmation_token: Option<String>,
    recovery_token: Option<String>,
    last_sign_in_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn try_into_user(self) -> Result<User, DbError> {
        let organization_id = self
            .organization_id
            .as_deref()
            .map(|s| parse_uuid("organization", s))
            .transpose()?;
        Ok(User {
            id: parse_uuid("user", &self.record_id)?,
            tenant_id: parse_uuid("tenant", &self.tenant_id)?,
            organization_id,
            email: self.email,
            password_hash: self.password_hash,
            role: self.role,
            email_confirmed_at: self.email_confirmed_at,
            confirmation_token: self.confirmation_token,
            recovery_token: self.recovery_token,
            last_sign_in_at: self.last_sign_in_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// Hash a password with Argon2id.
///
/// If a pepper is provided, it is prepended to the password before
/// hashing.
pub fn hash_password(password: &str, pepper: Option<&str>) -> Result<String, DbError> {
    let params = argon2::Params::new(19456, 2, 1, None)
        .map_err(|e| DbError::Query(format!("argon2 params error: {e}")))?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let peppered: String;
    let input = match pepper {
        Some(p) => {
            peppered = format!("{p}{password}");
            peppered.as_bytes()
        }
        None => password.as_bytes(),
    };

    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let hash = argon2
        .hash_password(input, &salt)
        .map_err(|e| DbError::Query(format!("password hash error: {e}")))?;

    Ok(hash.to_string())
}

/// SurrealDB implementation of the User repository.
#[derive(Clone)]
pub struct SurrealUserRepository<C: Connection> {
    db: Surreal<C>,
    pepper: Option<String>,
}

impl<C: Connection> SurrealUserRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db, pepper: None }
    }

    pub fn with_pepper(db: Surreal<C>, pepper: String) -> Self {
        Self {
            db,
            pepper: Some(pepper),
        }
    }

    async fn email_taken(&self, tenant_id: &str, key: &str) -> Result<bool, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM user \
                 WHERE tenant_id = $tenant_id AND email_key = $email_key GROUP ALL",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("email_key", key.to_string()))
            .await?;
        let rows: Vec<CountRow> = result.take(0)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0) > 0)
    }
}

impl<C: Connection> UserRepository for SurrealUserRepository<C> {
    async fn create(&self, input: CreateUser) -> WardenResult<User> {
        let id_str = Uuid::new_v4().to_string();
        let tenant_id_str = input.tenant_id.to_string();
        let email = input.email.trim().to_string();
        let key = email_key(&email);
        if key.is_empty() {
            return Err(WardenError::validation("email is empty"));
        }

        if self.email_taken(&tenant_id_str, &key).await? {
            return Err(WardenError::AlreadyExists {
                entity: "user".into(),
            });
        }

        let password_hash = hash_password(&input.password, self.pepper.as_deref())?;
        let confirmed_at = input.email_confirmed.then(Utc::now);

        let result = self
            .db
            .query(
                "CREATE type::record('user', $id) SET \
                 tenant_id = $tenant_id, \
                 organization_id = $organization_id, \
                 email = $email, email_key = $email_key, \
                 password_hash = $password_hash, \
                 role = $role, \
                 email_confirmed_at = $email_confirmed_at; \
                 SELECT meta::id(id) AS record_id, * \
                 FROM type::record('user', $id);",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id_str))
            .bind((
                "organization_id",
                input.organization_id.map(|o| o.to_string()),
            ))
            .bind(("email", email))
            .bind(("email_key", key))
            .bind(("password_hash", password_hash))
            .bind((
                "role",
                input.role.unwrap_or_else(|| DEFAULT_ROLE.to_string()),
            ))
            .bind(("email_confirmed_at", confirmed_at))
            .await
            .map_err(DbError::from)?;

        // A concurrent insert that slipped past the pre-check still trips
        // the unique index and surfaces as a conflict here.
        let mut result = result
            .check()
            .map_err(|e| DbError::classify("user", e))?;

        let rows: Vec<UserRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;

        Ok(row.try_into_user()?)
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> WardenResult<User> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * \
                 FROM type::record('user', $id) \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;

        Ok(row.try_into_user()?)
    }

    async fn get_by_email(&self, tenant_id: Uuid, email: &str) -> WardenResult<User> {
        let key = email_key(email);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM user \
                 WHERE tenant_id = $tenant_id AND email_key = $email_key",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("email_key", key.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: format!("email={key}"),
        })?;

        Ok(row.try_into_user()?)
    }

    async fn update(&self, tenant_id: Uuid, id: Uuid, input: UpdateUser) -> WardenResult<User> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.role.is_some() {
            sets.push("role = $role");
        }
        if input.email_confirmed_at.is_some() {
            sets.push("email_confirmed_at = $email_confirmed_at");
        }
        if input.confirmation_token.is_some() {
            sets.push("confirmation_token = $confirmation_token");
        }
        if input.recovery_token.is_some() {
            sets.push("recovery_token = $recovery_token");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('user', $id) SET {} \
             WHERE tenant_id = $tenant_id; \
             SELECT meta::id(id) AS record_id, * \
             FROM type::record('user', $id) WHERE tenant_id = $tenant_id;",
            sets.join(", ")
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()));

        if let Some(role) = input.role {
            builder = builder.bind(("role", role));
        }
        if let Some(confirmed_at) = input.email_confirmed_at {
            builder = builder.bind(("email_confirmed_at", confirmed_at));
        }
        if let Some(token) = input.confirmation_token {
            builder = builder.bind(("confirmation_token", token));
        }
        if let Some(token) = input.recovery_token {
            builder = builder.bind(("recovery_token", token));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::classify("user", e))?;

        let rows: Vec<UserRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;

        Ok(row.try_into_user()?)
    }

    async fn record_sign_in(&self, tenant_id: Uuid, id: Uuid, at: DateTime<Utc>) -> WardenResult<()> {
        self.db
            .query(
                "UPDATE type::record('user', $id) SET \
                 last_sign_in_at = $at, updated_at = time::now() \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("at", at))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::classify("user", e))?;

        Ok(())
    }

    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> WardenResult<()> {
        self.db
            .query(
                "DELETE type::record('user', $id) \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::classify("user", e))?;

        Ok(())
    }
}
