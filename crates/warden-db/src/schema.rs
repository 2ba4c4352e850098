//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode. UUIDs are stored as
//! strings. Case-insensitive uniqueness is enforced through lower-cased
//! `*_key` columns carrying UNIQUE indexes. Foreign-key cascades are
//! expressed as DELETE events.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "identity_and_tokens",
        sql: SCHEMA_V1,
    },
    Migration {
        version: 2,
        name: "audit_and_rate_limits",
        sql: SCHEMA_V2,
    },
];

// -----------------------------------------------------------------------
// Schema v1: tenants, organizations, users, refresh tokens
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Tenants (root of isolation)
-- =======================================================================
DEFINE TABLE tenant SCHEMAFULL;
DEFINE FIELD name ON TABLE tenant TYPE string;
DEFINE FIELD slug ON TABLE tenant TYPE string;
DEFINE FIELD slug_key ON TABLE tenant TYPE string;
DEFINE FIELD created_at ON TABLE tenant TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE tenant TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_tenant_slug_key ON TABLE tenant \
    COLUMNS slug_key UNIQUE;

-- =======================================================================
-- Organizations (tenant scope)
-- =======================================================================
DEFINE TABLE organization SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE organization TYPE string;
DEFINE FIELD name ON TABLE organization TYPE string;
DEFINE FIELD created_at ON TABLE organization TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE organization TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_organization_tenant_name ON TABLE organization \
    COLUMNS tenant_id, name UNIQUE;

-- =======================================================================
-- Users (tenant scope, optional organization)
-- =======================================================================
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE user TYPE string;
DEFINE FIELD organization_id ON TABLE user TYPE option<string>;
DEFINE FIELD email ON TABLE user TYPE string;
DEFINE FIELD email_key ON TABLE user TYPE string;
DEFINE FIELD password_hash ON TABLE user TYPE string;
DEFINE FIELD role ON TABLE user TYPE string;
DEFINE FIELD email_confirmed_at ON TABLE user TYPE option<datetime>;
DEFINE FIELD confirmation_token ON TABLE user TYPE option<string>;
DEFINE FIELD recovery_token ON TABLE user TYPE option<string>;
DEFINE FIELD last_sign_in_at ON TABLE user TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_user_tenant_email_key ON TABLE user \
    COLUMNS tenant_id, email_key UNIQUE;
DEFINE INDEX idx_user_tenant_org ON TABLE user \
    COLUMNS tenant_id, organization_id;

-- =======================================================================
-- Refresh tokens (tenant scope, chained per session through parent)
-- =======================================================================
DEFINE TABLE refresh_token SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE refresh_token TYPE string;
DEFINE FIELD session_id ON TABLE refresh_token TYPE string;
DEFINE FIELD user_id ON TABLE refresh_token TYPE string;
DEFINE FIELD token ON TABLE refresh_token TYPE string;
DEFINE FIELD revoked ON TABLE refresh_token TYPE bool DEFAULT false;
DEFINE FIELD has_child ON TABLE refresh_token TYPE bool DEFAULT false;
DEFINE FIELD parent ON TABLE refresh_token TYPE option<string>;
DEFINE FIELD revoked_reason ON TABLE refresh_token TYPE option<string> \
    ASSERT $value = NONE OR $value IN ['Rotated', 'ReuseDetected', \
    'SignedOut'];
DEFINE FIELD created_at ON TABLE refresh_token TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE refresh_token TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_refresh_token_token ON TABLE refresh_token \
    COLUMNS token UNIQUE;
DEFINE INDEX idx_refresh_token_parent ON TABLE refresh_token \
    COLUMNS parent;
DEFINE INDEX idx_refresh_token_session ON TABLE refresh_token \
    COLUMNS tenant_id, session_id;
DEFINE INDEX idx_refresh_token_user ON TABLE refresh_token \
    COLUMNS user_id;

-- =======================================================================
-- Cascades
-- =======================================================================
DEFINE EVENT tenant_cascade ON TABLE tenant \
    WHEN $event = 'DELETE' THEN {
        DELETE organization WHERE tenant_id = meta::id($before.id);
        DELETE user WHERE tenant_id = meta::id($before.id);
    };
DEFINE EVENT organization_cascade ON TABLE organization \
    WHEN $event = 'DELETE' THEN {
        DELETE user WHERE organization_id = meta::id($before.id);
    };
DEFINE EVENT user_cascade ON TABLE user \
    WHEN $event = 'DELETE' THEN {
        DELETE refresh_token WHERE user_id = meta::id($before.id);
    };
";

// -----------------------------------------------------------------------
// Schema v2: audit log and rate limit buckets
// -----------------------------------------------------------------------

const SCHEMA_V2: &str = "\
-- =======================================================================
-- Audit log (append-only, tenant recorded in payload)
-- =======================================================================
DEFINE TABLE audit_log_entry SCHEMAFULL
    PERMISSIONS
        FOR create FULL
        FOR select FULL
        FOR update NONE
        FOR delete NONE;
DEFINE FIELD payload ON TABLE audit_log_entry TYPE object FLEXIBLE;
DEFINE FIELD created_at ON TABLE audit_log_entry TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_audit_created_at ON TABLE audit_log_entry \
    COLUMNS created_at;

-- =======================================================================
-- Rate limit buckets (one record per tenant, action and window)
-- =======================================================================
DEFINE TABLE rate_limit_bucket SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE rate_limit_bucket TYPE string;
DEFINE FIELD action ON TABLE rate_limit_bucket TYPE string;
DEFINE FIELD window_start ON TABLE rate_limit_bucket TYPE datetime;
DEFINE FIELD hits ON TABLE rate_limit_bucket TYPE int DEFAULT 0;
DEFINE INDEX idx_rate_limit_window ON TABLE rate_limit_bucket \
    COLUMNS window_start;

DEFINE EVENT tenant_rate_limit_cascade ON TABLE tenant \
    WHEN $event = 'DELETE' THEN {
        DELETE rate_limit_bucket WHERE tenant_id = meta::id($before.id);
    };
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT version FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }
        info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        db.query(migration.sql).await?.check().map_err(|e| {
            DbError::Migration(format!(
                "Migration v{} '{}' failed: {}",
                migration.version, migration.name, e,
            ))
        })?;

        db.query("CREATE _migration SET version = $version, name = $name")
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;
    }

    Ok(())
}

/// Latest schema version known to this build.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_ordered() {
        for window in MIGRATIONS.windows(2) {
            assert!(
                window[0].version < window[1].version,
                "Migrations must be in ascending version order"
            );
        }
    }

    #[test]
    fn every_table_is_schemafull() {
        for migration in MIGRATIONS {
            for line in migration.sql.lines().filter(|l| l.starts_with("DEFINE TABLE")) {
                assert!(line.contains("SCHEMAFULL"), "not schemafull: {line}");
            }
        }
    }

    #[test]
    fn latest_version_matches_last_migration() {
        assert_eq!(latest_version(), 2);
    }
}
