//! Database-specific error types and conversions.

use warden_core::error::WardenError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    /// A unique index rejected the write.
    #[error("Unique constraint violated on {entity}: {message}")]
    Conflict { entity: String, message: String },

    /// Transaction conflict, timeout or lost connection.
    #[error("Transient store failure: {0}")]
    Transient(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Invalid stored value: {0}")]
    Decode(String),
}

impl DbError {
    /// Classify a statement failure reported by SurrealDB.
    ///
    /// SurrealDB reports index violations and optimistic transaction
    /// conflicts only through the error text, so the match is textual.
    pub fn classify(entity: &str, err: surrealdb::Error) -> Self {
        let message = err.to_string();
        let lower = message.to_lowercase();
        if lower.contains("already contains") {
            DbError::Conflict {
                entity: entity.to_string(),
                message,
            }
        } else if lower.contains("can be retried")
            || lower.contains("conflict")
            || lower.contains("timed out")
            || lower.contains("timeout")
            || lower.contains("connection")
        {
            DbError::Transient(message)
        } else {
            DbError::Query(message)
        }
    }
}

impl From<DbError> for WardenError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => WardenError::NotFound { entity, id },
            DbError::Conflict { entity, .. } => WardenError::AlreadyExists { entity },
            DbError::Transient(msg) => WardenError::Unavailable(msg),
            other => WardenError::Database(other.to_string()),
        }
    }
}

/// Parse a UUID stored as a string column.
pub(crate) fn parse_uuid(field: &str, value: &str) -> Result<uuid::Uuid, DbError> {
    uuid::Uuid::parse_str(value).map_err(|e| DbError::Decode(format!("invalid {field} UUID: {e}")))
}
