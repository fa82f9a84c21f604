//! Database-specific error types and conversions.

use canopy_core::error::CanopyError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),

    /// A unique index rejected the write.
    #[error("Unique constraint violated on {entity}: {detail}")]
    Conflict { entity: String, detail: String },

    #[error("Stored value could not be decoded: {0}")]
    Decode(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },
}

impl DbError {
    /// Classify a failed statement, separating unique-index violations
    /// from other query errors.
    pub(crate) fn from_statement(entity: &str, err: impl ToString) -> Self {
        let detail = err.to_string();
        let lower = detail.to_lowercase();
        if lower.contains("already contains")
            || lower.contains("unique")
            || lower.contains("duplicate")
        {
            DbError::Conflict {
                entity: entity.to_string(),
                detail,
            }
        } else {
            DbError::Query(detail)
        }
    }
}

impl From<DbError> for CanopyError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => CanopyError::NotFound { entity, id },
            DbError::Conflict { entity, .. } => CanopyError::AlreadyExists { entity },
            other => CanopyError::Database(other.to_string()),
        }
    }
}
