//! Error types for the Canopy compliance core.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CanopyError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity}")]
    AlreadyExists { entity: String },

    /// The request host did not carry a usable subdomain.
    #[error("Tenant could not be identified from the request host")]
    TenantNotIdentified,

    /// The subdomain is well-formed but no tenant owns it.
    #[error("Tenant not found for subdomain '{subdomain}'")]
    TenantNotFound { subdomain: String },

    #[error(
        "Purchase limit exceeded: {daily_total}g already purchased today, \
         {requested}g requested, limit is {limit}g"
    )]
    PurchaseLimitExceeded {
        daily_total: f64,
        requested: f64,
        limit: f64,
    },

    /// A mandatory compliance event could not be persisted.
    #[error("Audit write failed: {0}")]
    AuditWriteFailure(String),

    #[error("Report generation failed: {0}")]
    ReportGenerationFailure(String),

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CanopyError {
    /// Whether the failed operation can be retried unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CanopyError::ReportGenerationFailure(_) | CanopyError::Database(_)
        )
    }
}

pub type CanopyResult<T> = Result<T, CanopyError>;
