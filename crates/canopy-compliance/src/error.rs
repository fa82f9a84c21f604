//! Compliance error types.

use canopy_core::error::CanopyError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ComplianceError {
    /// Another writer kept winning the race for the next sequence number.
    #[error("compliance chain for dispensary {dispensary_id} still conflicted after {attempts} attempts")]
    ChainConflict { dispensary_id: Uuid, attempts: u32 },

    #[error("failed to hash compliance entry: {0}")]
    Hashing(String),

    #[error("host '{0}' does not name a tenant")]
    UnidentifiedHost(String),

    #[error("invalid time range: start must be before end")]
    InvalidRange,
}

impl From<ComplianceError> for CanopyError {
    fn from(err: ComplianceError) -> Self {
        match err {
            ComplianceError::ChainConflict { .. } | ComplianceError::Hashing(_) => {
                CanopyError::AuditWriteFailure(err.to_string())
            }
            ComplianceError::UnidentifiedHost(_) => CanopyError::TenantNotIdentified,
            ComplianceError::InvalidRange => CanopyError::Validation {
                message: err.to_string(),
            },
        }
    }
}
