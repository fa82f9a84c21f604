//! HTTP mapping of domain errors.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use canopy_core::error::CanopyError;
use serde::Serialize;
use tracing::error;

/// A domain error on its way out of a handler.
#[derive(Debug)]
pub struct ApiError(pub CanopyError);

impl From<CanopyError> for ApiError {
    fn from(err: CanopyError) -> Self {
        Self(err)
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    #[serde(rename = "type")]
    error_type: &'static str,
    message: String,
    retryable: bool,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            CanopyError::TenantNotIdentified
            | CanopyError::TenantNotFound { .. }
            | CanopyError::NotFound { .. } => StatusCode::NOT_FOUND,
            CanopyError::PurchaseLimitExceeded { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            CanopyError::ReportGenerationFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
            CanopyError::Validation { .. } => StatusCode::BAD_REQUEST,
            CanopyError::AlreadyExists { .. } => StatusCode::CONFLICT,
            CanopyError::AuditWriteFailure(_)
            | CanopyError::Database(_)
            | CanopyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &'static str {
        match &self.0 {
            CanopyError::TenantNotIdentified => "tenant_not_identified",
            CanopyError::TenantNotFound { .. } => "tenant_not_found",
            CanopyError::NotFound { .. } => "not_found",
            CanopyError::AlreadyExists { .. } => "already_exists",
            CanopyError::PurchaseLimitExceeded { .. } => "purchase_limit_exceeded",
            CanopyError::AuditWriteFailure(_) => "audit_write_failure",
            CanopyError::ReportGenerationFailure(_) => "report_generation_failure",
            CanopyError::Validation { .. } => "validation",
            CanopyError::Database(_) | CanopyError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self.0, "Request failed");
        }

        // Storage details stay in the log.
        let message = match &self.0 {
            CanopyError::Database(_) | CanopyError::Internal(_) => {
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        let body = ErrorBody {
            error: ErrorDetail {
                error_type: self.error_type(),
                message,
                retryable: self.0.is_retryable(),
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_error_table() {
        let cases = [
            (CanopyError::TenantNotIdentified, StatusCode::NOT_FOUND),
            (
                CanopyError::TenantNotFound {
                    subdomain: "x".into(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                CanopyError::PurchaseLimitExceeded {
                    daily_total: 80.0,
                    requested: 10.0,
                    limit: 85.0,
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                CanopyError::AuditWriteFailure("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                CanopyError::ReportGenerationFailure("x".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                CanopyError::Validation {
                    message: "x".into(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (CanopyError::Database("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError(err).status(), expected);
        }
    }
}
