//! Error types for the dashboard API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::error;
use yardim_registry::{
    messages, AccessError, AdmissionError, ReportError, StoreError, ValidationErrors,
};

/// API error types.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Authentication required: {0}")]
    Unauthenticated(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Account is inactive")]
    InactiveAccount,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            ApiError::Unauthenticated(_) => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            ApiError::InactiveAccount => (StatusCode::FORBIDDEN, "INACTIVE_ACCOUNT"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::RateLimitExceeded => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMIT_EXCEEDED"),
            ApiError::StoreUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "STORE_UNAVAILABLE"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        // Store and internal details stay in the logs.
        let (message, fields) = match self {
            ApiError::Validation(errors) => {
                (messages::FORM_INVALID.to_string(), Some(errors.fields().clone()))
            }
            ApiError::StoreUnavailable(detail) => {
                error!("Store unavailable: {}", detail);
                (messages::STORE_FAILURE.to_string(), None)
            }
            ApiError::Internal(detail) => {
                error!("Internal error: {}", detail);
                ("Internal error".to_string(), None)
            }
            other => (other.to_string(), None),
        };

        let body = ErrorResponse {
            success: false,
            error: message,
            error_code: code.to_string(),
            fields,
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(e: ValidationErrors) -> Self {
        ApiError::Validation(e)
    }
}

impl From<AccessError> for ApiError {
    fn from(e: AccessError) -> Self {
        match e {
            AccessError::Forbidden(reason) => ApiError::Forbidden(reason),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(detail) => ApiError::StoreUnavailable(detail),
            StoreError::NotFound(what) => ApiError::NotFound(what),
            StoreError::Conflict(what) => ApiError::Conflict(what),
            StoreError::InvalidReference(column) => {
                ApiError::Validation(ValidationErrors::unresolved_reference(&column))
            }
            StoreError::InvalidData(detail) => ApiError::Internal(detail),
        }
    }
}

impl From<AdmissionError> for ApiError {
    fn from(e: AdmissionError) -> Self {
        match e {
            AdmissionError::Validation(errors) => ApiError::Validation(errors),
            AdmissionError::Access(access) => access.into(),
            AdmissionError::StoreUnavailable(store) => ApiError::StoreUnavailable(store.to_string()),
            AdmissionError::Internal(store) => ApiError::Internal(store.to_string()),
        }
    }
}

impl From<ReportError> for ApiError {
    fn from(e: ReportError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unretryable_admission_failure_is_internal() {
        let err = ApiError::from(AdmissionError::Internal(StoreError::InvalidData(
            "registration violates a column rule".into(),
        )));
        assert!(matches!(err, ApiError::Internal(_)));
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        let err = ApiError::from(AdmissionError::StoreUnavailable(StoreError::Unavailable(
            "database is locked".into(),
        )));
        assert_eq!(
            err.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (
                ApiError::Validation(ValidationErrors::single("address", "kısa")),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (ApiError::Unauthenticated("x".into()), StatusCode::UNAUTHORIZED),
            (ApiError::InactiveAccount, StatusCode::FORBIDDEN),
            (ApiError::RateLimitExceeded, StatusCode::TOO_MANY_REQUESTS),
            (
                ApiError::StoreUnavailable("disk".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn test_store_error_mapping() {
        assert!(matches!(
            ApiError::from(StoreError::Unavailable("locked".into())),
            ApiError::StoreUnavailable(_)
        ));
        assert!(matches!(
            ApiError::from(StoreError::InvalidReference("neighborhood_id".into())),
            ApiError::Validation(ref e) if e.contains("neighborhood_id")
        ));
        assert!(matches!(
            ApiError::from(StoreError::InvalidReference("registered_by".into())),
            ApiError::Validation(ref e) if e.contains("registered_by") && !e.contains("neighborhood_id")
        ));
        assert!(matches!(
            ApiError::from(StoreError::Conflict("email".into())),
            ApiError::Conflict(_)
        ));
    }
}
