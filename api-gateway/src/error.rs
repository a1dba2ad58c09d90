//! Error handling for the API gateway
//!
//! Two renderings exist. Routes under `/api/profile` answer with the
//! structured [`ErrorResponse`]; the game-client routes under `/api/v1`
//! answer with the flat `{success: false, message}` body those clients parse.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::error::Error;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// API error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error information
    pub error: ErrorInfo,
    /// Request ID for tracing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Detailed error information
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorInfo {
    /// Error code (string identifier for the error type)
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional error details
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
}

/// Whether a failed operation only read state or tried to change it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

/// API errors
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("{1}")]
    Common(Access, #[source] Error),
}

impl ApiError {
    /// Wrap a failure from a read-only operation
    pub fn read(err: Error) -> Self {
        ApiError::Common(Access::Read, err)
    }

    /// Wrap a failure from a mutation
    pub fn write(err: Error) -> Self {
        ApiError::Common(Access::Write, err)
    }
}

/// HTTP status and error code for a service error.
///
/// A missing profile is 404 on reads. Mutations fold it into 400 like any
/// other rejected update.
pub fn classify(access: Access, err: &Error) -> (StatusCode, &'static str) {
    match err {
        // Client errors (4xx)
        Error::ValidationError(_) => (StatusCode::BAD_REQUEST, "validation_error"),
        Error::ProfileNotFound(_) if access == Access::Read => (StatusCode::NOT_FOUND, "profile_not_found"),
        Error::ProfileNotFound(_) => (StatusCode::BAD_REQUEST, "profile_not_found"),
        Error::MutationFailed(_) => (StatusCode::BAD_REQUEST, "mutation_failed"),
        Error::InsufficientBalance(_) => (StatusCode::BAD_REQUEST, "insufficient_balance"),

        // Server errors (5xx)
        Error::ConfigurationError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "configuration_error"),
        Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        Error::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
        Error::Migration(_) => (StatusCode::INTERNAL_SERVER_ERROR, "migration_error"),
        Error::Serialization(_) => (StatusCode::INTERNAL_SERVER_ERROR, "serialization_error"),
    }
}

fn log_error(request_id: &str, status: StatusCode, err: &dyn std::fmt::Debug) {
    if status.is_server_error() {
        tracing::error!("API Error [{}]: {:?}", request_id, err);
    } else {
        tracing::debug!("API client error [{}]: {:?}", request_id, err);
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Generate a request ID for tracking errors
        let request_id = Uuid::new_v4().to_string();

        let (status, code) = match &self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ApiError::Common(access, e) => classify(*access, e),
        };
        log_error(&request_id, status, &self);

        // Never leak driver messages to clients
        let message = if status.is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let error_response = ErrorResponse {
            error: ErrorInfo {
                code: code.to_string(),
                message,
                details: None,
            },
            request_id: Some(request_id),
        };

        (status, Json(error_response)).into_response()
    }
}

/// Failure body for the `/api/v1` routes
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FailureResponse {
    /// Always false
    pub success: bool,
    /// Human-readable reason
    pub message: String,
}

/// Errors of the `/api/v1` routes
#[derive(Debug, thiserror::Error)]
pub enum V1Error {
    #[error("{0}")]
    BadRequest(String),

    #[error("{1}")]
    Common(Access, #[source] Error),
}

impl V1Error {
    /// Wrap a failure from a read-only operation
    pub fn read(err: Error) -> Self {
        V1Error::Common(Access::Read, err)
    }

    /// Wrap a failure from a mutation
    pub fn write(err: Error) -> Self {
        V1Error::Common(Access::Write, err)
    }
}

impl IntoResponse for V1Error {
    fn into_response(self) -> Response {
        let request_id = Uuid::new_v4().to_string();

        let (status, message) = match &self {
            V1Error::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            V1Error::Common(access, e) => {
                let (status, _) = classify(*access, e);
                let message = match e {
                    Error::ValidationError(msg) => msg.clone(),
                    Error::ProfileNotFound(_) => "Profile not found".to_string(),
                    Error::InsufficientBalance(_) => "Insufficient Vbucks balance.".to_string(),
                    Error::MutationFailed(_) => "Failed to update Vbucks balance.".to_string(),
                    _ => "Internal server error".to_string(),
                };
                (status, message)
            }
        };
        log_error(&request_id, status, &self);

        (status, Json(FailureResponse { success: false, message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_depends_on_access() {
        let err = Error::ProfileNotFound("x".to_string());
        assert_eq!(classify(Access::Read, &err).0, StatusCode::NOT_FOUND);
        assert_eq!(classify(Access::Write, &err).0, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_store_errors_are_server_errors() {
        let err = Error::Database(sqlx::Error::PoolClosed);
        assert_eq!(classify(Access::Write, &err).0, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            ApiError::write(err).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_v1_mutation_failed_is_bad_request() {
        let response = V1Error::write(Error::MutationFailed("no change".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
