//! Application Error Types
//!
//! Centralized error handling with Axum integration.
//!
//! Every error leaves the service as `{"Error": <message>, "SubCode": <code>}`.
//! Domain services describe their failures as `Code-Message` strings; the
//! presentation layer splits those on the first hyphen with [`split_sub_code`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Malformed request (400, `InvalidData`)
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Caller does not manage the project (403, `UserPermissionError`)
    #[error("Permission denied: {0}")]
    UserPermission(String),

    /// Business rule rejection raised by a domain service (403)
    #[error("{sub_code}-{message}")]
    Forbidden { sub_code: String, message: String },

    /// License terms not accepted (409, `UserLicenseError`)
    #[error("User not accepted license terms")]
    LicenseNotAccepted,

    /// Request rejected with a service subcode (400)
    #[error("{sub_code}-{message}")]
    BadRequest { sub_code: String, message: String },

    #[error("{sub_code}-{message}")]
    NotFound { sub_code: String, message: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

impl AppError {
    /// 403 built from a `Code-Message` domain error.
    pub fn forbidden(coded: impl std::fmt::Display) -> Self {
        let (sub_code, message) = split_sub_code(&coded.to_string());
        AppError::Forbidden { sub_code, message }
    }

    /// 400 built from a `Code-Message` domain error.
    pub fn bad_request(coded: impl std::fmt::Display) -> Self {
        let (sub_code, message) = split_sub_code(&coded.to_string());
        AppError::BadRequest { sub_code, message }
    }

    /// 404 built from a `Code-Message` domain error.
    pub fn not_found(coded: impl std::fmt::Display) -> Self {
        let (sub_code, message) = split_sub_code(&coded.to_string());
        AppError::NotFound { sub_code, message }
    }

    /// Status code and subcode this error is reported with.
    pub fn status_and_sub_code(&self) -> (StatusCode, &str) {
        match self {
            AppError::InvalidData(_) => (StatusCode::BAD_REQUEST, "InvalidData"),
            AppError::UserPermission(_) => (StatusCode::FORBIDDEN, "UserPermissionError"),
            AppError::Forbidden { sub_code, .. } => (StatusCode::FORBIDDEN, sub_code),
            AppError::LicenseNotAccepted => (StatusCode::CONFLICT, "UserLicenseError"),
            AppError::BadRequest { sub_code, .. } => (StatusCode::BAD_REQUEST, sub_code),
            AppError::NotFound { sub_code, .. } => (StatusCode::NOT_FOUND, sub_code),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "InvalidToken"),
            AppError::Internal(_) | AppError::Database(_) | AppError::Redis(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "InternalServerError")
            }
        }
    }
}

/// Split a `Code-Message` string on its first hyphen.
///
/// Strings without a hyphen are reported with the whole text as both the
/// subcode and the message.
pub fn split_sub_code(raw: &str) -> (String, String) {
    match raw.split_once('-') {
        Some((code, message)) => (code.trim().to_string(), message.trim().to_string()),
        None => (raw.trim().to_string(), raw.trim().to_string()),
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    #[serde(rename = "Error")]
    pub error: String,
    #[serde(rename = "SubCode")]
    pub sub_code: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, sub_code) = self.status_and_sub_code();
        let sub_code = sub_code.to_string();

        let message = match &self {
            AppError::InvalidData(msg)
            | AppError::UserPermission(msg)
            | AppError::Unauthorized(msg) => msg.clone(),
            AppError::Forbidden { message, .. }
            | AppError::BadRequest { message, .. }
            | AppError::NotFound { message, .. } => message.clone(),
            AppError::LicenseNotAccepted => self.to_string(),
            AppError::Internal(msg) => {
                tracing::error!("Unhandled error: {}", msg);
                "Internal server error".into()
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                "Internal server error".into()
            }
            AppError::Redis(e) => {
                tracing::error!("Redis error: {}", e);
                "Internal server error".into()
            }
        };

        let body = ErrorResponse {
            error: message,
            sub_code,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_split_on_first_hyphen_only() {
        let (code, message) = split_sub_code("NameExists-Partner name already exists");
        assert_eq!(code, "NameExists");
        assert_eq!(message, "Partner name already exists");

        let (code, message) = split_sub_code("TaskNotOwned-Task 12 is locked by a non-owner - retry");
        assert_eq!(code, "TaskNotOwned");
        assert_eq!(message, "Task 12 is locked by a non-owner - retry");
    }

    #[test]
    fn test_split_without_hyphen() {
        let (code, message) = split_sub_code("Unexpected");
        assert_eq!(code, "Unexpected");
        assert_eq!(message, "Unexpected");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::InvalidData("x".into()).status_and_sub_code(),
            (StatusCode::BAD_REQUEST, "InvalidData")
        );
        assert_eq!(
            AppError::LicenseNotAccepted.status_and_sub_code(),
            (StatusCode::CONFLICT, "UserLicenseError")
        );
        assert_eq!(
            AppError::forbidden("InvalidTaskState-Task in invalid state for mapping")
                .status_and_sub_code(),
            (StatusCode::FORBIDDEN, "InvalidTaskState")
        );
        assert_eq!(
            AppError::Internal("boom".into()).status_and_sub_code(),
            (StatusCode::INTERNAL_SERVER_ERROR, "InternalServerError")
        );
    }
}
