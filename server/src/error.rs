//! Error type bridging engine errors and HTTP responses.

use axum::{
    Json,
    extract::{FromRequest, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use seat_engine_core::SeatError;
use serde::Serialize;
use std::fmt;

/// Application error type for handlers.
///
/// Serialized as `{"code": ..., "message": ...}` with the status code the
/// engine error maps to. Server-side failures are logged with their source
/// and answered with a generic message.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    code: String,
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub const fn new(status: StatusCode, message: String, code: String) -> Self {
        Self {
            status,
            message,
            code,
            source: None,
        }
    }

    /// Attach the underlying error for logging.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// 400 Bad Request.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message.into(), "BAD_REQUEST".to_string())
    }

    /// 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message.into(),
            "INTERNAL_SERVER_ERROR".to_string(),
        )
    }

    /// HTTP status
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable code
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            match &self.source {
                Some(source) => tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    error = %source,
                    "Request failed"
                ),
                None => tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    "Request failed"
                ),
            }
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<SeatError> for AppError {
    fn from(err: SeatError) -> Self {
        let status = match &err {
            SeatError::MissingLocation { .. }
            | SeatError::MissingPurpose
            | SeatError::Validation(_)
            | SeatError::InvalidSignature
            | SeatError::MissingPgSignature => StatusCode::BAD_REQUEST,
            SeatError::NotFound { .. } => StatusCode::NOT_FOUND,
            SeatError::NoSeatsDesignation
            | SeatError::NoSeatsLevelAggregate
            | SeatError::SoldOut
            | SeatError::RefundRequired { .. }
            | SeatError::Conflict(_)
            | SeatError::InvalidTransition { .. } => StatusCode::CONFLICT,
            SeatError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            SeatError::Provider(_) => StatusCode::BAD_GATEWAY,
        };
        let code = err.code().to_string();
        if status.is_server_error() {
            let message = match status {
                StatusCode::BAD_GATEWAY => "Payment provider unavailable",
                _ => "An internal error occurred",
            };
            Self::new(status, message.to_string(), code).with_source(err.into())
        } else {
            Self::new(status, err.to_string(), code)
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            rejection.body_text(),
            "VALIDATION_ERROR".to_string(),
        )
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal("An internal error occurred").with_source(err)
    }
}

/// `Json` extractor whose rejections render as [`AppError`]
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AppError::bad_request("Invalid input");
        assert_eq!(err.to_string(), "[BAD_REQUEST] Invalid input");
    }

    #[test]
    fn test_capacity_conflicts_are_409() {
        for err in [
            SeatError::NoSeatsDesignation,
            SeatError::NoSeatsLevelAggregate,
            SeatError::SoldOut,
        ] {
            let code = err.code();
            let app = AppError::from(err);
            assert_eq!(app.status(), StatusCode::CONFLICT);
            assert_eq!(app.code(), code);
        }
    }

    #[test]
    fn test_refund_required_keeps_its_code() {
        let app = AppError::from(SeatError::RefundRequired {
            intent_id: "abc".to_string(),
        });
        assert_eq!(app.status(), StatusCode::CONFLICT);
        assert_eq!(app.code(), "REFUND_REQUIRED");
    }

    #[test]
    fn test_storage_message_is_not_leaked() {
        let app = AppError::from(SeatError::Storage("password=hunter2".to_string()));
        assert_eq!(app.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!app.to_string().contains("hunter2"));
    }

    #[test]
    fn test_signature_errors_are_400() {
        assert_eq!(
            AppError::from(SeatError::MissingPgSignature).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::from(SeatError::InvalidSignature).code(), "INVALID_SIGNATURE");
    }
}
