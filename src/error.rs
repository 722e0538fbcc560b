//! Error types for Librum server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application error codes exposed in API error bodies. One code per
/// `AppError` category; the accompanying message carries the specifics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Success = 0,
    Failure = 1,
    NotAuthorized = 2,
    DbFailure = 3,
    NotFound = 4,
    BadValue = 5,
    Conflict = 6,
    StoreUnavailable = 7,
    InventoryInconsistent = 8,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// The request would violate a lending invariant (no copies available,
    /// already borrowed, total-copies reduction below borrowed count, delete
    /// while borrowed). Callers may retry after state changes.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The store is unavailable or timed out. Safe to retry with backoff;
    /// never assumed to have partially committed.
    #[error("Storage temporarily unavailable: {0}")]
    Transient(#[source] sqlx::Error),

    /// Stored data contradicts the model's guarantees (e.g. a borrowed
    /// counter about to go negative). Logged loudly and clamped; must never
    /// crash the coordinator.
    #[error("Inventory inconsistency: {0}")]
    InvariantViolation(String),

    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                AppError::Transient(e)
            }
            other => AppError::Database(other),
        }
    }
}

/// True when the database rejected a write because of a unique constraint.
/// The active-loan partial unique index surfaces the borrow race this way;
/// callers translate it into the same `Conflict` as the pre-check.
pub fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, ErrorCode) {
        match self {
            AppError::Authentication(_) => (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthorized),
            AppError::Authorization(_) => (StatusCode::FORBIDDEN, ErrorCode::NotAuthorized),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, ErrorCode::NotFound),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, ErrorCode::BadValue),
            AppError::Conflict(_) => (StatusCode::CONFLICT, ErrorCode::Conflict),
            AppError::Transient(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, ErrorCode::StoreUnavailable)
            }
            AppError::InvariantViolation(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::InventoryInconsistent,
            ),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::DbFailure),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Failure),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "Database error".to_string()
            }
            AppError::Transient(e) => {
                tracing::warn!("Storage unavailable: {:?}", e);
                "Storage temporarily unavailable, retry later".to_string()
            }
            AppError::InvariantViolation(msg) => {
                tracing::error!("Inventory inconsistency: {}", msg);
                msg.clone()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeout_is_transient() {
        let err = AppError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, AppError::Transient(_)));
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err = AppError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn status_codes_follow_taxonomy() {
        let cases = [
            (
                AppError::NotFound("x".into()),
                StatusCode::NOT_FOUND,
                ErrorCode::NotFound,
            ),
            (
                AppError::Conflict("x".into()),
                StatusCode::CONFLICT,
                ErrorCode::Conflict,
            ),
            (
                AppError::Validation("x".into()),
                StatusCode::BAD_REQUEST,
                ErrorCode::BadValue,
            ),
            (
                AppError::Transient(sqlx::Error::PoolTimedOut),
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorCode::StoreUnavailable,
            ),
            (
                AppError::InvariantViolation("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::InventoryInconsistent,
            ),
            (
                AppError::Authentication("x".into()),
                StatusCode::UNAUTHORIZED,
                ErrorCode::NotAuthorized,
            ),
            (
                AppError::Authorization("x".into()),
                StatusCode::FORBIDDEN,
                ErrorCode::NotAuthorized,
            ),
            (
                AppError::Database(sqlx::Error::PoolClosed),
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::DbFailure,
            ),
            (
                AppError::Internal("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::Failure,
            ),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.status_and_code(), (status, code));
        }
    }
}
