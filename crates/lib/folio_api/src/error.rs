//! Application error types.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use folio_core::auth::AuthError;
use folio_core::linking::LinkError;
use folio_core::watchlist::WatchlistError;
use thiserror::Error;
use tracing::error;

use crate::envelope::error_body;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Missing client parameters: {0:?}")]
    MissingParams(Vec<&'static str>),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Access token expired")]
    TokenExpired,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Upstream provider error: {0}")]
    Provider(String),

    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, "validation_error", m),
            AppError::MissingParams(params) => {
                return error_body(
                    StatusCode::BAD_REQUEST,
                    "missing_params",
                    "Missing required parameters in request body",
                    Some(params),
                );
            }
            AppError::Conflict(m) => (StatusCode::CONFLICT, "conflict", m),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, "unauthorized", m),
            AppError::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                "token_expired",
                "Access token expired".to_string(),
            ),
            AppError::Forbidden(m) => (StatusCode::FORBIDDEN, "forbidden", m),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m),
            AppError::Unavailable(m) => {
                error!(reason = %m, "store unavailable");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "store_unavailable",
                    "Service temporarily unavailable, please retry".to_string(),
                )
            }
            AppError::Provider(m) => {
                error!(reason = %m, "provider call failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "provider_error",
                    "Financial data provider request failed".to_string(),
                )
            }
            AppError::Internal(m) => {
                error!(reason = %m, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                )
            }
        };
        error_body(status, code, message, None)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => AppError::Unavailable(e.to_string()),
            _ => AppError::Internal(e.to_string()),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::ValidationError(msg) => AppError::Validation(msg),
            AuthError::Conflict(msg) => AppError::Conflict(msg),
            AuthError::CredentialError(msg) => AppError::Unauthorized(msg),
            AuthError::TokenExpired => AppError::TokenExpired,
            AuthError::TokenError(msg) => AppError::Unauthorized(msg),
            AuthError::Forbidden(msg) => AppError::Forbidden(msg),
            AuthError::NotFound(msg) => AppError::NotFound(msg),
            AuthError::Unavailable(msg) => AppError::Unavailable(msg),
            AuthError::DbError(e) => AppError::from(e),
            AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<WatchlistError> for AppError {
    fn from(e: WatchlistError) -> Self {
        match e {
            WatchlistError::ValidationError(msg) => AppError::Validation(msg),
            WatchlistError::NotFound(msg) => AppError::NotFound(msg),
            WatchlistError::Unavailable(msg) => AppError::Unavailable(msg),
            WatchlistError::DbError(e) => AppError::from(e),
        }
    }
}

impl From<LinkError> for AppError {
    fn from(e: LinkError) -> Self {
        match e {
            LinkError::ValidationError(msg) => AppError::Validation(msg),
            LinkError::NotFound(msg) => AppError::NotFound(msg),
            LinkError::Unavailable(msg) => AppError::Unavailable(msg),
            LinkError::DbError(e) => AppError::from(e),
            LinkError::Provider(e) => AppError::Provider(e.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}
