//! Authentication and session lifecycle.
//!
//! Provides password hashing, access token minting/verification, refresh
//! token records, the credential and token stores, and the session manager
//! that ties them together.

pub mod jwt;
pub mod memory;
pub mod password;
pub mod queries;
pub mod session;
pub mod store;
pub mod tokens;
pub mod validation;

#[cfg(test)]
mod tests;

use thiserror::Error;

use crate::store::{StoreFailure, is_transient_db_error};

pub use jwt::{TokenCodec, VerifyError};
pub use session::SessionManager;
pub use store::{CredentialStore, TokenRecordStore};

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid credentials: {0}")]
    CredentialError(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Token error: {0}")]
    TokenError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StoreFailure for AuthError {
    fn timed_out(op: &'static str) -> Self {
        AuthError::Unavailable(format!("{op} timed out"))
    }

    fn is_retryable(&self) -> bool {
        match self {
            AuthError::Unavailable(_) => true,
            AuthError::DbError(e) => is_transient_db_error(e),
            _ => false,
        }
    }
}
