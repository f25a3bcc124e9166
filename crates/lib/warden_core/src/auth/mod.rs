//! Authentication: credential checks and cookie-backed login sessions.
//!
//! Also home of [`AuthError`], the error taxonomy shared by every component
//! in this crate, grant storage included.

pub mod credentials;
pub mod password;
pub mod sessions;

use thiserror::Error;

use crate::grant::record::TokenRecord;

/// Errors surfaced by credential, session and grant-artifact operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Not found")]
    NotFound,

    #[error("Token is inactive")]
    InactiveToken,

    /// A redeemed authorization code was presented again. The record is
    /// returned so the caller can revoke everything issued under its
    /// request id.
    #[error("Authorization code has already been used")]
    InvalidatedCode(Box<TokenRecord>),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Login session expired or not found")]
    SessionNotFound,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Server(#[source] sqlx::Error),

    /// Server-side fault outside storage, such as a bad bcrypt cost.
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Operation canceled")]
    Canceled,
}

impl AuthError {
    /// The record carried by [`AuthError::InvalidatedCode`], if any.
    pub fn invalidated_record(&self) -> Option<&TokenRecord> {
        match self {
            AuthError::InvalidatedCode(record) => Some(record),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => AuthError::NotFound,
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AuthError::Conflict(db.message().to_string())
            }
            // Dangling owner reference, e.g. a session for a deleted credential.
            sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => AuthError::NotFound,
            _ => AuthError::Server(e),
        }
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(e: serde_json::Error) -> Self {
        AuthError::Serialization(e.to_string())
    }
}
