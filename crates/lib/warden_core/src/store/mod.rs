//! Persistence seams.
//!
//! Components receive one of these handles at construction. Each method is a
//! single unit of work: implementations must make multi-row methods atomic
//! (one transaction, or one lock scope) and must enforce per-kind signature
//! uniqueness themselves.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::auth::AuthError;
use crate::grant::{TokenKind, TokenRecord};
use crate::models::auth::{
    CredentialId, CredentialStatus, CredentialWithHash, LoginSession, ProfileUpdate,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Storage for grant artifacts, keyed by already-transformed signatures.
#[async_trait]
pub trait GrantBackend: Send + Sync {
    /// Insert a new record. A taken key fails with [`AuthError::Conflict`].
    async fn insert_token(&self, kind: TokenKind, record: &TokenRecord) -> Result<(), AuthError>;

    async fn get_token(&self, kind: TokenKind, key: &str)
    -> Result<Option<TokenRecord>, AuthError>;

    /// Flip an active authorization code to inactive. Returns affected rows:
    /// zero means the code was absent or already inactive.
    async fn deactivate_code(&self, key: &str) -> Result<u64, AuthError>;

    async fn delete_token(&self, kind: TokenKind, key: &str) -> Result<u64, AuthError>;

    /// Delete every `anchor` row with `request_id`, then every row of the
    /// `cascade` kinds with the same request id, atomically.
    ///
    /// Returns `None` (and deletes nothing) when no `anchor` row exists.
    async fn delete_anchored(
        &self,
        anchor: TokenKind,
        cascade: &[TokenKind],
        request_id: &str,
    ) -> Result<Option<u64>, AuthError>;

    /// Delete rows of all `kinds` sharing `request_id`, atomically.
    async fn delete_request(&self, kinds: &[TokenKind], request_id: &str)
    -> Result<u64, AuthError>;

    /// Delete inactive authorization codes requested before `before`.
    async fn delete_inactive_codes(&self, before: DateTime<Utc>) -> Result<u64, AuthError>;
}

/// Storage for login sessions, keyed by token digest.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Insert a session. Fails with [`AuthError::NotFound`] when the owning
    /// credential does not exist.
    async fn insert_session(&self, session: &LoginSession) -> Result<(), AuthError>;

    /// Fetch a session that has not expired at `now`.
    async fn get_live_session(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<LoginSession>, AuthError>;

    async fn delete_session(&self, token_hash: &str) -> Result<u64, AuthError>;

    async fn delete_sessions_for(&self, credential_id: CredentialId) -> Result<u64, AuthError>;

    /// Live sessions of a credential, newest first.
    async fn list_sessions(
        &self,
        credential_id: CredentialId,
        now: DateTime<Utc>,
    ) -> Result<Vec<LoginSession>, AuthError>;

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, AuthError>;
}

/// Storage for user credentials.
#[async_trait]
pub trait CredentialBackend: Send + Sync {
    /// Insert a credential. A taken username fails with [`AuthError::Conflict`].
    async fn insert_credential(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<CredentialWithHash, AuthError>;

    async fn credential_by_id(
        &self,
        id: CredentialId,
    ) -> Result<Option<CredentialWithHash>, AuthError>;

    async fn credential_by_username(
        &self,
        username: &str,
    ) -> Result<Option<CredentialWithHash>, AuthError>;

    async fn update_password(&self, id: CredentialId, password_hash: &str)
    -> Result<u64, AuthError>;

    async fn update_profile(&self, id: CredentialId, update: &ProfileUpdate)
    -> Result<u64, AuthError>;

    async fn update_status(
        &self,
        id: CredentialId,
        status: CredentialStatus,
    ) -> Result<u64, AuthError>;

    /// Delete a credential, its login sessions and every grant artifact whose
    /// subject is the credential id, atomically.
    async fn delete_credential(&self, id: CredentialId) -> Result<u64, AuthError>;
}
