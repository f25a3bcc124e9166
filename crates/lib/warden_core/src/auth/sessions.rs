//! Cookie-backed login sessions.
//!
//! The cookie value is a random 256-bit token. Only its SHA-256 digest is
//! stored, so a leaked table cannot be replayed as cookies.

use std::sync::Arc;

use base64::Engine;
use chrono::Utc;
use rand::RngCore;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::AuthError;
use crate::cancel::cancellable;
use crate::models::auth::{CredentialId, LoginSession};
use crate::store::SessionBackend;

const TOKEN_BYTES: usize = 32;

/// Generate an opaque session token (43 chars, URL-safe).
pub fn generate_session_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Storage key for a session token.
pub fn hash_session_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

/// Creates, resolves and destroys login sessions.
pub struct LoginSessionManager {
    backend: Arc<dyn SessionBackend>,
}

impl LoginSessionManager {
    pub fn new(backend: Arc<dyn SessionBackend>) -> Self {
        Self { backend }
    }

    /// Open a session for `credential_id` and return the cookie token.
    ///
    /// The token is returned only here. Fails with [`AuthError::NotFound`]
    /// if the credential does not exist.
    pub async fn create_session(
        &self,
        cancel: &CancellationToken,
        credential_id: CredentialId,
        device: &str,
        ip: &str,
        ttl: chrono::Duration,
    ) -> Result<String, AuthError> {
        if ttl <= chrono::Duration::zero() {
            return Err(AuthError::Validation(
                "session ttl must be positive".into(),
            ));
        }
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| AuthError::Validation("session ttl too large".into()))?;
        let token = generate_session_token();
        let session = LoginSession {
            token_hash: hash_session_token(&token),
            credential_id,
            device: device.to_string(),
            ip: ip.to_string(),
            expires_at,
            created_at: now,
        };
        cancellable(cancel, self.backend.insert_session(&session)).await?;
        info!(credential_id, device, ip, "login session created");
        Ok(token)
    }

    /// Resolve a cookie token to its live session.
    ///
    /// Unknown and expired tokens are indistinguishable:
    /// both fail with [`AuthError::SessionNotFound`].
    pub async fn lookup_session(
        &self,
        cancel: &CancellationToken,
        token: &str,
    ) -> Result<LoginSession, AuthError> {
        let hash = hash_session_token(token);
        cancellable(cancel, self.backend.get_live_session(&hash, Utc::now()))
            .await?
            .ok_or(AuthError::SessionNotFound)
    }

    /// Log out. Destroying an unknown token is not an error.
    pub async fn destroy_session(
        &self,
        cancel: &CancellationToken,
        token: &str,
    ) -> Result<(), AuthError> {
        let hash = hash_session_token(token);
        let deleted = cancellable(cancel, self.backend.delete_session(&hash)).await?;
        debug!(deleted, "login session destroyed");
        Ok(())
    }

    /// Log a credential out everywhere. Returns the number of sessions removed.
    pub async fn destroy_all_for_credential(
        &self,
        cancel: &CancellationToken,
        credential_id: CredentialId,
    ) -> Result<u64, AuthError> {
        let deleted =
            cancellable(cancel, self.backend.delete_sessions_for(credential_id)).await?;
        info!(credential_id, deleted, "all login sessions destroyed");
        Ok(deleted)
    }

    /// Live sessions of a credential, newest first.
    pub async fn list_sessions(
        &self,
        cancel: &CancellationToken,
        credential_id: CredentialId,
    ) -> Result<Vec<LoginSession>, AuthError> {
        cancellable(
            cancel,
            self.backend.list_sessions(credential_id, Utc::now()),
        )
        .await
    }

    /// Delete sessions that expired before now.
    pub async fn sweep_expired(&self, cancel: &CancellationToken) -> Result<u64, AuthError> {
        cancellable(cancel, self.backend.delete_expired_sessions(Utc::now())).await
    }
}
