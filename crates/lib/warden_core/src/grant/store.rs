//! Create, fetch, invalidate and delete grant artifacts.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::hasher::SignatureHasher;
use super::{GrantRequest, SessionPayload, TokenKind, TokenRecord};
use crate::auth::AuthError;
use crate::cancel::cancellable;
use crate::store::GrantBackend;

/// Kind-parameterized storage for grant artifacts.
///
/// Every signature passes through the [`SignatureHasher`] before it reaches
/// the backend, so callers always deal in raw signatures.
pub struct TokenStore {
    backend: Arc<dyn GrantBackend>,
    hasher: SignatureHasher,
}

impl TokenStore {
    pub fn new(backend: Arc<dyn GrantBackend>, hasher: SignatureHasher) -> Self {
        Self { backend, hasher }
    }

    pub fn hasher(&self) -> SignatureHasher {
        self.hasher
    }

    /// Persist a new artifact derived from `request`.
    ///
    /// Not idempotent: a signature that already exists in `kind` fails with
    /// [`AuthError::Conflict`] and the stored row is left untouched.
    pub async fn create<S: SessionPayload>(
        &self,
        cancel: &CancellationToken,
        kind: TokenKind,
        signature: &str,
        request: &GrantRequest<S>,
    ) -> Result<(), AuthError> {
        let key = self.hasher.transform(signature, kind);
        let record = TokenRecord::from_request(key, request)?;
        cancellable(cancel, self.backend.insert_token(kind, &record)).await?;
        debug!(%kind, request_id = %record.request_id, "grant artifact created");
        Ok(())
    }

    /// Fetch an artifact by its raw signature.
    ///
    /// Inactive authorization codes fail with [`AuthError::InvalidatedCode`]
    /// carrying the record; inactive artifacts of other kinds fail with
    /// [`AuthError::InactiveToken`].
    pub async fn find(
        &self,
        cancel: &CancellationToken,
        kind: TokenKind,
        signature: &str,
    ) -> Result<TokenRecord, AuthError> {
        let key = self.hasher.transform(signature, kind);
        let record = cancellable(cancel, self.backend.get_token(kind, &key))
            .await?
            .ok_or(AuthError::NotFound)?;

        if record.active {
            return Ok(record);
        }
        if kind.detects_replay() {
            warn!(
                request_id = %record.request_id,
                client_id = %record.client_id,
                "invalidated authorization code presented again"
            );
            return Err(AuthError::InvalidatedCode(Box::new(record)));
        }
        Err(AuthError::InactiveToken)
    }

    /// Mark an authorization code as redeemed, keeping the row for replay
    /// detection.
    ///
    /// Returns `true` if this call made the transition and `false` if the
    /// code was already inactive or does not exist. Safe to retry.
    pub async fn invalidate_authorization_code(
        &self,
        cancel: &CancellationToken,
        signature: &str,
    ) -> Result<bool, AuthError> {
        let key = self
            .hasher
            .transform(signature, TokenKind::AuthorizationCode);
        let affected = cancellable(cancel, self.backend.deactivate_code(&key)).await?;
        if affected == 0 {
            debug!("authorization code already inactive or absent");
        }
        Ok(affected > 0)
    }

    /// Hard-delete an artifact. Deleting an absent signature is not an error.
    pub async fn delete(
        &self,
        cancel: &CancellationToken,
        kind: TokenKind,
        signature: &str,
    ) -> Result<(), AuthError> {
        let key = self.hasher.transform(signature, kind);
        cancellable(cancel, self.backend.delete_token(kind, &key)).await?;
        Ok(())
    }

    /// Remove inactive authorization codes requested before `older_than`.
    pub async fn sweep_inactive_codes(
        &self,
        cancel: &CancellationToken,
        older_than: DateTime<Utc>,
    ) -> Result<u64, AuthError> {
        cancellable(cancel, self.backend.delete_inactive_codes(older_than)).await
    }
}
