//! Cascading revocation across token kinds.
//!
//! Each operation is one backend call, and the backend runs it as a single
//! transaction: either every row goes or none does.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use super::TokenKind;
use crate::auth::AuthError;
use crate::cancel::cancellable;
use crate::store::GrantBackend;

/// Revokes artifacts by the request id of the grant that produced them.
pub struct RevocationCoordinator {
    backend: Arc<dyn GrantBackend>,
}

impl RevocationCoordinator {
    pub fn new(backend: Arc<dyn GrantBackend>) -> Self {
        Self { backend }
    }

    /// Revoke the refresh token issued under `request_id` together with the
    /// access token it produced.
    pub async fn revoke_refresh_token(
        &self,
        cancel: &CancellationToken,
        request_id: &str,
    ) -> Result<(), AuthError> {
        let deleted = cancellable(
            cancel,
            self.backend.delete_anchored(
                TokenKind::RefreshToken,
                &[TokenKind::AccessToken],
                request_id,
            ),
        )
        .await?
        .ok_or(AuthError::NotFound)?;
        info!(request_id, deleted, "refresh token revoked");
        Ok(())
    }

    /// Revoke the access token issued under `request_id`.
    pub async fn revoke_access_token(
        &self,
        cancel: &CancellationToken,
        request_id: &str,
    ) -> Result<(), AuthError> {
        let deleted = cancellable(
            cancel,
            self.backend
                .delete_anchored(TokenKind::AccessToken, &[], request_id),
        )
        .await?
        .ok_or(AuthError::NotFound)?;
        info!(request_id, deleted, "access token revoked");
        Ok(())
    }

    /// Delete every artifact of every kind issued under `request_id`.
    ///
    /// This is the response to [`AuthError::InvalidatedCode`]. Returns the
    /// number of rows removed; zero is not an error.
    pub async fn revoke_grant(
        &self,
        cancel: &CancellationToken,
        request_id: &str,
    ) -> Result<u64, AuthError> {
        let deleted = cancellable(
            cancel,
            self.backend.delete_request(&TokenKind::ALL, request_id),
        )
        .await?;
        info!(request_id, deleted, "grant revoked");
        Ok(deleted)
    }
}
