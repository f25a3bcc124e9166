//! Credential verification and account management.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::AuthError;
use super::password::{hash_password, verify_password};
use crate::cancel::cancellable;
use crate::models::auth::{
    Credential, CredentialId, CredentialStatus, CredentialWithHash, ProfileUpdate,
};
use crate::store::CredentialBackend;

/// Plaintext behind the decoy hash compared against when no credential exists.
const DECOY_PASSWORD: &str = "warden-decoy-password";

const USERNAME_MAX_LEN: usize = 20;
const PASSWORD_MIN_LEN: usize = 6;
const PASSWORD_MAX_LEN: usize = 32;
const BIO_MAX_LEN: usize = 255;

/// Checks secrets against stored credentials.
pub struct CredentialVerifier {
    backend: Arc<dyn CredentialBackend>,
    decoy_hash: Option<String>,
}

impl CredentialVerifier {
    /// The decoy hash is computed here, at the cost new passwords are hashed
    /// with, so no lookup ever pays for building it.
    pub fn new(backend: Arc<dyn CredentialBackend>, bcrypt_cost: u32) -> Self {
        let decoy_hash = match hash_password(DECOY_PASSWORD, bcrypt_cost) {
            Ok(hash) => Some(hash),
            Err(e) => {
                warn!(error = %e, "no decoy hash, missing-credential checks skip bcrypt");
                None
            }
        };
        Self {
            backend,
            decoy_hash,
        }
    }

    /// Verify `secret` for the credential with the given id.
    ///
    /// An id that is not a valid credential id is `NotFound`, the same as one
    /// that does not exist. Either way a full bcrypt comparison still runs,
    /// so the missing-id path costs as much as the wrong-secret path.
    pub async fn verify(
        &self,
        cancel: &CancellationToken,
        id: &str,
        secret: &str,
    ) -> Result<(), AuthError> {
        let row = match id.trim().parse::<CredentialId>() {
            Ok(id) => cancellable(cancel, self.backend.credential_by_id(id)).await?,
            Err(_) => None,
        };
        match row {
            Some(row) if verify_password(secret, &row.password_hash) => Ok(()),
            Some(_) => Err(AuthError::InvalidCredentials),
            None => {
                self.burn_decoy(secret);
                Err(AuthError::NotFound)
            }
        }
    }

    /// Login-form check by username. Unknown usernames and wrong passwords
    /// are both reported as [`AuthError::InvalidCredentials`].
    pub async fn authenticate(
        &self,
        cancel: &CancellationToken,
        username: &str,
        password: &str,
    ) -> Result<Credential, AuthError> {
        let row = cancellable(cancel, self.backend.credential_by_username(username)).await?;
        match row {
            Some(row) if verify_password(password, &row.password_hash) => Ok(row.credential),
            Some(_) => Err(AuthError::InvalidCredentials),
            None => {
                self.burn_decoy(password);
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    /// Spend one bcrypt comparison against a hash that can never match.
    fn burn_decoy(&self, secret: &str) {
        if let Some(hash) = &self.decoy_hash {
            let _ = verify_password(secret, hash);
        }
    }
}

/// Outcome of [`CredentialStore::register`].
#[derive(Debug, Clone)]
pub struct Registration {
    pub credential: Credential,
    /// Set for the first account ever created; the web layer grants it the
    /// bootstrap admin role.
    pub is_first: bool,
}

/// Account lifecycle: signup, profile edits, status and deletion.
pub struct CredentialStore {
    backend: Arc<dyn CredentialBackend>,
    bcrypt_cost: u32,
}

impl CredentialStore {
    pub fn new(backend: Arc<dyn CredentialBackend>, bcrypt_cost: u32) -> Self {
        Self {
            backend,
            bcrypt_cost,
        }
    }

    /// Create a new account.
    pub async fn register(
        &self,
        cancel: &CancellationToken,
        username: &str,
        password: &str,
    ) -> Result<Registration, AuthError> {
        validate_username(username)?;
        validate_password(password)?;
        let hash = hash_password(password, self.bcrypt_cost)?;

        let row = cancellable(cancel, self.backend.insert_credential(username, &hash)).await?;
        let is_first = row.credential.id == 1;
        info!(
            credential_id = row.credential.id,
            username, is_first, "credential registered"
        );
        Ok(Registration {
            credential: row.credential,
            is_first,
        })
    }

    pub async fn find(
        &self,
        cancel: &CancellationToken,
        id: CredentialId,
    ) -> Result<Credential, AuthError> {
        self.fetch(cancel, id).await.map(|row| row.credential)
    }

    pub async fn find_by_username(
        &self,
        cancel: &CancellationToken,
        username: &str,
    ) -> Result<Credential, AuthError> {
        cancellable(cancel, self.backend.credential_by_username(username))
            .await?
            .map(|row| row.credential)
            .ok_or(AuthError::NotFound)
    }

    pub async fn change_password(
        &self,
        cancel: &CancellationToken,
        id: CredentialId,
        new_password: &str,
    ) -> Result<(), AuthError> {
        validate_password(new_password)?;
        let hash = hash_password(new_password, self.bcrypt_cost)?;
        let affected = cancellable(cancel, self.backend.update_password(id, &hash)).await?;
        if affected == 0 {
            return Err(AuthError::NotFound);
        }
        info!(credential_id = id, "password changed");
        Ok(())
    }

    /// Apply a profile edit. A username already held by someone else fails
    /// with [`AuthError::Conflict`].
    pub async fn update_profile(
        &self,
        cancel: &CancellationToken,
        id: CredentialId,
        update: &ProfileUpdate,
    ) -> Result<Credential, AuthError> {
        if let Some(username) = &update.username {
            validate_username(username)?;
        }
        if let Some(bio) = &update.bio
            && bio.chars().count() > BIO_MAX_LEN
        {
            return Err(AuthError::Validation(format!(
                "bio must be at most {BIO_MAX_LEN} characters"
            )));
        }
        let affected = cancellable(cancel, self.backend.update_profile(id, update)).await?;
        if affected == 0 {
            return Err(AuthError::NotFound);
        }
        self.find(cancel, id).await
    }

    pub async fn set_status(
        &self,
        cancel: &CancellationToken,
        id: CredentialId,
        status: CredentialStatus,
    ) -> Result<(), AuthError> {
        let affected = cancellable(cancel, self.backend.update_status(id, status)).await?;
        if affected == 0 {
            return Err(AuthError::NotFound);
        }
        info!(credential_id = id, ?status, "credential status changed");
        Ok(())
    }

    /// Delete an account with its login sessions and grant artifacts.
    ///
    /// Returns whether a credential was removed; deleting an absent id is not
    /// an error.
    pub async fn delete(&self, cancel: &CancellationToken, id: CredentialId) -> Result<bool, AuthError> {
        let deleted = cancellable(cancel, self.backend.delete_credential(id)).await?;
        if deleted > 0 {
            info!(credential_id = id, "credential deleted");
        }
        Ok(deleted > 0)
    }

    async fn fetch(
        &self,
        cancel: &CancellationToken,
        id: CredentialId,
    ) -> Result<CredentialWithHash, AuthError> {
        cancellable(cancel, self.backend.credential_by_id(id))
            .await?
            .ok_or(AuthError::NotFound)
    }
}

/// 1-20 ASCII letters or digits.
pub fn validate_username(username: &str) -> Result<(), AuthError> {
    if username.is_empty()
        || username.len() > USERNAME_MAX_LEN
        || !username.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return Err(AuthError::Validation(format!(
            "username must be 1-{USERNAME_MAX_LEN} letters or digits"
        )));
    }
    Ok(())
}

/// 6-32 characters.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    let len = password.chars().count();
    if !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&len) {
        return Err(AuthError::Validation(format!(
            "password must be {PASSWORD_MIN_LEN}-{PASSWORD_MAX_LEN} characters"
        )));
    }
    Ok(())
}
