//! # warden_core
//!
//! Credential verification, cookie-backed login sessions and storage of
//! OAuth2/OIDC grant artifacts (authorization codes, access and refresh
//! tokens, PKCE verifiers, OIDC sessions).
//!
//! Every component takes its store handle at construction; nothing here is a
//! process-wide singleton. Use [`Warden::from_backend`] to wire all of them
//! over one backend.

pub mod auth;
pub mod cancel;
pub mod config;
pub mod grant;
pub mod migrate;
pub mod models;
pub mod store;
pub mod sweep;

use std::sync::Arc;

use crate::auth::credentials::{CredentialStore, CredentialVerifier};
use crate::auth::sessions::LoginSessionManager;
use crate::config::WardenConfig;
use crate::grant::hasher::SignatureHasher;
use crate::grant::revocation::RevocationCoordinator;
use crate::grant::store::TokenStore;
use crate::store::{CredentialBackend, GrantBackend, SessionBackend};
use crate::sweep::Sweeper;

/// All components wired over a single backend.
pub struct Warden {
    pub tokens: Arc<TokenStore>,
    pub revocation: RevocationCoordinator,
    pub verifier: CredentialVerifier,
    pub credentials: CredentialStore,
    pub sessions: Arc<LoginSessionManager>,
}

impl Warden {
    /// Build every component from one backend that implements all store seams.
    pub fn from_backend<B>(backend: Arc<B>, config: &WardenConfig) -> Self
    where
        B: GrantBackend + SessionBackend + CredentialBackend + 'static,
    {
        let grants: Arc<dyn GrantBackend> = backend.clone();
        let sessions: Arc<dyn SessionBackend> = backend.clone();
        let credentials: Arc<dyn CredentialBackend> = backend;

        Self {
            tokens: Arc::new(TokenStore::new(
                grants.clone(),
                SignatureHasher::new(config.hash_signatures),
            )),
            revocation: RevocationCoordinator::new(grants),
            verifier: CredentialVerifier::new(credentials.clone(), config.bcrypt_cost),
            credentials: CredentialStore::new(credentials, config.bcrypt_cost),
            sessions: Arc::new(LoginSessionManager::new(sessions)),
        }
    }

    /// A sweeper over this instance's sessions and tokens.
    pub fn sweeper(&self, config: &WardenConfig) -> Sweeper {
        Sweeper::new(self.sessions.clone(), self.tokens.clone(), config)
    }
}

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
