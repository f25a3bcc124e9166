//! Credential and login-session models.
//!
//! Grant-artifact records live in [`crate::grant::record`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Numeric credential id (`credentials.id`).
pub type CredentialId = i64;

/// Account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "credential_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CredentialStatus {
    Active,
    Suspended,
}

/// Public view of a credential. The password hash is never part of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub id: CredentialId,
    pub username: String,
    pub status: CredentialStatus,
    pub bio: String,
    pub avatar: bool,
    pub created_at: DateTime<Utc>,
}

/// Credential with its bcrypt hash, for internal verification flows only.
#[derive(Debug, Clone)]
pub struct CredentialWithHash {
    pub credential: Credential,
    pub password_hash: String,
}

/// Profile fields a user may change. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<bool>,
}

/// A browser login session.
///
/// `token_hash` is the SHA-256 digest of the cookie value; the raw token is
/// only ever returned once, from `create_session`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct LoginSession {
    pub token_hash: String,
    pub credential_id: CredentialId,
    pub device: String,
    pub ip: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl LoginSession {
    /// Whether the session is past its expiry at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_expiry_boundary() {
        let now = Utc::now();
        let session = LoginSession {
            token_hash: "h".into(),
            credential_id: 1,
            device: String::new(),
            ip: String::new(),
            expires_at: now,
            created_at: now,
        };
        assert!(session.is_expired_at(now));
        assert!(!session.is_expired_at(now - chrono::Duration::seconds(1)));
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&CredentialStatus::Suspended).unwrap();
        assert_eq!(json, "\"suspended\"");
    }
}
