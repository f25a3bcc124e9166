//! In-process backend.
//!
//! Holds every table behind one lock, so each trait method is atomic the same
//! way a single Postgres transaction is. Nothing survives the process.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{CredentialBackend, GrantBackend, SessionBackend};
use crate::auth::AuthError;
use crate::grant::{TokenKind, TokenRecord};
use crate::models::auth::{
    Credential, CredentialId, CredentialStatus, CredentialWithHash, LoginSession, ProfileUpdate,
};

#[derive(Debug, Default)]
struct Tables {
    tokens: HashMap<TokenKind, HashMap<String, TokenRecord>>,
    sessions: HashMap<String, LoginSession>,
    credentials: BTreeMap<CredentialId, CredentialWithHash>,
    last_credential_id: CredentialId,
}

impl Tables {
    fn kind(&mut self, kind: TokenKind) -> &mut HashMap<String, TokenRecord> {
        self.tokens.entry(kind).or_default()
    }

    fn delete_where(&mut self, kind: TokenKind, pred: impl Fn(&TokenRecord) -> bool) -> u64 {
        let rows = self.kind(kind);
        let before = rows.len();
        rows.retain(|_, r| !pred(&*r));
        (before - rows.len()) as u64
    }

    fn username_taken(&self, username: &str, except: Option<CredentialId>) -> bool {
        self.credentials
            .values()
            .any(|c| c.credential.username == username && Some(c.credential.id) != except)
    }
}

/// Backend that keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GrantBackend for MemoryStore {
    async fn insert_token(&self, kind: TokenKind, record: &TokenRecord) -> Result<(), AuthError> {
        let mut tables = self.tables.write().await;
        let rows = tables.kind(kind);
        if rows.contains_key(&record.signature) {
            return Err(AuthError::Conflict(format!("duplicate {kind} signature")));
        }
        rows.insert(record.signature.clone(), record.clone());
        Ok(())
    }

    async fn get_token(
        &self,
        kind: TokenKind,
        key: &str,
    ) -> Result<Option<TokenRecord>, AuthError> {
        let tables = self.tables.read().await;
        Ok(tables.tokens.get(&kind).and_then(|rows| rows.get(key)).cloned())
    }

    async fn deactivate_code(&self, key: &str) -> Result<u64, AuthError> {
        let mut tables = self.tables.write().await;
        match tables.kind(TokenKind::AuthorizationCode).get_mut(key) {
            Some(record) if record.active => {
                record.active = false;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn delete_token(&self, kind: TokenKind, key: &str) -> Result<u64, AuthError> {
        let mut tables = self.tables.write().await;
        Ok(tables.kind(kind).remove(key).map_or(0, |_| 1))
    }

    async fn delete_anchored(
        &self,
        anchor: TokenKind,
        cascade: &[TokenKind],
        request_id: &str,
    ) -> Result<Option<u64>, AuthError> {
        let mut tables = self.tables.write().await;
        let anchored = tables.delete_where(anchor, |r| r.request_id == request_id);
        if anchored == 0 {
            return Ok(None);
        }
        let mut total = anchored;
        for &kind in cascade {
            total += tables.delete_where(kind, |r| r.request_id == request_id);
        }
        Ok(Some(total))
    }

    async fn delete_request(
        &self,
        kinds: &[TokenKind],
        request_id: &str,
    ) -> Result<u64, AuthError> {
        let mut tables = self.tables.write().await;
        let mut total = 0;
        for &kind in kinds {
            total += tables.delete_where(kind, |r| r.request_id == request_id);
        }
        Ok(total)
    }

    async fn delete_inactive_codes(&self, before: DateTime<Utc>) -> Result<u64, AuthError> {
        let mut tables = self.tables.write().await;
        Ok(tables.delete_where(TokenKind::AuthorizationCode, |r| {
            !r.active && r.requested_at < before
        }))
    }
}

#[async_trait]
impl SessionBackend for MemoryStore {
    async fn insert_session(&self, session: &LoginSession) -> Result<(), AuthError> {
        let mut tables = self.tables.write().await;
        if !tables.credentials.contains_key(&session.credential_id) {
            return Err(AuthError::NotFound);
        }
        if tables.sessions.contains_key(&session.token_hash) {
            return Err(AuthError::Conflict("duplicate session token".into()));
        }
        tables
            .sessions
            .insert(session.token_hash.clone(), session.clone());
        Ok(())
    }

    async fn get_live_session(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<LoginSession>, AuthError> {
        let tables = self.tables.read().await;
        Ok(tables
            .sessions
            .get(token_hash)
            .filter(|s| !s.is_expired_at(now))
            .cloned())
    }

    async fn delete_session(&self, token_hash: &str) -> Result<u64, AuthError> {
        let mut tables = self.tables.write().await;
        Ok(tables.sessions.remove(token_hash).map_or(0, |_| 1))
    }

    async fn delete_sessions_for(&self, credential_id: CredentialId) -> Result<u64, AuthError> {
        let mut tables = self.tables.write().await;
        let before = tables.sessions.len();
        tables
            .sessions
            .retain(|_, s| s.credential_id != credential_id);
        Ok((before - tables.sessions.len()) as u64)
    }

    async fn list_sessions(
        &self,
        credential_id: CredentialId,
        now: DateTime<Utc>,
    ) -> Result<Vec<LoginSession>, AuthError> {
        let tables = self.tables.read().await;
        let mut sessions: Vec<_> = tables
            .sessions
            .values()
            .filter(|s| s.credential_id == credential_id && !s.is_expired_at(now))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        let mut tables = self.tables.write().await;
        let before = tables.sessions.len();
        tables.sessions.retain(|_, s| !s.is_expired_at(now));
        Ok((before - tables.sessions.len()) as u64)
    }
}

#[async_trait]
impl CredentialBackend for MemoryStore {
    async fn insert_credential(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<CredentialWithHash, AuthError> {
        let mut tables = self.tables.write().await;
        if tables.username_taken(username, None) {
            return Err(AuthError::Conflict(format!(
                "username {username:?} is taken"
            )));
        }
        tables.last_credential_id += 1;
        let row = CredentialWithHash {
            credential: Credential {
                id: tables.last_credential_id,
                username: username.to_string(),
                status: CredentialStatus::Active,
                bio: String::new(),
                avatar: false,
                created_at: Utc::now(),
            },
            password_hash: password_hash.to_string(),
        };
        tables.credentials.insert(row.credential.id, row.clone());
        Ok(row)
    }

    async fn credential_by_id(
        &self,
        id: CredentialId,
    ) -> Result<Option<CredentialWithHash>, AuthError> {
        Ok(self.tables.read().await.credentials.get(&id).cloned())
    }

    async fn credential_by_username(
        &self,
        username: &str,
    ) -> Result<Option<CredentialWithHash>, AuthError> {
        let tables = self.tables.read().await;
        Ok(tables
            .credentials
            .values()
            .find(|c| c.credential.username == username)
            .cloned())
    }

    async fn update_password(
        &self,
        id: CredentialId,
        password_hash: &str,
    ) -> Result<u64, AuthError> {
        let mut tables = self.tables.write().await;
        Ok(match tables.credentials.get_mut(&id) {
            Some(row) => {
                row.password_hash = password_hash.to_string();
                1
            }
            None => 0,
        })
    }

    async fn update_profile(
        &self,
        id: CredentialId,
        update: &ProfileUpdate,
    ) -> Result<u64, AuthError> {
        let mut tables = self.tables.write().await;
        if let Some(username) = &update.username
            && tables.username_taken(username, Some(id))
        {
            return Err(AuthError::Conflict(format!(
                "username {username:?} is taken"
            )));
        }
        let Some(row) = tables.credentials.get_mut(&id) else {
            return Ok(0);
        };
        if let Some(username) = &update.username {
            row.credential.username = username.clone();
        }
        if let Some(bio) = &update.bio {
            row.credential.bio = bio.clone();
        }
        if let Some(avatar) = update.avatar {
            row.credential.avatar = avatar;
        }
        Ok(1)
    }

    async fn update_status(
        &self,
        id: CredentialId,
        status: CredentialStatus,
    ) -> Result<u64, AuthError> {
        let mut tables = self.tables.write().await;
        Ok(match tables.credentials.get_mut(&id) {
            Some(row) => {
                row.credential.status = status;
                1
            }
            None => 0,
        })
    }

    async fn delete_credential(&self, id: CredentialId) -> Result<u64, AuthError> {
        let mut tables = self.tables.write().await;
        let subject = id.to_string();
        for kind in TokenKind::ALL {
            tables.delete_where(kind, |r| r.subject == subject);
        }
        tables.sessions.retain(|_, s| s.credential_id != id);
        Ok(tables.credentials.remove(&id).map_or(0, |_| 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grant::{GrantRequest, GrantSession};

    fn record(sig: &str, request_id: &str) -> TokenRecord {
        let req = GrantRequest::new(request_id, "client").with_session(GrantSession::new("1"));
        TokenRecord::from_request(sig.to_string(), &req).unwrap()
    }

    #[tokio::test]
    async fn same_signature_in_different_kinds_is_allowed() {
        let store = MemoryStore::new();
        let r = record("s", "r");
        store.insert_token(TokenKind::AccessToken, &r).await.unwrap();
        store.insert_token(TokenKind::RefreshToken, &r).await.unwrap();
        assert!(matches!(
            store.insert_token(TokenKind::AccessToken, &r).await,
            Err(AuthError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn deactivate_reports_affected_rows() {
        let store = MemoryStore::new();
        store
            .insert_token(TokenKind::AuthorizationCode, &record("c", "r"))
            .await
            .unwrap();
        assert_eq!(store.deactivate_code("c").await.unwrap(), 1);
        assert_eq!(store.deactivate_code("c").await.unwrap(), 0);
        assert_eq!(store.deactivate_code("missing").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn anchored_delete_without_anchor_touches_nothing() {
        let store = MemoryStore::new();
        store
            .insert_token(TokenKind::AccessToken, &record("a", "r"))
            .await
            .unwrap();
        let out = store
            .delete_anchored(TokenKind::RefreshToken, &[TokenKind::AccessToken], "r")
            .await
            .unwrap();
        assert_eq!(out, None);
        assert!(
            store
                .get_token(TokenKind::AccessToken, "a")
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn session_requires_existing_credential() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let session = LoginSession {
            token_hash: "h".into(),
            credential_id: 99,
            device: String::new(),
            ip: String::new(),
            expires_at: now,
            created_at: now,
        };
        assert!(matches!(
            store.insert_session(&session).await,
            Err(AuthError::NotFound)
        ));
    }

    #[tokio::test]
    async fn credential_ids_are_sequential_from_one() {
        let store = MemoryStore::new();
        let a = store.insert_credential("alice", "x").await.unwrap();
        let b = store.insert_credential("bob", "x").await.unwrap();
        assert_eq!(a.credential.id, 1);
        assert_eq!(b.credential.id, 2);
    }
}
