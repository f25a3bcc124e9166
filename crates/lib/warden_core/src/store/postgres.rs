//! PostgreSQL backend.
//!
//! Raw SQLx queries against the tables created by `migrations/`. Token
//! tables are chosen by [`TokenKind::table`], which only ever yields static
//! names, so formatting them into SQL is safe.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use super::{CredentialBackend, GrantBackend, SessionBackend};
use crate::auth::AuthError;
use crate::config::WardenConfig;
use crate::grant::{TokenKind, TokenRecord};
use crate::models::auth::{
    Credential, CredentialId, CredentialStatus, CredentialWithHash, LoginSession, ProfileUpdate,
};

const TOKEN_COLUMNS: &str = "signature, request_id, requested_at, client_id, \
     requested_scopes, granted_scopes, requested_audience, granted_audience, \
     form, session, subject, consent_challenge, active";

const SESSION_COLUMNS: &str = "token_hash, credential_id, device, ip, expires_at, created_at";

const CREDENTIAL_COLUMNS: &str = "id, username, password_hash, status, bio, avatar, created_at";

/// Flat `credentials` row.
#[derive(Debug, sqlx::FromRow)]
struct CredentialRow {
    id: CredentialId,
    username: String,
    password_hash: String,
    status: CredentialStatus,
    bio: String,
    avatar: bool,
    created_at: DateTime<Utc>,
}

impl From<CredentialRow> for CredentialWithHash {
    fn from(row: CredentialRow) -> Self {
        Self {
            credential: Credential {
                id: row.id,
                username: row.username,
                status: row.status,
                bio: row.bio,
                avatar: row.avatar,
                created_at: row.created_at,
            },
            password_hash: row.password_hash,
        }
    }
}

/// Backend over a shared connection pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool using the configured URL and size.
    pub async fn connect(config: &WardenConfig) -> Result<Self, AuthError> {
        info!(
            max_connections = config.max_connections,
            "configuring connection pool"
        );
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&config.database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl GrantBackend for PgStore {
    async fn insert_token(&self, kind: TokenKind, record: &TokenRecord) -> Result<(), AuthError> {
        let sql = format!(
            "INSERT INTO {} ({TOKEN_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
            kind.table()
        );
        sqlx::query(&sql)
            .bind(&record.signature)
            .bind(&record.request_id)
            .bind(record.requested_at)
            .bind(&record.client_id)
            .bind(&record.requested_scopes)
            .bind(&record.granted_scopes)
            .bind(&record.requested_audience)
            .bind(&record.granted_audience)
            .bind(&record.form)
            .bind(&record.session)
            .bind(&record.subject)
            .bind(&record.consent_challenge)
            .bind(record.active)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_token(
        &self,
        kind: TokenKind,
        key: &str,
    ) -> Result<Option<TokenRecord>, AuthError> {
        let sql = format!(
            "SELECT {TOKEN_COLUMNS} FROM {} WHERE signature = $1",
            kind.table()
        );
        let row = sqlx::query_as::<_, TokenRecord>(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn deactivate_code(&self, key: &str) -> Result<u64, AuthError> {
        let sql = format!(
            "UPDATE {} SET active = false WHERE signature = $1 AND active = true",
            TokenKind::AuthorizationCode.table()
        );
        let result = sqlx::query(&sql).bind(key).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn delete_token(&self, kind: TokenKind, key: &str) -> Result<u64, AuthError> {
        let sql = format!("DELETE FROM {} WHERE signature = $1", kind.table());
        let result = sqlx::query(&sql).bind(key).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn delete_anchored(
        &self,
        anchor: TokenKind,
        cascade: &[TokenKind],
        request_id: &str,
    ) -> Result<Option<u64>, AuthError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("DELETE FROM {} WHERE request_id = $1", anchor.table());
        let anchored = sqlx::query(&sql)
            .bind(request_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if anchored == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let mut total = anchored;
        for kind in cascade {
            let sql = format!("DELETE FROM {} WHERE request_id = $1", kind.table());
            total += sqlx::query(&sql)
                .bind(request_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }

        tx.commit().await?;
        Ok(Some(total))
    }

    async fn delete_request(
        &self,
        kinds: &[TokenKind],
        request_id: &str,
    ) -> Result<u64, AuthError> {
        let mut tx = self.pool.begin().await?;
        let mut total = 0;
        for kind in kinds {
            let sql = format!("DELETE FROM {} WHERE request_id = $1", kind.table());
            total += sqlx::query(&sql)
                .bind(request_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;
        Ok(total)
    }

    async fn delete_inactive_codes(&self, before: DateTime<Utc>) -> Result<u64, AuthError> {
        let sql = format!(
            "DELETE FROM {} WHERE active = false AND requested_at < $1",
            TokenKind::AuthorizationCode.table()
        );
        let result = sqlx::query(&sql).bind(before).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl SessionBackend for PgStore {
    async fn insert_session(&self, session: &LoginSession) -> Result<(), AuthError> {
        sqlx::query(
            "INSERT INTO login_sessions (token_hash, credential_id, device, ip, expires_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&session.token_hash)
        .bind(session.credential_id)
        .bind(&session.device)
        .bind(&session.ip)
        .bind(session.expires_at)
        .bind(session.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_live_session(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<LoginSession>, AuthError> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM login_sessions \
             WHERE token_hash = $1 AND expires_at > $2"
        );
        let row = sqlx::query_as::<_, LoginSession>(&sql)
            .bind(token_hash)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn delete_session(&self, token_hash: &str) -> Result<u64, AuthError> {
        let result = sqlx::query("DELETE FROM login_sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_sessions_for(&self, credential_id: CredentialId) -> Result<u64, AuthError> {
        let result = sqlx::query("DELETE FROM login_sessions WHERE credential_id = $1")
            .bind(credential_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn list_sessions(
        &self,
        credential_id: CredentialId,
        now: DateTime<Utc>,
    ) -> Result<Vec<LoginSession>, AuthError> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM login_sessions \
             WHERE credential_id = $1 AND expires_at > $2 \
             ORDER BY created_at DESC"
        );
        let rows = sqlx::query_as::<_, LoginSession>(&sql)
            .bind(credential_id)
            .bind(now)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        let result = sqlx::query("DELETE FROM login_sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl CredentialBackend for PgStore {
    async fn insert_credential(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<CredentialWithHash, AuthError> {
        let sql = format!(
            "INSERT INTO credentials (username, password_hash) VALUES ($1, $2) \
             RETURNING {CREDENTIAL_COLUMNS}"
        );
        let row = sqlx::query_as::<_, CredentialRow>(&sql)
            .bind(username)
            .bind(password_hash)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }

    async fn credential_by_id(
        &self,
        id: CredentialId,
    ) -> Result<Option<CredentialWithHash>, AuthError> {
        let sql = format!("SELECT {CREDENTIAL_COLUMNS} FROM credentials WHERE id = $1");
        let row = sqlx::query_as::<_, CredentialRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn credential_by_username(
        &self,
        username: &str,
    ) -> Result<Option<CredentialWithHash>, AuthError> {
        let sql = format!("SELECT {CREDENTIAL_COLUMNS} FROM credentials WHERE username = $1");
        let row = sqlx::query_as::<_, CredentialRow>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn update_password(
        &self,
        id: CredentialId,
        password_hash: &str,
    ) -> Result<u64, AuthError> {
        let result = sqlx::query("UPDATE credentials SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn update_profile(
        &self,
        id: CredentialId,
        update: &ProfileUpdate,
    ) -> Result<u64, AuthError> {
        let result = sqlx::query(
            r#"
            UPDATE credentials
            SET username = COALESCE($2, username),
                bio = COALESCE($3, bio),
                avatar = COALESCE($4, avatar)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(update.username.as_deref())
        .bind(update.bio.as_deref())
        .bind(update.avatar)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn update_status(
        &self,
        id: CredentialId,
        status: CredentialStatus,
    ) -> Result<u64, AuthError> {
        let result = sqlx::query("UPDATE credentials SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_credential(&self, id: CredentialId) -> Result<u64, AuthError> {
        let mut tx = self.pool.begin().await?;

        let subject = id.to_string();
        for kind in TokenKind::ALL {
            let sql = format!("DELETE FROM {} WHERE subject = $1", kind.table());
            sqlx::query(&sql)
                .bind(&subject)
                .execute(&mut *tx)
                .await?;
        }

        // login_sessions rows go with the credential via ON DELETE CASCADE.
        let deleted = sqlx::query("DELETE FROM credentials WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(deleted)
    }
}
