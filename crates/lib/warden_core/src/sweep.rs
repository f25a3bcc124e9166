//! Periodic removal of expired sessions and redeemed authorization codes.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::AuthError;
use crate::auth::sessions::LoginSessionManager;
use crate::config::WardenConfig;
use crate::grant::store::TokenStore;

/// Rows removed by one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired_sessions: u64,
    pub inactive_codes: u64,
}

pub struct Sweeper {
    sessions: Arc<LoginSessionManager>,
    tokens: Arc<TokenStore>,
    interval: Duration,
    code_retention: chrono::Duration,
}

impl Sweeper {
    pub fn new(
        sessions: Arc<LoginSessionManager>,
        tokens: Arc<TokenStore>,
        config: &WardenConfig,
    ) -> Self {
        Self {
            sessions,
            tokens,
            // tokio::time::interval rejects a zero period.
            interval: config.sweep_interval.max(Duration::from_millis(1)),
            code_retention: config.code_retention,
        }
    }

    /// Run both sweeps once.
    pub async fn run_once(&self, cancel: &CancellationToken) -> Result<SweepReport, AuthError> {
        let expired_sessions = self.sessions.sweep_expired(cancel).await?;
        // A retention reaching past the earliest representable time keeps every code.
        let cutoff = Utc::now()
            .checked_sub_signed(self.code_retention)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let inactive_codes = self.tokens.sweep_inactive_codes(cancel, cutoff).await?;
        Ok(SweepReport {
            expired_sessions,
            inactive_codes,
        })
    }

    /// Sweep on every interval tick until `cancel` fires. A failed pass is
    /// logged and retried on the next tick.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("sweeper stopped");
                        return;
                    }
                    _ = ticker.tick() => {}
                }
                match self.run_once(&cancel).await {
                    Ok(report) if report == SweepReport::default() => {}
                    Ok(report) => info!(
                        expired_sessions = report.expired_sessions,
                        inactive_codes = report.inactive_codes,
                        "sweep complete"
                    ),
                    Err(AuthError::Canceled) => return,
                    Err(e) => warn!(error = %e, "sweep failed"),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grant::hasher::SignatureHasher;
    use crate::grant::{GrantRequest, GrantSession, TokenKind};
    use crate::store::{CredentialBackend, MemoryStore};

    struct Fixture {
        sessions: Arc<LoginSessionManager>,
        tokens: Arc<TokenStore>,
        credential_id: i64,
    }

    async fn fixture() -> Fixture {
        let backend = Arc::new(MemoryStore::new());
        let credential_id = backend
            .insert_credential("alice", "hash")
            .await
            .unwrap()
            .credential
            .id;
        Fixture {
            sessions: Arc::new(LoginSessionManager::new(backend.clone())),
            tokens: Arc::new(TokenStore::new(backend, SignatureHasher::new(true))),
            credential_id,
        }
    }

    fn config(interval: Duration) -> WardenConfig {
        WardenConfig {
            sweep_interval: interval,
            code_retention: chrono::Duration::hours(1),
            ..WardenConfig::default()
        }
    }

    async fn seed(f: &Fixture, cancel: &CancellationToken) {
        f.sessions
            .create_session(
                cancel,
                f.credential_id,
                "old",
                "::1",
                chrono::Duration::milliseconds(10),
            )
            .await
            .unwrap();
        f.sessions
            .create_session(cancel, f.credential_id, "new", "::1", chrono::Duration::hours(1))
            .await
            .unwrap();

        let mut old = GrantRequest::new("R1", "client").with_session(GrantSession::new("1"));
        old.requested_at = Utc::now() - chrono::Duration::hours(2);
        f.tokens
            .create(cancel, TokenKind::AuthorizationCode, "C1", &old)
            .await
            .unwrap();
        f.tokens
            .invalidate_authorization_code(cancel, "C1")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
    }

    #[tokio::test]
    async fn run_once_reports_counts() {
        let f = fixture().await;
        let cancel = CancellationToken::new();
        seed(&f, &cancel).await;

        let sweeper = Sweeper::new(
            f.sessions.clone(),
            f.tokens.clone(),
            &config(Duration::from_secs(60)),
        );
        let report = sweeper.run_once(&cancel).await.unwrap();
        assert_eq!(
            report,
            SweepReport {
                expired_sessions: 1,
                inactive_codes: 1,
            }
        );
        assert_eq!(sweeper.run_once(&cancel).await.unwrap(), SweepReport::default());
        assert_eq!(
            f.sessions
                .list_sessions(&cancel, f.credential_id)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn unbounded_retention_keeps_every_code() {
        let f = fixture().await;
        let cancel = CancellationToken::new();
        seed(&f, &cancel).await;

        let unbounded = WardenConfig {
            code_retention: chrono::Duration::MAX,
            ..config(Duration::from_secs(60))
        };
        let sweeper = Sweeper::new(f.sessions.clone(), f.tokens.clone(), &unbounded);
        let report = sweeper.run_once(&cancel).await.unwrap();
        assert_eq!(report.inactive_codes, 0);
        assert_eq!(report.expired_sessions, 1);
        assert!(matches!(
            f.tokens
                .find(&cancel, TokenKind::AuthorizationCode, "C1")
                .await,
            Err(AuthError::InvalidatedCode(_))
        ));
    }

    #[tokio::test]
    async fn spawned_sweeper_runs_and_stops_on_cancel() {
        let f = fixture().await;
        let cancel = CancellationToken::new();
        seed(&f, &cancel).await;

        let sweeper = Sweeper::new(
            f.sessions.clone(),
            f.tokens.clone(),
            &config(Duration::from_millis(10)),
        );
        let handle = sweeper.spawn(cancel.clone());
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(matches!(
            f.tokens
                .find(&cancel, TokenKind::AuthorizationCode, "C1")
                .await,
            Err(AuthError::NotFound)
        ));

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper should stop after cancel")
            .unwrap();
    }
}
