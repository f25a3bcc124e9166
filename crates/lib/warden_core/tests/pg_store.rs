//! Postgres-backed integration tests.
//!
//! Run against a scratch database:
//! `WARDEN_TEST_DATABASE_URL=postgres://localhost/warden_test cargo test -p warden_core`.
//! Without the variable every test returns early.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use warden_core::Warden;
use warden_core::auth::AuthError;
use warden_core::config::WardenConfig;
use warden_core::grant::{GrantRequest, GrantSession, TokenKind};
use warden_core::models::auth::{CredentialStatus, ProfileUpdate};
use warden_core::store::{GrantBackend, PgStore};

async fn connect() -> Option<(Warden, Arc<PgStore>)> {
    let Ok(url) = std::env::var("WARDEN_TEST_DATABASE_URL") else {
        eprintln!("WARDEN_TEST_DATABASE_URL not set, skipping");
        return None;
    };
    let config = WardenConfig {
        database_url: url,
        max_connections: 2,
        bcrypt_cost: 4,
        ..WardenConfig::default()
    };
    let store = Arc::new(PgStore::connect(&config).await.expect("connect"));
    warden_core::migrate::migrate(&store).await.expect("migrate");
    Some((Warden::from_backend(store.clone(), &config), store))
}

/// Unique suffix so tests sharing one database never collide.
fn unique(prefix: &str) -> String {
    format!("{prefix}{:08x}", rand::random::<u32>())
}

#[tokio::test]
async fn grant_artifacts_round_trip_and_replay_is_detected() {
    let Some((warden, store)) = connect().await else {
        return;
    };
    let cancel = CancellationToken::new();
    let request_id = unique("req");
    let request = GrantRequest::new(&request_id, "client-a")
        .with_session(GrantSession::new("42"))
        .with_scopes(&["openid", "offline"], &["openid"])
        .with_audience(&["api"], &["api"])
        .with_form_field("redirect_uri", "https://app.example/cb");

    for kind in TokenKind::ALL {
        let sig = unique("sig");
        warden
            .tokens
            .create(&cancel, kind, &sig, &request)
            .await
            .unwrap();
        let record = warden.tokens.find(&cancel, kind, &sig).await.unwrap();
        assert_eq!(record.request_id, request_id);
        assert_eq!(record.granted_scopes, vec!["openid"]);
        assert_eq!(record.requested_audience, vec!["api"]);
        assert_eq!(record.subject, "42");
        let session: GrantSession = record.session().unwrap().unwrap();
        assert_eq!(session.subject, "42");
    }

    // Access tokens are stored under their digest.
    let access_sig = unique("acc");
    warden
        .tokens
        .create(&cancel, TokenKind::AccessToken, &access_sig, &request)
        .await
        .unwrap();
    assert!(
        store
            .get_token(TokenKind::AccessToken, &access_sig)
            .await
            .unwrap()
            .is_none()
    );

    let code = unique("code");
    warden
        .tokens
        .create(&cancel, TokenKind::AuthorizationCode, &code, &request)
        .await
        .unwrap();
    assert!(
        warden
            .tokens
            .invalidate_authorization_code(&cancel, &code)
            .await
            .unwrap()
    );
    let err = warden
        .tokens
        .find(&cancel, TokenKind::AuthorizationCode, &code)
        .await
        .unwrap_err();
    let replayed = err.invalidated_record().expect("record attached");
    assert_eq!(replayed.request_id, request_id);

    let removed = warden
        .revocation
        .revoke_grant(&cancel, &replayed.request_id)
        .await
        .unwrap();
    assert_eq!(removed, 7);
}

#[tokio::test]
async fn duplicate_signature_is_a_conflict() {
    let Some((warden, _)) = connect().await else {
        return;
    };
    let cancel = CancellationToken::new();
    let sig = unique("dup");
    let first = GrantRequest::new(unique("req"), "c").with_session(GrantSession::new("1"));
    let second = GrantRequest::new(unique("req"), "c").with_session(GrantSession::new("1"));

    warden
        .tokens
        .create(&cancel, TokenKind::RefreshToken, &sig, &first)
        .await
        .unwrap();
    assert!(matches!(
        warden
            .tokens
            .create(&cancel, TokenKind::RefreshToken, &sig, &second)
            .await,
        Err(AuthError::Conflict(_))
    ));
    let stored = warden
        .tokens
        .find(&cancel, TokenKind::RefreshToken, &sig)
        .await
        .unwrap();
    assert_eq!(stored.request_id, first.request_id);
}

#[tokio::test]
async fn refresh_revocation_is_transactional() {
    let Some((warden, _)) = connect().await else {
        return;
    };
    let cancel = CancellationToken::new();
    let request_id = unique("req");
    let request = GrantRequest::new(&request_id, "c").with_session(GrantSession::new("9"));
    let (access, refresh) = (unique("a"), unique("r"));

    warden
        .tokens
        .create(&cancel, TokenKind::AccessToken, &access, &request)
        .await
        .unwrap();

    // No refresh token yet: nothing is deleted.
    assert!(matches!(
        warden
            .revocation
            .revoke_refresh_token(&cancel, &request_id)
            .await,
        Err(AuthError::NotFound)
    ));
    assert!(
        warden
            .tokens
            .find(&cancel, TokenKind::AccessToken, &access)
            .await
            .is_ok()
    );

    warden
        .tokens
        .create(&cancel, TokenKind::RefreshToken, &refresh, &request)
        .await
        .unwrap();
    warden
        .revocation
        .revoke_refresh_token(&cancel, &request_id)
        .await
        .unwrap();
    for (kind, sig) in [
        (TokenKind::AccessToken, &access),
        (TokenKind::RefreshToken, &refresh),
    ] {
        assert!(matches!(
            warden.tokens.find(&cancel, kind, sig).await,
            Err(AuthError::NotFound)
        ));
    }
}

#[tokio::test]
async fn credential_lifecycle_with_sessions() {
    let Some((warden, _)) = connect().await else {
        return;
    };
    let cancel = CancellationToken::new();
    let username = unique("u");

    let reg = warden
        .credentials
        .register(&cancel, &username, "hunter22")
        .await
        .unwrap();
    let id = reg.credential.id;
    assert_eq!(reg.credential.status, CredentialStatus::Active);
    assert!(matches!(
        warden
            .credentials
            .register(&cancel, &username, "hunter22")
            .await,
        Err(AuthError::Conflict(_))
    ));

    warden
        .verifier
        .verify(&cancel, &id.to_string(), "hunter22")
        .await
        .unwrap();
    assert!(matches!(
        warden
            .verifier
            .verify(&cancel, &id.to_string(), "wrongpass")
            .await,
        Err(AuthError::InvalidCredentials)
    ));

    let update = ProfileUpdate {
        bio: Some("hi".into()),
        ..Default::default()
    };
    let updated = warden
        .credentials
        .update_profile(&cancel, id, &update)
        .await
        .unwrap();
    assert_eq!(updated.bio, "hi");
    assert_eq!(updated.username, username);

    warden
        .credentials
        .set_status(&cancel, id, CredentialStatus::Suspended)
        .await
        .unwrap();

    let token = warden
        .sessions
        .create_session(&cancel, id, "firefox", "10.0.0.1", chrono::Duration::hours(1))
        .await
        .unwrap();
    let session = warden.sessions.lookup_session(&cancel, &token).await.unwrap();
    assert_eq!(session.credential_id, id);

    let grant = GrantRequest::new(unique("req"), "c").with_session(GrantSession::new(id.to_string()));
    let refresh = unique("r");
    warden
        .tokens
        .create(&cancel, TokenKind::RefreshToken, &refresh, &grant)
        .await
        .unwrap();

    assert!(warden.credentials.delete(&cancel, id).await.unwrap());
    assert!(matches!(
        warden.sessions.lookup_session(&cancel, &token).await,
        Err(AuthError::SessionNotFound)
    ));
    assert!(matches!(
        warden
            .tokens
            .find(&cancel, TokenKind::RefreshToken, &refresh)
            .await,
        Err(AuthError::NotFound)
    ));
    assert!(!warden.credentials.delete(&cancel, id).await.unwrap());
}

#[tokio::test]
async fn session_for_unknown_credential_is_not_found() {
    let Some((warden, _)) = connect().await else {
        return;
    };
    let cancel = CancellationToken::new();
    assert!(matches!(
        warden
            .sessions
            .create_session(&cancel, i64::MAX, "cli", "::1", chrono::Duration::hours(1))
            .await,
        Err(AuthError::NotFound)
    ));
}
