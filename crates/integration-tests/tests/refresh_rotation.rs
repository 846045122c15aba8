//! Refresh-token rotation tests: exclusivity under concurrency, IP binding,
//! expiry, and logout.

#![allow(clippy::unwrap_used)]

use chrono::{Duration, Utc};
use secrecy::SecretString;

use barestore_api::db::SessionStore;
use barestore_api::models::NewSession;
use barestore_api::services::auth::tokens::hash_token;
use barestore_api::services::auth::{AuthError, TokenIssuer};
use barestore_integration_tests::{AWAY_IP, HOME_IP, TestApp};

#[tokio::test]
async fn test_concurrent_refresh_rotates_exactly_once() {
    let app = TestApp::new();
    let session = app.register("ana@example.com", "Ana").await.unwrap();
    let token = session.tokens.refresh_token;

    let auth_a = app.auth();
    let auth_b = app.auth();
    let (a, b) = tokio::join!(auth_a.refresh(&token, HOME_IP), auth_b.refresh(&token, HOME_IP));

    let (winner, loser) = match (a, b) {
        (Ok(winner), Err(loser)) | (Err(loser), Ok(winner)) => (winner, loser),
        (a, b) => panic!("expected exactly one success, got {a:?} and {b:?}"),
    };
    assert!(matches!(loser, AuthError::InvalidOrRevokedToken));

    let sessions = app.store.sessions().await;
    assert_eq!(sessions.len(), 1);
    assert_eq!(
        sessions[0].token_hash,
        hash_token(&winner.tokens.refresh_token)
    );
}

#[tokio::test]
async fn test_rotation_chain_revokes_every_predecessor() {
    let app = TestApp::new();
    let mut current = app.register("ana@example.com", "Ana").await.unwrap();
    let mut retired = Vec::new();

    for _ in 0..3 {
        let next = app
            .auth()
            .refresh(&current.tokens.refresh_token, HOME_IP)
            .await
            .unwrap();
        retired.push(current.tokens.refresh_token);
        current = next;
    }

    for token in &retired {
        let err = app.auth().refresh(token, HOME_IP).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidOrRevokedToken));
    }
    assert_eq!(app.store.sessions().await.len(), 1);

    let principal = app.principal(&current.tokens.access_token).unwrap();
    assert_eq!(principal.user_id, current.user.id);
}

#[tokio::test]
async fn test_refresh_is_bound_to_issuing_ip() {
    let app = TestApp::new();
    let session = app.register("ana@example.com", "Ana").await.unwrap();

    let err = app
        .auth()
        .refresh(&session.tokens.refresh_token, AWAY_IP)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::IpMismatch));
    assert_eq!(err.code(), "IP_MISMATCH");

    // The failed attempt must not burn the session
    let sessions = app.store.sessions().await;
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].ip_address, HOME_IP);

    let rotated = app
        .auth()
        .refresh(&session.tokens.refresh_token, HOME_IP)
        .await
        .unwrap();
    assert_eq!(rotated.user.id, session.user.id);
}

#[tokio::test]
async fn test_expired_session_is_rejected_and_kept() {
    let app = TestApp::new();
    let session = app.register("ana@example.com", "Ana").await.unwrap();
    let user_id = session.user.id;

    let stale = app.issuer.issue_refresh(user_id).unwrap();
    app.store
        .create_session(NewSession {
            user_id,
            token_hash: hash_token(&stale),
            expires_at: Utc::now() - Duration::seconds(1),
            ip_address: HOME_IP,
        })
        .await
        .unwrap();

    let err = app.auth().refresh(&stale, HOME_IP).await.unwrap_err();
    assert!(matches!(err, AuthError::SessionExpired));
    assert_eq!(err.code(), "TOKEN_EXPIRED");

    assert!(
        app.store
            .find_session(user_id, &hash_token(&stale))
            .await
            .unwrap()
            .is_some()
    );
    assert_eq!(app.store.sessions().await.len(), 2);
}

#[tokio::test]
async fn test_access_token_cannot_refresh() {
    let app = TestApp::new();
    let session = app.register("ana@example.com", "Ana").await.unwrap();

    let err = app
        .auth()
        .refresh(&session.tokens.access_token, HOME_IP)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidOrRevokedToken));
    assert_eq!(app.store.sessions().await.len(), 1);
}

#[tokio::test]
async fn test_logout_revokes_session() {
    let app = TestApp::new();
    let session = app.register("ana@example.com", "Ana").await.unwrap();

    app.auth()
        .logout(&session.tokens.refresh_token)
        .await
        .unwrap();
    assert!(app.store.sessions().await.is_empty());

    let err = app
        .auth()
        .refresh(&session.tokens.refresh_token, HOME_IP)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidOrRevokedToken));

    let err = app
        .auth()
        .logout(&session.tokens.refresh_token)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidOrRevokedToken));
}

#[tokio::test]
async fn test_logout_accepts_expired_refresh_token() {
    let app = TestApp {
        issuer: TokenIssuer::with_ttls(
            &SecretString::from("integration-access-secret-0123456789abcdef"),
            &SecretString::from("integration-refresh-secret-0123456789abcdef"),
            Duration::minutes(15),
            Duration::seconds(-10),
        ),
        ..TestApp::new()
    };
    let session = app.register("ana@example.com", "Ana").await.unwrap();

    // Past its exp claim the token can no longer refresh...
    let err = app
        .auth()
        .refresh(&session.tokens.refresh_token, HOME_IP)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidOrRevokedToken));

    // ...but can still end its session
    app.auth()
        .logout(&session.tokens.refresh_token)
        .await
        .unwrap();
    assert!(app.store.sessions().await.is_empty());
}

#[tokio::test]
async fn test_logout_rejects_foreign_signature() {
    let app = TestApp::new();
    app.register("ana@example.com", "Ana").await.unwrap();

    let forger = TokenIssuer::new(
        &SecretString::from("some-other-access-secret-0123456789abcdef"),
        &SecretString::from("some-other-refresh-secret-0123456789abcdef"),
    );
    let forged = forger
        .issue_refresh(app.store.sessions().await[0].user_id)
        .unwrap();

    let err = app.auth().logout(&forged).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidOrRevokedToken));
    assert_eq!(app.store.sessions().await.len(), 1);
}
