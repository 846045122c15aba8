//! Account lifecycle tests: signup, verification, password set, login and
//! OAuth login, all against one shared in-memory application.

#![allow(clippy::unwrap_used)]

use chrono::Duration;

use barestore_api::services::auth::AuthError;
use barestore_api::services::email::SentEmail;
use barestore_api::services::oauth::ProviderProfile;
use barestore_core::{Email, OAuthProvider, UserStatus};
use barestore_integration_tests::{HOME_IP, PASSWORD, TestApp};

fn google_profile(email: &str, picture: Option<&str>) -> ProviderProfile {
    ProviderProfile {
        email: Email::parse(email).unwrap(),
        first_name: "Katherine".to_owned(),
        middle_name: Some("Coleman".to_owned()),
        last_name: Some("Johnson".to_owned()),
        picture: picture.map(str::to_owned),
    }
}

// =============================================================================
// Password Signup
// =============================================================================

#[tokio::test]
async fn test_full_signup_then_login() {
    let app = TestApp::new();

    app.auth().signup("Dana@Example.com", "Dana Scully").await.unwrap();
    let token = app.verification_token("dana@example.com").await;

    let verified = app.auth().verify_signup(&token).await.unwrap();
    assert_eq!(verified.email.as_str(), "dana@example.com");

    let session = app
        .auth()
        .set_password(&token, PASSWORD, HOME_IP)
        .await
        .unwrap();
    assert_eq!(session.user.status, UserStatus::Active);
    assert_eq!(session.user.name, "Dana Scully");

    let principal = app.principal(&session.tokens.access_token).unwrap();
    assert_eq!(principal.user_id, session.user.id);

    // The token is single-use
    let reused = app
        .auth()
        .set_password(&token, "another password", HOME_IP)
        .await
        .unwrap_err();
    assert!(matches!(reused, AuthError::InvalidOrExpiredToken));

    let login = app
        .auth()
        .login("dana@example.com", PASSWORD, HOME_IP)
        .await
        .unwrap();
    assert_eq!(login.user.id, session.user.id);
    assert_eq!(app.store.sessions().await.len(), 2);

    let me = app.auth().current_user(principal.user_id).await.unwrap();
    assert_eq!(me.email.as_str(), "dana@example.com");
}

#[tokio::test]
async fn test_login_while_pending_creates_no_session() {
    let app = TestApp::new();
    app.auth().signup("skinner@example.com", "Walter Skinner").await.unwrap();
    let user_id = app.store.verifications().await[0].user_id;

    // Password stored while the account is still pending
    assert!(
        app.store
            .set_password_hash(user_id, "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA")
            .await
    );

    let err = app
        .auth()
        .login("skinner@example.com", PASSWORD, HOME_IP)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::EmailNotVerified));
    assert_eq!(err.code(), "EMAIL_NOT_VERIFIED");
    assert_eq!(err.status().as_u16(), 403);
    assert!(app.store.sessions().await.is_empty());
}

#[tokio::test]
async fn test_login_before_password_is_set() {
    let app = TestApp::new();
    app.auth().signup("fox@example.com", "Fox Mulder").await.unwrap();

    let err = app
        .auth()
        .login("fox@example.com", PASSWORD, HOME_IP)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::PasswordNotSet));
    assert_eq!(err.code(), "PENDING_PASSWORD");
    assert_eq!(err.status().as_u16(), 403);
    assert!(app.store.sessions().await.is_empty());
}

#[tokio::test]
async fn test_wrong_password_and_unknown_user() {
    let app = TestApp::new();
    app.register("walter@example.com", "Walter Skinner")
        .await
        .unwrap();

    let err = app
        .auth()
        .login("walter@example.com", "not the password", HOME_IP)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidPassword));

    let err = app
        .auth()
        .login("nobody@example.com", PASSWORD, HOME_IP)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::UserNotFound));
}

#[tokio::test]
async fn test_secrets_are_stored_hashed() {
    let app = TestApp::new();
    app.auth().signup("monica@example.com", "Monica Reyes").await.unwrap();
    let raw_verification = app.verification_token("monica@example.com").await;

    let stored = app.store.verifications().await;
    assert_eq!(stored.len(), 1);
    assert_ne!(stored[0].token_hash, raw_verification);
    assert_eq!(stored[0].token_hash.len(), 64);

    let session = app
        .auth()
        .set_password(&raw_verification, PASSWORD, HOME_IP)
        .await
        .unwrap();

    let sessions = app.store.sessions().await;
    assert_eq!(sessions.len(), 1);
    assert_ne!(sessions[0].token_hash, session.tokens.refresh_token);
    assert!(
        sessions[0]
            .token_hash
            .chars()
            .all(|c| c.is_ascii_hexdigit())
    );

    let password_hash = app.store.password_hash(session.user.id).await.unwrap();
    assert!(password_hash.starts_with("$argon2"));
    assert!(!password_hash.contains(PASSWORD));

    let body = serde_json::to_value(&session).unwrap();
    assert!(body["user"].get("passwordHash").is_none());
    assert!(body["accessToken"].is_string());
    assert!(body["refreshToken"].is_string());
}

#[tokio::test]
async fn test_resend_cooldown_then_resend() {
    let app = TestApp::new();
    app.auth().signup("john@example.com", "John Doggett").await.unwrap();
    let first = app.verification_token("john@example.com").await;

    let err = app
        .auth()
        .signup("john@example.com", "John Doggett")
        .await
        .unwrap_err();
    match err {
        AuthError::TooManyRequests {
            retry_after_seconds,
        } => assert!((1..=60).contains(&retry_after_seconds)),
        other => panic!("expected TooManyRequests, got {other:?}"),
    }

    let user_id = app.store.verifications().await[0].user_id;
    app.store
        .age_verifications(user_id, Duration::seconds(61))
        .await;
    app.auth().signup("john@example.com", "John Doggett").await.unwrap();

    let second = app.verification_token("john@example.com").await;
    assert_ne!(first, second);

    let verification_emails = app
        .mailer
        .sent()
        .await
        .into_iter()
        .filter(|m| matches!(m, SentEmail::Verification { .. }))
        .count();
    assert_eq!(verification_emails, 2);
}

#[tokio::test]
async fn test_signup_of_active_account_is_rejected() {
    let app = TestApp::new();
    app.register("alex@example.com", "Alex Krycek").await.unwrap();

    let err = app
        .auth()
        .signup("alex@example.com", "Alex Krycek")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::UserAlreadyExists));
    assert_eq!(err.status().as_u16(), 409);
}

// =============================================================================
// OAuth Login
// =============================================================================

#[tokio::test]
async fn test_oauth_first_login_creates_active_user() {
    let app = TestApp::new();
    let profile = google_profile("kj@example.com", Some("https://lh3.example.com/kj.png"));

    let session = app
        .auth()
        .oauth_login(OAuthProvider::Google, &profile, HOME_IP)
        .await
        .unwrap();

    assert_eq!(session.user.status, UserStatus::Active);
    assert_eq!(session.user.name, "Katherine Coleman Johnson");
    assert_eq!(
        session.user.avatar.as_deref(),
        Some("https://lh3.example.com/kj.png")
    );
    assert_eq!(app.store.sessions().await.len(), 1);

    // No password yet: password login is refused, signup sees an active account
    let err = app
        .auth()
        .login("kj@example.com", PASSWORD, HOME_IP)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::PasswordNotSet));
    let err = app.auth().signup("kj@example.com", "KJ").await.unwrap_err();
    assert!(matches!(err, AuthError::UserAlreadyExists));
}

#[tokio::test]
async fn test_oauth_backfills_but_never_overwrites_avatar() {
    let app = TestApp::new();
    let registered = app.register("kj@example.com", "Katherine").await.unwrap();
    assert!(registered.user.avatar.is_none());

    let first = app
        .auth()
        .oauth_login(
            OAuthProvider::Google,
            &google_profile("kj@example.com", Some("https://lh3.example.com/one.png")),
            HOME_IP,
        )
        .await
        .unwrap();
    assert_eq!(first.user.id, registered.user.id);
    assert_eq!(
        first.user.avatar.as_deref(),
        Some("https://lh3.example.com/one.png")
    );

    let second = app
        .auth()
        .oauth_login(
            OAuthProvider::Google,
            &google_profile("kj@example.com", Some("https://lh3.example.com/two.png")),
            HOME_IP,
        )
        .await
        .unwrap();
    assert_eq!(
        second.user.avatar.as_deref(),
        Some("https://lh3.example.com/one.png")
    );
}

#[tokio::test]
async fn test_microsoft_inline_photo_is_uploaded() {
    let app = TestApp::new();
    let mut profile = google_profile("kj@example.com", Some("data:image/jpeg;base64,/9j/4AAQ"));
    profile.middle_name = None;

    let session = app
        .auth()
        .oauth_login(OAuthProvider::Microsoft, &profile, HOME_IP)
        .await
        .unwrap();

    assert_eq!(session.user.name, "Katherine Johnson");
    assert_eq!(
        session.user.avatar.as_deref(),
        Some("https://cdn.example.com/avatars/1.jpg")
    );
}
