//! Session lifecycle through the coordinator over the in-memory store.

mod common;

use cocktail_auth::application_port::*;
use cocktail_auth::domain_model::UserId;
use cocktail_auth::domain_port::{Clock, RefreshTokenStore};
use common::*;
use std::time::Duration;

#[tokio::test]
async fn test_login_refresh_rotate_then_idle_out() {
    let ctx = setup();
    let coordinator = ctx.server.session_coordinator.clone();
    let start = ctx.clock.now();

    let first = coordinator.login(alice()).await.expect("login");
    assert_eq!(first.identity, alice());
    assert_eq!(first.access_token_expires_at, start + chrono::Duration::seconds(900));
    assert_eq!(
        first.refresh_token_expires_at,
        start + chrono::Duration::seconds(30 * 24 * 60 * 60)
    );

    ctx.clock.advance(Duration::from_secs(60));
    let second = coordinator
        .refresh(&first.refresh_token)
        .await
        .expect("refresh");
    assert_eq!(second.identity, alice());
    assert_ne!(second.refresh_token, first.refresh_token);
    assert_ne!(second.access_token, first.access_token);

    // The rotated-out token is gone for good.
    assert!(matches!(
        coordinator.refresh(&first.refresh_token).await,
        Err(SessionError::UnknownToken)
    ));

    ctx.clock.advance(IDLE_TTL + Duration::from_secs(1));
    assert!(matches!(
        coordinator.refresh(&second.refresh_token).await,
        Err(SessionError::IdleTimeoutExceeded)
    ));
    assert!(ctx.store.is_empty());
}

#[tokio::test]
async fn test_new_access_credential_validates() {
    let ctx = setup();
    let coordinator = ctx.server.session_coordinator.clone();

    let tokens = coordinator.login(alice()).await.expect("login");
    let refreshed = coordinator
        .refresh(&tokens.refresh_token)
        .await
        .expect("refresh");

    let state = ctx
        .server
        .authenticator
        .resolve(Some(&refreshed.access_token));
    assert_eq!(state, AuthState::Authenticated(alice()));
}

#[tokio::test]
async fn test_second_login_supersedes_first_session() {
    let ctx = setup();
    let coordinator = ctx.server.session_coordinator.clone();

    let laptop = coordinator.login(alice()).await.expect("login");
    let phone = coordinator.login(alice()).await.expect("login");

    assert_eq!(ctx.store.record_count_for_user(UserId(42)), 1);
    assert!(matches!(
        coordinator.refresh(&laptop.refresh_token).await,
        Err(SessionError::UnknownToken)
    ));
    assert!(coordinator.refresh(&phone.refresh_token).await.is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_refresh_has_exactly_one_winner() {
    let ctx = setup();
    let coordinator = ctx.server.session_coordinator.clone();
    let tokens = coordinator.login(alice()).await.expect("login");

    let attempts = (0..8).map(|_| {
        let coordinator = coordinator.clone();
        let token = tokens.refresh_token.clone();
        tokio::spawn(async move { coordinator.refresh(&token).await })
    });
    let results = futures_util::future::join_all(attempts).await;

    let mut winners = 0;
    for result in results {
        match result.expect("task") {
            Ok(_) => winners += 1,
            Err(SessionError::UnknownToken) => {}
            Err(e) => panic!("unexpected refresh error: {e}"),
        }
    }
    assert_eq!(winners, 1);
    assert_eq!(ctx.store.record_count_for_user(UserId(42)), 1);
}

#[tokio::test]
async fn test_absolute_timeout_beats_activity() {
    let ctx = setup();
    let coordinator = ctx.server.session_coordinator.clone();
    let tokens = coordinator.login(alice()).await.expect("login");

    // Keep the record busy: idle never fires, the absolute window still does.
    let step = Duration::from_secs(6 * 24 * 60 * 60);
    for _ in 0..5 {
        ctx.clock.advance(step);
        ctx.store
            .touch(&tokens.refresh_token)
            .await
            .expect("still alive");
    }
    ctx.clock.advance(Duration::from_secs(24 * 60 * 60));

    assert!(matches!(
        coordinator.refresh(&tokens.refresh_token).await,
        Err(SessionError::AbsoluteTimeoutExceeded)
    ));
}

#[tokio::test]
async fn test_logout_is_idempotent() {
    let ctx = setup();
    let coordinator = ctx.server.session_coordinator.clone();
    let tokens = coordinator.login(alice()).await.expect("login");

    coordinator.logout(&tokens.refresh_token).await.expect("logout");
    coordinator.logout(&tokens.refresh_token).await.expect("second logout");
    coordinator.logout("never-issued").await.expect("unknown logout");

    assert!(matches!(
        coordinator.refresh(&tokens.refresh_token).await,
        Err(SessionError::UnknownToken)
    ));
}

#[tokio::test]
async fn test_revoke_user_ends_every_session() {
    let ctx = setup();
    let coordinator = ctx.server.session_coordinator.clone();
    let tokens = coordinator.login(alice()).await.expect("login");

    assert_eq!(coordinator.revoke_user(UserId(42)).await.expect("revoke"), 1);
    assert_eq!(coordinator.revoke_user(UserId(42)).await.expect("revoke"), 0);
    assert!(matches!(
        coordinator.refresh(&tokens.refresh_token).await,
        Err(SessionError::UnknownToken)
    ));
}
