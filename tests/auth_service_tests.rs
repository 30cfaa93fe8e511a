use chrono::Utc;
use smartkitchen::{
    config::AuthConfig,
    services::auth_service::AuthError,
    test_utils::test_helpers::{self, ManualClock, RecordingEmailService},
};
use std::sync::Arc;

#[tokio::test]
async fn test_request_and_redeem_scenario() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let email_service = Arc::new(RecordingEmailService::new());
    let service = test_helpers::build_default_auth_service(pool, email_service.clone());

    // Request a link for a brand-new email
    let outcome = service.request_link("new@example.com", None).await.unwrap();
    assert_eq!(outcome.email, "new@example.com");
    assert_eq!(outcome.expires_in_minutes, 15);

    let sent = email_service.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "new@example.com");

    // Redeem within the window
    let session = service.redeem_link(&sent[0].token).await.unwrap();
    assert_eq!(session.user.email, "new@example.com");
    assert_eq!(session.user.username, "new");
    // Independent 48-byte session credential, hex encoded
    assert_eq!(session.session_token.len(), 96);
    assert_ne!(session.session_token, sent[0].token);

    // Redeem again: single-use
    let again = service.redeem_link(&sent[0].token).await;
    assert!(matches!(again, Err(AuthError::TokenInvalid)));
}

#[tokio::test]
async fn test_request_for_existing_email_creates_no_new_user() {
    let pool = test_helpers::create_test_db().await.unwrap();
    test_helpers::insert_test_user(&pool, "old@example.com", "old", true)
        .await
        .unwrap();
    let email_service = Arc::new(RecordingEmailService::new());
    let service = test_helpers::build_default_auth_service(pool.clone(), email_service);

    service.request_link("old@example.com", None).await.unwrap();

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_inactive_user_cannot_request_link() {
    let pool = test_helpers::create_test_db().await.unwrap();
    test_helpers::insert_test_user(&pool, "gone@example.com", "gone", false)
        .await
        .unwrap();
    let email_service = Arc::new(RecordingEmailService::new());
    let service = test_helpers::build_default_auth_service(pool, email_service.clone());

    let result = service.request_link("gone@example.com", None).await;
    assert!(matches!(result, Err(AuthError::UserInactive)));
    // Nothing was handed to the channel
    assert!(email_service.sent().is_empty());
}

#[tokio::test]
async fn test_inactive_user_cannot_redeem_valid_token() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let user_id = test_helpers::insert_test_user(&pool, "late@example.com", "late", true)
        .await
        .unwrap();
    let email_service = Arc::new(RecordingEmailService::new());
    let service = test_helpers::build_default_auth_service(pool.clone(), email_service.clone());

    service.request_link("late@example.com", None).await.unwrap();
    let token = email_service.last_token().unwrap();

    // Account deactivated between request and redeem
    test_helpers::set_user_active(&pool, &user_id, false)
        .await
        .unwrap();

    let result = service.redeem_link(&token).await;
    // Distinct from the generic invalid-token outcome
    assert!(matches!(result, Err(AuthError::UserInactive)));
}

#[tokio::test]
async fn test_delivery_failure_aborts_request_but_token_stays_usable() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let email_service = Arc::new(RecordingEmailService::new());
    let service = test_helpers::build_default_auth_service(pool.clone(), email_service.clone());

    email_service.set_failing(true);
    let result = service.request_link("flaky@example.com", None).await;
    assert!(matches!(result, Err(AuthError::DeliveryFailed(_))));

    // No compensating rollback: the persisted token is still redeemable
    let token: String = sqlx::query_scalar("SELECT token FROM magic_links")
        .fetch_one(&pool)
        .await
        .unwrap();
    let session = service.redeem_link(&token).await.unwrap();
    assert_eq!(session.user.email, "flaky@example.com");
}

#[tokio::test]
async fn test_expiry_boundary_with_manual_clock() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let email_service = Arc::new(RecordingEmailService::new());
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let service = test_helpers::build_auth_service(
        pool,
        email_service.clone(),
        clock.clone(),
        AuthConfig::default(),
    );

    service.request_link("edge@example.com", None).await.unwrap();
    let token = email_service.last_token().unwrap();

    // One minute past the 15 minute default TTL
    clock.advance_minutes(16);
    let result = service.redeem_link(&token).await;
    assert!(matches!(result, Err(AuthError::TokenInvalid)));
}

#[tokio::test]
async fn test_parallel_redemptions_yield_exactly_one_success() {
    // File-backed database: every task needs its own connection
    let (pool, _guard) = test_helpers::create_test_db_file().await.unwrap();
    let email_service = Arc::new(RecordingEmailService::new());
    let service = test_helpers::build_default_auth_service(pool, email_service.clone());

    service.request_link("race@example.com", None).await.unwrap();
    let token = email_service.last_token().unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = service.clone();
        let token = token.clone();
        handles.push(tokio::spawn(
            async move { service.redeem_link(&token).await },
        ));
    }

    let mut successes = 0;
    let mut invalid = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(AuthError::TokenInvalid) => invalid += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(invalid, 7);
}

#[tokio::test]
async fn test_sweep_through_the_service() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let email_service = Arc::new(RecordingEmailService::new());
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let service = test_helpers::build_auth_service(
        pool.clone(),
        email_service,
        clock.clone(),
        AuthConfig::default(),
    );

    service.request_link("sweep@example.com", None).await.unwrap();
    clock.advance_minutes(20);

    assert_eq!(service.sweep_expired().await.unwrap(), 1);

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM magic_links")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}
