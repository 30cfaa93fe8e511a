use chrono::Utc;
use smartkitchen::{
    clock::Clock,
    models::{MagicLink, TokenState, User},
    repositories::{MagicLinkRepository, SqliteMagicLinkRepository, SqliteUserRepository, UserRepository},
    services::magic_link_service::{MagicLinkError, MagicLinkService},
    test_utils::test_helpers::{self, ManualClock},
    token::OsRngTokenGenerator,
};
use std::sync::Arc;

struct Harness {
    service: MagicLinkService,
    repository: Arc<SqliteMagicLinkRepository>,
    clock: Arc<ManualClock>,
    user: User,
}

async fn harness(pool: sqlx::SqlitePool) -> Harness {
    let user_id = test_helpers::insert_test_user(&pool, "link@example.com", "link", true)
        .await
        .unwrap();
    let user = SqliteUserRepository::new(pool.clone())
        .find_by_id(&user_id)
        .await
        .unwrap()
        .unwrap();

    let repository = Arc::new(SqliteMagicLinkRepository::new(pool));
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let service = MagicLinkService::new(
        repository.clone(),
        Arc::new(OsRngTokenGenerator),
        clock.clone(),
        32,
    );

    Harness {
        service,
        repository,
        clock,
        user,
    }
}

async fn find(repository: &SqliteMagicLinkRepository, token: &str) -> Option<MagicLink> {
    repository.find_by_token(token).await.unwrap()
}

#[tokio::test]
async fn test_issue_then_redeem_succeeds_once() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let h = harness(pool).await;

    let link = h.service.issue(&h.user, 15).await.unwrap();
    assert_eq!(link.state(h.clock.now()), TokenState::Pending);

    let redeemed = h.service.redeem(&link.token).await.unwrap();
    assert_eq!(redeemed.user_id, h.user.id);
    assert!(redeemed.is_used);
    assert_eq!(redeemed.state(h.clock.now()), TokenState::Redeemed);
}

#[tokio::test]
async fn test_second_redeem_fails_regardless_of_elapsed_time() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let h = harness(pool).await;

    let link = h.service.issue(&h.user, 15).await.unwrap();
    h.service.redeem(&link.token).await.unwrap();

    let immediately = h.service.redeem(&link.token).await;
    assert!(matches!(immediately, Err(MagicLinkError::TokenInvalid)));

    h.clock.advance_minutes(1);
    let later = h.service.redeem(&link.token).await;
    assert!(matches!(later, Err(MagicLinkError::TokenInvalid)));
}

#[tokio::test]
async fn test_expired_token_fails_even_if_never_used() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let h = harness(pool).await;

    let link = h.service.issue(&h.user, 15).await.unwrap();
    h.clock.advance_minutes(16);

    assert_eq!(
        find(&h.repository, &link.token).await.unwrap().state(h.clock.now()),
        TokenState::Expired
    );

    let result = h.service.redeem(&link.token).await;
    assert!(matches!(result, Err(MagicLinkError::TokenInvalid)));
}

#[tokio::test]
async fn test_unknown_token_is_indistinguishable_from_expired() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let h = harness(pool).await;

    let result = h.service.redeem("never-issued").await;
    assert!(matches!(result, Err(MagicLinkError::TokenInvalid)));
}

#[tokio::test]
async fn test_sweep_removes_exactly_the_past_expiry_rows() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let h = harness(pool).await;

    let short = h.service.issue(&h.user, 5).await.unwrap();
    let long = h.service.issue(&h.user, 60).await.unwrap();
    // Redeemed but not yet expired: must survive the sweep
    let redeemed = h.service.issue(&h.user, 60).await.unwrap();
    h.service.redeem(&redeemed.token).await.unwrap();

    h.clock.advance_minutes(10);
    let removed = h.service.sweep_expired().await.unwrap();
    assert_eq!(removed, 1);

    assert!(find(&h.repository, &short.token).await.is_none());
    assert!(find(&h.repository, &long.token).await.is_some());
    assert!(find(&h.repository, &redeemed.token).await.is_some());

    // Idempotent: nothing left to remove
    assert_eq!(h.service.sweep_expired().await.unwrap(), 0);
}

#[tokio::test]
async fn test_sweep_removes_used_tokens_past_expiry() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let h = harness(pool).await;

    let link = h.service.issue(&h.user, 5).await.unwrap();
    h.service.redeem(&link.token).await.unwrap();

    h.clock.advance_minutes(10);
    assert_eq!(h.service.sweep_expired().await.unwrap(), 1);
    assert!(find(&h.repository, &link.token).await.is_none());
}
