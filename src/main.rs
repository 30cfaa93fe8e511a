use smartkitchen::{
    clock::SystemClock,
    config::AuthConfig,
    db, handlers,
    repositories::{SqliteMagicLinkRepository, SqliteUserRepository},
    services::{create_email_service, AuthService, MagicLinkService, UserService},
    token::OsRngTokenGenerator,
    AppState,
};

use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SWEEP_INTERVAL_SECS: u64 = 3600;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "smartkitchen=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Database connection
    let pool = db::create_pool().await?;

    // Run migrations
    sqlx::migrate!("./migrations").run(&pool).await?;

    let config = AuthConfig::from_env();
    let clock = Arc::new(SystemClock);
    let tokens = Arc::new(OsRngTokenGenerator);

    // Initialize repositories
    let user_repository = Arc::new(SqliteUserRepository::new(pool.clone()));
    let magic_link_repository = Arc::new(SqliteMagicLinkRepository::new(pool.clone()));

    // Initialize services
    let user_service = Arc::new(UserService::new(
        user_repository.clone(),
        clock.clone(),
        config.max_username_attempts,
    ));
    let magic_link_service = Arc::new(MagicLinkService::new(
        magic_link_repository,
        tokens.clone(),
        clock,
        config.token_bytes,
    ));
    let email_service = create_email_service();
    let auth_service = Arc::new(AuthService::new(
        user_service,
        magic_link_service,
        user_repository,
        email_service,
        tokens,
        config,
    ));

    // Periodic expired-token sweep, off the request path
    let sweeper = auth_service.clone();
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(SWEEP_INTERVAL_SECS));
        loop {
            interval.tick().await;
            match sweeper.sweep_expired().await {
                Ok(0) => {}
                Ok(count) => tracing::info!("Swept {} expired magic link tokens", count),
                Err(e) => tracing::warn!("Expired token sweep failed: {}", e),
            }
        }
    });

    let app_state = AppState { auth_service };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = handlers::router()
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
