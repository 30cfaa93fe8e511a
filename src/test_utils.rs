pub mod test_helpers {
    use crate::clock::{Clock, SystemClock};
    use crate::config::AuthConfig;
    use crate::repositories::{SqliteMagicLinkRepository, SqliteUserRepository};
    use crate::services::auth_service::AuthService;
    use crate::services::email_service::EmailService;
    use crate::services::magic_link_service::MagicLinkService;
    use crate::services::user_service::UserService;
    use crate::token::OsRngTokenGenerator;
    use chrono::{DateTime, SecondsFormat, Utc};
    use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
    use std::sync::Arc;
    use tempfile::NamedTempFile;
    use uuid::Uuid;

    /// Create a new in-memory SQLite database for testing
    pub async fn create_test_db() -> Result<SqlitePool, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await?;

        // Run migrations
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(pool)
    }

    /// Create a temporary file-based SQLite database for testing.
    /// Needed when a test requires multiple connections (an in-memory
    /// database is private to its single connection).
    pub async fn create_test_db_file() -> Result<(SqlitePool, NamedTempFile), sqlx::Error> {
        let temp_file = NamedTempFile::new().map_err(sqlx::Error::Io)?;
        let db_path = temp_file
            .path()
            .to_str()
            .ok_or_else(|| sqlx::Error::Configuration("Invalid database path".into()))?;
        let database_url = format!("sqlite://{}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await?;

        // Run migrations
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok((pool, temp_file))
    }

    /// Insert a test user directly, bypassing the directory service
    pub async fn insert_test_user(
        pool: &SqlitePool,
        email: &str,
        username: &str,
        is_active: bool,
    ) -> Result<String, sqlx::Error> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

        sqlx::query(
            r#"
            INSERT INTO users (id, email, username, full_name, role, is_active, preferences, created_at, updated_at)
            VALUES (?, ?, ?, ?, 'user', ?, '{}', ?, ?)
            "#,
        )
        .bind(&id)
        .bind(email)
        .bind(username)
        .bind(username)
        .bind(is_active)
        .bind(&now)
        .bind(&now)
        .execute(pool)
        .await?;

        Ok(id)
    }

    /// Flip a user's active flag directly
    pub async fn set_user_active(
        pool: &SqlitePool,
        user_id: &str,
        is_active: bool,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET is_active = ? WHERE id = ?")
            .bind(is_active)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Wire a full `AuthService` over `pool` with the given collaborators,
    /// mirroring the wiring in `main`.
    pub fn build_auth_service(
        pool: SqlitePool,
        email_service: Arc<dyn EmailService>,
        clock: Arc<dyn Clock>,
        config: AuthConfig,
    ) -> Arc<AuthService> {
        let tokens = Arc::new(OsRngTokenGenerator);
        let user_repository = Arc::new(SqliteUserRepository::new(pool.clone()));
        let magic_link_repository = Arc::new(SqliteMagicLinkRepository::new(pool));

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

        Arc::new(AuthService::new(
            user_service,
            magic_link_service,
            user_repository,
            email_service,
            tokens,
            config,
        ))
    }

    /// Convenience wiring with the system clock and default config.
    pub fn build_default_auth_service(
        pool: SqlitePool,
        email_service: Arc<dyn EmailService>,
    ) -> Arc<AuthService> {
        build_auth_service(
            pool,
            email_service,
            Arc::new(SystemClock),
            AuthConfig::default(),
        )
    }

    /// Test clock that only moves when told to.
    pub struct ManualClock {
        now: std::sync::Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        pub fn new(start: DateTime<Utc>) -> Self {
            Self {
                now: std::sync::Mutex::new(start),
            }
        }

        pub fn advance_minutes(&self, minutes: i64) {
            let mut now = self.now.lock().expect("clock lock poisoned");
            *now += chrono::Duration::minutes(minutes);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().expect("clock lock poisoned")
        }
    }

    /// Notification channel fake that records every delivery instead of
    /// sending, and can be told to fail on demand.
    pub struct RecordingEmailService {
        sent: std::sync::Mutex<Vec<SentMagicLink>>,
        failing: std::sync::atomic::AtomicBool,
    }

    #[derive(Debug, Clone)]
    pub struct SentMagicLink {
        pub to: String,
        pub token: String,
        pub expires_at: DateTime<Utc>,
    }

    impl RecordingEmailService {
        pub fn new() -> Self {
            Self {
                sent: std::sync::Mutex::new(Vec::new()),
                failing: std::sync::atomic::AtomicBool::new(false),
            }
        }

        pub fn set_failing(&self, failing: bool) {
            self.failing
                .store(failing, std::sync::atomic::Ordering::SeqCst);
        }

        pub fn sent(&self) -> Vec<SentMagicLink> {
            self.sent.lock().expect("sent lock poisoned").clone()
        }

        pub fn last_token(&self) -> Option<String> {
            self.sent
                .lock()
                .expect("sent lock poisoned")
                .last()
                .map(|s| s.token.clone())
        }
    }

    impl Default for RecordingEmailService {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait::async_trait]
    impl EmailService for RecordingEmailService {
        async fn send_magic_link(
            &self,
            to_email: &str,
            token: &str,
            expires_at: DateTime<Utc>,
        ) -> Result<(), crate::services::email_service::EmailError> {
            if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(crate::services::email_service::EmailError::SendFailed(
                    "simulated delivery failure".to_string(),
                ));
            }

            self.sent
                .lock()
                .expect("sent lock poisoned")
                .push(SentMagicLink {
                    to: to_email.to_string(),
                    token: token.to_string(),
                    expires_at,
                });
            Ok(())
        }
    }
}
