use crate::models::{User, UserRole};
use crate::repositories::{format_timestamp, parse_timestamp, RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Fields for a user created by the magic link flow. There is no password
/// credential: this application only supports passwordless entry.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub full_name: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub preferences: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait UserRepository: Send + Sync {
    /// Insert a new user. The store's uniqueness constraints on email and
    /// username are the final backstop against concurrent creation; the
    /// two violations are reported distinctly so callers can react to
    /// each race differently.
    async fn insert(&self, user: &NewUser) -> RepositoryResult<User>;
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>>;
    async fn find_by_username(&self, username: &str) -> RepositoryResult<Option<User>>;
}

pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str =
    "id, email, username, full_name, role, is_active, preferences, created_at, updated_at";

fn map_user(row: &SqliteRow) -> RepositoryResult<User> {
    let role_raw: String = row.try_get("role")?;
    let role: UserRole = role_raw
        .parse()
        .map_err(|e: String| RepositoryError::Database(sqlx::Error::Decode(e.into())))?;

    let preferences_raw: String = row.try_get("preferences")?;
    let preferences = serde_json::from_str(&preferences_raw)
        .map_err(|e| RepositoryError::Database(sqlx::Error::Decode(Box::new(e))))?;

    let created_at_raw: String = row.try_get("created_at")?;
    let updated_at_raw: String = row.try_get("updated_at")?;

    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        username: row.try_get("username")?,
        full_name: row.try_get("full_name")?,
        role,
        is_active: row.try_get("is_active")?,
        preferences,
        created_at: parse_timestamp(&created_at_raw)?,
        updated_at: parse_timestamp(&updated_at_raw)?,
    })
}

fn map_unique_violation(err: sqlx::Error) -> RepositoryError {
    let message = err.to_string();
    if message.contains("users.email") {
        RepositoryError::EmailTaken
    } else if message.contains("users.username") {
        RepositoryError::UsernameTaken
    } else {
        RepositoryError::Database(err)
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn insert(&self, user: &NewUser) -> RepositoryResult<User> {
        let id = Uuid::new_v4().to_string();
        let created_at = format_timestamp(user.created_at);
        let preferences = user.preferences.to_string();

        let result = sqlx::query(
            r#"
            INSERT INTO users (id, email, username, full_name, role, is_active, preferences, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.full_name)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .bind(&preferences)
        .bind(&created_at)
        .bind(&created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => self.find_by_id(&id).await?.ok_or(RepositoryError::NotFound),
            Err(e) if e.to_string().contains("UNIQUE") => Err(map_unique_violation(e)),
            Err(e) => Err(RepositoryError::Database(e)),
        }
    }

    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(map_user).transpose()
    }

    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE email = ?",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_user).transpose()
    }

    async fn find_by_username(&self, username: &str) -> RepositoryResult<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE username = ?",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_user).transpose()
    }
}
