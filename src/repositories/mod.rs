pub mod magic_link_repository;
pub mod user_repository;

pub use magic_link_repository::{MagicLinkRepository, SqliteMagicLinkRepository};
pub use user_repository::{NewUser, SqliteUserRepository, UserRepository};

use chrono::{DateTime, SecondsFormat, Utc};

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Record not found")]
    NotFound,
    #[error("Email already registered")]
    EmailTaken,
    #[error("Username already taken")]
    UsernameTaken,
    #[error("Token already exists")]
    DuplicateToken,
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Timestamps are stored as fixed-width RFC 3339 strings so SQL string
/// comparison matches chronological order.
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(raw: &str) -> RepositoryResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Database(sqlx::Error::Decode(Box::new(e))))
}
