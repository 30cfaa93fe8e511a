use crate::models::MagicLink;
use crate::repositories::{format_timestamp, parse_timestamp, RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait MagicLinkRepository: Send + Sync {
    /// Persist a freshly minted link. A duplicate token string violates
    /// the unique constraint and is reported as `DuplicateToken`, never
    /// silently accepted.
    async fn insert(&self, link: &MagicLink) -> RepositoryResult<()>;
    async fn find_by_token(&self, token: &str) -> RepositoryResult<Option<MagicLink>>;
    /// Atomically flip `is_used` on a row that is still redeemable at
    /// `now`. Returns the consumed record, or `None` when no row matched
    /// (unknown token, already used, or expired). Concurrent calls on the
    /// same token can never both observe a matching row.
    async fn consume(&self, token: &str, now: DateTime<Utc>) -> RepositoryResult<Option<MagicLink>>;
    /// Delete every row past its expiry, used or not. Returns the count.
    async fn delete_expired(&self, now: DateTime<Utc>) -> RepositoryResult<u64>;
}

pub struct SqliteMagicLinkRepository {
    pool: SqlitePool,
}

impl SqliteMagicLinkRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn map_link(row: &SqliteRow) -> RepositoryResult<MagicLink> {
    let expires_at_raw: String = row.try_get("expires_at")?;
    let created_at_raw: String = row.try_get("created_at")?;

    Ok(MagicLink {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        token: row.try_get("token")?,
        expires_at: parse_timestamp(&expires_at_raw)?,
        is_used: row.try_get("is_used")?,
        created_at: parse_timestamp(&created_at_raw)?,
    })
}

#[async_trait]
impl MagicLinkRepository for SqliteMagicLinkRepository {
    async fn insert(&self, link: &MagicLink) -> RepositoryResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO magic_links (id, user_id, token, expires_at, is_used, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&link.id)
        .bind(&link.user_id)
        .bind(&link.token)
        .bind(format_timestamp(link.expires_at))
        .bind(link.is_used)
        .bind(format_timestamp(link.created_at))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().contains("magic_links.token") => {
                Err(RepositoryError::DuplicateToken)
            }
            Err(e) => Err(RepositoryError::Database(e)),
        }
    }

    async fn find_by_token(&self, token: &str) -> RepositoryResult<Option<MagicLink>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, token, expires_at, is_used, created_at
            FROM magic_links
            WHERE token = ?
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_link).transpose()
    }

    async fn consume(&self, token: &str, now: DateTime<Utc>) -> RepositoryResult<Option<MagicLink>> {
        // Single conditional mutation: the validity check and the flip
        // happen in one statement, so two racing redemptions cannot both
        // match the row.
        let result = sqlx::query(
            r#"
            UPDATE magic_links
            SET is_used = 1
            WHERE token = ? AND is_used = 0 AND expires_at > ?
            "#,
        )
        .bind(token)
        .bind(format_timestamp(now))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.find_by_token(token)
            .await?
            .ok_or(RepositoryError::NotFound)
            .map(Some)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> RepositoryResult<u64> {
        let result = sqlx::query("DELETE FROM magic_links WHERE expires_at < ?")
            .bind(format_timestamp(now))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_helpers;
    use chrono::Duration;
    use uuid::Uuid;

    fn link(user_id: &str, token: &str, expires_at: DateTime<Utc>) -> MagicLink {
        MagicLink {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            token: token.to_string(),
            expires_at,
            is_used: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_duplicate_token_rejected() {
        let pool = test_helpers::create_test_db().await.unwrap();
        let user_id = test_helpers::insert_test_user(&pool, "t@example.com", "t", true)
            .await
            .unwrap();
        let repo = SqliteMagicLinkRepository::new(pool);

        let expires = Utc::now() + Duration::minutes(15);
        repo.insert(&link(&user_id, "same-token", expires)).await.unwrap();

        let result = repo.insert(&link(&user_id, "same-token", expires)).await;
        assert!(matches!(result, Err(RepositoryError::DuplicateToken)));
    }

    #[tokio::test]
    async fn test_consume_unknown_token() {
        let pool = test_helpers::create_test_db().await.unwrap();
        let repo = SqliteMagicLinkRepository::new(pool);

        let consumed = repo.consume("nope", Utc::now()).await.unwrap();
        assert!(consumed.is_none());
    }

    #[tokio::test]
    async fn test_consume_marks_used() {
        let pool = test_helpers::create_test_db().await.unwrap();
        let user_id = test_helpers::insert_test_user(&pool, "c@example.com", "c", true)
            .await
            .unwrap();
        let repo = SqliteMagicLinkRepository::new(pool);

        let now = Utc::now();
        repo.insert(&link(&user_id, "tok", now + Duration::minutes(15)))
            .await
            .unwrap();

        let consumed = repo.consume("tok", now).await.unwrap().unwrap();
        assert!(consumed.is_used);
        assert_eq!(consumed.user_id, user_id);

        // Second consume finds nothing redeemable
        assert!(repo.consume("tok", now).await.unwrap().is_none());
    }
}
