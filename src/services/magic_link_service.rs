use crate::clock::Clock;
use crate::models::{MagicLink, User};
use crate::repositories::magic_link_repository::MagicLinkRepository;
use crate::repositories::RepositoryError;
use crate::token::TokenGenerator;
use chrono::Duration;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum MagicLinkError {
    /// Unknown, already used, or expired. Deliberately merged so callers
    /// cannot learn why a token failed.
    #[error("Token is not redeemable")]
    TokenInvalid,
    #[error("Generated token collided with an existing record")]
    TokenCollision,
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Owns the magic link lifecycle: mint, single-use consumption, and the
/// expired-record sweep.
pub struct MagicLinkService {
    repository: Arc<dyn MagicLinkRepository>,
    tokens: Arc<dyn TokenGenerator>,
    clock: Arc<dyn Clock>,
    token_bytes: usize,
}

impl MagicLinkService {
    pub fn new(
        repository: Arc<dyn MagicLinkRepository>,
        tokens: Arc<dyn TokenGenerator>,
        clock: Arc<dyn Clock>,
        token_bytes: usize,
    ) -> Self {
        Self {
            repository,
            tokens,
            clock,
            token_bytes,
        }
    }

    /// Mint and persist a link for `user`, valid for `ttl_minutes`. The
    /// returned record carries the plaintext token; this is the only
    /// point where it is handed out.
    pub async fn issue(&self, user: &User, ttl_minutes: i64) -> Result<MagicLink, MagicLinkError> {
        let now = self.clock.now();
        let link = MagicLink {
            id: Uuid::new_v4().to_string(),
            user_id: user.id.clone(),
            token: self.tokens.generate(self.token_bytes),
            expires_at: now + Duration::minutes(ttl_minutes),
            is_used: false,
            created_at: now,
        };

        match self.repository.insert(&link).await {
            Ok(()) => Ok(link),
            Err(RepositoryError::DuplicateToken) => Err(MagicLinkError::TokenCollision),
            Err(e) => Err(e.into()),
        }
    }

    /// Atomically consume `token`. Succeeds at most once per token; every
    /// other outcome is the indistinguishable `TokenInvalid`.
    pub async fn redeem(&self, token: &str) -> Result<MagicLink, MagicLinkError> {
        self.repository
            .consume(token, self.clock.now())
            .await?
            .ok_or(MagicLinkError::TokenInvalid)
    }

    /// Remove every record past its expiry, used or not. Safe to run
    /// concurrently with issuance and redemption of live tokens.
    pub async fn sweep_expired(&self) -> Result<u64, MagicLinkError> {
        Ok(self.repository.delete_expired(self.clock.now()).await?)
    }
}
