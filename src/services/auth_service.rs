use crate::config::AuthConfig;
use crate::models::User;
use crate::repositories::user_repository::UserRepository;
use crate::repositories::RepositoryError;
use crate::services::email_service::{EmailError, EmailService};
use crate::services::magic_link_service::{MagicLinkError, MagicLinkService};
use crate::services::user_service::{UserService, UserServiceError};
use crate::token::TokenGenerator;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Surfaced distinctly at both the request and redeem stages, unlike
    /// token failures which stay generic.
    #[error("User account is inactive")]
    UserInactive,
    #[error("Invalid or expired token")]
    TokenInvalid,
    #[error("Magic link delivery failed: {0}")]
    DeliveryFailed(#[from] EmailError),
    #[error("User service error: {0}")]
    UserService(#[from] UserServiceError),
    #[error("Magic link error: {0}")]
    MagicLink(MagicLinkError),
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Outcome of a successful "request link" call.
#[derive(Debug, Clone)]
pub struct LinkRequested {
    pub email: String,
    pub expires_in_minutes: i64,
}

/// Outcome of a successful redemption: the owning user plus a freshly
/// minted opaque session credential. The core does not store or expire
/// the credential; the transport layer carries it as a cookie.
#[derive(Debug, Clone)]
pub struct AuthenticatedSession {
    pub user: User,
    pub session_token: String,
}

/// Orchestrates the magic link flows over the user directory, the link
/// store, and the notification channel.
pub struct AuthService {
    user_service: Arc<UserService>,
    magic_links: Arc<MagicLinkService>,
    user_repository: Arc<dyn UserRepository>,
    email_service: Arc<dyn EmailService>,
    tokens: Arc<dyn TokenGenerator>,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(
        user_service: Arc<UserService>,
        magic_links: Arc<MagicLinkService>,
        user_repository: Arc<dyn UserRepository>,
        email_service: Arc<dyn EmailService>,
        tokens: Arc<dyn TokenGenerator>,
        config: AuthConfig,
    ) -> Self {
        Self {
            user_service,
            magic_links,
            user_repository,
            email_service,
            tokens,
            config,
        }
    }

    /// Request a magic link for `email`, provisioning the user on first
    /// sight. Inactive accounts are rejected before a link is minted.
    ///
    /// If delivery fails the operation fails, but the already persisted
    /// token is not rolled back and remains redeemable until it expires.
    pub async fn request_link(
        &self,
        email: &str,
        full_name: Option<&str>,
    ) -> Result<LinkRequested, AuthError> {
        let user = self.user_service.resolve_or_create(email, full_name).await?;

        if !user.is_active {
            return Err(AuthError::UserInactive);
        }

        let ttl_minutes = self.config.ttl_minutes;
        let link = self
            .magic_links
            .issue(&user, ttl_minutes)
            .await
            .map_err(AuthError::MagicLink)?;

        tracing::info!("Issued magic link for {}", user.email);

        self.email_service
            .send_magic_link(&user.email, &link.token, link.expires_at)
            .await?;

        Ok(LinkRequested {
            email: user.email,
            expires_in_minutes: ttl_minutes,
        })
    }

    /// Redeem a magic link token. Unknown, used, and expired tokens all
    /// fail with the same `TokenInvalid`; an inactive owner fails with
    /// `UserInactive` even though the token itself was consumed.
    pub async fn redeem_link(&self, token: &str) -> Result<AuthenticatedSession, AuthError> {
        let link = match self.magic_links.redeem(token).await {
            Ok(link) => link,
            Err(MagicLinkError::TokenInvalid) => return Err(AuthError::TokenInvalid),
            Err(e) => return Err(AuthError::MagicLink(e)),
        };

        let user = self
            .user_repository
            .find_by_id(&link.user_id)
            .await?
            .ok_or(AuthError::Repository(RepositoryError::NotFound))?;

        if !user.is_active {
            return Err(AuthError::UserInactive);
        }

        // Independent secret, not derived from the magic link token
        let session_token = self.tokens.generate(self.config.session_token_bytes);

        tracing::info!("User {} authenticated via magic link", user.email);

        Ok(AuthenticatedSession {
            user,
            session_token,
        })
    }

    /// Periodic maintenance: drop every token past its expiry.
    pub async fn sweep_expired(&self) -> Result<u64, AuthError> {
        self.magic_links
            .sweep_expired()
            .await
            .map_err(AuthError::MagicLink)
    }
}
