use crate::clock::Clock;
use crate::models::{User, UserRole};
use crate::repositories::user_repository::{NewUser, UserRepository};
use crate::repositories::RepositoryError;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("Invalid email address")]
    InvalidEmail,
    #[error("No free username found after {0} attempts")]
    UsernameExhausted(u32),
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Directory over the user table: resolves an email to an existing user
/// or provisions one, allocating a unique username from the email's
/// local part.
pub struct UserService {
    repository: Arc<dyn UserRepository>,
    clock: Arc<dyn Clock>,
    max_username_attempts: u32,
}

impl UserService {
    pub fn new(
        repository: Arc<dyn UserRepository>,
        clock: Arc<dyn Clock>,
        max_username_attempts: u32,
    ) -> Self {
        Self {
            repository,
            clock,
            max_username_attempts,
        }
    }

    /// Return the user for `email`, creating one on first sight.
    ///
    /// Idempotent for a known email. For a new email the username is the
    /// local part, suffixed with 1, 2, 3, ... until free. An insert that
    /// loses the uniqueness race on username moves on to the next suffix;
    /// losing it on email means a concurrent request already provisioned
    /// the user, which is then re-fetched and returned.
    pub async fn resolve_or_create(
        &self,
        email: &str,
        full_name: Option<&str>,
    ) -> Result<User, UserServiceError> {
        self.validate_email(email)?;

        if let Some(user) = self.repository.find_by_email(email).await? {
            return Ok(user);
        }

        let base = User::username_candidate(email);

        for attempt in 0..self.max_username_attempts {
            let username = if attempt == 0 {
                base.to_string()
            } else {
                format!("{}{}", base, attempt)
            };

            if self.repository.find_by_username(&username).await?.is_some() {
                continue;
            }

            let new_user = NewUser {
                email: email.to_string(),
                username: username.clone(),
                // Passwordless entry: full name falls back to the username
                full_name: Some(full_name.unwrap_or(&username).to_string()),
                role: UserRole::User,
                is_active: true,
                preferences: serde_json::json!({}),
                created_at: self.clock.now(),
            };

            match self.repository.insert(&new_user).await {
                Ok(user) => {
                    tracing::info!("Created user {} with username {}", user.email, user.username);
                    return Ok(user);
                }
                Err(RepositoryError::UsernameTaken) => continue,
                Err(RepositoryError::EmailTaken) => {
                    return self
                        .repository
                        .find_by_email(email)
                        .await?
                        .ok_or(UserServiceError::Repository(RepositoryError::NotFound));
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(UserServiceError::UsernameExhausted(
            self.max_username_attempts,
        ))
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserServiceError> {
        Ok(self.repository.find_by_email(email).await?)
    }

    fn validate_email(&self, email: &str) -> Result<(), UserServiceError> {
        let local = User::username_candidate(email);
        if !email.contains('@') || email.len() > 255 || local.is_empty() {
            return Err(UserServiceError::InvalidEmail);
        }
        Ok(())
    }
}
