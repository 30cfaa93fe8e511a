use crate::repositories::RepositoryError;
use crate::services::auth_service::AuthError;
use crate::services::user_service::UserServiceError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

// Type alias for Result with our AppError
pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid or expired token")]
    TokenInvalid,

    #[error("User account is inactive")]
    UserInactive,

    #[error("Failed to send magic link email")]
    DeliveryFailed,

    #[error("Internal server error")]
    InternalError,

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::UserInactive => AppError::UserInactive,
            AuthError::TokenInvalid => AppError::TokenInvalid,
            AuthError::DeliveryFailed(e) => {
                tracing::error!("Magic link delivery failed: {}", e);
                AppError::DeliveryFailed
            }
            AuthError::UserService(UserServiceError::InvalidEmail) => {
                AppError::Validation("Invalid email address".to_string())
            }
            AuthError::UserService(e) => {
                tracing::error!("User provisioning failed: {}", e);
                AppError::InternalError
            }
            AuthError::Repository(RepositoryError::Database(e)) => AppError::Database(e),
            AuthError::MagicLink(e) => {
                tracing::error!("Magic link store failure: {}", e);
                AppError::InternalError
            }
            AuthError::Repository(e) => {
                tracing::error!("Repository failure: {}", e);
                AppError::InternalError
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::TokenInvalid => (
                StatusCode::UNAUTHORIZED,
                "Invalid or expired token. Please request a new magic link.".to_string(),
            ),
            AppError::UserInactive => (
                StatusCode::FORBIDDEN,
                "User account is inactive. Please contact support.".to_string(),
            ),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::DeliveryFailed => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to send magic link email. Please try again.".to_string(),
            ),
            AppError::Database(_) | AppError::InternalError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = json!({ "error": error_message });

        (status, Json(body)).into_response()
    }
}
