//! Thin request/response mapping over `AuthService`. All state machine
//! and security reasoning lives in the service layer.

use crate::error::AppError;
use crate::models::{User, UserRole};
use crate::AppState;
use axum::extract::{Json, State};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::Duration;

const SESSION_COOKIE: &str = "session_token";

#[derive(Debug, Deserialize)]
pub struct MagicLinkRequest {
    pub email: String,
    pub full_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MagicLinkResponse {
    pub message: String,
    pub email: String,
    pub expires_in_minutes: i64,
}

#[derive(Debug, Deserialize)]
pub struct VerifyTokenRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub username: String,
    pub full_name: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            full_name: user.full_name,
            role: user.role,
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VerifyTokenResponse {
    pub message: String,
    pub user: UserResponse,
    pub session_token: String,
}

pub async fn request_magic_link(
    State(state): State<AppState>,
    Json(request): Json<MagicLinkRequest>,
) -> Result<Json<MagicLinkResponse>, AppError> {
    let outcome = state
        .auth_service
        .request_link(&request.email, request.full_name.as_deref())
        .await?;

    Ok(Json(MagicLinkResponse {
        message: "Magic link sent successfully! Check your email.".to_string(),
        email: outcome.email,
        expires_in_minutes: outcome.expires_in_minutes,
    }))
}

pub async fn verify_magic_link(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<VerifyTokenRequest>,
) -> Result<(CookieJar, Json<VerifyTokenResponse>), AppError> {
    let session = state.auth_service.redeem_link(&request.token).await?;

    let cookie = Cookie::build((SESSION_COOKIE, session.session_token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(Duration::hours(24))
        .build();

    Ok((
        jar.add(cookie),
        Json(VerifyTokenResponse {
            message: "Authentication successful!".to_string(),
            user: session.user.into(),
            session_token: session.session_token,
        }),
    ))
}

pub async fn logout(jar: CookieJar) -> (CookieJar, Json<serde_json::Value>) {
    let cookie = Cookie::build((SESSION_COOKIE, "")).path("/").build();
    (
        jar.remove(cookie),
        Json(json!({ "message": "Logged out successfully" })),
    )
}
