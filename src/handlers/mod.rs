pub mod auth_handlers;

use crate::AppState;
use axum::{routing::post, Router};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/magic-link", post(auth_handlers::request_magic_link))
        .route("/auth/verify", post(auth_handlers::verify_magic_link))
        .route("/auth/logout", post(auth_handlers::logout))
}
