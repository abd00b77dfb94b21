pub mod auth;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod validation;

use std::sync::Arc;

use axum::{
    Json, Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};

use murmur_db::Database;
use murmur_mailer::Mailer;

pub type AppState = Arc<AppStateInner>;

/// Bounds applied to anonymous message content. Policy, not a constant:
/// the bootstrap reads them from the environment.
#[derive(Debug, Clone, Copy)]
pub struct ContentLimits {
    pub min: usize,
    pub max: usize,
}

pub struct AppStateInner {
    pub db: Database,
    pub mailer: Mailer,
    pub jwt_secret: String,
    pub content_limits: ContentLimits,
}

/// Build the full API router over the shared state.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health))
        .route("/api/sign-up", post(auth::sign_up))
        .route("/api/verify-code", post(auth::verify_code))
        .route("/api/sign-in", post(auth::sign_in))
        .route("/api/check-username-unique", get(auth::check_username_unique))
        .route("/api/send-message", post(messages::send_message))
        .with_state(state.clone());

    let protected = Router::new()
        .route("/api/accept-messages", get(messages::get_accept_messages))
        .route("/api/accept-messages", post(messages::set_accept_messages))
        .route("/api/get-messages", get(messages::get_messages))
        .layer(from_fn_with_state(state.clone(), middleware::require_auth))
        .with_state(state);

    public.merge(protected)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "murmur"
    }))
}
