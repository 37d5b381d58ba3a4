use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints that need no credential. Registration and login are how a client
/// obtains one; the reset endpoints answer uniformly so they cannot be used to
/// probe for accounts.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for monitoring and load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /api/auth/register (multipart)
        // Creates the account and its profile, with optional avatar and cover image.
        .route("/api/auth/register", post(handlers::accounts::register))
        // POST /api/auth/login
        // Returns a signed token carrying the user's id, email and role.
        .route("/api/auth/login", post(handlers::accounts::login))
        // POST /api/auth/password-reset/request
        .route(
            "/api/auth/password-reset/request",
            post(handlers::accounts::request_password_reset),
        )
        // POST /api/auth/password-reset/reset
        .route(
            "/api/auth/password-reset/reset",
            post(handlers::accounts::reset_password),
        )
        // GET /api/profiles/{user_id}
        .route(
            "/api/profiles/{user_id}",
            get(handlers::profiles::get_profile),
        )
}
