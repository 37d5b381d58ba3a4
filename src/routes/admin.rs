use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, put},
};

/// Admin Router Module
///
/// User administration. `create_router` nests this under `/api/admin` and wraps
/// it in the `require_admin` route layer, which authenticates the caller and
/// then demands the 'admin' role before any handler runs.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /api/admin/users
        .route("/users", get(handlers::users::list_users))
        // PUT /api/admin/users/{id}/role
        // Body {"role": "admin" | "author" | "reader"}; anything else is a 400.
        .route("/users/{id}/role", put(handlers::users::update_user_role))
        // DELETE /api/admin/users/{id}
        // Removes the account, its profile and its uploaded files.
        .route("/users/{id}", delete(handlers::users::delete_user))
}
