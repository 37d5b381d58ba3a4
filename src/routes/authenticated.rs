use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Routes for any caller with a valid token. The router is wrapped in the
/// authentication layer, so every handler here receives a verified `AuthUser`;
/// role requirements (author to create posts, admin to delete them) and
/// ownership checks are applied inside the handlers.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Posts ---
        // GET/POST /api/posts
        // Listing is open to every role; creating requires 'author' or higher.
        .route(
            "/api/posts",
            get(handlers::posts::list_posts).post(handlers::posts::create_post),
        )
        // GET/PUT/DELETE /api/posts/{id}
        // Update: owner or admin. Delete: admin only, cascades to the post's media.
        .route(
            "/api/posts/{id}",
            get(handlers::posts::get_post)
                .put(handlers::posts::update_post)
                .delete(handlers::posts::delete_post),
        )
        // --- Media ---
        // POST /api/media (multipart) uploads; GET lists the caller's own media.
        .route(
            "/api/media",
            post(handlers::media::upload_media).get(handlers::media::list_my_media),
        )
        // GET/PUT/DELETE /api/media/{id}
        // Mutations are owner-only; the repository filters on the owner id as well.
        .route(
            "/api/media/{id}",
            get(handlers::media::get_media)
                .put(handlers::media::update_media)
                .delete(handlers::media::delete_media),
        )
        // --- Profiles ---
        // GET/PUT/DELETE /api/profiles/me
        .route(
            "/api/profiles/me",
            get(handlers::profiles::get_my_profile)
                .put(handlers::profiles::update_my_profile)
                .delete(handlers::profiles::delete_my_profile),
        )
}
