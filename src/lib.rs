use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core: role model, credential tokens, authorization gate, media pipeline.
pub mod roles;
pub mod token;
pub mod auth;
pub mod gate;
pub mod media;

// Workflows and their collaborators.
pub mod config;
pub mod error;
pub mod handlers;
pub mod mailer;
pub mod models;
pub mod password;
pub mod repository;

// Module for routing segregation (Public, Authenticated, Admin).
pub mod routes;
use auth::AuthUser;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use mailer::{LogEmailService, MailerState, MockEmailService};
pub use media::{LocalMediaStore, MediaState, MockMediaStore};
pub use repository::{MemoryRepository, PostgresRepository, RepositoryState};
pub use token::TokenService;

/// Largest request body accepted. Registration may carry two images of up to
/// `media::MAX_UPLOAD_SIZE` each, plus the text fields.
const MAX_BODY_SIZE: usize = 2 * media::MAX_UPLOAD_SIZE as usize + 1024 * 1024;

/// ApiDoc
///
/// Generates the OpenAPI document from the `#[utoipa::path]` handlers and the
/// `ToSchema` models. Served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::accounts::register, handlers::accounts::login,
        handlers::accounts::request_password_reset, handlers::accounts::reset_password,
        handlers::posts::list_posts, handlers::posts::get_post, handlers::posts::create_post,
        handlers::posts::update_post, handlers::posts::delete_post,
        handlers::media::upload_media, handlers::media::list_my_media,
        handlers::media::get_media, handlers::media::update_media, handlers::media::delete_media,
        handlers::profiles::get_profile, handlers::profiles::get_my_profile,
        handlers::profiles::update_my_profile, handlers::profiles::delete_my_profile,
        handlers::users::list_users, handlers::users::update_user_role,
        handlers::users::delete_user,
    ),
    components(
        schemas(
            roles::Role, models::User, models::Profile, models::SocialLinks, models::Media,
            models::Thumbnail, models::MediaMetadata, models::Post, models::PostStatus,
            models::LoginRequest, models::LoginResponse, models::RegisterResponse,
            models::PasswordResetRequest, models::ResetPasswordRequest,
            models::UpdateRoleRequest, models::CreatePostRequest, models::UpdatePostRequest,
            models::UpdateMediaRequest, models::MessageResponse, models::CascadeReport,
            handlers::accounts::RegisterForm, handlers::media::MediaUploadForm,
            handlers::profiles::ProfileForm,
        )
    ),
    tags(
        (name = "blog-platform", description = "Blog platform API: accounts, posts, media and profiles")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single, immutable container of every service a handler may need,
/// shared across all requests.
#[derive(Clone)]
pub struct AppState {
    /// Persistence: Postgres in deployment, in-memory in tests.
    pub repo: RepositoryState,
    /// Media pipeline: validation, storage, thumbnails, deletion.
    pub media: MediaState,
    /// Outbound mail (password reset links).
    pub mailer: MailerState,
    /// Issues and verifies credential tokens.
    pub tokens: TokenService,
    pub config: AppConfig,
}

impl AppState {
    /// Builds the state, deriving the token service from the configured secret
    /// and lifetime.
    pub fn new(
        repo: RepositoryState,
        media: MediaState,
        mailer: MailerState,
        config: AppConfig,
    ) -> Self {
        let tokens = TokenService::new(&config.jwt_secret, config.token_ttl());
        Self {
            repo,
            media,
            mailer,
            tokens,
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for MediaState {
    fn from_ref(app_state: &AppState) -> MediaState {
        app_state.media.clone()
    }
}

impl FromRef<AppState> for MailerState {
    fn from_ref(app_state: &AppState) -> MailerState {
        app_state.mailer.clone()
    }
}

// Lets the `AuthUser` extractor verify tokens against any state that carries them.
impl FromRef<AppState> for TokenService {
    fn from_ref(app_state: &AppState) -> TokenService {
        app_state.tokens.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Enforces authentication for the authenticated routes. Extracting `AuthUser`
/// verifies the bearer token; any failure rejects the request with 401 before
/// the handler runs.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the routing structure, applies global and scoped middleware, and
/// registers the application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        // Documentation: Serve the auto-generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Public Routes: No middleware applied.
        .merge(public::public_routes())
        // Authenticated Routes: every request must carry a valid token.
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        // Admin Routes: authenticated, then the 'admin' role is required.
        .nest(
            "/api/admin",
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                gate::require_admin,
            )),
        )
        // Uploaded originals and thumbnails, under the URLs built by `public_url`.
        .nest_service("/media", ServeDir::new(&state.config.upload_dir))
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        // Apply the Unified State to all routes.
        .with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. Request ID Generation: a UUID for every incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. Request Tracing: one span per request, tagged with the request ID.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Request ID Propagation: echo x-request-id back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: method, URI and the `x-request-id` header, so
/// every log line of a request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
