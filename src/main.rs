use blog_platform::{
    AppState, LocalMediaStore, LogEmailService, MemoryRepository, PostgresRepository,
    config::{AppConfig, Env},
    create_router,
    mailer::MailerState,
    media::MediaState,
    repository::RepositoryState,
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Entry point: configuration, logging, persistence, media storage, mail, and
/// the HTTP server.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (Fail-Fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging Filter Setup
    // RUST_LOG wins; otherwise debug for this crate and request logs from tower_http.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "blog_platform=debug,tower_http=info".into());

    // 3. Logging format by environment: pretty locally, JSON for log aggregation in production.
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 4. Persistence: Postgres when configured, otherwise the in-memory store (local only).
    let repo: RepositoryState = match &config.db_url {
        Some(db_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Duration::from_secs(5))
                .connect(db_url)
                .await
                .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .expect("FATAL: Failed to run database migrations.");

            Arc::new(PostgresRepository::new(pool)) as RepositoryState
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using the in-memory repository");
            Arc::new(MemoryRepository::new()) as RepositoryState
        }
    };

    // 5. Media storage on the local filesystem.
    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .expect("FATAL: Failed to create the upload directory. Check UPLOAD_DIR.");
    let media = Arc::new(LocalMediaStore::new(&config.upload_dir, &config.base_url)) as MediaState;

    // 6. Mail: reset links are written to the log.
    let mailer = Arc::new(LogEmailService::new(&config.mail_from)) as MailerState;

    // 7. Unified State Assembly
    let server_addr = config.server_addr.clone();
    let base_url = config.base_url.clone();
    let app_state = AppState::new(repo, media, mailer, config);

    // 8. Router and Server Startup
    let app = create_router(app_state);

    let listener = TcpListener::bind(&server_addr)
        .await
        .expect("FATAL: Failed to bind SERVER_ADDR.");

    tracing::info!("HTTP server bound successfully.");
    tracing::info!("Listening on {}", server_addr);
    tracing::info!("API Documentation (Swagger UI) available at: {}/swagger-ui", base_url);

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly.");
}
