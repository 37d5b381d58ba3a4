use std::env;

const LOCAL_JWT_SECRET: &str = "super-secure-test-secret-value-local";

/// AppConfig
///
/// Holds the application's entire configuration state. Immutable once loaded;
/// it is pulled into the application state via FromRef.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls log format and which settings are mandatory.
    pub env: Env,
    // Postgres connection string. None in local selects the in-memory repository.
    pub db_url: Option<String>,
    // HS256 signing secret for credential tokens.
    pub jwt_secret: String,
    // Default lifetime of a login token, in hours.
    pub token_ttl_hours: i64,
    // Root directory for uploaded media and thumbnails.
    pub upload_dir: String,
    // Public origin used to build media URLs and reset links.
    pub base_url: String,
    pub server_addr: String,
    // Sender address for outgoing mail.
    pub mail_from: String,
}

/// Env
///
/// The runtime context: local development or hardened production.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// default
    ///
    /// Safe, non-panicking values for test state setup, so no environment
    /// variables are needed to build a router in tests.
    fn default() -> Self {
        Self {
            env: Env::Local,
            db_url: None,
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            token_ttl_hours: 24,
            upload_dir: "uploads".to_string(),
            base_url: "http://localhost:8080".to_string(),
            server_addr: "0.0.0.0:8080".to_string(),
            mail_from: "noreply@blog.local".to_string(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables and fails fast.
    ///
    /// # Panics
    /// Panics in production when `JWT_SECRET` or `DATABASE_URL` is missing, so the
    /// server never starts with a guessable secret or without its database.
    pub fn load() -> Self {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };
        let defaults = Self::default();

        let (jwt_secret, db_url) = match env {
            Env::Production => (
                env::var("JWT_SECRET").expect("FATAL: JWT_SECRET must be set in production."),
                Some(env::var("DATABASE_URL").expect("FATAL: DATABASE_URL required in prod")),
            ),
            Env::Local => (
                env::var("JWT_SECRET").unwrap_or(defaults.jwt_secret),
                env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            ),
        };

        let token_ttl_hours = env::var("TOKEN_TTL_HOURS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|h| *h > 0)
            .unwrap_or(defaults.token_ttl_hours);

        Self {
            env,
            db_url,
            jwt_secret,
            token_ttl_hours,
            upload_dir: env::var("UPLOAD_DIR").unwrap_or(defaults.upload_dir),
            base_url: env::var("BASE_URL").unwrap_or(defaults.base_url),
            server_addr: env::var("SERVER_ADDR").unwrap_or(defaults.server_addr),
            mail_from: env::var("MAIL_FROM").unwrap_or(defaults.mail_from),
        }
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.token_ttl_hours)
    }
}
