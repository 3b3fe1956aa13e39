use std::env;

/// AppConfig
///
/// Process-wide settings, loaded once at startup and immutable afterwards.
/// It lives inside `AppState` and is pulled out by extractors through `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls the local auth bypass and log format.
    pub env: Env,
    // Postgres connection string. Local runs without it fall back to the in-memory repository.
    pub db_url: Option<String>,
    // Secret used to validate incoming JWTs.
    pub jwt_secret: String,
    // Public origin of the service, used for email links and redirects.
    pub server_url: String,
    // Prefix every API route is parented on.
    pub base_path: String,
    // Mail API endpoint and key. Without them verification emails are only logged.
    pub mail_api_url: Option<String>,
    pub mail_api_key: Option<String>,
    pub mail_sender: String,
    // Socket address the HTTP listener binds to.
    pub bind_addr: String,
}

/// Env
///
/// Runtime context: local development conveniences versus hardened production behavior.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// Non-panicking configuration for tests and scaffolding.
    fn default() -> Self {
        Self {
            env: Env::Local,
            db_url: None,
            jwt_secret: "super-secure-test-secret-value-local".to_string(),
            server_url: "http://localhost:3000".to_string(),
            base_path: "/api".to_string(),
            mail_api_url: None,
            mail_api_key: None,
            mail_sender: "noreply@localhost".to_string(),
            bind_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables.
    ///
    /// # Panics
    /// Panics when a variable required in production (`JWT_SECRET`, `DATABASE_URL`,
    /// `SERVER_URL`) is missing, so the service never starts half-configured.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };
        let defaults = Self::default();

        let jwt_secret = match env {
            Env::Production => {
                env::var("JWT_SECRET").expect("FATAL: JWT_SECRET must be set in production.")
            }
            Env::Local => env::var("JWT_SECRET").unwrap_or(defaults.jwt_secret),
        };

        let db_url = match env {
            Env::Production => Some(
                env::var("DATABASE_URL").expect("FATAL: DATABASE_URL required in production"),
            ),
            Env::Local => env::var("DATABASE_URL").ok(),
        };

        let server_url = match env {
            Env::Production => {
                env::var("SERVER_URL").expect("FATAL: SERVER_URL required in production")
            }
            Env::Local => env::var("SERVER_URL").unwrap_or(defaults.server_url),
        };

        Self {
            env,
            db_url,
            jwt_secret,
            server_url,
            base_path: env::var("API_BASE_PATH").unwrap_or(defaults.base_path),
            mail_api_url: env::var("MAIL_API_URL").ok(),
            mail_api_key: env::var("MAIL_API_KEY").ok(),
            mail_sender: env::var("MAIL_SENDER").unwrap_or(defaults.mail_sender),
            bind_addr: env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
        }
    }

    /// Where redirecting endpoints send the browser.
    pub fn dashboard_url(&self) -> String {
        format!("{}/dashboard", self.server_url.trim_end_matches('/'))
    }
}
