use dashboard_api::{
    AppState, HttpMailer, InMemoryRepository, LogMailer, MailerState, PostgresRepository,
    RepositoryState,
    config::{AppConfig, Env},
    create_router,
};
use sqlx::postgres::PgPoolOptions;
use std::{process::ExitCode, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, initialises logging and collaborators, registers every
/// route and starts serving. Any registration failure stops the process before
/// the listener is bound.
#[tokio::main]
async fn main() -> ExitCode {
    // 1. Configuration (fail-fast on missing production secrets)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: pretty locally, JSON in production.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "dashboard_api=debug,tower_http=info".into());

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

    // 3. Repository: Postgres when configured, in-memory otherwise (local only).
    let repo: RepositoryState = match &config.db_url {
        Some(db_url) => {
            let pool = match PgPoolOptions::new().max_connections(5).connect(db_url).await {
                Ok(pool) => pool,
                Err(e) => {
                    tracing::error!(error = %e, "FATAL: failed to connect to Postgres");
                    return ExitCode::FAILURE;
                }
            };
            Arc::new(PostgresRepository::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory repository");
            Arc::new(InMemoryRepository::new())
        }
    };

    // 4. Mailer
    let mailer: MailerState = match (&config.mail_api_url, &config.mail_api_key) {
        (Some(url), Some(key)) => Arc::new(HttpMailer::new(url, key, &config.mail_sender)),
        _ => {
            tracing::warn!("mail API not configured, verification emails are only logged");
            Arc::new(LogMailer)
        }
    };

    let bind_addr = config.bind_addr.clone();
    let app_state = AppState {
        repo,
        mailer,
        config,
    };

    // 5. Route registration (all-or-nothing)
    let app = match create_router(app_state) {
        Ok(app) => app,
        Err(e) => {
            tracing::error!(error = %e, "FATAL: route registration failed");
            return ExitCode::FAILURE;
        }
    };

    // 6. Server
    let listener = match TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, addr = %bind_addr, "FATAL: failed to bind listener");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at /swagger-ui");

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "server terminated");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
