use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    routing::get,
};
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Route model and registration.
pub mod types;
pub mod endpoint;
pub mod errors;
pub mod router;
pub mod openapi;

// Collaborators handed to handlers through the shared config bag.
pub mod auth;
pub mod config;
pub mod handlers;
pub mod mailer;
pub mod models;
pub mod repository;

use router::{Registerer, RouterScope};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use endpoint::{ApiEndpointFactory, EndpointFactory};
pub use errors::{ApiError, RegistrationError};
pub use mailer::{HttpMailer, LogMailer, MailerError, MailerState, MockMailer};
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use router::build_routes;
pub use types::Path;

/// AppState
///
/// The shared configuration bag. Built once in `main`, immutable afterwards, handed
/// by reference to every route producer and cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    /// Persistence (Postgres or in-memory).
    pub repo: RepositoryState,
    /// Outbound email for the verification flow.
    pub mailer: MailerState,
    /// The loaded environment configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// registerer_tree
///
/// The process-wide registration tree: user-scoped routes at the root with the
/// project-scoped routes nested in their own router group.
pub fn registerer_tree() -> Registerer {
    router::user::new_user_scoped_registerer(vec![
        router::project::new_project_scoped_registerer(vec![]),
    ])
}

/// create_router
///
/// Collects the route list from the registerer tree, mounts it, and wraps the result
/// in the observability layers. Any `RegistrationError` is returned before a single
/// route is served.
pub fn create_router(state: AppState) -> Result<Router, RegistrationError> {
    let factory = ApiEndpointFactory::new(&state.config);
    let base_path = Path::root(state.config.base_path.clone());
    let mut scope = RouterScope::root();

    let routes = build_routes(&registerer_tree(), &mut scope, &state, &base_path, &factory)?;
    let api_doc = openapi::api_doc(&routes);
    let api_routes = router::mount_routes(routes)?;

    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api_doc))
        // Liveness check, outside the registered API.
        .route("/health", get(|| async { "ok" }))
        .merge(api_routes)
        .with_state(state);

    Ok(base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors))
}

/// trace_span_logger
///
/// Span for every HTTP request, tagged with the `x-request-id` set above.
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
