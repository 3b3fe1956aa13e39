use async_trait::async_trait;
use axum::{
    Json,
    body::Bytes,
    extract::Query,
    http::{HeaderMap, Method, StatusCode, Uri, header, uri::PathAndQuery},
    response::{IntoResponse, Response},
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::json;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use crate::{
    auth::AuthUser,
    config::AppConfig,
    errors::{ApiError, RegistrationError},
    types::{EndpointMetadata, HttpVerb},
};

// --- Request & Handler Contract ---

/// ApiRequest
///
/// What a handler sees of an incoming request once authentication and scope checks
/// have passed. The transport layer builds it; tests can build it directly.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub user: AuthUser,
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    /// Path parameters captured by the route template (e.g. `project_id`).
    pub params: HashMap<String, String>,
    pub body: Bytes,
}

impl ApiRequest {
    pub fn new(user: AuthUser, method: Method, uri: Uri) -> Self {
        Self {
            user,
            method,
            uri,
            headers: HeaderMap::new(),
            params: HashMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

/// Handler
///
/// A unit of business logic bound to one endpoint. Resource modules implement it;
/// the routing core never looks inside.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, request: ApiRequest) -> Response;
}

// --- Shared Collaborators ---

/// Validate
///
/// Implemented by request payloads that have rules beyond their shape.
/// Each returned message names the offending field.
pub trait Validate {
    fn validate(&self) -> Result<(), Vec<String>> {
        Ok(())
    }
}

/// DecoderValidator
///
/// Stateless decoder shared by every handler. Reads the query string for GET and
/// DELETE requests, the JSON body otherwise, then runs the payload's `Validate` rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecoderValidator;

impl DecoderValidator {
    pub fn decode_and_validate<T>(&self, request: &ApiRequest) -> Result<T, ApiError>
    where
        T: DeserializeOwned + Validate,
    {
        let value: T = if request.method == Method::GET || request.method == Method::DELETE {
            Query::<T>::try_from_uri(&request.uri)
                .map(|Query(value)| value)
                .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?
        } else {
            if request.body.is_empty() {
                return Err(ApiError::BadRequest("request body is required".to_string()));
            }
            serde_json::from_slice(&request.body)
                .map_err(|e| ApiError::BadRequest(format!("invalid request body: {e}")))?
        };

        value.validate().map_err(ApiError::Validation)?;
        Ok(value)
    }
}

/// ResultWriter
///
/// Stateless response writer shared by every handler, so success bodies and the
/// error envelope look the same on every endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultWriter;

impl ResultWriter {
    pub fn write_result<T: Serialize>(&self, status: StatusCode, value: &T) -> Response {
        (status, Json(value)).into_response()
    }

    /// write_error
    ///
    /// Renders `{"error": <code>, "message": <text>}` with the error's status.
    /// The `ApiError` itself rides along in the response extensions so the dispatch
    /// layer can reuse it (e.g. for redirect query parameters).
    pub fn write_error(&self, err: ApiError) -> Response {
        let status = err.status();
        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
        } else {
            tracing::debug!(error = %err, "request rejected");
        }

        let mut response = (
            status,
            Json(json!({
                "error": err.code(),
                "message": err.to_string(),
            })),
        )
            .into_response();
        response.extensions_mut().insert(err);
        response
    }
}

// --- Endpoint ---

/// Endpoint
///
/// The routable form of an `EndpointMetadata`. Besides the resolved path it carries
/// the collaborators the factory attached, so every endpoint enforces scopes and
/// honors the redirect flag the same way.
#[derive(Debug, Clone)]
pub struct Endpoint {
    metadata: Arc<EndpointMetadata>,
    path: String,
    writer: ResultWriter,
    redirect_url: Arc<str>,
}

impl Endpoint {
    pub fn metadata(&self) -> &EndpointMetadata {
        &self.metadata
    }

    /// Fully resolved path, e.g. `/api/projects`.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn method(&self) -> HttpVerb {
        self.metadata.method
    }

    pub fn writer(&self) -> ResultWriter {
        self.writer
    }

    /// Checks the identity against every declared scope, in declaration order.
    pub fn authorize(&self, user: &AuthUser) -> Result<(), ApiError> {
        match self
            .metadata
            .scopes
            .iter()
            .find(|scope| !user.has_scope(**scope))
        {
            Some(missing) => Err(ApiError::Forbidden(*missing)),
            None => Ok(()),
        }
    }

    /// finish
    ///
    /// Applies the endpoint's response policy to a handler response. Endpoints flagged
    /// with `redirect_on_success` answer `302 Found` to the dashboard, appending
    /// `?error=<code>` when the handler failed. Other endpoints pass through untouched.
    pub fn finish(&self, response: Response) -> Response {
        if !self.metadata.redirect_on_success {
            return response;
        }

        let location = if response.status().is_success() {
            self.redirect_url.to_string()
        } else {
            let code = response
                .extensions()
                .get::<ApiError>()
                .map(ApiError::code)
                .or_else(|| response.status().canonical_reason())
                .unwrap_or("request_failed");

            match reqwest::Url::parse(&self.redirect_url) {
                Ok(mut url) => {
                    url.query_pairs_mut().append_pair("error", code);
                    url.to_string()
                }
                Err(_) => self.redirect_url.to_string(),
            }
        };

        (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
    }
}

// --- Factory ---

/// EndpointFactory
///
/// The single seam every endpoint is built through. Policies that must hold for all
/// endpoints (scope enforcement, response envelope, redirect target) are attached here
/// rather than at each declaration site.
pub trait EndpointFactory: Send + Sync {
    /// Builds an endpoint. Errors are programming mistakes caught at startup.
    fn new_endpoint(&self, metadata: EndpointMetadata) -> Result<Endpoint, RegistrationError>;

    fn decoder_validator(&self) -> DecoderValidator;

    fn result_writer(&self) -> ResultWriter;
}

/// ApiEndpointFactory
///
/// Default factory. Built once from `AppConfig`; obtaining its collaborators is free.
#[derive(Debug, Clone)]
pub struct ApiEndpointFactory {
    decoder: DecoderValidator,
    writer: ResultWriter,
    redirect_url: Arc<str>,
}

impl ApiEndpointFactory {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            decoder: DecoderValidator,
            writer: ResultWriter,
            redirect_url: Arc::from(config.dashboard_url()),
        }
    }
}

impl EndpointFactory for ApiEndpointFactory {
    fn new_endpoint(&self, metadata: EndpointMetadata) -> Result<Endpoint, RegistrationError> {
        let path = metadata.path.resolve();
        validate_route_path(&path)?;

        if metadata.scopes.is_empty() {
            return Err(RegistrationError::MissingScopes {
                method: metadata.method,
                path,
            });
        }

        tracing::debug!(
            method = %metadata.method,
            path = %path,
            verb = %metadata.verb,
            redirect = metadata.redirect_on_success,
            "endpoint created"
        );

        Ok(Endpoint {
            metadata: Arc::new(metadata),
            path,
            writer: self.writer,
            redirect_url: Arc::clone(&self.redirect_url),
        })
    }

    fn decoder_validator(&self) -> DecoderValidator {
        self.decoder
    }

    fn result_writer(&self) -> ResultWriter {
        self.writer
    }
}

/// validate_route_path
///
/// The path must parse as an `http` path with no query or fragment. Each segment
/// is either literal text or one whole `{name}` capture; names are alphanumeric
/// (plus `_`) and unique within the path. Segments starting with `:` or `*` are
/// rejected since the router would refuse them.
fn validate_route_path(path: &str) -> Result<(), RegistrationError> {
    let malformed = |reason: &str| RegistrationError::MalformedPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    let parsed: PathAndQuery = path
        .parse()
        .map_err(|_| malformed("not a valid URI path"))?;
    if parsed.query().is_some() || path.contains('#') {
        return Err(malformed("query or fragment in route path"));
    }

    let mut captures = HashSet::new();
    for segment in path.split('/') {
        if segment.starts_with(':') || segment.starts_with('*') {
            return Err(malformed("segments must not start with `:` or `*`"));
        }

        if !segment.contains(['{', '}']) {
            continue;
        }
        let name = segment
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
            .ok_or_else(|| malformed("a capture must span the whole segment"))?;

        if name.is_empty() {
            return Err(malformed("empty capture name"));
        }
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(malformed("capture names must be alphanumeric"));
        }
        if !captures.insert(name) {
            return Err(malformed("capture name used twice"));
        }
    }
    Ok(())
}

/// route_shape
///
/// The path with every capture name erased (`/projects/{id}` becomes `/projects/{}`).
/// Two routes with the same method and shape collide on the router.
pub fn route_shape(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if segment.starts_with('{') && segment.ends_with('}') {
                "{}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
