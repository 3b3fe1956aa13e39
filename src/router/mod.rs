//! Declarative route registration.
//!
//! A tree of `Registerer`s is reduced once at startup into a flat, pre-ordered list
//! of `Route`s, which `mount_routes` then hands to axum. Nesting a registerer under
//! another only isolates its router scope (middleware); it does not prefix paths.
//! Every producer parents its paths on the same base path.

use axum::{
    Router,
    extract::{FromRequestParts, RawPathParams, Request, State},
    response::Response,
    routing::{MethodFilter, MethodRouter},
};
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    fmt,
    sync::Arc,
};

use crate::{
    AppState,
    auth::AuthUser,
    endpoint::{ApiRequest, Endpoint, EndpointFactory, Handler, route_shape},
    errors::{ApiError, RegistrationError},
    types::{HttpVerb, Path},
};

pub mod project;
pub mod user;

/// Upper bound on buffered request bodies.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

// --- Router Scope ---

/// Middleware
///
/// A request guard attached to a router scope. Guards run after the scope check
/// and before the handler, in the order they were added.
pub trait Middleware: Send + Sync {
    fn name(&self) -> &'static str;

    fn check(&self, request: &ApiRequest) -> Result<(), ApiError>;
}

/// RouterScope
///
/// Grouping handle threaded through registration. `group()` opens a child scope
/// that starts with everything its parent has; middleware added to the child is
/// copy-on-write and never reaches the parent or its siblings.
#[derive(Clone, Default)]
pub struct RouterScope {
    depth: usize,
    middleware: Arc<Vec<Arc<dyn Middleware>>>,
}

impl RouterScope {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn group(&self) -> Self {
        Self {
            depth: self.depth + 1,
            middleware: Arc::clone(&self.middleware),
        }
    }

    pub fn use_middleware(&mut self, middleware: impl Middleware + 'static) {
        Arc::make_mut(&mut self.middleware).push(Arc::new(middleware));
    }

    pub fn middleware(&self) -> &[Arc<dyn Middleware>] {
        &self.middleware
    }

    /// 0 for the root scope, +1 per `group()`.
    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl fmt::Debug for RouterScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterScope")
            .field("depth", &self.depth)
            .field(
                "middleware",
                &self.middleware.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

// --- Route (binding) ---

/// Route
///
/// An endpoint bound to its handler and to the router scope it was declared in.
pub struct Route {
    pub endpoint: Endpoint,
    pub handler: Arc<dyn Handler>,
    pub router: RouterScope,
}

impl Route {
    pub fn new(endpoint: Endpoint, handler: impl Handler + 'static, router: &RouterScope) -> Self {
        Self {
            endpoint,
            handler: Arc::new(handler),
            router: router.clone(),
        }
    }

    /// dispatch
    ///
    /// Scope check, then scope middleware, then the handler. A failed check
    /// answers with the error envelope and the handler is never called.
    pub async fn dispatch(&self, request: ApiRequest) -> Response {
        let writer = self.endpoint.writer();

        if let Err(err) = self.endpoint.authorize(&request.user) {
            tracing::debug!(
                user_id = %request.user.id,
                path = %self.endpoint.path(),
                "scope check failed"
            );
            return writer.write_error(err);
        }

        for middleware in self.router.middleware() {
            if let Err(err) = middleware.check(&request) {
                tracing::debug!(middleware = middleware.name(), "request rejected by middleware");
                return writer.write_error(err);
            }
        }

        let response = self.handler.handle(request).await;
        self.endpoint.finish(response)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.endpoint.method())
            .field("path", &self.endpoint.path())
            .field("router", &self.router)
            .finish()
    }
}

// --- Registerer ---

/// RouteProducer
///
/// Declares one registerer's own routes. It may add middleware to the scope it is
/// given; children collected afterwards inherit it.
pub type RouteProducer = Box<
    dyn Fn(
            &mut RouterScope,
            &AppState,
            &Arc<Path>,
            &dyn EndpointFactory,
        ) -> Result<Vec<Route>, RegistrationError>
        + Send
        + Sync,
>;

/// Registerer
///
/// A node of the registration tree: its own route producer plus ordered children.
pub struct Registerer {
    pub get_routes: RouteProducer,
    pub children: Vec<Registerer>,
}

impl Registerer {
    pub fn new<F>(get_routes: F, children: Vec<Registerer>) -> Self
    where
        F: Fn(
                &mut RouterScope,
                &AppState,
                &Arc<Path>,
                &dyn EndpointFactory,
            ) -> Result<Vec<Route>, RegistrationError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            get_routes: Box::new(get_routes),
            children,
        }
    }

    /// collect_routes
    ///
    /// Pre-order reduction: this node's routes first, then each child's subtree in
    /// declaration order, each collected inside its own `group()` of `router`.
    /// The base path is handed down unchanged. The first producer error aborts the
    /// whole walk.
    pub fn collect_routes(
        &self,
        router: &mut RouterScope,
        config: &AppState,
        base_path: &Arc<Path>,
        factory: &dyn EndpointFactory,
    ) -> Result<Vec<Route>, RegistrationError> {
        let mut routes = (self.get_routes)(router, config, base_path, factory)?;

        for child in &self.children {
            let mut group = router.group();
            let child_routes = child.collect_routes(&mut group, config, base_path, factory)?;
            routes.extend(child_routes);
        }

        Ok(routes)
    }

    /// Number of registerers in this subtree, including this one.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Registerer::node_count).sum::<usize>()
    }
}

/// build_routes
///
/// Entry point used once at startup.
pub fn build_routes(
    root: &Registerer,
    router: &mut RouterScope,
    config: &AppState,
    base_path: &Arc<Path>,
    factory: &dyn EndpointFactory,
) -> Result<Vec<Route>, RegistrationError> {
    let routes = root.collect_routes(router, config, base_path, factory)?;
    tracing::info!(
        routes = routes.len(),
        registerers = root.node_count(),
        base_path = %base_path.resolve(),
        "routes collected"
    );
    Ok(routes)
}

// --- Transport Mounting ---

fn method_filter(method: HttpVerb) -> MethodFilter {
    match method {
        HttpVerb::Get => MethodFilter::GET,
        HttpVerb::Post => MethodFilter::POST,
        HttpVerb::Put => MethodFilter::PUT,
        HttpVerb::Patch => MethodFilter::PATCH,
        HttpVerb::Delete => MethodFilter::DELETE,
    }
}

/// mount_routes
///
/// Registers every route on an axum router as `(method, path, dispatch)`.
/// A repeated `(method, path)` pair is a startup error, including paths that
/// differ only in capture names. Routes sharing a shape must use the same names.
pub fn mount_routes(routes: Vec<Route>) -> Result<Router<AppState>, RegistrationError> {
    let mut seen = HashSet::new();
    // shape -> the first spelling of that shape
    let mut spellings: HashMap<String, String> = HashMap::new();
    let mut by_path: BTreeMap<String, MethodRouter<AppState>> = BTreeMap::new();

    for route in routes {
        let method = route.endpoint.method();
        let path = route.endpoint.path().to_string();
        let shape = route_shape(&path);

        if !seen.insert((method, shape.clone())) {
            return Err(RegistrationError::DuplicateRoute { method, path });
        }
        let spelling = spellings.entry(shape).or_insert_with(|| path.clone());
        if *spelling != path {
            return Err(RegistrationError::MalformedPath {
                reason: format!("capture names conflict with `{spelling}`"),
                path,
            });
        }
        tracing::debug!(%method, %path, "mounting route");

        let route = Arc::new(route);
        let handler = move |State(state): State<AppState>, request: Request| {
            let route = Arc::clone(&route);
            async move { serve(route, state, request).await }
        };

        let methods = by_path.remove(&path).unwrap_or_else(MethodRouter::new);
        by_path.insert(path, methods.on(method_filter(method), handler));
    }

    let router = by_path
        .into_iter()
        .fold(Router::new(), |router, (path, methods)| {
            router.route(&path, methods)
        });
    Ok(router)
}

/// serve
///
/// Transport adapter: authenticates the caller, buffers the request into an
/// `ApiRequest` and dispatches it.
async fn serve(route: Arc<Route>, state: AppState, request: Request) -> Response {
    let writer = route.endpoint.writer();
    let (mut parts, body) = request.into_parts();

    let user = match AuthUser::from_request_parts(&mut parts, &state).await {
        Ok(user) => user,
        Err(_) => return writer.write_error(ApiError::Unauthenticated),
    };

    let params: HashMap<String, String> = RawPathParams::from_request_parts(&mut parts, &state)
        .await
        .map(|params| {
            params
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect()
        })
        .unwrap_or_default();

    let body = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(body) => body,
        Err(_) => {
            return writer.write_error(ApiError::BadRequest(
                "request body is unreadable or too large".to_string(),
            ));
        }
    };

    let request = ApiRequest {
        user,
        method: parts.method,
        uri: parts.uri,
        headers: parts.headers,
        params,
        body,
    };
    route.dispatch(request).await
}
