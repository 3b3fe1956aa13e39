use axum::http::Method;
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};
use ts_rs::TS;
use utoipa::ToSchema;

// --- Path Model ---

/// Path
///
/// A hierarchical URL path: an optional parent plus a segment relative to it.
/// Paths are built once while routes are declared and never mutated afterwards,
/// so a parent is always an already existing `Arc<Path>` and the chain cannot cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    pub parent: Option<Arc<Path>>,
    pub relative_path: String,
}

impl Path {
    /// Creates a path with no parent, e.g. the `/api` base path of the tree.
    pub fn root(relative_path: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            parent: None,
            relative_path: relative_path.into(),
        })
    }

    /// Creates a path nested under `parent`.
    pub fn child(parent: &Arc<Path>, relative_path: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            parent: Some(Arc::clone(parent)),
            relative_path: relative_path.into(),
        })
    }

    /// resolve
    ///
    /// Produces the absolute path string. Every non-empty segment of the parent chain
    /// is joined with exactly one `/`, whatever separators the relative segments carry,
    /// and the result always starts with `/`.
    pub fn resolve(&self) -> String {
        let mut segments = Vec::new();
        self.collect_segments(&mut segments);

        if segments.is_empty() {
            return "/".to_string();
        }

        segments.iter().fold(String::new(), |mut acc, segment| {
            acc.push('/');
            acc.push_str(segment);
            acc
        })
    }

    fn collect_segments<'a>(&'a self, segments: &mut Vec<&'a str>) {
        if let Some(parent) = &self.parent {
            parent.collect_segments(segments);
        }
        segments.extend(self.relative_path.split('/').filter(|s| !s.is_empty()));
    }

    /// Number of ancestors above this path.
    pub fn depth(&self) -> usize {
        self.parent.as_ref().map_or(0, |p| p.depth() + 1)
    }
}

// --- Verbs & Scopes ---

/// ActionVerb
///
/// The semantic operation an endpoint performs, independent of the HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ActionVerb {
    Get,
    List,
    Create,
    Update,
    Delete,
}

impl fmt::Display for ActionVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            ActionVerb::Get => "get",
            ActionVerb::List => "list",
            ActionVerb::Create => "create",
            ActionVerb::Update => "update",
            ActionVerb::Delete => "delete",
        };
        f.write_str(verb)
    }
}

/// HttpVerb
///
/// Transport-level method of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
#[ts(export)]
pub enum HttpVerb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpVerb {
    pub fn as_method(&self) -> Method {
        match self {
            HttpVerb::Get => Method::GET,
            HttpVerb::Post => Method::POST,
            HttpVerb::Put => Method::PUT,
            HttpVerb::Patch => Method::PATCH,
            HttpVerb::Delete => Method::DELETE,
        }
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_method().as_str())
    }
}

/// PermissionScope
///
/// A named permission an endpoint requires. The identity attached to a request
/// must hold every scope its endpoint declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum PermissionScope {
    User,
    Project,
}

impl fmt::Display for PermissionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionScope::User => f.write_str("user"),
            PermissionScope::Project => f.write_str("project"),
        }
    }
}

// --- Endpoint Metadata ---

/// EndpointMetadata
///
/// Immutable description of one API operation. The verb/method pairing
/// (e.g. `Delete` with `DELETE`) is a naming convention and is not checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointMetadata {
    pub verb: ActionVerb,
    pub method: HttpVerb,
    pub path: Arc<Path>,
    pub scopes: Vec<PermissionScope>,
    /// When set, the dispatch layer answers with a redirect instead of a body.
    pub redirect_on_success: bool,
}

impl EndpointMetadata {
    pub fn new(
        verb: ActionVerb,
        method: HttpVerb,
        path: Arc<Path>,
        scopes: impl IntoIterator<Item = PermissionScope>,
    ) -> Self {
        // Declaration order is kept, repeats are dropped.
        let mut ordered = Vec::new();
        for scope in scopes {
            if !ordered.contains(&scope) {
                ordered.push(scope);
            }
        }

        Self {
            verb,
            method,
            path,
            scopes: ordered,
            redirect_on_success: false,
        }
    }

    pub fn with_redirect(mut self) -> Self {
        self.redirect_on_success = true;
        self
    }
}
