use axum::http::StatusCode;
use thiserror::Error;

use crate::{
    mailer::MailerError,
    repository::RepositoryError,
    types::{HttpVerb, PermissionScope},
};

/// RegistrationError
///
/// Raised while the route tree is being built. Any of these aborts startup:
/// the server never runs with a partially registered route table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistrationError {
    /// The resolved path is not a legal URI path.
    #[error("malformed path `{path}`: {reason}")]
    MalformedPath { path: String, reason: String },

    /// An endpoint was declared without any required scope.
    #[error("endpoint {method} {path} declares no required scopes")]
    MissingScopes { method: HttpVerb, path: String },

    /// Two routes resolved to the same method and path.
    #[error("duplicate route {method} {path}")]
    DuplicateRoute { method: HttpVerb, path: String },
}

/// ApiError
///
/// Request-time failures. They are always turned into a JSON error envelope by
/// the `ResultWriter` and never escape the dispatch boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("missing required scope `{0}`")]
    Forbidden(PermissionScope),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    BadRequest(String),

    /// One message per rejected field.
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("{0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code placed in the `error` field of the envelope.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated => "unauthenticated",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Validation(_) => "validation_error",
            ApiError::Conflict(_) => "conflict",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(message) => ApiError::Conflict(message),
            RepositoryError::Database(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<MailerError> for ApiError {
    fn from(err: MailerError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
