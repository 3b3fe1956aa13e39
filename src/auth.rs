use axum::{
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, header, request::Parts},
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    models::User,
    repository::RepositoryState,
    types::PermissionScope,
};

/// Scopes granted to an ordinary signed-in user.
pub const DEFAULT_USER_SCOPES: [PermissionScope; 2] =
    [PermissionScope::User, PermissionScope::Project];

fn default_scopes() -> Vec<PermissionScope> {
    DEFAULT_USER_SCOPES.to_vec()
}

/// Claims
///
/// JWT payload accepted by the API.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's UUID.
    pub sub: Uuid,
    /// Expiration time (seconds since epoch). Always validated.
    pub exp: usize,
    /// Issued at.
    pub iat: usize,
    /// Scopes this token grants. Tokens issued without the claim act as a full user session.
    #[serde(default = "default_scopes")]
    pub scopes: Vec<PermissionScope>,
}

/// AuthUser
///
/// The resolved identity of an authenticated request together with the scopes it holds.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub email_verified: bool,
    pub scopes: Vec<PermissionScope>,
}

impl AuthUser {
    pub fn from_user(user: User, scopes: Vec<PermissionScope>) -> Self {
        Self {
            id: user.id,
            email: user.email,
            email_verified: user.email_verified,
            scopes,
        }
    }

    pub fn has_scope(&self, scope: PermissionScope) -> bool {
        self.scopes.contains(&scope)
    }
}

/// AuthUser Extractor Implementation
///
/// 1. Local bypass: in `Env::Local` a known user id in `x-user-id` is accepted.
/// 2. Otherwise a `Bearer` JWT is decoded with the configured secret.
/// 3. The user must still exist in the repository.
///
/// Rejection: `StatusCode::UNAUTHORIZED` on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        if config.env == Env::Local {
            let bypass_id = parts
                .headers
                .get("x-user-id")
                .and_then(|value| value.to_str().ok())
                .and_then(|id| Uuid::parse_str(id).ok());

            if let Some(user_id) = bypass_id {
                if let Ok(Some(user)) = repo.get_user(user_id).await {
                    return Ok(AuthUser::from_user(user, default_scopes()));
                }
            }
        }
        // Production, or the bypass did not resolve a user: fall through to JWT.

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let token_data = decode::<Claims>(token, &decoding_key, &validation).map_err(|e| {
            tracing::debug!(error = %e, "rejected bearer token");
            StatusCode::UNAUTHORIZED
        })?;

        // A valid token for a deleted user is not a session.
        let user = repo
            .get_user(token_data.claims.sub)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "user lookup failed during authentication");
                StatusCode::UNAUTHORIZED
            })?
            .ok_or(StatusCode::UNAUTHORIZED)?;

        Ok(AuthUser::from_user(user, token_data.claims.scopes))
    }
}
