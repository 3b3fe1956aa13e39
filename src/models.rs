use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::endpoint::Validate;

// --- Stored Records ---

/// User
///
/// A dashboard account as stored in the `users` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    // Flipped by the email verification flow.
    pub email_verified: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Project
///
/// A project owned by one user (`projects` table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Project {
    pub id: Uuid,
    // FK to users.id (owner).
    pub user_id: Uuid,
    pub name: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// EmailVerifyToken
///
/// Single-use token mailed by the verification flow. Internal only.
#[derive(Debug, Clone, FromRow)]
pub struct EmailVerifyToken {
    pub token: Uuid,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

// --- Request Payloads ---

/// Longest project name accepted by `POST /projects`.
pub const MAX_PROJECT_NAME_LEN: usize = 64;

/// CreateProjectRequest
///
/// Body of `POST {base}/projects`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateProjectRequest {
    pub name: String,
}

impl Validate for CreateProjectRequest {
    fn validate(&self) -> Result<(), Vec<String>> {
        let name = self.name.trim();
        let mut errors = Vec::new();

        if name.is_empty() {
            errors.push("name: must not be empty".to_string());
        }
        if name.chars().count() > MAX_PROJECT_NAME_LEN {
            errors.push(format!("name: must be at most {MAX_PROJECT_NAME_LEN} characters"));
        }
        // Names end up in URLs and resource labels on the dashboard.
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ' ')
        {
            errors.push("name: only letters, digits, spaces, `-` and `_` are allowed".to_string());
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// VerifyEmailFinalizeRequest
///
/// Query string of `GET {base}/email/verify/finalize?token=...`.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyEmailFinalizeRequest {
    pub token: Uuid,
}

impl Validate for VerifyEmailFinalizeRequest {}

// --- Responses ---

/// AuthCheckResponse
///
/// Returned by `GET {base}/auth/check` for a valid session.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AuthCheckResponse {
    pub id: Uuid,
    pub email: String,
    pub email_verified: bool,
}

impl From<User> for AuthCheckResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            email_verified: user.email_verified,
        }
    }
}
