use crate::models::{EmailVerifyToken, Project, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// RepositoryError
///
/// Storage failures. Handlers report them as internal errors.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A uniqueness rule was violated, e.g. a second project with the same name.
    #[error("{0}")]
    Conflict(String),
}

fn duplicate_project(name: &str) -> RepositoryError {
    RepositoryError::Conflict(format!("project `{name}` already exists"))
}

/// Repository
///
/// Persistence contract used by the user and project handlers. Owner-scoped
/// operations take the caller's `user_id` and touch nothing they do not own.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepositoryError>;
    async fn create_user(&self, user: User) -> Result<User, RepositoryError>;
    // Removes the user together with everything they own.
    async fn delete_user(&self, id: Uuid) -> Result<Option<User>, RepositoryError>;
    async fn set_email_verified(&self, id: Uuid) -> Result<bool, RepositoryError>;

    // --- Projects ---
    // Names are unique per owner; a taken name is `RepositoryError::Conflict`.
    async fn create_project(&self, user_id: Uuid, name: &str) -> Result<Project, RepositoryError>;
    async fn list_projects(&self, user_id: Uuid) -> Result<Vec<Project>, RepositoryError>;
    async fn get_project(&self, id: Uuid, user_id: Uuid)
    -> Result<Option<Project>, RepositoryError>;
    async fn delete_project(&self, id: Uuid, user_id: Uuid) -> Result<bool, RepositoryError>;

    // --- Email verification ---
    async fn create_verify_token(
        &self,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<EmailVerifyToken, RepositoryError>;
    // Single use: removes the token only when it belongs to `user_id`, expired or not.
    // Someone else's token is reported as missing and left in place.
    async fn consume_verify_token(
        &self,
        token: Uuid,
        user_id: Uuid,
    ) -> Result<Option<EmailVerifyToken>, RepositoryError>;
}

/// RepositoryState
///
/// Shared handle stored in `AppState`.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// `Repository` backed by PostgreSQL through a `PgPool`.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, email_verified, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create_user(&self, user: User) -> Result<User, RepositoryError> {
        let user = sqlx::query_as::<_, User>(
            r#"INSERT INTO users (id, email, email_verified, created_at)
               VALUES ($1, $2, $3, $4)
               RETURNING id, email, email_verified, created_at"#,
        )
        .bind(user.id)
        .bind(user.email)
        .bind(user.email_verified)
        .bind(user.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    /// delete_user
    ///
    /// Runs in one transaction so a failure leaves no orphaned projects or tokens.
    async fn delete_user(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM email_verify_tokens WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM projects WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let user = sqlx::query_as::<_, User>(
            "DELETE FROM users WHERE id = $1 RETURNING id, email, email_verified, created_at",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(user)
    }

    async fn set_email_verified(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE users SET email_verified = true WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// create_project
    ///
    /// Relies on the `UNIQUE (user_id, name)` constraint from `migrations/`.
    async fn create_project(&self, user_id: Uuid, name: &str) -> Result<Project, RepositoryError> {
        let result = sqlx::query_as::<_, Project>(
            r#"INSERT INTO projects (id, user_id, name, created_at)
               VALUES ($1, $2, $3, NOW())
               RETURNING id, user_id, name, created_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(name)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(project) => Ok(project),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(duplicate_project(name))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_projects(&self, user_id: Uuid) -> Result<Vec<Project>, RepositoryError> {
        let projects = sqlx::query_as::<_, Project>(
            r#"SELECT id, user_id, name, created_at FROM projects
               WHERE user_id = $1 ORDER BY created_at ASC"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(projects)
    }

    async fn get_project(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Project>, RepositoryError> {
        let project = sqlx::query_as::<_, Project>(
            "SELECT id, user_id, name, created_at FROM projects WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(project)
    }

    async fn delete_project(&self, id: Uuid, user_id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_verify_token(
        &self,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<EmailVerifyToken, RepositoryError> {
        let token = sqlx::query_as::<_, EmailVerifyToken>(
            r#"INSERT INTO email_verify_tokens (token, user_id, expires_at)
               VALUES ($1, $2, $3)
               RETURNING token, user_id, expires_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(token)
    }

    async fn consume_verify_token(
        &self,
        token: Uuid,
        user_id: Uuid,
    ) -> Result<Option<EmailVerifyToken>, RepositoryError> {
        let token = sqlx::query_as::<_, EmailVerifyToken>(
            r#"DELETE FROM email_verify_tokens WHERE token = $1 AND user_id = $2
               RETURNING token, user_id, expires_at"#,
        )
        .bind(token)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(token)
    }
}

/// InMemoryRepository
///
/// `Repository` kept in process memory. Used for local runs without `DATABASE_URL`
/// and by the test suite.
#[derive(Default)]
pub struct InMemoryRepository {
    users: RwLock<HashMap<Uuid, User>>,
    // Insertion order doubles as creation order for listings.
    projects: RwLock<Vec<Project>>,
    tokens: RwLock<HashMap<Uuid, EmailVerifyToken>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn create_user(&self, user: User) -> Result<User, RepositoryError> {
        self.users.write().await.insert(user.id, user.clone());
        Ok(user)
    }

    async fn delete_user(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        let removed = self.users.write().await.remove(&id);
        if removed.is_some() {
            self.projects.write().await.retain(|p| p.user_id != id);
            self.tokens.write().await.retain(|_, t| t.user_id != id);
        }
        Ok(removed)
    }

    async fn set_email_verified(&self, id: Uuid) -> Result<bool, RepositoryError> {
        match self.users.write().await.get_mut(&id) {
            Some(user) => {
                user.email_verified = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn create_project(&self, user_id: Uuid, name: &str) -> Result<Project, RepositoryError> {
        // Check and insert under the same write lock.
        let mut projects = self.projects.write().await;
        if projects.iter().any(|p| p.user_id == user_id && p.name == name) {
            return Err(duplicate_project(name));
        }

        let project = Project {
            id: Uuid::new_v4(),
            user_id,
            name: name.to_string(),
            created_at: Utc::now(),
        };
        projects.push(project.clone());
        Ok(project)
    }

    async fn list_projects(&self, user_id: Uuid) -> Result<Vec<Project>, RepositoryError> {
        Ok(self
            .projects
            .read()
            .await
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_project(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Project>, RepositoryError> {
        Ok(self
            .projects
            .read()
            .await
            .iter()
            .find(|p| p.id == id && p.user_id == user_id)
            .cloned())
    }

    async fn delete_project(&self, id: Uuid, user_id: Uuid) -> Result<bool, RepositoryError> {
        let mut projects = self.projects.write().await;
        let before = projects.len();
        projects.retain(|p| !(p.id == id && p.user_id == user_id));
        Ok(projects.len() < before)
    }

    async fn create_verify_token(
        &self,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<EmailVerifyToken, RepositoryError> {
        let token = EmailVerifyToken {
            token: Uuid::new_v4(),
            user_id,
            expires_at,
        };
        self.tokens.write().await.insert(token.token, token.clone());
        Ok(token)
    }

    async fn consume_verify_token(
        &self,
        token: Uuid,
        user_id: Uuid,
    ) -> Result<Option<EmailVerifyToken>, RepositoryError> {
        let mut tokens = self.tokens.write().await;
        match tokens.get(&token) {
            Some(found) if found.user_id == user_id => Ok(tokens.remove(&token)),
            _ => Ok(None),
        }
    }
}
