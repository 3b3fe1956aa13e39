use async_trait::async_trait;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::{
    AppState,
    endpoint::{ApiRequest, DecoderValidator, Handler, ResultWriter},
    errors::ApiError,
    models::{CreateProjectRequest, Project},
};

/// ProjectCreateHandler
///
/// Creates a project owned by the caller. Names are unique per owner.
pub struct ProjectCreateHandler {
    config: AppState,
    decoder: DecoderValidator,
    writer: ResultWriter,
}

impl ProjectCreateHandler {
    pub fn new(config: &AppState, decoder: DecoderValidator, writer: ResultWriter) -> Self {
        Self {
            config: config.clone(),
            decoder,
            writer,
        }
    }

    async fn create(&self, request: &ApiRequest) -> Result<Project, ApiError> {
        let payload: CreateProjectRequest = self.decoder.decode_and_validate(request)?;
        let name = payload.name.trim();

        // The repository rejects a taken name atomically (409).
        let project = self.config.repo.create_project(request.user.id, name).await?;
        tracing::info!(project_id = %project.id, user_id = %request.user.id, "project created");
        Ok(project)
    }
}

#[async_trait]
impl Handler for ProjectCreateHandler {
    async fn handle(&self, request: ApiRequest) -> Response {
        match self.create(&request).await {
            Ok(project) => self.writer.write_result(StatusCode::CREATED, &project),
            Err(err) => self.writer.write_error(err),
        }
    }
}

/// ProjectListHandler
pub struct ProjectListHandler {
    config: AppState,
    writer: ResultWriter,
}

impl ProjectListHandler {
    pub fn new(config: &AppState, writer: ResultWriter) -> Self {
        Self {
            config: config.clone(),
            writer,
        }
    }
}

#[async_trait]
impl Handler for ProjectListHandler {
    async fn handle(&self, request: ApiRequest) -> Response {
        match self.config.repo.list_projects(request.user.id).await {
            Ok(projects) => self.writer.write_result(StatusCode::OK, &projects),
            Err(e) => self.writer.write_error(e.into()),
        }
    }
}

/// Reads the `project_id` path parameter.
fn project_id(request: &ApiRequest) -> Result<Uuid, ApiError> {
    request
        .param("project_id")
        .and_then(|id| Uuid::parse_str(id).ok())
        .ok_or_else(|| ApiError::BadRequest("invalid project id".to_string()))
}

/// ProjectGetHandler
///
/// Returns one of the caller's projects. Projects owned by someone else are
/// reported as missing rather than forbidden.
pub struct ProjectGetHandler {
    config: AppState,
    writer: ResultWriter,
}

impl ProjectGetHandler {
    pub fn new(config: &AppState, writer: ResultWriter) -> Self {
        Self {
            config: config.clone(),
            writer,
        }
    }

    async fn get(&self, request: &ApiRequest) -> Result<Project, ApiError> {
        let id = project_id(request)?;
        self.config
            .repo
            .get_project(id, request.user.id)
            .await?
            .ok_or(ApiError::NotFound("project"))
    }
}

#[async_trait]
impl Handler for ProjectGetHandler {
    async fn handle(&self, request: ApiRequest) -> Response {
        match self.get(&request).await {
            Ok(project) => self.writer.write_result(StatusCode::OK, &project),
            Err(err) => self.writer.write_error(err),
        }
    }
}

/// ProjectDeleteHandler
pub struct ProjectDeleteHandler {
    config: AppState,
    writer: ResultWriter,
}

impl ProjectDeleteHandler {
    pub fn new(config: &AppState, writer: ResultWriter) -> Self {
        Self {
            config: config.clone(),
            writer,
        }
    }

    async fn delete(&self, request: &ApiRequest) -> Result<(), ApiError> {
        let id = project_id(request)?;
        if self.config.repo.delete_project(id, request.user.id).await? {
            tracing::info!(project_id = %id, "project deleted");
            Ok(())
        } else {
            Err(ApiError::NotFound("project"))
        }
    }
}

#[async_trait]
impl Handler for ProjectDeleteHandler {
    async fn handle(&self, request: ApiRequest) -> Response {
        match self.delete(&request).await {
            Ok(()) => StatusCode::NO_CONTENT.into_response(),
            Err(err) => self.writer.write_error(err),
        }
    }
}
