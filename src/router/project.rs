use std::sync::Arc;
use uuid::Uuid;

use crate::{
    AppState,
    endpoint::{ApiRequest, EndpointFactory},
    errors::{ApiError, RegistrationError},
    handlers::project::{ProjectDeleteHandler, ProjectGetHandler},
    router::{Middleware, Registerer, Route, RouterScope},
    types::{ActionVerb, EndpointMetadata, HttpVerb, Path, PermissionScope},
};

/// ProjectIdGuard
///
/// Rejects requests whose `{project_id}` is not a UUID before any handler runs.
pub struct ProjectIdGuard;

impl Middleware for ProjectIdGuard {
    fn name(&self) -> &'static str {
        "project_id_guard"
    }

    fn check(&self, request: &ApiRequest) -> Result<(), ApiError> {
        match request.param("project_id").map(Uuid::parse_str) {
            Some(Ok(_)) => Ok(()),
            _ => Err(ApiError::BadRequest(
                "project_id must be a valid UUID".to_string(),
            )),
        }
    }
}

/// Project-Scoped Registerer
///
/// Endpoints acting on a single project. Installs `ProjectIdGuard` on its own
/// router group, so the guard never applies to the parent's routes.
pub fn new_project_scoped_registerer(children: Vec<Registerer>) -> Registerer {
    Registerer::new(get_project_routes, children)
}

pub fn get_project_routes(
    router: &mut RouterScope,
    config: &AppState,
    base_path: &Arc<Path>,
    factory: &dyn EndpointFactory,
) -> Result<Vec<Route>, RegistrationError> {
    router.use_middleware(ProjectIdGuard);

    let project_scopes = [PermissionScope::User, PermissionScope::Project];
    let project_path = Path::child(base_path, "/projects/{project_id}");

    // GET {base}/projects/{project_id}
    let get_endpoint = factory.new_endpoint(EndpointMetadata::new(
        ActionVerb::Get,
        HttpVerb::Get,
        Arc::clone(&project_path),
        project_scopes,
    ))?;
    let get_handler = ProjectGetHandler::new(config, factory.result_writer());

    // DELETE {base}/projects/{project_id}
    let delete_endpoint = factory.new_endpoint(EndpointMetadata::new(
        ActionVerb::Delete,
        HttpVerb::Delete,
        project_path,
        project_scopes,
    ))?;
    let delete_handler = ProjectDeleteHandler::new(config, factory.result_writer());

    Ok(vec![
        Route::new(get_endpoint, get_handler, router),
        Route::new(delete_endpoint, delete_handler, router),
    ])
}
