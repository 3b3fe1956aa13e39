use std::sync::Arc;

use crate::{
    AppState,
    endpoint::EndpointFactory,
    errors::RegistrationError,
    handlers::{
        project::{ProjectCreateHandler, ProjectListHandler},
        user::{
            AuthCheckHandler, UserDeleteHandler, UserLogoutHandler, VerifyEmailFinalizeHandler,
            VerifyEmailInitiateHandler,
        },
    },
    router::{Registerer, Route, RouterScope},
    types::{ActionVerb, EndpointMetadata, HttpVerb, Path, PermissionScope},
};

/// User-Scoped Registerer
///
/// Root of the tree: endpoints that act on the signed-in user, with every other
/// resource registerer nested underneath.
pub fn new_user_scoped_registerer(children: Vec<Registerer>) -> Registerer {
    Registerer::new(get_user_routes, children)
}

/// get_user_routes
///
/// Every endpoint requires the `user` scope. Only email verification finalize
/// redirects, since it is opened from a link in the browser.
pub fn get_user_routes(
    router: &mut RouterScope,
    config: &AppState,
    base_path: &Arc<Path>,
    factory: &dyn EndpointFactory,
) -> Result<Vec<Route>, RegistrationError> {
    let mut routes = Vec::with_capacity(7);
    let user_scope = [PermissionScope::User];

    // POST {base}/logout
    let logout_endpoint = factory.new_endpoint(EndpointMetadata::new(
        ActionVerb::Update,
        HttpVerb::Post,
        Path::child(base_path, "/logout"),
        user_scope,
    ))?;
    routes.push(Route::new(logout_endpoint, UserLogoutHandler, router));

    // GET {base}/auth/check
    let auth_check_endpoint = factory.new_endpoint(EndpointMetadata::new(
        ActionVerb::Get,
        HttpVerb::Get,
        Path::child(base_path, "/auth/check"),
        user_scope,
    ))?;
    routes.push(Route::new(
        auth_check_endpoint,
        AuthCheckHandler::new(factory.result_writer()),
        router,
    ));

    // DELETE {base}/users/current
    let delete_user_endpoint = factory.new_endpoint(EndpointMetadata::new(
        ActionVerb::Delete,
        HttpVerb::Delete,
        Path::child(base_path, "/users/current"),
        user_scope,
    ))?;
    routes.push(Route::new(
        delete_user_endpoint,
        UserDeleteHandler::new(config, factory.result_writer()),
        router,
    ));

    // POST {base}/projects
    let create_project_endpoint = factory.new_endpoint(EndpointMetadata::new(
        ActionVerb::Create,
        HttpVerb::Post,
        Path::child(base_path, "/projects"),
        user_scope,
    ))?;
    routes.push(Route::new(
        create_project_endpoint,
        ProjectCreateHandler::new(config, factory.decoder_validator(), factory.result_writer()),
        router,
    ));

    // GET {base}/projects
    let list_projects_endpoint = factory.new_endpoint(EndpointMetadata::new(
        ActionVerb::List,
        HttpVerb::Get,
        Path::child(base_path, "/projects"),
        user_scope,
    ))?;
    routes.push(Route::new(
        list_projects_endpoint,
        ProjectListHandler::new(config, factory.result_writer()),
        router,
    ));

    // POST {base}/email/verify/initiate
    let verify_initiate_endpoint = factory.new_endpoint(EndpointMetadata::new(
        ActionVerb::Update,
        HttpVerb::Post,
        Path::child(base_path, "/email/verify/initiate"),
        user_scope,
    ))?;
    routes.push(Route::new(
        verify_initiate_endpoint,
        VerifyEmailInitiateHandler::new(config, factory.result_writer()),
        router,
    ));

    // GET {base}/email/verify/finalize
    let verify_finalize_endpoint = factory.new_endpoint(
        EndpointMetadata::new(
            ActionVerb::Get,
            HttpVerb::Get,
            Path::child(base_path, "/email/verify/finalize"),
            user_scope,
        )
        .with_redirect(),
    )?;
    routes.push(Route::new(
        verify_finalize_endpoint,
        VerifyEmailFinalizeHandler::new(
            config,
            factory.decoder_validator(),
            factory.result_writer(),
        ),
        router,
    ));

    Ok(routes)
}
