use std::collections::BTreeMap;
use utoipa::openapi::{
    ComponentsBuilder, InfoBuilder, OpenApi, OpenApiBuilder, Required, Response,
    path::{
        HttpMethod, OperationBuilder, ParameterBuilder, ParameterIn, PathItemBuilder,
        PathsBuilder,
    },
    security::{HttpAuthScheme, HttpBuilder, SecurityRequirement, SecurityScheme},
};

use crate::{
    models::{AuthCheckResponse, CreateProjectRequest, Project},
    router::Route,
    types::{ActionVerb, HttpVerb},
};

const SECURITY_SCHEME: &str = "bearer_auth";

fn http_method(method: HttpVerb) -> HttpMethod {
    match method {
        HttpVerb::Get => HttpMethod::Get,
        HttpVerb::Post => HttpMethod::Post,
        HttpVerb::Put => HttpMethod::Put,
        HttpVerb::Patch => HttpMethod::Patch,
        HttpVerb::Delete => HttpMethod::Delete,
    }
}

/// `create_api_projects` for `Create` on `/api/projects`.
fn operation_id(verb: ActionVerb, path: &str) -> String {
    let slug: Vec<&str> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| s.trim_matches(|c| c == '{' || c == '}'))
        .collect();
    format!("{}_{}", verb, slug.join("_"))
}

/// api_doc
///
/// Builds the OpenAPI document from the registered route list, so the docs can
/// never drift from what is actually mounted. Scopes become bearer security
/// requirements; `{name}` captures become required path parameters.
pub fn api_doc(routes: &[Route]) -> OpenApi {
    let mut items: BTreeMap<&str, PathItemBuilder> = BTreeMap::new();

    for route in routes {
        let endpoint = &route.endpoint;
        let metadata = endpoint.metadata();
        let scopes: Vec<String> = metadata.scopes.iter().map(ToString::to_string).collect();

        let mut operation = OperationBuilder::new()
            .operation_id(Some(operation_id(metadata.verb, endpoint.path())))
            .tag(metadata.scopes.last().map_or("api".to_string(), ToString::to_string))
            .security(SecurityRequirement::new(SECURITY_SCHEME, scopes))
            .response("401", Response::new("Missing or invalid credentials"))
            .response("403", Response::new("A required scope is missing"));

        operation = if metadata.redirect_on_success {
            operation.response("302", Response::new("Redirects to the dashboard"))
        } else {
            operation.response("200", Response::new("Success"))
        };

        for segment in endpoint.path().split('/') {
            if let Some(name) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                operation = operation.parameter(
                    ParameterBuilder::new()
                        .name(name)
                        .parameter_in(ParameterIn::Path)
                        .required(Required::True)
                        .build(),
                );
            }
        }

        let item = items
            .remove(endpoint.path())
            .unwrap_or_else(PathItemBuilder::new);
        items.insert(
            endpoint.path(),
            item.operation(http_method(metadata.method), operation.build()),
        );
    }

    let paths = items
        .into_iter()
        .fold(PathsBuilder::new(), |paths, (path, item)| {
            paths.path(path, item.build())
        });

    let components = ComponentsBuilder::new()
        .security_scheme(
            SECURITY_SCHEME,
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        )
        .schema_from::<Project>()
        .schema_from::<CreateProjectRequest>()
        .schema_from::<AuthCheckResponse>()
        .build();

    OpenApiBuilder::new()
        .info(
            InfoBuilder::new()
                .title("Dashboard API")
                .version(env!("CARGO_PKG_VERSION"))
                .build(),
        )
        .paths(paths.build())
        .components(Some(components))
        .build()
}
