use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, MatchedPath, Request},
    http::{Method, StatusCode},
    routing::get,
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    dispatcher::GatewayDispatcher,
    http_objects::{
        CreateFunction,
        CreateNamespace,
        FunctionEcho,
        GatewayAPIError,
        GatewayResponse,
        UpdateFunction,
        Version,
    },
    schema_store::SchemaIntrospector,
};

mod database;
mod functions;
mod namespaces;

/// Function source code travels in request bodies.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

#[derive(OpenApi)]
#[openapi(
        paths(
            version,
            namespaces::list_namespaces,
            namespaces::create_namespace,
            namespaces::delete_namespace,
            functions::list_functions,
            functions::create_function,
            functions::get_function,
            functions::update_function,
            functions::delete_function,
            functions::invoke_function,
            database::list_tables,
            database::list_columns,
        ),
        components(
            schemas(
                CreateNamespace,
                CreateFunction,
                UpdateFunction,
                FunctionEcho,
                GatewayAPIError,
                Version,
            )
        ),
        tags(
            (name = "pgfaas", description = "pgFaaS API")
        )
    )]
struct ApiDoc;

#[derive(Clone)]
pub struct RouteState {
    pub dispatcher: Arc<GatewayDispatcher>,
    pub schema: Arc<SchemaIntrospector>,
}

pub fn create_routes(route_state: RouteState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .merge(SwaggerUi::new("/docs/swagger").url("/docs/openapi.json", ApiDoc::openapi()))
        .route("/version", get(version))
        .route(
            "/function/namespaces",
            get(namespaces::list_namespaces).post(namespaces::create_namespace),
        )
        .route(
            "/function/namespaces/{namespace}",
            get(functions::list_functions)
                .post(functions::create_function)
                .delete(namespaces::delete_namespace),
        )
        .route(
            "/function/namespaces/{namespace}/{name}",
            get(functions::get_function)
                .put(functions::update_function)
                .delete(functions::delete_function)
                .post(functions::invoke_function),
        )
        .route("/database/tables", get(database::list_tables))
        .route("/database/tables/{table}", get(database::list_columns))
        .fallback(not_found)
        .with_state(route_state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request| {
                    let method = req.method();
                    let uri = req.uri();

                    let matched_path = req
                        .extensions()
                        .get::<MatchedPath>()
                        .map(|matched_path| matched_path.as_str());

                    tracing::debug_span!("request", %method, %uri, matched_path)
                })
                .on_failure(()),
        )
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}

/// Version of the gateway
#[utoipa::path(
    get,
    path = "/version",
    tag = "operations",
    responses(
        (status = 200, description = "Gateway version", body = Version),
    ),
)]
async fn version() -> GatewayResponse {
    GatewayResponse::ok(serde_json::json!({ "version": env!("CARGO_PKG_VERSION") }))
}

async fn not_found() -> GatewayAPIError {
    GatewayAPIError::new(StatusCode::NOT_FOUND, "Not found")
}
