use axum::extract::{Path, State};
use bytes::Bytes;

use super::RouteState;
use crate::http_objects::{
    parse_json_body,
    CreateFunction,
    FunctionEcho,
    GatewayAPIError,
    GatewayResponse,
    UpdateFunction,
};

/// List the functions of a namespace
#[utoipa::path(
    get,
    path = "/function/namespaces/{namespace}",
    params(
        ("namespace" = String, Path, description = "Namespace of the functions"),
    ),
    tag = "operations",
    responses(
        (status = 200, description = "Functions of the namespace, as listed by the controller"),
        (status = INTERNAL_SERVER_ERROR, description = "Unable to list functions", body = GatewayAPIError)
    ),
)]
pub async fn list_functions(
    Path(namespace): Path<String>,
    State(state): State<RouteState>,
) -> Result<GatewayResponse, GatewayAPIError> {
    state.dispatcher.list_functions(&namespace).await
}

/// Create a function
#[utoipa::path(
    post,
    path = "/function/namespaces/{namespace}",
    params(
        ("namespace" = String, Path, description = "Namespace of the new function"),
    ),
    request_body = CreateFunction,
    tag = "operations",
    responses(
        (status = 202, description = "Function is being created", body = FunctionEcho),
        (status = BAD_REQUEST, description = "Missing parameter or incorrect name", body = GatewayAPIError),
        (status = INTERNAL_SERVER_ERROR, description = "Unable to create function", body = GatewayAPIError)
    ),
)]
pub async fn create_function(
    Path(namespace): Path<String>,
    State(state): State<RouteState>,
    body: Bytes,
) -> Result<GatewayResponse, GatewayAPIError> {
    let body = parse_json_body(&body)?;
    state.dispatcher.create_function(&namespace, body).await
}

/// Get a function with its source code and test fixture
#[utoipa::path(
    get,
    path = "/function/namespaces/{namespace}/{name}",
    params(
        ("namespace" = String, Path, description = "Namespace of the function"),
        ("name" = String, Path, description = "Name of the function"),
    ),
    tag = "operations",
    responses(
        (status = 200, description = "Function detail"),
        (status = BAD_REQUEST, description = "Incorrect name", body = GatewayAPIError),
        (status = NOT_FOUND, description = "Function not found", body = GatewayAPIError)
    ),
)]
pub async fn get_function(
    Path((namespace, name)): Path<(String, String)>,
    State(state): State<RouteState>,
) -> Result<GatewayResponse, GatewayAPIError> {
    state.dispatcher.get_function(&namespace, &name).await
}

/// Replace the source code and test fixture of a function
#[utoipa::path(
    put,
    path = "/function/namespaces/{namespace}/{name}",
    params(
        ("namespace" = String, Path, description = "Namespace of the function"),
        ("name" = String, Path, description = "Name of the function"),
    ),
    request_body = UpdateFunction,
    tag = "operations",
    responses(
        (status = 200, description = "Function updated", body = FunctionEcho),
        (status = BAD_REQUEST, description = "Missing parameter or incorrect name", body = GatewayAPIError),
        (status = NOT_FOUND, description = "Function not found", body = GatewayAPIError)
    ),
)]
pub async fn update_function(
    Path((namespace, name)): Path<(String, String)>,
    State(state): State<RouteState>,
    body: Bytes,
) -> Result<GatewayResponse, GatewayAPIError> {
    let body = parse_json_body(&body)?;
    state.dispatcher.update_function(&namespace, &name, body).await
}

/// Delete a function
#[utoipa::path(
    delete,
    path = "/function/namespaces/{namespace}/{name}",
    params(
        ("namespace" = String, Path, description = "Namespace of the function"),
        ("name" = String, Path, description = "Name of the function"),
    ),
    tag = "operations",
    responses(
        (status = 200, description = "Function deleted"),
        (status = BAD_REQUEST, description = "Incorrect name", body = GatewayAPIError),
        (status = NOT_FOUND, description = "Function not found", body = GatewayAPIError)
    ),
)]
pub async fn delete_function(
    Path((namespace, name)): Path<(String, String)>,
    State(state): State<RouteState>,
) -> Result<GatewayResponse, GatewayAPIError> {
    state.dispatcher.delete_function(&namespace, &name).await
}

/// Invoke a function
///
/// The body is handed to the function as is and must name the `verb` to run.
#[utoipa::path(
    post,
    path = "/function/namespaces/{namespace}/{name}",
    params(
        ("namespace" = String, Path, description = "Namespace of the function"),
        ("name" = String, Path, description = "Name of the function"),
    ),
    request_body(content_type = "application/json", content = inline(serde_json::Value)),
    tag = "operations",
    responses(
        (status = 200, description = "Output of the function"),
        (status = BAD_REQUEST, description = "Missing verb or incorrect name", body = GatewayAPIError),
        (status = NOT_FOUND, description = "Function not ready or missing", body = GatewayAPIError)
    ),
)]
pub async fn invoke_function(
    Path((namespace, name)): Path<(String, String)>,
    State(state): State<RouteState>,
    body: Bytes,
) -> Result<GatewayResponse, GatewayAPIError> {
    let body = parse_json_body(&body)?;
    state
        .dispatcher
        .invoke_function(&namespace, &name, body)
        .await
}
