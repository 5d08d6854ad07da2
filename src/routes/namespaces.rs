use axum::extract::{Path, State};
use bytes::Bytes;

use super::RouteState;
use crate::http_objects::{parse_json_body, CreateNamespace, GatewayAPIError, GatewayResponse};

/// List all namespaces
#[utoipa::path(
    get,
    path = "/function/namespaces",
    tag = "operations",
    responses(
        (status = 200, description = "Sorted namespace names", body = [String]),
        (status = INTERNAL_SERVER_ERROR, description = "Unable to list namespaces", body = GatewayAPIError)
    ),
)]
pub async fn list_namespaces(
    State(state): State<RouteState>,
) -> Result<GatewayResponse, GatewayAPIError> {
    state.dispatcher.list_namespaces().await
}

/// Create a namespace
#[utoipa::path(
    post,
    path = "/function/namespaces",
    request_body = CreateNamespace,
    tag = "operations",
    responses(
        (status = 202, description = "Namespace is being created"),
        (status = BAD_REQUEST, description = "Missing or incorrect name", body = GatewayAPIError),
        (status = INTERNAL_SERVER_ERROR, description = "Unable to create namespace", body = GatewayAPIError)
    ),
)]
pub async fn create_namespace(
    State(state): State<RouteState>,
    body: Bytes,
) -> Result<GatewayResponse, GatewayAPIError> {
    let body = parse_json_body(&body)?;
    state.dispatcher.create_namespace(body).await
}

/// Delete a namespace and all of its functions
#[utoipa::path(
    delete,
    path = "/function/namespaces/{namespace}",
    params(
        ("namespace" = String, Path, description = "Namespace to delete"),
    ),
    tag = "operations",
    responses(
        (status = 202, description = "Namespace deleted"),
        (status = INTERNAL_SERVER_ERROR, description = "Unable to delete namespace", body = GatewayAPIError)
    ),
)]
pub async fn delete_namespace(
    Path(namespace): Path<String>,
    State(state): State<RouteState>,
) -> Result<GatewayResponse, GatewayAPIError> {
    state.dispatcher.delete_namespace(&namespace).await
}
