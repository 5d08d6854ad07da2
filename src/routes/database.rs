use axum::extract::{Path, State};

use super::RouteState;
use crate::http_objects::{GatewayAPIError, GatewayResponse};

/// List the tables of the configured schema
#[utoipa::path(
    get,
    path = "/database/tables",
    tag = "database",
    responses(
        (status = 200, description = "Sorted table names", body = [String]),
        (status = INTERNAL_SERVER_ERROR, description = "Unable to query the database", body = GatewayAPIError)
    ),
)]
pub async fn list_tables(
    State(state): State<RouteState>,
) -> Result<GatewayResponse, GatewayAPIError> {
    state.schema.tables().await
}

/// List the columns of a table, as `name(type)`
#[utoipa::path(
    get,
    path = "/database/tables/{table}",
    params(
        ("table" = String, Path, description = "Table name"),
    ),
    tag = "database",
    responses(
        (status = 200, description = "Sorted column descriptions", body = [String]),
        (status = NOT_FOUND, description = "Table not found", body = GatewayAPIError),
        (status = INTERNAL_SERVER_ERROR, description = "Unable to query the database", body = GatewayAPIError)
    ),
)]
pub async fn list_columns(
    Path(table): Path<String>,
    State(state): State<RouteState>,
) -> Result<GatewayResponse, GatewayAPIError> {
    state.schema.columns(&table).await
}
