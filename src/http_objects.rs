use std::fmt;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use data_model::{body::strip_composite_names, process_body};
use faas_client::UpstreamResponse;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::error;
use utoipa::ToSchema;

/// A client-facing reply: a status and a JSON body, always sent with the
/// JSON content type and a wildcard CORS origin.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayResponse {
    pub status_code: StatusCode,
    pub body: Value,
}

impl GatewayResponse {
    pub fn new(status_code: StatusCode, body: Value) -> Self {
        Self { status_code, body }
    }

    pub fn ok(body: Value) -> Self {
        Self::new(StatusCode::OK, body)
    }

    pub fn accepted(body: Value) -> Self {
        Self::new(StatusCode::ACCEPTED, body)
    }

    pub fn message(status_code: StatusCode, message: &str) -> Self {
        Self::new(status_code, json!({ "message": message }))
    }

    /// Relays an upstream response with its status and normalized body.
    pub fn from_upstream(upstream: &UpstreamResponse) -> Self {
        let mut response = Self::passthrough(upstream);
        strip_composite_names(&mut response.body);
        response
    }

    /// Like [`GatewayResponse::from_upstream`], without touching function
    /// names. Used for the output of user functions.
    pub fn passthrough(upstream: &UpstreamResponse) -> Self {
        Self::new(
            upstream_status(upstream.status),
            process_body(upstream.body.clone()),
        )
    }
}

pub fn upstream_status(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

impl IntoResponse for GatewayResponse {
    fn into_response(self) -> Response {
        (
            self.status_code,
            [
                (header::CONTENT_TYPE, "application/json"),
                (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            ],
            Json(self.body),
        )
            .into_response()
    }
}

#[derive(Debug, ToSchema, Serialize, Deserialize)]
pub struct GatewayAPIError {
    #[serde(skip)]
    status_code: StatusCode,
    message: String,
}

impl GatewayAPIError {
    pub fn new(status_code: StatusCode, message: &str) -> Self {
        Self {
            status_code,
            message: message.to_string(),
        }
    }

    pub fn internal_error(e: anyhow::Error) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string().as_str())
    }

    pub fn not_found(message: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn status_code(&self) -> StatusCode {
        self.status_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for GatewayAPIError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status_code, self.message)
    }
}

impl std::error::Error for GatewayAPIError {}

impl IntoResponse for GatewayAPIError {
    fn into_response(self) -> Response {
        error!("API Error: {} - {}", self.status_code, self.message);
        GatewayResponse::message(self.status_code, &self.message).into_response()
    }
}

/// Parses a request body. An empty body is an empty object.
pub fn parse_json_body(body: &Bytes) -> Result<Value, GatewayAPIError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(json!({}));
    }
    serde_json::from_slice(body).map_err(|_| GatewayAPIError::bad_request("Malformed JSON body"))
}

/// Present and not `null`, `false`, `0` or empty.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::String(text)) => !text.is_empty(),
        Some(Value::Number(number)) => number.as_f64() != Some(0.0),
        Some(_) => true,
    }
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct CreateNamespace {
    pub name: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct CreateFunction {
    pub name: Option<String>,
    /// Source code of the function module.
    pub sourcecode: Option<String>,
    /// Test fixture, as a JSON object or a serialized one. Must name a
    /// `verb`.
    #[schema(value_type = Object)]
    pub test: Option<Value>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct UpdateFunction {
    pub sourcecode: Option<String>,
    #[schema(value_type = Object)]
    pub test: Option<Value>,
}

/// Function as echoed back after a create or update.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FunctionEcho {
    pub namespace: String,
    pub name: String,
    pub image: String,
    pub sourcecode: String,
    /// The test fixture as stored, serialized to a string.
    pub test: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Version {
    pub version: String,
}
