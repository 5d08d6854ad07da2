use std::{collections::BTreeSet, sync::Arc};

use axum::http::StatusCode;
use data_model::{
    body::{annotate_function_list, lift_function_detail, listed_function_names},
    build_manifest,
    is_name_correct,
    process_body,
    split_function_name,
    DatabaseConnection,
    FunctionDefaults,
    FunctionManifest,
    FunctionName,
    TestFixture,
};
use faas_client::{FaasController, UpstreamResponse};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::{
    bulk_delete::{BulkNamespaceDeleter, NamespaceDeletion, PartialFailurePolicy},
    config::ServerConfig,
    http_objects::{is_truthy, upstream_status, FunctionEcho, GatewayAPIError, GatewayResponse},
};

/// Function created with every namespace so that the namespace shows up in
/// the controller listing.
pub const BOOTSTRAP_FUNCTION_NAME: &str = "echo";

pub const BOOTSTRAP_SOURCE_CODE: &str = r#"module.exports = {
  echo: (sqlexec, req, callback) => {
    return callback(null, req.body);
  }
};
"#;

const MISSING_PARAMETER: &str = "Missing parameter";
const INCORRECT_NAME: &str = "Either the namespace or function name is incorrect (it should contain only lowercase letters and digits)";
const MISSING_VERB: &str = r#"Missing "verb" in the body of the request"#;

/// Translates gateway operations into controller calls.
///
/// Required inputs are checked before any controller call is made. Controller
/// responses are relayed with their status unless an operation translates it,
/// and a controller that cannot be reached is reported as a 500.
pub struct GatewayDispatcher {
    controller: Arc<dyn FaasController>,
    deleter: BulkNamespaceDeleter,
    function_defaults: FunctionDefaults,
    database: DatabaseConnection,
    delete_policy: PartialFailurePolicy,
}

impl GatewayDispatcher {
    pub fn new(controller: Arc<dyn FaasController>, config: &ServerConfig) -> Self {
        Self {
            deleter: BulkNamespaceDeleter::new(controller.clone()),
            controller,
            function_defaults: config.function.clone(),
            database: config.database.clone(),
            delete_policy: config.namespace_delete_policy,
        }
    }

    pub async fn list_namespaces(&self) -> Result<GatewayResponse, GatewayAPIError> {
        debug!("list namespaces");
        let listing = self.list_functions_upstream().await?;
        if !listing.is_success() {
            return Ok(GatewayResponse::from_upstream(&listing));
        }
        let namespaces: BTreeSet<String> = listed_function_names(&process_body(listing.body))
            .iter()
            .map(|composite| split_function_name(Some(composite.as_str())).namespace)
            .filter(|namespace| !namespace.is_empty())
            .collect();
        Ok(GatewayResponse::new(
            upstream_status(listing.status),
            json!(namespaces),
        ))
    }

    pub async fn create_namespace(&self, body: Value) -> Result<GatewayResponse, GatewayAPIError> {
        let namespace = required_str(&body, "name")?;
        debug!(namespace, "create namespace");
        if !is_name_correct(namespace) {
            return Err(incorrect_name());
        }

        let function = FunctionName::new(namespace, BOOTSTRAP_FUNCTION_NAME);
        let manifest = self.manifest(
            &function,
            BOOTSTRAP_SOURCE_CODE,
            &TestFixture::from(json!({ "verb": BOOTSTRAP_FUNCTION_NAME })),
        )?;
        let response = self
            .controller
            .create_function(&manifest)
            .await
            .map_err(GatewayAPIError::internal_error)?;
        if !response.is_success() {
            warn!(namespace, status = response.status, "namespace not created");
            return Ok(GatewayResponse::from_upstream(&response));
        }
        info!(namespace, "namespace created");
        Ok(GatewayResponse::message(
            StatusCode::ACCEPTED,
            &format!("Namespace {} created", namespace),
        ))
    }

    pub async fn delete_namespace(
        &self,
        namespace: &str,
    ) -> Result<GatewayResponse, GatewayAPIError> {
        debug!(namespace, "delete namespace");
        let deletion = self
            .deleter
            .delete_namespace(namespace)
            .await
            .map_err(GatewayAPIError::internal_error)?;
        let outcome = match deletion {
            NamespaceDeletion::ListFailed(listing) => {
                return Ok(GatewayResponse::from_upstream(&listing))
            }
            NamespaceDeletion::Completed(outcome) => outcome,
        };
        if self.delete_policy.is_failure(&outcome) {
            error!(
                namespace,
                failed = ?outcome.failed,
                "namespace only partially deleted"
            );
            return Ok(GatewayResponse::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "message": format!("Namespace {} only partially deleted", namespace),
                    "failed": outcome.failed,
                }),
            ));
        }
        Ok(GatewayResponse::message(
            StatusCode::ACCEPTED,
            &format!("Namespace {} deleted", namespace),
        ))
    }

    pub async fn list_functions(
        &self,
        namespace: &str,
    ) -> Result<GatewayResponse, GatewayAPIError> {
        debug!(namespace, "list functions");
        let listing = self.list_functions_upstream().await?;
        if !listing.is_success() {
            return Ok(GatewayResponse::from_upstream(&listing));
        }
        let functions: Vec<Value> = match process_body(listing.body) {
            Value::Array(functions) => functions
                .into_iter()
                .filter(|function| {
                    split_function_name(function.get("name").and_then(Value::as_str)).namespace ==
                        namespace
                })
                .collect(),
            _ => vec![],
        };
        Ok(GatewayResponse::new(
            upstream_status(listing.status),
            annotate_function_list(Value::Array(functions)),
        ))
    }

    pub async fn get_function(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<GatewayResponse, GatewayAPIError> {
        let function = addressed_function(namespace, name)?;
        debug!(%function, "get function");
        let response = self
            .controller
            .get_function(&function.composite())
            .await
            .map_err(GatewayAPIError::internal_error)?;
        if !response.is_success() {
            return Ok(GatewayResponse::from_upstream(&response));
        }
        Ok(GatewayResponse::new(
            upstream_status(response.status),
            lift_function_detail(process_body(response.body)),
        ))
    }

    pub async fn create_function(
        &self,
        namespace: &str,
        body: Value,
    ) -> Result<GatewayResponse, GatewayAPIError> {
        let name = required_str(&body, "name")?;
        let (source_code, test) = function_definition(&body)?;
        let function = FunctionName::new(namespace, name);
        debug!(%function, "create function");
        if !is_name_correct(namespace) || !is_name_correct(name) {
            return Err(incorrect_name());
        }

        let manifest = self.manifest(&function, source_code, &test)?;
        let response = self
            .controller
            .create_function(&manifest)
            .await
            .map_err(GatewayAPIError::internal_error)?;
        if !response.is_success() {
            warn!(%function, status = response.status, "function not created");
            return Ok(GatewayResponse::from_upstream(&response));
        }
        info!(%function, "function created");
        Ok(GatewayResponse::accepted(self.echo(&function, &manifest)?))
    }

    pub async fn update_function(
        &self,
        namespace: &str,
        name: &str,
        body: Value,
    ) -> Result<GatewayResponse, GatewayAPIError> {
        if name.is_empty() {
            return Err(GatewayAPIError::bad_request(MISSING_PARAMETER));
        }
        let function = addressed_function(namespace, name)?;
        let (source_code, test) = function_definition(&body)?;
        debug!(%function, "update function");

        let manifest = self.manifest(&function, source_code, &test)?;
        let response = self
            .controller
            .update_function(&manifest)
            .await
            .map_err(GatewayAPIError::internal_error)?;
        if !response.is_success() {
            warn!(%function, status = response.status, "function not updated");
            return Ok(GatewayResponse::from_upstream(&response));
        }
        info!(%function, "function updated");
        Ok(GatewayResponse::ok(self.echo(&function, &manifest)?))
    }

    pub async fn delete_function(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<GatewayResponse, GatewayAPIError> {
        let function = addressed_function(namespace, name)?;
        debug!(%function, "delete function");
        let response = self
            .controller
            .delete_function(&function.composite())
            .await
            .map_err(GatewayAPIError::internal_error)?;
        Ok(GatewayResponse::from_upstream(&response))
    }

    pub async fn invoke_function(
        &self,
        namespace: &str,
        name: &str,
        body: Value,
    ) -> Result<GatewayResponse, GatewayAPIError> {
        let function = addressed_function(namespace, name)?;
        debug!(%function, verb = ?body.get("verb"), "invoke function");
        if !is_truthy(body.get("verb")) {
            return Err(GatewayAPIError::bad_request(MISSING_VERB));
        }

        let response = self
            .controller
            .invoke_function(&function.composite(), &body)
            .await
            .map_err(GatewayAPIError::internal_error)?;
        match response.status {
            502 | 503 => {
                warn!(%function, status = response.status, "function not available");
                Err(GatewayAPIError::not_found(&format!(
                    "Function {} is not ready or does not exist",
                    function
                )))
            }
            _ => Ok(GatewayResponse::passthrough(&response)),
        }
    }

    async fn list_functions_upstream(&self) -> Result<UpstreamResponse, GatewayAPIError> {
        self.controller
            .list_functions()
            .await
            .map_err(GatewayAPIError::internal_error)
    }

    fn manifest(
        &self,
        function: &FunctionName,
        source_code: &str,
        test: &TestFixture,
    ) -> Result<FunctionManifest, GatewayAPIError> {
        build_manifest(
            &function.composite(),
            source_code,
            test,
            &self.function_defaults,
            &self.database,
        )
        .map_err(|e| GatewayAPIError::bad_request(&e.to_string()))
    }

    fn echo(
        &self,
        function: &FunctionName,
        manifest: &FunctionManifest,
    ) -> Result<Value, GatewayAPIError> {
        let echo = FunctionEcho {
            namespace: function.namespace.clone(),
            name: function.name.clone(),
            image: manifest.image.clone(),
            sourcecode: manifest.source_code().unwrap_or_default().to_string(),
            test: manifest.test().unwrap_or_default().to_string(),
        };
        serde_json::to_value(echo).map_err(|e| GatewayAPIError::internal_error(e.into()))
    }
}

fn incorrect_name() -> GatewayAPIError {
    GatewayAPIError::bad_request(INCORRECT_NAME)
}

/// Name of an existing function taken from the request path. Only names
/// the gateway could have created are forwarded upstream.
fn addressed_function(namespace: &str, name: &str) -> Result<FunctionName, GatewayAPIError> {
    if !is_name_correct(namespace) || !is_name_correct(name) {
        return Err(incorrect_name());
    }
    Ok(FunctionName::new(namespace, name))
}

fn required<'a>(body: &'a Value, key: &str) -> Result<&'a Value, GatewayAPIError> {
    let value = body.get(key);
    if !is_truthy(value) {
        return Err(GatewayAPIError::bad_request(MISSING_PARAMETER));
    }
    value.ok_or_else(|| GatewayAPIError::bad_request(MISSING_PARAMETER))
}

fn required_str<'a>(body: &'a Value, key: &str) -> Result<&'a str, GatewayAPIError> {
    required(body, key)?
        .as_str()
        .ok_or_else(|| GatewayAPIError::bad_request(&format!("{} must be a string", key)))
}

/// Source code and test fixture of a create or update request. The fixture
/// must name the verb it exercises.
fn function_definition(body: &Value) -> Result<(&str, TestFixture), GatewayAPIError> {
    let source_code = required_str(body, "sourcecode")?;
    let test = TestFixture::from(required(body, "test")?.clone());
    if test.verb().is_none() {
        return Err(GatewayAPIError::bad_request(MISSING_PARAMETER));
    }
    Ok((source_code, test))
}
