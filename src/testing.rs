use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
        Mutex,
    },
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::Router;
use data_model::{
    build_manifest,
    compose_function_name,
    test_objects::tests::{plus_fixture, PLUS_SOURCE_CODE},
    DatabaseConnection,
    FunctionDefaults,
    FunctionManifest,
    TestFixture,
};
use faas_client::{FaasController, UpstreamResponse};
use serde_json::{json, Value};
use tracing::subscriber;
use tracing_subscriber::{layer::SubscriberExt, Layer};

use crate::{
    config::ServerConfig,
    dispatcher::GatewayDispatcher,
    routes::{create_routes, RouteState},
    schema_store::{ColumnRow, SchemaIntrospector, SchemaStore},
};

/// A call received by [`FakeController`], with the composite function name
/// it targeted.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamCall {
    ListFunctions,
    GetFunction(String),
    CreateFunction(String),
    UpdateFunction(String),
    DeleteFunction(String),
    InvokeFunction(String, Value),
}

#[derive(Default)]
struct ControllerState {
    deployed: Vec<FunctionManifest>,
    calls: Vec<UpstreamCall>,
    failing_deletes: HashSet<String>,
    unavailable: HashSet<String>,
    list_failure: Option<UpstreamResponse>,
    unreachable: bool,
}

/// In-memory stand-in for the FaaS controller. Deployed functions run the
/// `plus` and `echo` verbs of the sample function.
#[derive(Default)]
pub struct FakeController {
    state: Mutex<ControllerState>,
    deletes_in_flight: AtomicUsize,
    max_deletes_in_flight: AtomicUsize,
}

impl FakeController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_functions(functions: &[(&str, &str)]) -> Self {
        let controller = Self::new();
        for (namespace, name) in functions {
            controller.deploy(namespace, name);
        }
        controller
    }

    pub fn deploy(&self, namespace: &str, name: &str) {
        let manifest = build_manifest(
            &compose_function_name(namespace, name),
            PLUS_SOURCE_CODE,
            &TestFixture::from(plus_fixture()),
            &FunctionDefaults::default(),
            &DatabaseConnection::default(),
        )
        .unwrap();
        self.state.lock().unwrap().deployed.push(manifest);
    }

    pub fn calls(&self) -> Vec<UpstreamCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Composite names of the deployed functions, in deployment order.
    pub fn deployed(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .deployed
            .iter()
            .map(|manifest| manifest.name.clone())
            .collect()
    }

    pub fn manifest(&self, composite_name: &str) -> Option<FunctionManifest> {
        self.state
            .lock()
            .unwrap()
            .deployed
            .iter()
            .find(|manifest| manifest.name == composite_name)
            .cloned()
    }

    pub fn fail_delete(&self, composite_name: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_deletes
            .insert(composite_name.to_string());
    }

    pub fn fail_list(&self, response: UpstreamResponse) {
        self.state.lock().unwrap().list_failure = Some(response);
    }

    /// The function stays listed but its replicas never become ready.
    pub fn make_unavailable(&self, composite_name: &str) {
        self.state
            .lock()
            .unwrap()
            .unavailable
            .insert(composite_name.to_string());
    }

    /// Every call fails before reaching the controller.
    pub fn make_unreachable(&self) {
        self.state.lock().unwrap().unreachable = true;
    }

    pub fn max_concurrent_deletes(&self) -> usize {
        self.max_deletes_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, call: UpstreamCall) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.unreachable {
            return Err(anyhow!("connection refused"));
        }
        state.calls.push(call);
        Ok(())
    }

    fn listed(manifest: &FunctionManifest) -> Value {
        json!({
            "name": manifest.name,
            "image": manifest.image,
            "invocationCount": 0,
            "replicas": manifest.replicas,
            "availableReplicas": manifest.replicas,
            "envProcess": manifest.env_process,
            "labels": manifest.labels,
        })
    }

    fn run(verb: &str, body: &Value) -> UpstreamResponse {
        match verb {
            "plus" => {
                let a = body["a"].as_i64().unwrap_or_default();
                let b = body["b"].as_i64().unwrap_or_default();
                UpstreamResponse::new(200, json!({ "c": a + b }).to_string())
            }
            "echo" => UpstreamResponse::new(200, body.to_string()),
            other => UpstreamResponse::new(
                500,
                json!({ "message": format!("verb {} not supported", other) }).to_string(),
            ),
        }
    }
}

#[async_trait]
impl FaasController for FakeController {
    async fn list_functions(&self) -> Result<UpstreamResponse> {
        self.record(UpstreamCall::ListFunctions)?;
        let state = self.state.lock().unwrap();
        if let Some(failure) = &state.list_failure {
            return Ok(failure.clone());
        }
        let listing: Vec<Value> = state.deployed.iter().map(Self::listed).collect();
        Ok(UpstreamResponse::new(200, json!(listing).to_string()))
    }

    async fn get_function(&self, composite_name: &str) -> Result<UpstreamResponse> {
        self.record(UpstreamCall::GetFunction(composite_name.to_string()))?;
        let state = self.state.lock().unwrap();
        let Some(manifest) = state.deployed.iter().find(|m| m.name == composite_name) else {
            return Ok(UpstreamResponse::new(404, "function not found"));
        };
        let mut detail = Self::listed(manifest);
        detail["annotations"] = json!(manifest.annotations);
        Ok(UpstreamResponse::new(200, detail.to_string()))
    }

    async fn create_function(&self, manifest: &FunctionManifest) -> Result<UpstreamResponse> {
        self.record(UpstreamCall::CreateFunction(manifest.name.clone()))?;
        let mut state = self.state.lock().unwrap();
        if state.deployed.iter().any(|m| m.name == manifest.name) {
            return Ok(UpstreamResponse::new(
                409,
                format!("function {} already exists", manifest.name),
            ));
        }
        state.deployed.push(manifest.clone());
        Ok(UpstreamResponse::new(200, ""))
    }

    async fn update_function(&self, manifest: &FunctionManifest) -> Result<UpstreamResponse> {
        self.record(UpstreamCall::UpdateFunction(manifest.name.clone()))?;
        let mut state = self.state.lock().unwrap();
        match state.deployed.iter_mut().find(|m| m.name == manifest.name) {
            Some(deployed) => {
                *deployed = manifest.clone();
                Ok(UpstreamResponse::new(200, ""))
            }
            None => Ok(UpstreamResponse::new(404, "function not found")),
        }
    }

    async fn delete_function(&self, composite_name: &str) -> Result<UpstreamResponse> {
        self.record(UpstreamCall::DeleteFunction(composite_name.to_string()))?;
        let in_flight = self.deletes_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_deletes_in_flight
            .fetch_max(in_flight, Ordering::SeqCst);
        tokio::task::yield_now().await;

        let response = {
            let mut state = self.state.lock().unwrap();
            if state.failing_deletes.contains(composite_name) {
                UpstreamResponse::new(500, json!({ "msg": "delete failed" }).to_string())
            } else if let Some(position) =
                state.deployed.iter().position(|m| m.name == composite_name)
            {
                state.deployed.remove(position);
                UpstreamResponse::new(200, "")
            } else {
                UpstreamResponse::new(404, "function not found")
            }
        };
        self.deletes_in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(response)
    }

    async fn invoke_function(
        &self,
        composite_name: &str,
        body: &Value,
    ) -> Result<UpstreamResponse> {
        self.record(UpstreamCall::InvokeFunction(
            composite_name.to_string(),
            body.clone(),
        ))?;
        let state = self.state.lock().unwrap();
        let deployed = state.deployed.iter().any(|m| m.name == composite_name);
        if !deployed || state.unavailable.contains(composite_name) {
            return Ok(UpstreamResponse::new(502, "Bad Gateway"));
        }
        let verb = body["verb"].as_str().unwrap_or_default();
        Ok(Self::run(verb, body))
    }
}

/// In-memory stand-in for the PostgreSQL catalog.
#[derive(Default)]
pub struct FakeSchemaStore {
    tables: Vec<String>,
    columns: HashMap<String, Vec<ColumnRow>>,
    failure: Option<String>,
}

impl FakeSchemaStore {
    pub fn new(tables: &[&str], columns: &[(&str, Vec<ColumnRow>)]) -> Self {
        Self {
            tables: tables.iter().map(|table| table.to_string()).collect(),
            columns: columns
                .iter()
                .map(|(table, rows)| (table.to_string(), rows.clone()))
                .collect(),
            failure: None,
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Default::default()
        }
    }

    fn check(&self) -> Result<()> {
        match &self.failure {
            Some(message) => Err(anyhow!(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SchemaStore for FakeSchemaStore {
    async fn list_tables(&self, _schema: &str) -> Result<Vec<String>> {
        self.check()?;
        Ok(self.tables.clone())
    }

    async fn list_columns(&self, _schema: &str, table: &str) -> Result<Vec<ColumnRow>> {
        self.check()?;
        Ok(self.columns.get(table).cloned().unwrap_or_default())
    }
}

/// The gateway router wired to the fakes.
pub struct TestGateway {
    pub controller: Arc<FakeController>,
    pub router: Router,
}

impl TestGateway {
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    pub fn with_config(config: ServerConfig) -> Self {
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug"));
        let _ = subscriber::set_global_default(
            tracing_subscriber::registry()
                .with(tracing_subscriber::fmt::layer().with_filter(env_filter)),
        );

        let controller = Arc::new(FakeController::new());
        let schema_store = FakeSchemaStore::new(
            &["roads", "discount"],
            &[(
                "roads",
                vec![
                    ColumnRow::new("name", "text"),
                    ColumnRow::new("geom", "USER-DEFINED"),
                ],
            )],
        );
        let route_state = RouteState {
            dispatcher: Arc::new(GatewayDispatcher::new(controller.clone(), &config)),
            schema: Arc::new(SchemaIntrospector::new(
                Arc::new(schema_store),
                &config.database.schema,
            )),
        };
        Self {
            controller,
            router: create_routes(route_state),
        }
    }
}
