use std::{collections::BTreeMap, fmt};

use anyhow::{anyhow, Result};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const SCALE_MIN_LABEL: &str = "com.openfaas.scale.min";
pub const SCALE_MAX_LABEL: &str = "com.openfaas.scale.max";
pub const SCALE_FACTOR_LABEL: &str = "com.openfaas.scale.factor";
pub const FUNCTION_LABEL: &str = "com.openfaas.function";
pub const SOURCE_CODE_ANNOTATION: &str = "sourcecode";
pub const TEST_ANNOTATION: &str = "test";

/// Memory and CPU, in the string notation the controller expects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FunctionResources {
    pub memory: String,
    pub cpu: String,
}

impl Default for FunctionResources {
    fn default() -> Self {
        Self {
            memory: "128M".to_string(),
            cpu: "0.01".to_string(),
        }
    }
}

/// Deployment parameters shared by every function the gateway creates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FunctionDefaults {
    pub image: String,
    pub scale_min: u32,
    pub scale_max: u32,
    pub scale_factor: u32,
    pub limits: FunctionResources,
    pub requests: FunctionResources,
}

impl Default for FunctionDefaults {
    fn default() -> Self {
        Self {
            image: "lmorandini/pgfaas-node:latest".to_string(),
            scale_min: 1,
            scale_max: 2,
            scale_factor: 10,
            limits: FunctionResources::default(),
            requests: FunctionResources::default(),
        }
    }
}

/// PostgreSQL connection parameters. They are used by the gateway for schema
/// introspection and handed to every function through its environment.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DatabaseConnection {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub schema: String,
    pub user: String,
    pub password: String,
    /// Host the function containers use to reach the database, when it
    /// differs from the one the gateway uses.
    pub function_host: Option<String>,
}

impl Default for DatabaseConnection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5432,
            database: "postgres".to_string(),
            schema: "public".to_string(),
            user: "pgfaas".to_string(),
            password: "pgfaas".to_string(),
            function_host: None,
        }
    }
}

impl fmt::Debug for DatabaseConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConnection")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("user", &self.user)
            .field("function_host", &self.function_host)
            .finish()
    }
}

impl DatabaseConnection {
    fn function_env(&self) -> BTreeMap<String, String> {
        let host = self.function_host.as_ref().unwrap_or(&self.host);
        BTreeMap::from([
            ("PGHOST".to_string(), host.clone()),
            ("PGPORT".to_string(), self.port.to_string()),
            ("PGDATABASE".to_string(), self.database.clone()),
            ("PGSCHEMA".to_string(), self.schema.clone()),
            ("PGUSER".to_string(), self.user.clone()),
            ("PGPASSWORD".to_string(), self.password.clone()),
        ])
    }
}

/// Test data attached to a function, either already serialized by the
/// client or as a JSON document.
#[derive(Debug, Clone, PartialEq)]
pub enum TestFixture {
    Text(String),
    Structured(Value),
}

impl From<Value> for TestFixture {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => TestFixture::Text(text),
            other => TestFixture::Structured(other),
        }
    }
}

impl TestFixture {
    /// The string form embedded in the manifest. Clients get it back verbatim
    /// when reading the function.
    pub fn to_text(&self) -> Result<String> {
        match self {
            TestFixture::Text(text) => Ok(text.clone()),
            TestFixture::Structured(value) => serde_json::to_string(value)
                .map_err(|e| anyhow!("unable to serialize test fixture: {}", e)),
        }
    }

    /// The verb the fixture exercises, if it names a non-empty one.
    pub fn verb(&self) -> Option<String> {
        let parsed;
        let value = match self {
            TestFixture::Structured(value) => value,
            TestFixture::Text(text) => {
                parsed = serde_json::from_str::<Value>(text).ok()?;
                &parsed
            }
        };
        match value.get("verb")? {
            Value::String(verb) if !verb.is_empty() => Some(verb.clone()),
            _ => None,
        }
    }
}

/// Deployment document sent to the controller when creating or updating a
/// function.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Builder)]
#[serde(rename_all = "camelCase")]
pub struct FunctionManifest {
    pub service: String,
    pub name: String,
    pub image: String,
    #[builder(default = "1")]
    pub replicas: u32,
    #[builder(default)]
    pub env_process: String,
    #[builder(default)]
    pub network: String,
    pub env_vars: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub limits: FunctionResources,
    pub requests: FunctionResources,
}

impl FunctionManifest {
    pub fn source_code(&self) -> Option<&str> {
        self.annotations
            .get(SOURCE_CODE_ANNOTATION)
            .map(String::as_str)
    }

    pub fn test(&self) -> Option<&str> {
        self.annotations.get(TEST_ANNOTATION).map(String::as_str)
    }
}

/// Builds the manifest of a function.
///
/// The controller only accepts flat string environment variables and does not
/// keep arbitrary metadata around, so the source code and the test fixture are
/// flattened to strings and stored twice: once in the environment, where the
/// function runtime reads them, and once in the annotations, which are
/// returned when the function is read back.
pub fn build_manifest(
    composite_name: &str,
    source_code: &str,
    test: &TestFixture,
    defaults: &FunctionDefaults,
    database: &DatabaseConnection,
) -> Result<FunctionManifest> {
    let test = test.to_text()?;

    let mut env_vars = database.function_env();
    env_vars.insert("SCRIPT".to_string(), source_code.to_string());
    env_vars.insert("TEST".to_string(), test.clone());

    let labels = BTreeMap::from([
        (SCALE_MIN_LABEL.to_string(), defaults.scale_min.to_string()),
        (SCALE_MAX_LABEL.to_string(), defaults.scale_max.to_string()),
        (
            SCALE_FACTOR_LABEL.to_string(),
            defaults.scale_factor.to_string(),
        ),
        (FUNCTION_LABEL.to_string(), composite_name.to_string()),
        ("function".to_string(), "true".to_string()),
    ]);

    let annotations = BTreeMap::from([
        (SOURCE_CODE_ANNOTATION.to_string(), source_code.to_string()),
        (TEST_ANNOTATION.to_string(), test),
    ]);

    let manifest = FunctionManifestBuilder::default()
        .service(composite_name.to_string())
        .name(composite_name.to_string())
        .image(defaults.image.clone())
        .env_vars(env_vars)
        .labels(labels)
        .annotations(annotations)
        .limits(defaults.limits.clone())
        .requests(defaults.requests.clone())
        .build()?;
    Ok(manifest)
}
