use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use data_model::FunctionManifest;
use reqwest::{Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenFaasConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Applies to every upstream call. There are no retries.
    pub timeout_secs: u64,
}

impl Default for OpenFaasConfig {
    fn default() -> Self {
        OpenFaasConfig {
            url: "http://127.0.0.1:8080".to_string(),
            username: None,
            password: None,
            timeout_secs: 60,
        }
    }
}

impl OpenFaasConfig {
    pub fn validate(&self) -> Result<()> {
        let url = self
            .url
            .parse::<Url>()
            .map_err(|e| anyhow!("invalid openfaas url {}: {}", self.url, e))?;
        if url.cannot_be_a_base() {
            return Err(anyhow!("invalid openfaas url: {}", self.url));
        }
        if self.timeout_secs == 0 {
            return Err(anyhow!("openfaas timeout must be greater than zero"));
        }
        Ok(())
    }
}

/// Status and raw body of a controller response. Any HTTP status, successful
/// or not, is a response; only transport failures are errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: String,
}

impl UpstreamResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The FaaS controller the gateway deploys functions on.
#[async_trait]
pub trait FaasController: Send + Sync {
    async fn list_functions(&self) -> Result<UpstreamResponse>;

    async fn get_function(&self, composite_name: &str) -> Result<UpstreamResponse>;

    async fn create_function(&self, manifest: &FunctionManifest) -> Result<UpstreamResponse>;

    async fn update_function(&self, manifest: &FunctionManifest) -> Result<UpstreamResponse>;

    async fn delete_function(&self, composite_name: &str) -> Result<UpstreamResponse>;

    async fn invoke_function(&self, composite_name: &str, body: &Value)
        -> Result<UpstreamResponse>;
}

/// Client of the OpenFaaS gateway API.
pub struct OpenFaasClient {
    client: reqwest::Client,
    base_url: Url,
    username: Option<String>,
    password: Option<String>,
}

impl OpenFaasClient {
    pub fn new(config: &OpenFaasConfig) -> Result<Self> {
        config.validate()?;
        let base_url = config.url.parse::<Url>()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url,
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    /// Appends `segments` to the base path. Each segment is percent-encoded,
    /// so a function name can never leave its path segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("invalid openfaas url: {}", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        let url = self.endpoint(segments)?;
        debug!(%method, %url, "openfaas request");
        let mut builder = self
            .client
            .request(method, url)
            .header("Accept", "*/*")
            .header("Cache-Control", "no-cache");
        if let Some(username) = &self.username {
            builder = builder.basic_auth(username, self.password.as_ref());
        }
        Ok(builder)
    }

    async fn send(builder: RequestBuilder) -> Result<UpstreamResponse> {
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!(status, "openfaas response");
        Ok(UpstreamResponse { status, body })
    }
}

#[async_trait]
impl FaasController for OpenFaasClient {
    async fn list_functions(&self) -> Result<UpstreamResponse> {
        Self::send(self.request(Method::GET, &["system", "functions"])?).await
    }

    async fn get_function(&self, composite_name: &str) -> Result<UpstreamResponse> {
        Self::send(self.request(Method::GET, &["system", "function", composite_name])?).await
    }

    async fn create_function(&self, manifest: &FunctionManifest) -> Result<UpstreamResponse> {
        Self::send(self.request(Method::POST, &["system", "functions"])?.json(manifest)).await
    }

    async fn update_function(&self, manifest: &FunctionManifest) -> Result<UpstreamResponse> {
        Self::send(self.request(Method::PUT, &["system", "functions"])?.json(manifest)).await
    }

    async fn delete_function(&self, composite_name: &str) -> Result<UpstreamResponse> {
        let body = json!({ "functionName": composite_name });
        Self::send(self.request(Method::DELETE, &["system", "functions"])?.json(&body)).await
    }

    async fn invoke_function(
        &self,
        composite_name: &str,
        body: &Value,
    ) -> Result<UpstreamResponse> {
        Self::send(self.request(Method::POST, &["function", composite_name])?.json(body)).await
    }
}
