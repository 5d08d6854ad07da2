use std::{fmt::Debug, net::SocketAddr, path::PathBuf, str::FromStr};

use anyhow::Result;
use data_model::{DatabaseConnection, FunctionDefaults};
use faas_client::OpenFaasConfig;
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing_subscriber::filter::LevelFilter;

use crate::bulk_delete::PartialFailurePolicy;

const ENV_PREFIX: &str = "PGFAAS_";

/// How often the log file is rolled over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogRotation {
    Never,
    Hourly,
    #[default]
    Daily,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level, used when `RUST_LOG` is not set.
    pub level: String,
    /// JSON log lines instead of the compact human format.
    pub structured: bool,
    /// Log to this file instead of stdout.
    pub file: Option<PathBuf>,
    pub rotation: LogRotation,
    /// Rolled over files to keep, 0 keeps all of them.
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            structured: false,
            file: None,
            rotation: LogRotation::default(),
            max_files: 7,
        }
    }
}

impl LoggingConfig {
    pub fn level_filter(&self) -> Result<LevelFilter> {
        LevelFilter::from_str(&self.level)
            .map_err(|e| anyhow::anyhow!("invalid log level {}: {}", self.level, e))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub enable_tracing: bool,
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub env: String,
    pub listen_addr: String,
    pub openfaas: OpenFaasConfig,
    pub database: DatabaseConnection,
    pub function: FunctionDefaults,
    pub namespace_delete_policy: PartialFailurePolicy,
    pub logging: LoggingConfig,
    pub telemetry: TelemetryConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            env: "development".to_string(),
            listen_addr: "0.0.0.0:3010".to_string(),
            openfaas: OpenFaasConfig::default(),
            database: DatabaseConnection::default(),
            function: FunctionDefaults::default(),
            namespace_delete_policy: PartialFailurePolicy::default(),
            logging: LoggingConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl ServerConfig {
    fn figment() -> Figment {
        Figment::new().merge(Serialized::defaults(ServerConfig::default()))
    }

    /// Defaults, overridden by the YAML file, overridden by `PGFAAS_`
    /// environment variables (`__` separates nested keys).
    pub fn from_path(path: &str) -> Result<ServerConfig> {
        let config_str = std::fs::read_to_string(path)?;
        let config: ServerConfig = Self::figment()
            .merge(Yaml::string(&config_str))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> Result<ServerConfig> {
        let config: ServerConfig = Self::figment()
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn structured_logging(&self) -> bool {
        self.logging.structured
    }

    pub fn validate(&self) -> Result<()> {
        if self.listen_addr.parse::<SocketAddr>().is_err() {
            return Err(anyhow::anyhow!(
                "invalid listen address: {}",
                self.listen_addr
            ));
        }
        self.openfaas.validate()?;
        self.logging.level_filter()?;
        if self.function.image.is_empty() {
            return Err(anyhow::anyhow!("function image must not be empty"));
        }
        if self.function.scale_max == 0 || self.function.scale_min > self.function.scale_max {
            return Err(anyhow::anyhow!(
                "invalid function scaling bounds: min {} max {}",
                self.function.scale_min,
                self.function.scale_max
            ));
        }
        Ok(())
    }
}
