use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::http::StatusCode;
use data_model::DatabaseConnection;
use serde_json::json;
use tokio_postgres::{Config, NoTls};
use tracing::{debug, error, info};

use crate::http_objects::{GatewayAPIError, GatewayResponse};

const LIST_TABLES: &str =
    "SELECT table_name::text FROM information_schema.tables WHERE table_schema = $1";
const LIST_COLUMNS: &str = "SELECT column_name::text, data_type::text \
     FROM information_schema.columns WHERE table_schema = $1 AND table_name = $2";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRow {
    pub column_name: String,
    pub data_type: String,
}

impl ColumnRow {
    pub fn new(column_name: &str, data_type: &str) -> Self {
        Self {
            column_name: column_name.to_string(),
            data_type: data_type.to_string(),
        }
    }

    pub fn display(&self) -> String {
        format!("{}({})", self.column_name, self.data_type)
    }
}

/// Read-only view of the database schema functions run against.
#[async_trait]
pub trait SchemaStore: Send + Sync {
    async fn list_tables(&self, schema: &str) -> Result<Vec<String>>;

    async fn list_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnRow>>;
}

pub struct PgSchemaStore {
    client: tokio_postgres::Client,
}

impl PgSchemaStore {
    /// Opens the connection used for the lifetime of the process.
    pub async fn connect(database: &DatabaseConnection) -> Result<Self> {
        let mut config = Config::new();
        config
            .host(&database.host)
            .port(database.port)
            .dbname(&database.database)
            .user(&database.user)
            .password(&database.password)
            .options("-c default_transaction_read_only=on");

        let (client, connection) = config.connect(NoTls).await.with_context(|| {
            format!(
                "unable to connect to postgres at {}:{}",
                database.host, database.port
            )
        })?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("postgres connection error: {}", e);
            }
        });
        info!(
            host = database.host,
            database = database.database,
            "connected to postgres"
        );
        Ok(Self { client })
    }
}

#[async_trait]
impl SchemaStore for PgSchemaStore {
    async fn list_tables(&self, schema: &str) -> Result<Vec<String>> {
        let rows = self.client.query(LIST_TABLES, &[&schema]).await?;
        rows.iter()
            .map(|row| -> Result<String> { Ok(row.try_get(0)?) })
            .collect()
    }

    async fn list_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnRow>> {
        let rows = self.client.query(LIST_COLUMNS, &[&schema, &table]).await?;
        rows.iter()
            .map(|row| -> Result<ColumnRow> {
                Ok(ColumnRow {
                    column_name: row.try_get(0)?,
                    data_type: row.try_get(1)?,
                })
            })
            .collect()
    }
}

/// Serves the schema listings clients browse when writing functions.
pub struct SchemaIntrospector {
    store: Arc<dyn SchemaStore>,
    schema: String,
}

impl SchemaIntrospector {
    pub fn new(store: Arc<dyn SchemaStore>, schema: &str) -> Self {
        Self {
            store,
            schema: schema.to_string(),
        }
    }

    pub async fn tables(&self) -> Result<GatewayResponse, GatewayAPIError> {
        debug!(schema = self.schema, "list tables");
        let mut tables = self
            .store
            .list_tables(&self.schema)
            .await
            .map_err(GatewayAPIError::internal_error)?;
        tables.sort();
        Ok(GatewayResponse::ok(json!(tables)))
    }

    pub async fn columns(&self, table: &str) -> Result<GatewayResponse, GatewayAPIError> {
        debug!(schema = self.schema, table, "list columns");
        let rows = self
            .store
            .list_columns(&self.schema, table)
            .await
            .map_err(GatewayAPIError::internal_error)?;
        if rows.is_empty() {
            return Err(GatewayAPIError::not_found(&format!(
                "Table {} not found",
                table
            )));
        }
        let mut columns: Vec<String> = rows.iter().map(ColumnRow::display).collect();
        columns.sort();
        Ok(GatewayResponse::new(StatusCode::OK, json!(columns)))
    }
}
