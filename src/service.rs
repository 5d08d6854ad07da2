use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use axum_server::Handle;
use faas_client::OpenFaasClient;
use tokio::signal;
use tracing::{error, info};

use super::routes::RouteState;
use crate::{
    config::ServerConfig,
    dispatcher::GatewayDispatcher,
    routes::create_routes,
    schema_store::{PgSchemaStore, SchemaIntrospector},
};

pub struct Service {
    pub config: ServerConfig,
    pub dispatcher: Arc<GatewayDispatcher>,
    pub schema: Arc<SchemaIntrospector>,
}

impl Service {
    pub async fn new(config: ServerConfig) -> Result<Self> {
        let controller = Arc::new(
            OpenFaasClient::new(&config.openfaas).context("error initializing OpenFaaS client")?,
        );
        let dispatcher = Arc::new(GatewayDispatcher::new(controller, &config));

        let store = PgSchemaStore::connect(&config.database)
            .await
            .context("error connecting to the database")?;
        let schema = Arc::new(SchemaIntrospector::new(
            Arc::new(store),
            &config.database.schema,
        ));

        Ok(Self {
            config,
            dispatcher,
            schema,
        })
    }

    pub async fn start(&self) -> Result<()> {
        let route_state = RouteState {
            dispatcher: self.dispatcher.clone(),
            schema: self.schema.clone(),
        };

        let handle = Handle::new();
        let handle_sh = handle.clone();
        tokio::spawn(async move {
            shutdown_signal(handle_sh).await;
            info!("graceful shutdown signal received, shutting down server gracefully");
        });

        let addr: SocketAddr = self.config.listen_addr.parse()?;
        info!(
            openfaas = self.config.openfaas.url,
            "server api listening on {}", self.config.listen_addr
        );
        let routes = create_routes(route_state);
        axum_server::bind(addr)
            .handle(handle)
            .serve(routes.into_make_service())
            .await?;

        Ok(())
    }
}

async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {:?}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install signal handler: {:?}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
        },
        _ = terminate => {
        },
    }
    handle.shutdown();
    info!("signal received, shutting down server gracefully");
}
