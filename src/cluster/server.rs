//! Node server: wires config → gateway → engine → workers → HTTP.

use crate::cluster::engine::ClusterService;
use crate::cluster::http::create_router;
use crate::cluster::peer_client::HttpGateway;
use crate::cluster::workers::{spawn_heartbeat_worker, spawn_refresh_worker};
use crate::common::{Config, Result};
use std::sync::Arc;
use tracing::info;

pub struct Server {
    config: Config,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub async fn serve(self) -> Result<()> {
        self.config.validate()?;

        info!("starting nameserv node: {}", self.config.self_node());
        info!("  cluster: {} / {}", self.config.cluster, self.config.group);
        info!("  mode: {:?}", self.config.mode);
        info!("  nodes: {}", self.config.nodes.len());

        let config = Arc::new(self.config);
        let gateway = Arc::new(HttpGateway::new(config.rpc_timeout())?);
        let service = Arc::new(ClusterService::new(Arc::clone(&config), gateway));

        if config.is_strong() {
            spawn_heartbeat_worker(Arc::clone(&service));
            spawn_refresh_worker(Arc::clone(&service));
        }

        let router = create_router(Arc::clone(&service));
        let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
        info!("nameserv node listening on {}", config.bind_addr());

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
