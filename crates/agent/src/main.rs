//! mikra-agent host entry point.
//!
//! Loads configuration, runs the worker through install and activate, then
//! serves fetch events over the MCP stdio transport. Logging goes to stderr
//! to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use mikra_agent::Worker;
use mikra_agent::handler::AgentServer;
use mikra_client::{FetchClient, FetchConfig};
use mikra_core::{AgentConfig, CacheDb};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AgentConfig::load()?;
    tracing::info!(version_tag = %config.version_tag, db = %config.db_path.display(), "starting mikra-agent");

    let store = Arc::new(CacheDb::open(&config.db_path).await?);
    let network = Arc::new(FetchClient::new(FetchConfig::from_agent(&config))?);
    let worker = Arc::new(Worker::new(config, store, network)?);

    match worker.start().await {
        Ok(state) => tracing::info!(%state, "worker started"),
        Err(e) => tracing::error!("worker start failed, serving without control: {}", e),
    }

    let handler = AgentServer::new(worker);
    let server = serve_server(handler, stdio()).await?;

    server.waiting().await?;

    Ok(())
}
