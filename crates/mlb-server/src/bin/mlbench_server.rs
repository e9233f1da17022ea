use std::sync::Arc;

use mlb_server::{Registry, Server, ServerConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::load()?;
    config.logging.init();

    let registry = Arc::new(Registry::with_builtins());
    let server = Server::bind(&config, registry).await?;
    let addr = server.local_addr()?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => info!(addr = %addr, "Shutting down"),
    }
    Ok(())
}
