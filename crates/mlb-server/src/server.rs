//! TCP accept loop: one session task per connection.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use mlb_types::MlbResult;

use crate::config::ServerConfig;
use crate::registry::Registry;
use crate::session::{serve_connection, SessionSettings};

pub struct Server {
    listener: TcpListener,
    settings: SessionSettings,
}

impl Server {
    pub async fn bind(config: &ServerConfig, registry: Arc<Registry>) -> MlbResult<Self> {
        config.validate()?;
        let listener = TcpListener::bind(&config.listen_addr).await?;
        Ok(Self {
            listener,
            settings: SessionSettings {
                registry,
                emitter: config.emitter.clone(),
                poll_interval: config.poll_interval(),
            },
        })
    }

    pub fn local_addr(&self) -> MlbResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the surrounding task is dropped.
    pub async fn run(self) -> MlbResult<()> {
        info!(addr = %self.local_addr()?, "MLBench server listening");
        loop {
            let (socket, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(err) => {
                    warn!(error = %err, "Accept failed");
                    continue;
                }
            };
            info!(peer = %peer, "Session opened");
            let settings = self.settings.clone();
            tokio::spawn(async move {
                let (reader, writer) = socket.into_split();
                if let Err(err) = serve_connection(reader, writer, settings).await {
                    warn!(peer = %peer, error = %err, "Session ended with error");
                }
            });
        }
    }
}
