//! HTTP server: WebSocket upgrade endpoint plus static file root

use super::handler::{ws_handler, AppState};
use crate::config::RelayConfig;
use crate::{Error, Result};
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Relay HTTP server
pub struct RelayServer {
    config: Arc<RelayConfig>,
}

impl RelayServer {
    /// Create a server from a validated configuration
    pub fn new(config: RelayConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Router with the upgrade endpoint and the static fallback
    pub fn router(&self, shutdown: watch::Receiver<bool>) -> Router {
        let state = Arc::new(AppState::new(Arc::clone(&self.config), shutdown));

        Router::new()
            .route(&self.config.ws_path, get(ws_handler))
            .fallback_service(ServeDir::new(&self.config.static_dir))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Bind and start serving in the background
    ///
    /// # Errors
    ///
    /// Returns `Error::Setup` if the bind address is unavailable.
    pub async fn start(self) -> Result<RelayServerHandle> {
        let listener = TcpListener::bind(self.config.bind_address)
            .await
            .map_err(|e| {
                Error::Setup(format!(
                    "failed to bind {}: {}",
                    self.config.bind_address, e
                ))
            })?;
        let local_addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let app = self.router(shutdown_rx.clone());

        info!(
            "Relay listening on http://{} (control channel at {})",
            local_addr, self.config.ws_path
        );

        let mut graceful = shutdown_rx;
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = graceful.wait_for(|stop| *stop).await;
                })
                .await
        });

        Ok(RelayServerHandle {
            local_addr,
            shutdown_tx,
            task,
        })
    }
}

/// Handle to a running [`RelayServer`]
pub struct RelayServerHandle {
    local_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<std::io::Result<()>>,
}

impl RelayServerHandle {
    /// Bound address (resolves port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and close every live session
    pub async fn shutdown(self) -> Result<()> {
        info!("Shutting down relay server");
        self.shutdown_tx.send_replace(true);

        match self.task.await {
            Ok(result) => result.map_err(Error::from),
            Err(e) => {
                error!("Server task failed: {}", e);
                Err(Error::Other(anyhow::anyhow!("server task failed: {}", e)))
            }
        }
    }
}
