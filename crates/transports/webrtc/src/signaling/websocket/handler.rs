//! Per-connection WebSocket handling

use crate::config::RelayConfig;
use crate::session::Session;
use crate::signaling::ControlChannel;
use crate::Error;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// State shared by all connections
pub struct AppState {
    pub config: Arc<RelayConfig>,
    shutdown: watch::Receiver<bool>,
}

impl AppState {
    pub fn new(config: Arc<RelayConfig>, shutdown: watch::Receiver<bool>) -> Self {
        Self { config, shutdown }
    }

    /// Resolves once server shutdown is requested
    async fn shutdown_requested(&self) {
        let mut shutdown = self.shutdown.clone();
        let sender_dropped = shutdown.wait_for(|stop| *stop).await.is_err();
        if sender_dropped {
            // Sender gone without a shutdown request: keep serving
            std::future::pending::<()>().await;
        }
    }
}

pub(super) async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Run one client session over an upgraded connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (sink, stream) = socket.split();
    let channel = ControlChannel::new(sink);

    let session = match Session::connect(channel.clone(), Arc::clone(&state.config)).await {
        Ok(session) => session,
        Err(e) => {
            error!("Failed to create session: {}", e);
            let _ = channel.close().await;
            return;
        }
    };

    // The fixed ingest port admits one media-carrying session at a time
    if let Err(e) = session.start_ingest().await {
        warn!(session_id = %session.id(), "Continuing without media ingest: {}", e);
    }

    let inbound = stream.filter_map(|frame| async move {
        match frame {
            Ok(Message::Text(text)) => Some(Ok(text)),
            // Close frames end the stream; pings are answered by axum
            Ok(_) => None,
            Err(e) => Some(Err(Error::ControlChannel(e.to_string()))),
        }
    });

    tokio::select! {
        _ = session.run(inbound) => {}
        _ = state.shutdown_requested() => {
            info!(session_id = %session.id(), "server shutting down, closing session");
        }
    }

    session.close().await;
}
