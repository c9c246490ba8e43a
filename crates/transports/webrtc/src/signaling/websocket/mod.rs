//! WebSocket control channel over HTTP
//!
//! One upgrade endpoint (`ws_path`, `/ws` by default) hands each connection
//! to a fresh [`Session`](crate::session::Session); every other path is
//! served from the static directory.

mod handler;
mod server;

pub use handler::AppState;
pub use server::{RelayServer, RelayServerHandle};
