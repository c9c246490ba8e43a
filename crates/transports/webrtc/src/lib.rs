//! WebRTC signaling and media relay
//!
//! Accepts a browser peer over a WebSocket control channel, negotiates a
//! session with it, receives RTP on a local UDP socket, reassembles the
//! packets into samples and forwards them into the session's outgoing
//! VP8 video and Opus audio tracks.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  Browser                                                 │
//! │  ↕ (WebSocket: offer / answer / ice)   ↑ (SRTP media)    │
//! │  RelayServer (axum, /ws + static root)                   │
//! │  └─ Session (one per connection)                         │
//! │     ├─ Negotiator (offer → answer, remote candidates)    │
//! │     ├─ RtcPeerTransport (webrtc-rs peer connection)      │
//! │     └─ MediaIngest (UDP RTP, background task)            │
//! │        ├─ pt 96  → VideoReassembler → video track        │
//! │        └─ pt 111 → AudioReassembler → audio track        │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use relay_webrtc::RelayConfig;
//!
//! let config = RelayConfig::default();
//! assert!(config.validate().is_ok());
//! assert_eq!(config.ingest_address.port(), 5004);
//! assert_eq!(config.reassembly_window, 10);
//! ```
//!
//! ## Async Usage
//!
//! ```no_run
//! use relay_webrtc::{RelayConfig, RelayServer};
//!
//! # async fn example() -> relay_webrtc::Result<()> {
//! let server = RelayServer::new(RelayConfig::default())?;
//! let handle = server.start().await?;
//!
//! // ... until the process is asked to stop
//! handle.shutdown().await?;
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod media;
pub mod peer;
pub mod session;
pub mod signaling;

pub use config::RelayConfig;
pub use error::{Error, Result};
pub use media::{MediaIngest, MediaKind, PayloadRouter, SampleSink};
pub use peer::{RtcPeerTransport, TransportEvents, TransportSession};
pub use session::Session;
pub use signaling::{
    ControlChannel, Negotiator, RelayServer, RelayServerHandle, SignalingMessage, SignalingState,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get crate version
pub fn version() -> &'static str {
    VERSION
}
