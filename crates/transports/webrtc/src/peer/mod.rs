//! Transport session abstraction
//!
//! The relay drives the real-time transport only through [`TransportSession`]
//! and receives its notifications only through [`TransportEvents`]. The
//! webrtc-rs implementation lives in [`connection`].

pub mod connection;

pub use connection::RtcPeerTransport;

use crate::media::{MediaKind, SampleSink};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

/// Callbacks raised by the transport session
///
/// Registered once per session; the handler holds whatever session-scoped
/// state it needs.
#[async_trait]
pub trait TransportEvents: Send + Sync {
    /// A local network-path candidate was discovered
    async fn on_local_candidate(&self, candidate: RTCIceCandidateInit);

    /// Connectivity state changed
    async fn on_connection_state_change(&self, state: RTCIceConnectionState);
}

/// Operations the relay needs from a real-time transport session
#[async_trait]
pub trait TransportSession: Send + Sync {
    /// Register an outgoing track; returns the sink samples are written into
    async fn add_track(&self, kind: MediaKind) -> Result<Arc<dyn SampleSink>>;

    /// Apply the remote peer's description
    async fn set_remote_description(&self, description: RTCSessionDescription) -> Result<()>;

    /// Create an answer for the applied remote offer
    async fn create_answer(&self) -> Result<RTCSessionDescription>;

    /// Apply the local description, starting candidate gathering
    async fn set_local_description(&self, description: RTCSessionDescription) -> Result<()>;

    /// Wait until local candidate gathering has finished
    async fn gathering_complete(&self);

    /// Current local description, including gathered candidates
    async fn local_description(&self) -> Option<RTCSessionDescription>;

    /// Add a remote network-path candidate
    async fn add_ice_candidate(&self, candidate: RTCIceCandidateInit) -> Result<()>;

    /// Register the callback handler, replacing any previous one
    fn set_event_handler(&self, handler: Arc<dyn TransportEvents>);

    /// Close the session
    async fn close(&self) -> Result<()>;
}
