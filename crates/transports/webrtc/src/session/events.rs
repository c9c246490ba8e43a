//! Transport callback handler for one session

use crate::peer::TransportEvents;
use crate::signaling::{ControlChannel, SignalingMessage};
use async_trait::async_trait;
use tracing::{debug, info, warn};
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;

/// Forwards local candidates to the client and logs connectivity changes
pub struct SessionEvents {
    session_id: String,
    channel: ControlChannel,
}

impl SessionEvents {
    pub fn new(session_id: impl Into<String>, channel: ControlChannel) -> Self {
        Self {
            session_id: session_id.into(),
            channel,
        }
    }
}

#[async_trait]
impl TransportEvents for SessionEvents {
    async fn on_local_candidate(&self, candidate: RTCIceCandidateInit) {
        debug!(session_id = %self.session_id, candidate = %candidate.candidate, "local candidate");
        if let Err(e) = self.channel.send(&SignalingMessage::candidate(candidate)).await {
            warn!(session_id = %self.session_id, "Failed to send local candidate: {}", e);
        }
    }

    async fn on_connection_state_change(&self, state: RTCIceConnectionState) {
        info!(session_id = %self.session_id, %state, "connection state changed");
    }
}
