//! Control-channel message types
//!
//! Every message is a JSON object with a `type` tag:
//!
//! ```text
//! {"type":"offer","sdp":{"type":"offer","sdp":"v=0..."}}     inbound
//! {"type":"answer","sdp":{"type":"answer","sdp":"v=0..."}}   outbound
//! {"type":"ice","ice":{"candidate":"...","sdpMid":"0"}}      both
//! {"type":"ice","ice":null}                                  both
//! {"type":"error","error":"..."}                             outbound
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

/// Type tags this relay understands
pub const MESSAGE_TYPES: [&str; 4] = ["offer", "answer", "ice", "error"];

/// One control-channel message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SignalingMessage {
    /// Remote session description proposing a session
    Offer { sdp: RTCSessionDescription },

    /// Local session description accepting the offer
    Answer { sdp: RTCSessionDescription },

    /// Network-path candidate; null marks end-of-candidates
    Ice {
        #[serde(default)]
        ice: Option<RTCIceCandidateInit>,
    },

    /// Status report to the client
    Error { error: String },
}

impl SignalingMessage {
    /// Decode a text frame
    ///
    /// The `type` tag is checked before the payload so that an unknown
    /// type is reported as such rather than as a decode failure.
    ///
    /// # Errors
    ///
    /// - `Error::UnknownMessageType` if the tag is not one of [`MESSAGE_TYPES`]
    /// - `Error::InvalidMessage` if the text is not JSON, has no string `type`
    ///   field, or the payload does not match the type
    pub fn parse(text: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| Error::InvalidMessage(format!("not JSON: {}", e)))?;

        let msg_type = value
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| Error::InvalidMessage("missing \"type\" field".to_string()))?;

        if !MESSAGE_TYPES.contains(&msg_type) {
            return Err(Error::UnknownMessageType(msg_type.to_string()));
        }

        let msg_type = msg_type.to_string();
        serde_json::from_value(value)
            .map_err(|e| Error::InvalidMessage(format!("bad {} payload: {}", msg_type, e)))
    }

    /// Encode as a text frame
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| Error::InvalidMessage(format!("failed to encode message: {}", e)))
    }

    /// The `type` tag
    pub fn type_name(&self) -> &'static str {
        match self {
            SignalingMessage::Offer { .. } => "offer",
            SignalingMessage::Answer { .. } => "answer",
            SignalingMessage::Ice { .. } => "ice",
            SignalingMessage::Error { .. } => "error",
        }
    }

    pub fn answer(sdp: RTCSessionDescription) -> Self {
        SignalingMessage::Answer { sdp }
    }

    pub fn candidate(ice: RTCIceCandidateInit) -> Self {
        SignalingMessage::Ice { ice: Some(ice) }
    }

    pub fn error(error: impl Into<String>) -> Self {
        SignalingMessage::Error {
            error: error.into(),
        }
    }
}
