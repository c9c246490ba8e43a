//! Offer/answer state machine
//!
//! Inbound messages are handled one at a time in arrival order. An offer is
//! answered only after local candidate gathering completes, so no other
//! inbound message is dispatched while an answer is pending.

use super::channel::ControlChannel;
use super::protocol::SignalingMessage;
use crate::peer::TransportSession;
use crate::{Error, Result};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

/// Negotiation lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalingState {
    /// No offer handled yet
    AwaitingOffer,
    /// An offer is being answered
    Negotiating,
    /// The last offer was answered
    Stable,
    /// Negotiation failed after the remote description was applied;
    /// the transport session cannot be reused
    Failed,
}

impl fmt::Display for SignalingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SignalingState::AwaitingOffer => "awaiting-offer",
            SignalingState::Negotiating => "negotiating",
            SignalingState::Stable => "stable",
            SignalingState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Where a negotiation attempt stopped
struct NegotiationFailure {
    error: Error,
    remote_applied: bool,
}

/// Drives the transport session from inbound control messages
pub struct Negotiator {
    transport: Arc<dyn TransportSession>,
    channel: ControlChannel,
    state: SignalingState,
    answers_sent: u64,
}

impl Negotiator {
    pub fn new(transport: Arc<dyn TransportSession>, channel: ControlChannel) -> Self {
        Self {
            transport,
            channel,
            state: SignalingState::AwaitingOffer,
            answers_sent: 0,
        }
    }

    pub fn state(&self) -> SignalingState {
        self.state
    }

    /// Number of answers written to the control channel
    pub fn answers_sent(&self) -> u64 {
        self.answers_sent
    }

    /// Decode and dispatch one text frame
    pub async fn handle_text(&mut self, text: &str) -> Result<()> {
        let msg = SignalingMessage::parse(text)?;
        self.handle(msg).await
    }

    /// Dispatch one message by type
    ///
    /// Only `offer` and `ice` are accepted inbound; `answer` and `error` are
    /// outbound-only and rejected like any other unknown type.
    pub async fn handle(&mut self, msg: SignalingMessage) -> Result<()> {
        match msg {
            SignalingMessage::Offer { sdp } => self.handle_offer(sdp).await,
            SignalingMessage::Ice { ice } => self.handle_ice_candidate(ice).await,
            other => Err(Error::UnknownMessageType(other.type_name().to_string())),
        }
    }

    /// Answer a remote offer
    ///
    /// Exactly one `answer` message is sent on success. On failure one
    /// `error` message is sent and the error is returned; if the remote
    /// description had already been applied the state becomes `Failed`.
    pub async fn handle_offer(&mut self, offer: RTCSessionDescription) -> Result<()> {
        if self.state == SignalingState::Failed {
            return Err(Error::Negotiation(
                "transport session failed an earlier negotiation".to_string(),
            ));
        }

        let previous = self.state;
        self.state = SignalingState::Negotiating;
        debug!(from = %previous, "handling offer");

        let answer = match self.negotiate(offer).await {
            Ok(answer) => answer,
            Err(NegotiationFailure {
                error,
                remote_applied,
            }) => {
                self.state = if remote_applied {
                    SignalingState::Failed
                } else {
                    previous
                };
                warn!(state = %self.state, "{}", error);
                if let Err(e) = self.channel.send(&SignalingMessage::error(error.to_string())).await {
                    warn!("Failed to report negotiation error: {}", e);
                }
                return Err(error);
            }
        };

        self.state = SignalingState::Stable;
        self.channel.send(&SignalingMessage::answer(answer)).await?;
        self.answers_sent += 1;
        info!("answer sent");

        Ok(())
    }

    async fn negotiate(
        &self,
        offer: RTCSessionDescription,
    ) -> std::result::Result<RTCSessionDescription, NegotiationFailure> {
        let before_remote = |error: Error| NegotiationFailure {
            error: as_negotiation(error),
            remote_applied: false,
        };
        let after_remote = |error: Error| NegotiationFailure {
            error: as_negotiation(error),
            remote_applied: true,
        };

        self.transport
            .set_remote_description(offer)
            .await
            .map_err(before_remote)?;

        let answer = self.transport.create_answer().await.map_err(after_remote)?;
        self.transport
            .set_local_description(answer)
            .await
            .map_err(after_remote)?;

        self.transport.gathering_complete().await;
        debug!("candidate gathering complete");

        self.transport.local_description().await.ok_or_else(|| {
            after_remote(Error::Negotiation(
                "no local description after gathering".to_string(),
            ))
        })
    }

    /// Register a remote candidate; null marks end-of-candidates
    pub async fn handle_ice_candidate(&mut self, candidate: Option<RTCIceCandidateInit>) -> Result<()> {
        let Some(candidate) = candidate else {
            debug!("remote end-of-candidates");
            return Ok(());
        };

        debug!(candidate = %candidate.candidate, "adding remote candidate");
        self.transport
            .add_ice_candidate(candidate)
            .await
            .map_err(as_negotiation)
    }
}

fn as_negotiation(error: Error) -> Error {
    match error {
        Error::Negotiation(_) => error,
        other => Error::Negotiation(other.to_string()),
    }
}
