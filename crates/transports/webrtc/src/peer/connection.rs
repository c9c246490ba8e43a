//! webrtc-rs transport session

use super::{TransportEvents, TransportSession};
use crate::config::RelayConfig;
use crate::media::{MediaKind, SampleSink, STREAM_ID};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, trace, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;

/// Transport session backed by an `RTCPeerConnection`
pub struct RtcPeerTransport {
    peer_connection: Arc<RTCPeerConnection>,

    /// RTP senders (retained so the tracks stay bound)
    senders: Mutex<Vec<Arc<RTCRtpSender>>>,
}

impl RtcPeerTransport {
    /// Create a peer connection with default codecs and interceptors
    ///
    /// At most one discovery server is configured, taken from
    /// `config.stun_server`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Setup` if codec registration or peer connection
    /// construction fails.
    #[instrument(skip(config))]
    pub async fn new(config: &RelayConfig) -> Result<Self> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| Error::Setup(format!("Failed to register codecs: {}", e)))?;

        let registry = register_default_interceptors(Registry::new(), &mut media_engine)
            .map_err(|e| Error::Setup(format!("Failed to register interceptors: {}", e)))?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let ice_servers: Vec<RTCIceServer> = config
            .stun_server
            .iter()
            .map(|url| RTCIceServer {
                urls: vec![url.clone()],
                ..Default::default()
            })
            .collect();

        let rtc_config = RTCConfiguration {
            ice_servers,
            ..Default::default()
        };

        let peer_connection = Arc::new(
            api.new_peer_connection(rtc_config)
                .await
                .map_err(|e| Error::Setup(format!("Failed to create peer connection: {}", e)))?,
        );

        info!(stun = ?config.stun_server, "peer connection created");

        Ok(Self {
            peer_connection,
            senders: Mutex::new(Vec::new()),
        })
    }

    /// Underlying webrtc-rs peer connection
    pub fn peer_connection(&self) -> &Arc<RTCPeerConnection> {
        &self.peer_connection
    }
}

#[async_trait]
impl TransportSession for RtcPeerTransport {
    async fn add_track(&self, kind: MediaKind) -> Result<Arc<dyn SampleSink>> {
        let track = Arc::new(TrackLocalStaticSample::new(
            kind.codec_capability(),
            kind.track_id().to_string(),
            STREAM_ID.to_string(),
        ));

        let sender = self
            .peer_connection
            .add_track(Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(|e| Error::Setup(format!("Failed to add {} track: {}", kind, e)))?;

        // Interceptors only run while RTCP is read
        let rtcp_sender = Arc::clone(&sender);
        tokio::spawn(async move {
            let mut rtcp_buf = vec![0u8; 1500];
            while rtcp_sender.read(&mut rtcp_buf).await.is_ok() {}
            trace!(%kind, "rtcp reader finished");
        });

        self.senders.lock().await.push(sender);
        debug!(%kind, "outgoing track added");

        Ok(track)
    }

    async fn set_remote_description(&self, description: RTCSessionDescription) -> Result<()> {
        self.peer_connection
            .set_remote_description(description)
            .await
            .map_err(|e| Error::Negotiation(format!("Failed to set remote description: {}", e)))
    }

    async fn create_answer(&self) -> Result<RTCSessionDescription> {
        self.peer_connection
            .create_answer(None)
            .await
            .map_err(|e| Error::Negotiation(format!("Failed to create answer: {}", e)))
    }

    async fn set_local_description(&self, description: RTCSessionDescription) -> Result<()> {
        self.peer_connection
            .set_local_description(description)
            .await
            .map_err(|e| Error::Negotiation(format!("Failed to set local description: {}", e)))
    }

    async fn gathering_complete(&self) {
        // Resolves immediately when gathering already finished
        let mut gathered = self.peer_connection.gathering_complete_promise().await;
        let _ = gathered.recv().await;
    }

    async fn local_description(&self) -> Option<RTCSessionDescription> {
        self.peer_connection.local_description().await
    }

    async fn add_ice_candidate(&self, candidate: RTCIceCandidateInit) -> Result<()> {
        self.peer_connection
            .add_ice_candidate(candidate)
            .await
            .map_err(|e| Error::Negotiation(format!("Failed to add ICE candidate: {}", e)))
    }

    fn set_event_handler(&self, handler: Arc<dyn TransportEvents>) {
        let candidate_handler = Arc::clone(&handler);
        self.peer_connection
            .on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
                let handler = Arc::clone(&candidate_handler);
                Box::pin(async move {
                    // None marks the end of gathering
                    let Some(candidate) = candidate else {
                        return;
                    };
                    match candidate.to_json() {
                        Ok(init) => handler.on_local_candidate(init).await,
                        Err(e) => warn!("Failed to serialize local candidate: {}", e),
                    }
                })
            }));

        self.peer_connection
            .on_ice_connection_state_change(Box::new(move |state: RTCIceConnectionState| {
                let handler = Arc::clone(&handler);
                Box::pin(async move {
                    handler.on_connection_state_change(state).await;
                })
            }));
    }

    async fn close(&self) -> Result<()> {
        self.peer_connection
            .close()
            .await
            .map_err(|e| Error::Other(anyhow::anyhow!("Failed to close peer connection: {}", e)))
    }
}
