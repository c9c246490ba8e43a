//! Shared helpers for relay integration tests
//!
//! - [`FakeTransport`]: in-process transport session recording every call
//! - [`RecordingSink`]: sample sink that keeps what it receives
//! - [`BrowserPeer`]: webrtc-rs peer playing the browser side of a negotiation

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use relay_webrtc::media::{MediaKind, SampleSink};
use relay_webrtc::peer::{TransportEvents, TransportSession};
use relay_webrtc::{Error, Result};
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::interceptor::registry::Registry;
use webrtc::media::Sample;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp::header::Header;
use webrtc::rtp::packet::Packet;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::util::Marshal;

/// Initialize tracing for tests (call once per test)
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info,webrtc=warn")
        .with_test_writer()
        .try_init();
}

/// Minimal session description that is never parsed by the fakes
pub fn description(sdp_type: &str) -> RTCSessionDescription {
    serde_json::from_value(json!({"type": sdp_type, "sdp": "v=0\r\n"})).unwrap()
}

pub const OFFER: &str = r#"{"type":"offer","sdp":{"type":"offer","sdp":"v=0\r\n"}}"#;

pub fn candidate(addr: &str) -> RTCIceCandidateInit {
    RTCIceCandidateInit {
        candidate: format!("candidate:1 1 udp 2130706431 {} typ host", addr),
        sdp_mid: Some("0".to_string()),
        sdp_mline_index: Some(0),
        username_fragment: None,
    }
}

// =============================================================================
// Sinks
// =============================================================================

#[derive(Default)]
pub struct RecordingSink {
    pub samples: Mutex<Vec<Sample>>,
}

impl RecordingSink {
    pub fn count(&self) -> usize {
        self.samples.lock().unwrap().len()
    }

    /// Poll until `count` samples arrived or a second passed
    pub async fn wait_for(&self, count: usize) -> bool {
        for _ in 0..100 {
            if self.count() >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }
}

/// Field-by-field copy; `Sample` is not `Clone`
pub fn copy_sample(sample: &Sample) -> Sample {
    Sample {
        data: sample.data.clone(),
        duration: sample.duration,
        packet_timestamp: sample.packet_timestamp,
        prev_dropped_packets: sample.prev_dropped_packets,
        prev_padding_packets: sample.prev_padding_packets,
        ..Default::default()
    }
}

#[async_trait]
impl SampleSink for RecordingSink {
    async fn write_sample(&self, sample: &Sample) -> Result<()> {
        self.samples.lock().unwrap().push(copy_sample(sample));
        Ok(())
    }
}

// =============================================================================
// Fake transport
// =============================================================================

#[derive(Default)]
pub struct FakeTransport {
    pub tracks: Mutex<Vec<MediaKind>>,
    pub video: Arc<RecordingSink>,
    pub audio: Arc<RecordingSink>,
    pub handler: Mutex<Option<Arc<dyn TransportEvents>>>,
    pub remote_candidates: AtomicUsize,
    pub closes: AtomicUsize,
    pub fail_tracks: AtomicBool,
    pub fail_local: AtomicBool,
    /// Local candidate announced while gathering, if set
    pub gathered_candidate: Mutex<Option<RTCIceCandidateInit>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn handler(&self) -> Option<Arc<dyn TransportEvents>> {
        self.handler.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransportSession for FakeTransport {
    async fn add_track(&self, kind: MediaKind) -> Result<Arc<dyn SampleSink>> {
        if self.fail_tracks.load(Ordering::SeqCst) {
            return Err(Error::Setup(format!("cannot add {} track", kind)));
        }
        self.tracks.lock().unwrap().push(kind);
        let sink: Arc<dyn SampleSink> = match kind {
            MediaKind::Video => self.video.clone(),
            MediaKind::Audio => self.audio.clone(),
        };
        Ok(sink)
    }

    async fn set_remote_description(&self, _description: RTCSessionDescription) -> Result<()> {
        Ok(())
    }

    async fn create_answer(&self) -> Result<RTCSessionDescription> {
        Ok(description("answer"))
    }

    async fn set_local_description(&self, _description: RTCSessionDescription) -> Result<()> {
        if self.fail_local.load(Ordering::SeqCst) {
            return Err(Error::Negotiation("local description rejected".to_string()));
        }
        Ok(())
    }

    async fn gathering_complete(&self) {
        let gathered = self.gathered_candidate.lock().unwrap().clone();
        if let (Some(candidate), Some(handler)) = (gathered, self.handler()) {
            handler.on_local_candidate(candidate).await;
        }
    }

    async fn local_description(&self) -> Option<RTCSessionDescription> {
        Some(description("answer"))
    }

    async fn add_ice_candidate(&self, _candidate: RTCIceCandidateInit) -> Result<()> {
        self.remote_candidates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn set_event_handler(&self, handler: Arc<dyn TransportEvents>) {
        *self.handler.lock().unwrap() = Some(handler);
    }

    async fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// =============================================================================
// RTP
// =============================================================================

pub fn rtp(payload_type: u8, seq: u16, ts: u32, marker: bool, payload: &[u8]) -> Packet {
    Packet {
        header: Header {
            version: 2,
            payload_type,
            sequence_number: seq,
            timestamp: ts,
            marker,
            ssrc: 0xBEEF,
            ..Default::default()
        },
        payload: Bytes::copy_from_slice(payload),
    }
}

pub fn rtp_bytes(payload_type: u8, seq: u16, ts: u32, marker: bool, payload: &[u8]) -> Bytes {
    rtp(payload_type, seq, ts, marker, payload).marshal().unwrap()
}

/// Single-packet VP8 frame (S bit set, marker set)
pub fn vp8_frame(seq: u16, ts: u32) -> Packet {
    rtp(96, seq, ts, true, &[0x10, seq as u8, 0xB0, 0x0B])
}

pub fn opus_frame(seq: u16, ts: u32) -> Packet {
    rtp(111, seq, ts, false, &[0xFC, seq as u8])
}

// =============================================================================
// Browser side
// =============================================================================

/// webrtc-rs peer standing in for the browser
pub struct BrowserPeer {
    pub pc: Arc<RTCPeerConnection>,
}

impl BrowserPeer {
    /// Peer with one video and one audio transceiver, host candidates only
    pub async fn new() -> Self {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs().unwrap();
        let registry = register_default_interceptors(Registry::new(), &mut media_engine).unwrap();
        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let pc = Arc::new(
            api.new_peer_connection(RTCConfiguration::default())
                .await
                .unwrap(),
        );
        pc.add_transceiver_from_kind(RTPCodecType::Video, None)
            .await
            .unwrap();
        pc.add_transceiver_from_kind(RTPCodecType::Audio, None)
            .await
            .unwrap();

        Self { pc }
    }

    /// Create an offer with all host candidates gathered
    pub async fn offer(&self) -> RTCSessionDescription {
        let offer = self.pc.create_offer(None).await.unwrap();
        let mut gathered = self.pc.gathering_complete_promise().await;
        self.pc.set_local_description(offer).await.unwrap();
        let _ = gathered.recv().await;
        self.pc.local_description().await.unwrap()
    }

    /// `{"type":"offer","sdp":...}` text frame
    pub async fn offer_message(&self) -> String {
        json!({"type": "offer", "sdp": self.offer().await}).to_string()
    }

    pub async fn close(&self) {
        let _ = self.pc.close().await;
    }
}

/// Media sections in an SDP body
pub fn media_sections(sdp: &str) -> Vec<String> {
    sdp.lines()
        .filter(|line| line.starts_with("m="))
        .map(|line| line.to_string())
        .collect()
}
