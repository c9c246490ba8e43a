//! Media kinds, outgoing track sinks and RTP ingest
//!
//! Packets arrive on the ingest socket, are routed by payload type to a
//! per-kind [`Reassembler`], and the samples it emits are written into the
//! outgoing tracks through the [`SampleSink`] trait.

pub mod ingest;
pub mod reassembler;

pub use ingest::{IngestStats, MediaIngest};
pub use reassembler::{AudioReassembler, Reassembler, ReassemblerStats, VideoReassembler};

use crate::config::RelayConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use std::fmt;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::media::Sample;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// Stream id shared by both outgoing tracks
pub const STREAM_ID: &str = "relay";

/// The two media kinds forwarded to the browser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// VP8 video
    Video,
    /// Opus audio
    Audio,
}

impl MediaKind {
    /// Codec mime type of the outgoing track
    pub fn mime_type(&self) -> &'static str {
        match self {
            MediaKind::Video => MIME_TYPE_VP8,
            MediaKind::Audio => MIME_TYPE_OPUS,
        }
    }

    /// RTP clock rate used to interpret timestamp deltas
    pub fn clock_rate(&self) -> u32 {
        match self {
            MediaKind::Video => 90_000,
            MediaKind::Audio => 48_000,
        }
    }

    /// Channel count announced for the codec (0 for video)
    pub fn channels(&self) -> u16 {
        match self {
            MediaKind::Video => 0,
            MediaKind::Audio => 2,
        }
    }

    /// Track id announced in the session description
    pub fn track_id(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }

    /// Codec capability for a sample track of this kind
    ///
    /// Clock rate and fmtp are left to the media engine's registered codecs.
    pub fn codec_capability(&self) -> RTCRtpCodecCapability {
        RTCRtpCodecCapability {
            mime_type: self.mime_type().to_string(),
            ..Default::default()
        }
    }

    /// webrtc-rs codec type
    pub fn codec_type(&self) -> RTPCodecType {
        match self {
            MediaKind::Video => RTPCodecType::Video,
            MediaKind::Audio => RTPCodecType::Audio,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.track_id())
    }
}

/// Outgoing track that accepts reassembled samples
#[async_trait]
pub trait SampleSink: Send + Sync {
    /// Write one timestamped sample
    async fn write_sample(&self, sample: &Sample) -> Result<()>;
}

#[async_trait]
impl SampleSink for TrackLocalStaticSample {
    async fn write_sample(&self, sample: &Sample) -> Result<()> {
        TrackLocalStaticSample::write_sample(self, sample)
            .await
            .map_err(|e| Error::SampleWrite(e.to_string()))
    }
}

/// Maps RTP payload-type identifiers to media kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadRouter {
    video: u8,
    audio: u8,
}

impl PayloadRouter {
    pub fn new(video_payload_type: u8, audio_payload_type: u8) -> Self {
        Self {
            video: video_payload_type,
            audio: audio_payload_type,
        }
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(config.video_payload_type, config.audio_payload_type)
    }

    /// Kind carried by `payload_type`, or None for anything else
    pub fn route(&self, payload_type: u8) -> Option<MediaKind> {
        if payload_type == self.video {
            Some(MediaKind::Video)
        } else if payload_type == self.audio {
            Some(MediaKind::Audio)
        } else {
            None
        }
    }
}

impl Default for PayloadRouter {
    fn default() -> Self {
        Self::from_config(&RelayConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_kind_properties() {
        assert_eq!(MediaKind::Video.clock_rate(), 90_000);
        assert_eq!(MediaKind::Audio.clock_rate(), 48_000);
        assert_eq!(MediaKind::Video.mime_type(), MIME_TYPE_VP8);
        assert_eq!(MediaKind::Audio.mime_type(), MIME_TYPE_OPUS);
        assert_eq!(MediaKind::Video.to_string(), "video");
        assert_eq!(MediaKind::Audio.channels(), 2);
        assert_eq!(MediaKind::Audio.codec_type(), RTPCodecType::Audio);
    }

    #[test]
    fn test_default_routing() {
        let router = PayloadRouter::default();
        assert_eq!(router.route(96), Some(MediaKind::Video));
        assert_eq!(router.route(111), Some(MediaKind::Audio));
        assert_eq!(router.route(0), None);
        assert_eq!(router.route(97), None);
    }

    #[test]
    fn test_custom_routing() {
        let router = PayloadRouter::new(100, 101);
        assert_eq!(router.route(100), Some(MediaKind::Video));
        assert_eq!(router.route(101), Some(MediaKind::Audio));
        assert_eq!(router.route(96), None);
    }
}
