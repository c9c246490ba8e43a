//! RTP packet reassembly into presentable samples
//!
//! A thin wrapper over the webrtc-rs [`SampleBuilder`]. Packets are reordered
//! by sequence number inside a window of `window` packets and the payloads of
//! one frame are joined into a single [`Sample`]. A frame is released once the
//! first packet of the following frame is known, so its duration is the RTP
//! timestamp delta to that next frame divided by the clock rate.
//!
//! When more than `window` packets are pending the oldest ones are forced out:
//! a complete frame is emitted, anything else is dropped. The next emitted
//! sample reports the dropped packets in `prev_dropped_packets`.

use super::MediaKind;
use tracing::{debug, trace};
use webrtc::media::io::sample_builder::SampleBuilder;
use webrtc::media::Sample;
use webrtc::rtp::codecs::opus::OpusPacket;
use webrtc::rtp::codecs::vp8::Vp8Packet;
use webrtc::rtp::packet::Packet;
use webrtc::rtp::packetizer::Depacketizer;

/// VP8 reassembler (90 kHz clock)
pub type VideoReassembler = Reassembler<Vp8Packet>;

/// Opus reassembler (48 kHz clock)
pub type AudioReassembler = Reassembler<OpusPacket>;

/// Statistics about reassembler behaviour
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReassemblerStats {
    /// Packets handed to `push`
    pub pushed: u64,
    /// Samples produced
    pub emitted: u64,
    /// Packets lost or dropped before the emitted samples
    pub dropped: u64,
    /// Subset of `dropped` that were empty padding packets
    pub padding: u64,
}

/// Per-kind packet reassembler
pub struct Reassembler<D: Depacketizer> {
    kind: MediaKind,
    window: usize,
    builder: SampleBuilder<D>,
    stats: ReassemblerStats,
}

impl Reassembler<Vp8Packet> {
    /// VP8 reassembler for the video track
    pub fn video(window: usize) -> Self {
        Self::new(MediaKind::Video, Vp8Packet::default(), window)
    }
}

impl Reassembler<OpusPacket> {
    /// Opus reassembler for the audio track
    pub fn audio(window: usize) -> Self {
        Self::new(MediaKind::Audio, OpusPacket::default(), window)
    }
}

impl<D: Depacketizer> Reassembler<D> {
    /// Create a reassembler
    ///
    /// # Arguments
    /// * `kind` - Media kind; selects the clock rate
    /// * `depacketizer` - Codec-specific payload parser
    /// * `window` - Packets held before the oldest are forced out (1-65535)
    pub fn new(kind: MediaKind, depacketizer: D, window: usize) -> Self {
        let window = window.clamp(1, u16::MAX as usize);
        Self {
            kind,
            window,
            builder: SampleBuilder::new(window as u16, depacketizer, kind.clock_rate()),
            stats: ReassemblerStats::default(),
        }
    }

    /// Record a packet in the window
    pub fn push(&mut self, packet: Packet) {
        self.stats.pushed += 1;
        trace!(
            kind = %self.kind,
            seq = packet.header.sequence_number,
            ts = packet.header.timestamp,
            "packet buffered"
        );
        self.builder.push(packet);
    }

    /// Next in-order sample, if one is ready
    pub fn pop(&mut self) -> Option<Sample> {
        let sample = self.builder.pop()?;

        self.stats.emitted += 1;
        if sample.prev_dropped_packets > 0 {
            debug!(
                kind = %self.kind,
                dropped = sample.prev_dropped_packets,
                padding = sample.prev_padding_packets,
                "packets dropped before sample"
            );
            self.stats.dropped += u64::from(sample.prev_dropped_packets);
            self.stats.padding += u64::from(sample.prev_padding_packets);
        }

        Some(sample)
    }

    /// All samples that are ready, in order
    pub fn drain(&mut self) -> Vec<Sample> {
        let mut samples = Vec::new();
        while let Some(sample) = self.pop() {
            samples.push(sample);
        }
        samples
    }

    /// Get reassembler statistics
    pub fn stats(&self) -> ReassemblerStats {
        self.stats
    }

    /// Media kind handled by this reassembler
    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// Window size in packets
    pub fn window(&self) -> usize {
        self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::time::Duration;
    use webrtc::rtp::header::Header;

    fn opus(seq: u16, ts: u32) -> Packet {
        Packet {
            header: Header {
                version: 2,
                payload_type: 111,
                sequence_number: seq,
                timestamp: ts,
                marker: false,
                ..Default::default()
            },
            payload: Bytes::from(vec![seq as u8, 0xAA]),
        }
    }

    /// One VP8 packet; `start` sets the S bit of the payload descriptor
    fn vp8(seq: u16, ts: u32, start: bool, marker: bool) -> Packet {
        let descriptor = if start { 0x10 } else { 0x00 };
        Packet {
            header: Header {
                version: 2,
                payload_type: 96,
                sequence_number: seq,
                timestamp: ts,
                marker,
                ..Default::default()
            },
            payload: Bytes::from(vec![descriptor, seq as u8, 0x01, 0x02]),
        }
    }

    /// Push each packet and drain after it, the way the ingest loop does
    fn feed<D: Depacketizer>(r: &mut Reassembler<D>, packets: Vec<Packet>) -> Vec<Sample> {
        let mut out = Vec::new();
        for packet in packets {
            r.push(packet);
            out.extend(r.drain());
        }
        out
    }

    #[test]
    fn test_new_reassembler() {
        let r = AudioReassembler::audio(10);
        assert_eq!(r.window(), 10);
        assert_eq!(r.kind(), MediaKind::Audio);
        assert_eq!(VideoReassembler::video(0).window(), 1);
        assert_eq!(VideoReassembler::video(1 << 20).window(), u16::MAX as usize);
    }

    #[test]
    fn test_sample_waits_for_next_timestamp() {
        let mut r = AudioReassembler::audio(10);
        r.push(opus(1, 960));
        assert!(r.pop().is_none());

        r.push(opus(2, 1920));
        let sample = r.pop().expect("sample");
        assert_eq!(sample.data.as_ref(), &[1, 0xAA]);
        assert_eq!(sample.packet_timestamp, 960);
        assert!(r.pop().is_none());
    }

    #[test]
    fn test_duration_is_delta_to_next_sample() {
        let mut r = AudioReassembler::audio(10);
        let samples = feed(&mut r, (1..=4).map(|seq| opus(seq, seq as u32 * 960)).collect());

        assert_eq!(samples.len(), 3);
        // 960 ticks at 48 kHz, first sample included
        assert_eq!(samples[0].duration, Duration::from_millis(20));
        assert!(samples
            .iter()
            .all(|s| s.duration == Duration::from_millis(20)));
    }

    #[test]
    fn test_vp8_frame_spanning_packets() {
        let mut r = VideoReassembler::video(10);
        r.push(vp8(10, 3000, true, false));
        r.push(vp8(11, 3000, false, false));
        assert!(r.pop().is_none());

        r.push(vp8(12, 3000, false, true));
        assert!(r.pop().is_none());

        r.push(vp8(13, 6000, true, true));
        let sample = r.pop().expect("frame");
        assert_eq!(
            sample.data.as_ref(),
            &[10, 0x01, 0x02, 11, 0x01, 0x02, 12, 0x01, 0x02]
        );
        assert_eq!(sample.packet_timestamp, 3000);
        assert!(r.pop().is_none());
    }

    #[test]
    fn test_vp8_frame_completed_by_timestamp_change() {
        let mut r = VideoReassembler::video(10);
        r.push(vp8(1, 3000, true, false));
        assert!(r.pop().is_none());

        r.push(vp8(2, 6000, true, false));
        let sample = r.pop().expect("first frame");
        assert_eq!(sample.packet_timestamp, 3000);
        assert!(r.pop().is_none());
    }

    #[test]
    fn test_sequence_wraparound() {
        let mut r = AudioReassembler::audio(10);
        let samples = feed(
            &mut r,
            vec![
                opus(65534, 0),
                opus(0, 1920),
                opus(65535, 960),
                opus(1, 2880),
                opus(2, 3840),
            ],
        );

        let ts: Vec<u32> = samples.iter().map(|s| s.packet_timestamp).collect();
        assert_eq!(ts, vec![0, 960, 1920, 2880]);
    }

    #[test]
    fn test_orphan_fragment_dropped() {
        let mut r = VideoReassembler::video(10);
        // Stream joined mid-frame
        let samples = feed(
            &mut r,
            vec![
                vp8(1, 3000, false, true),
                vp8(2, 6000, true, true),
                vp8(3, 9000, true, true),
            ],
        );

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].packet_timestamp, 6000);
        assert_eq!(samples[0].prev_dropped_packets, 1);
        assert_eq!(r.stats().dropped, 1);
    }

    #[test]
    fn test_gap_skipped_once_window_exceeded() {
        let mut r = AudioReassembler::audio(4);
        // 2 is lost
        let samples = feed(
            &mut r,
            [1u16, 3, 4, 5, 6]
                .into_iter()
                .map(|seq| opus(seq, seq as u32 * 960))
                .collect(),
        );

        let ts: Vec<u32> = samples.iter().map(|s| s.packet_timestamp).collect();
        assert_eq!(ts, vec![960, 2880, 3840, 4800]);
        assert_eq!(samples[0].prev_dropped_packets, 0);
        assert_eq!(samples[1].prev_dropped_packets, 1);
        assert_eq!(samples[2].prev_dropped_packets, 0);
        assert_eq!(r.stats().dropped, 1);
        assert_eq!(r.stats().emitted, 4);
    }

    #[test]
    fn test_unfinished_frame_is_bounded_by_window() {
        let mut r = VideoReassembler::video(10);

        // A frame that never ends: one head, then same-timestamp fragments
        let mut packets = vec![vp8(1, 3000, true, false)];
        packets.extend((2..=5000).map(|seq| vp8(seq, 3000, false, false)));
        assert!(feed(&mut r, packets).is_empty());

        let samples = feed(
            &mut r,
            (5001..=5010)
                .map(|seq| vp8(seq, (seq as u32 - 4999) * 3000, true, true))
                .collect(),
        );

        assert!(!samples.is_empty());
        assert!(samples.iter().all(|s| s.packet_timestamp > 3000));
        // Everything beyond the window was dropped, not held
        assert!(samples[0].prev_dropped_packets >= 4990);
        assert_eq!(r.stats().pushed, 5010);
    }
}
