//! UDP RTP ingest loop
//!
//! Reads datagrams from the local ingest socket, decodes them as RTP,
//! routes them by payload type into the per-kind reassemblers and writes
//! every emitted sample into the matching outgoing track.

use super::reassembler::{AudioReassembler, ReassemblerStats, VideoReassembler};
use super::{MediaKind, PayloadRouter, SampleSink};
use crate::config::RelayConfig;
use crate::{Error, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};
use webrtc::media::Sample;
use webrtc::rtp::packet::Packet;
use webrtc::util::Unmarshal;

/// Counters reported when the ingest loop exits
#[derive(Debug, Clone, Default)]
pub struct IngestStats {
    pub datagrams: u64,
    pub read_errors: u64,
    pub decode_failures: u64,
    pub unknown_payload_types: u64,
    pub samples_written: u64,
    pub write_failures: u64,
    pub video: ReassemblerStats,
    pub audio: ReassemblerStats,
}

/// Owns the ingest socket and both reassemblers
pub struct MediaIngest {
    socket: UdpSocket,
    router: PayloadRouter,
    read_timeout: Duration,
    max_datagram_size: usize,
    video: VideoReassembler,
    audio: AudioReassembler,
    stats: IngestStats,
}

impl MediaIngest {
    /// Bind the ingest socket
    ///
    /// # Errors
    ///
    /// Returns `Error::Setup` if the address cannot be bound (e.g. another
    /// session already holds the fixed ingest port).
    pub async fn bind(config: &RelayConfig) -> Result<Self> {
        let socket = UdpSocket::bind(config.ingest_address).await.map_err(|e| {
            Error::Setup(format!(
                "failed to bind ingest socket {}: {}",
                config.ingest_address, e
            ))
        })?;

        debug!(addr = %config.ingest_address, "ingest socket bound");

        Ok(Self {
            socket,
            router: PayloadRouter::from_config(config),
            read_timeout: config.ingest_read_timeout(),
            max_datagram_size: config.max_datagram_size,
            video: VideoReassembler::video(config.reassembly_window),
            audio: AudioReassembler::audio(config.reassembly_window),
            stats: IngestStats::default(),
        })
    }

    /// Address the socket is bound to (resolves port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Run until the shutdown signal is set or its sender is dropped
    ///
    /// The socket is released when this returns.
    pub async fn run(
        mut self,
        shutdown: watch::Receiver<bool>,
        video_sink: Arc<dyn SampleSink>,
        audio_sink: Arc<dyn SampleSink>,
    ) -> IngestStats {
        let mut buf = vec![0u8; self.max_datagram_size];

        loop {
            if *shutdown.borrow() || shutdown.has_changed().is_err() {
                break;
            }

            let (len, from) =
                match tokio::time::timeout(self.read_timeout, self.socket.recv_from(&mut buf))
                    .await
                {
                    // Read timeout: recheck shutdown
                    Err(_) => continue,
                    Ok(Err(e)) => {
                        self.stats.read_errors += 1;
                        let err = Error::TransportRead(e.to_string());
                        warn!("{}", err);
                        continue;
                    }
                    Ok(Ok(received)) => received,
                };

            self.stats.datagrams += 1;
            trace!(len, %from, "datagram received");

            let (kind, samples) = match self.handle_datagram(&buf[..len]) {
                Ok(Some(ready)) => ready,
                Ok(None) => continue,
                Err(e) => {
                    debug!("dropping datagram from {}: {}", from, e);
                    continue;
                }
            };

            let sink = match kind {
                MediaKind::Video => &video_sink,
                MediaKind::Audio => &audio_sink,
            };
            for sample in samples {
                match sink.write_sample(&sample).await {
                    Ok(()) => self.stats.samples_written += 1,
                    Err(e) => {
                        self.stats.write_failures += 1;
                        warn!(%kind, "{}", e);
                    }
                }
            }
        }

        self.stats.video = self.video.stats();
        self.stats.audio = self.audio.stats();
        info!(
            datagrams = self.stats.datagrams,
            samples = self.stats.samples_written,
            decode_failures = self.stats.decode_failures,
            write_failures = self.stats.write_failures,
            "ingest loop stopped"
        );
        self.stats
    }

    /// Decode one datagram and push it into its reassembler
    ///
    /// Returns the samples that became ready, or None for an unrouted
    /// payload type.
    fn handle_datagram(&mut self, datagram: &[u8]) -> Result<Option<(MediaKind, Vec<Sample>)>> {
        let mut reader = datagram;
        let packet = Packet::unmarshal(&mut reader).map_err(|e| {
            self.stats.decode_failures += 1;
            Error::PacketDecode(e.to_string())
        })?;

        let Some(kind) = self.router.route(packet.header.payload_type) else {
            self.stats.unknown_payload_types += 1;
            trace!(
                payload_type = packet.header.payload_type,
                "ignoring unrouted payload type"
            );
            return Ok(None);
        };

        let samples = match kind {
            MediaKind::Video => {
                self.video.push(packet);
                self.video.drain()
            }
            MediaKind::Audio => {
                self.audio.push(packet);
                self.audio.drain()
            }
        };

        Ok(Some((kind, samples)))
    }
}
