//! Configuration types for the media relay

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Default STUN server used for server-reflexive candidate discovery
pub const DEFAULT_STUN_SERVER: &str = "stun:stun.l.google.com:19302";

/// Main configuration for the relay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// HTTP listen address for the upgrade endpoint and static files
    pub bind_address: SocketAddr,

    /// Directory served at `/` for the browser client
    pub static_dir: PathBuf,

    /// Path of the WebSocket upgrade endpoint
    pub ws_path: String,

    /// Local UDP address receiving RTP (default: 127.0.0.1:5004)
    pub ingest_address: SocketAddr,

    /// STUN server for candidate discovery (None: host candidates only)
    pub stun_server: Option<String>,

    /// Read timeout on the ingest socket in milliseconds (default: 100ms)
    pub ingest_read_timeout_ms: u64,

    /// Largest datagram read from the ingest socket (default: 1500)
    pub max_datagram_size: usize,

    /// Packets held per reassembler before loss is concealed (default: 10)
    pub reassembly_window: usize,

    /// RTP payload type carrying VP8 video (default: 96)
    pub video_payload_type: u8,

    /// RTP payload type carrying Opus audio (default: 111)
    pub audio_payload_type: u8,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 8080)),
            static_dir: PathBuf::from("static"),
            ws_path: "/ws".to_string(),
            ingest_address: SocketAddr::from(([127, 0, 0, 1], 5004)),
            stun_server: Some(DEFAULT_STUN_SERVER.to_string()),
            ingest_read_timeout_ms: 100,
            max_datagram_size: 1500,
            reassembly_window: 10,
            video_payload_type: 96,
            audio_payload_type: 111,
        }
    }
}

impl RelayConfig {
    /// Validate configuration parameters
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `stun_server` is set but is not a `stun:`/`stuns:` URL
    /// - `reassembly_window` is zero
    /// - `ingest_read_timeout_ms` is not in range 1-1000
    /// - `max_datagram_size` cannot hold an RTP header
    /// - a payload type does not fit the 7-bit RTP field
    /// - both payload types are equal
    /// - `ws_path` does not start with `/`
    pub fn validate(&self) -> crate::Result<()> {
        use crate::Error;

        if let Some(ref url) = self.stun_server {
            if !url.starts_with("stun:") && !url.starts_with("stuns:") {
                return Err(Error::InvalidConfig(format!(
                    "stun_server must start with stun: or stuns:, got {}",
                    url
                )));
            }
        }

        if self.reassembly_window == 0 {
            return Err(Error::InvalidConfig(
                "reassembly_window must be at least 1".to_string(),
            ));
        }

        if self.ingest_read_timeout_ms == 0 || self.ingest_read_timeout_ms > 1000 {
            return Err(Error::InvalidConfig(format!(
                "ingest_read_timeout_ms must be in range 1-1000, got {}",
                self.ingest_read_timeout_ms
            )));
        }

        // Fixed RTP header is 12 bytes
        if self.max_datagram_size < 12 {
            return Err(Error::InvalidConfig(format!(
                "max_datagram_size must be at least 12, got {}",
                self.max_datagram_size
            )));
        }

        // The RTP payload-type field is 7 bits wide
        for (name, pt) in [
            ("video_payload_type", self.video_payload_type),
            ("audio_payload_type", self.audio_payload_type),
        ] {
            if pt > 127 {
                return Err(Error::InvalidConfig(format!(
                    "{} must be in range 0-127, got {}",
                    name, pt
                )));
            }
        }

        if self.video_payload_type == self.audio_payload_type {
            return Err(Error::InvalidConfig(format!(
                "video and audio payload types must differ, both are {}",
                self.video_payload_type
            )));
        }

        if !self.ws_path.starts_with('/') {
            return Err(Error::InvalidConfig(format!(
                "ws_path must start with '/', got {:?}",
                self.ws_path
            )));
        }

        Ok(())
    }

    /// Read timeout on the ingest socket
    pub fn ingest_read_timeout(&self) -> Duration {
        Duration::from_millis(self.ingest_read_timeout_ms)
    }

    /// Set the ingest address
    ///
    /// Port 0 binds an ephemeral port per session.
    pub fn with_ingest_address(mut self, addr: SocketAddr) -> Self {
        self.ingest_address = addr;
        self
    }

    /// Set or clear the STUN server
    pub fn with_stun_server(mut self, url: Option<&str>) -> Self {
        self.stun_server = url.map(str::to_string);
        self
    }

    /// Set the HTTP bind address
    pub fn with_bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = addr;
        self
    }

    /// Set the static file directory
    pub fn with_static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = dir.into();
        self
    }

    /// Set the reassembly window size in packets
    pub fn with_reassembly_window(mut self, packets: usize) -> Self {
        self.reassembly_window = packets;
        self
    }
}
