//! Error types for the media relay

/// Result type alias using the relay Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while relaying a session
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration parameter
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Building the transport session or its tracks failed
    #[error("Setup error: {0}")]
    Setup(String),

    /// Offer/answer exchange failed
    #[error("Negotiation error: {0}")]
    Negotiation(String),

    /// Inbound signaling message with a type this relay does not handle
    #[error("Unknown message type: {0}")]
    UnknownMessageType(String),

    /// Inbound signaling message that could not be decoded
    #[error("Invalid signaling message: {0}")]
    InvalidMessage(String),

    /// Control channel read or write failed
    #[error("Control channel error: {0}")]
    ControlChannel(String),

    /// Transient failure reading from the ingest socket
    #[error("Transport read error: {0}")]
    TransportRead(String),

    /// Malformed RTP packet
    #[error("Packet decode error: {0}")]
    PacketDecode(String),

    /// Writing a reassembled sample into an outgoing track failed
    #[error("Sample write error: {0}")]
    SampleWrite(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error ends the session
    ///
    /// Steady-state failures (unknown messages, read/decode/write errors on
    /// the media path, a single failed negotiation) are contained and logged.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Setup(_) | Error::ControlChannel(_))
    }

    /// Check if this error came from the offer/answer exchange
    pub fn is_negotiation_error(&self) -> bool {
        matches!(self, Error::Negotiation(_))
    }
}
