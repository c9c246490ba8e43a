//! Control-channel signaling
//!
//! - [`protocol`]: JSON message types
//! - [`channel`]: serialized outbound writes
//! - [`negotiator`]: offer/answer state machine
//! - [`websocket`]: HTTP upgrade endpoint and static file root

pub mod channel;
pub mod negotiator;
pub mod protocol;
pub mod websocket;

pub use channel::{ControlChannel, ControlSink};
pub use negotiator::{Negotiator, SignalingState};
pub use protocol::SignalingMessage;
pub use websocket::{RelayServer, RelayServerHandle};
