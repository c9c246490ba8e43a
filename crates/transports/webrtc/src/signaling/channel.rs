//! Outbound half of the control channel
//!
//! Answers are written from the dispatch loop and candidates from the
//! transport's callback task. Both go through one [`ControlChannel`], whose
//! mutex keeps each write whole.

use super::protocol::SignalingMessage;
use crate::{Error, Result};
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::trace;

/// Anything that accepts text frames
#[async_trait]
pub trait ControlSink: Send {
    /// Write one text frame
    async fn send_text(&mut self, text: String) -> Result<()>;

    /// Close the channel
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl ControlSink for SplitSink<WebSocket, Message> {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.send(Message::Text(text))
            .await
            .map_err(|e| Error::ControlChannel(e.to_string()))
    }

    async fn close(&mut self) -> Result<()> {
        SinkExt::close(self)
            .await
            .map_err(|e| Error::ControlChannel(e.to_string()))
    }
}

#[async_trait]
impl ControlSink for mpsc::Sender<String> {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.send(text)
            .await
            .map_err(|_| Error::ControlChannel("receiver dropped".to_string()))
    }
}

/// Cloneable handle serializing writes to one control channel
#[derive(Clone)]
pub struct ControlChannel {
    sink: Arc<Mutex<Box<dyn ControlSink>>>,
}

impl ControlChannel {
    pub fn new(sink: impl ControlSink + 'static) -> Self {
        Self {
            sink: Arc::new(Mutex::new(Box::new(sink))),
        }
    }

    /// Channel backed by an in-process queue
    pub fn in_memory(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Encode and write one message
    pub async fn send(&self, msg: &SignalingMessage) -> Result<()> {
        let text = msg.to_json()?;
        trace!(msg_type = msg.type_name(), "sending control message");
        self.sink.lock().await.send_text(text).await
    }

    pub async fn close(&self) -> Result<()> {
        self.sink.lock().await.close().await
    }
}
