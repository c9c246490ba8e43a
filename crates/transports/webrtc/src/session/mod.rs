//! Per-client session lifecycle
//!
//! A [`Session`] owns one transport session, its two outgoing tracks, the
//! control-channel handle and the ingest task. It is created when a client
//! connects and closed exactly once, whichever path gets there first.

mod events;

pub use events::SessionEvents;

use crate::config::RelayConfig;
use crate::media::{IngestStats, MediaIngest, MediaKind, SampleSink};
use crate::peer::{RtcPeerTransport, TransportSession};
use crate::signaling::{ControlChannel, Negotiator, SignalingState};
use crate::{Error, Result};
use futures::future::{BoxFuture, Shared};
use futures::{FutureExt, Stream, StreamExt};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};

struct IngestTask {
    local_addr: SocketAddr,
    handle: JoinHandle<IngestStats>,
}

/// Teardown shared by every `close()` caller
type Teardown = Shared<BoxFuture<'static, ()>>;

/// One connected client
pub struct Session {
    id: String,
    config: Arc<RelayConfig>,
    transport: Arc<dyn TransportSession>,
    channel: ControlChannel,
    negotiator: Mutex<Negotiator>,
    video_sink: Arc<dyn SampleSink>,
    audio_sink: Arc<dyn SampleSink>,
    shutdown_tx: watch::Sender<bool>,
    ingest: Arc<Mutex<Option<IngestTask>>>,
    closed: AtomicBool,
    teardown: Mutex<Option<Teardown>>,
}

impl Session {
    /// Build a session around an existing transport
    ///
    /// Registers the video track then the audio track before any
    /// negotiation, so the first answer already carries both.
    ///
    /// # Errors
    ///
    /// Returns `Error::Setup` if a track cannot be registered.
    #[instrument(skip_all)]
    pub async fn create(
        transport: Arc<dyn TransportSession>,
        channel: ControlChannel,
        config: Arc<RelayConfig>,
    ) -> Result<Self> {
        let id = uuid::Uuid::new_v4().to_string();

        let video_sink = transport
            .add_track(MediaKind::Video)
            .await
            .map_err(as_setup)?;
        let audio_sink = transport
            .add_track(MediaKind::Audio)
            .await
            .map_err(as_setup)?;

        transport.set_event_handler(Arc::new(SessionEvents::new(id.clone(), channel.clone())));

        let negotiator = Negotiator::new(Arc::clone(&transport), channel.clone());
        let (shutdown_tx, _) = watch::channel(false);

        info!(session_id = %id, "session created");

        Ok(Self {
            id,
            config,
            transport,
            channel,
            negotiator: Mutex::new(negotiator),
            video_sink,
            audio_sink,
            shutdown_tx,
            ingest: Arc::new(Mutex::new(None)),
            closed: AtomicBool::new(false),
            teardown: Mutex::new(None),
        })
    }

    /// Build a session on a fresh webrtc-rs peer connection
    pub async fn connect(channel: ControlChannel, config: Arc<RelayConfig>) -> Result<Self> {
        let transport = RtcPeerTransport::new(&config).await?;
        Self::create(Arc::new(transport), channel, config).await
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current negotiation state
    pub async fn state(&self) -> SignalingState {
        self.negotiator.lock().await.state()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn video_sink(&self) -> Arc<dyn SampleSink> {
        Arc::clone(&self.video_sink)
    }

    pub fn audio_sink(&self) -> Arc<dyn SampleSink> {
        Arc::clone(&self.audio_sink)
    }

    /// Address of the running ingest socket
    pub async fn ingest_addr(&self) -> Option<SocketAddr> {
        self.ingest.lock().await.as_ref().map(|task| task.local_addr)
    }

    /// Bind the ingest socket and start the ingest loop in the background
    ///
    /// Calling this again while the loop runs returns the existing address.
    ///
    /// # Errors
    ///
    /// Returns `Error::Setup` if the session is closed or the socket cannot
    /// be bound.
    pub async fn start_ingest(&self) -> Result<SocketAddr> {
        let mut ingest = self.ingest.lock().await;
        if self.is_closed() {
            return Err(Error::Setup("session is closed".to_string()));
        }
        if let Some(task) = ingest.as_ref() {
            return Ok(task.local_addr);
        }

        let media = MediaIngest::bind(&self.config).await?;
        let local_addr = media.local_addr()?;
        let span = info_span!("ingest", session_id = %self.id, %local_addr);
        let handle = tokio::spawn(
            media
                .run(
                    self.shutdown_tx.subscribe(),
                    Arc::clone(&self.video_sink),
                    Arc::clone(&self.audio_sink),
                )
                .instrument(span),
        );

        info!(session_id = %self.id, %local_addr, "ingest started");
        *ingest = Some(IngestTask { local_addr, handle });
        Ok(local_addr)
    }

    /// Process inbound control frames until the channel ends, then close
    ///
    /// Malformed or unknown messages are logged and skipped. A read error,
    /// a fatal dispatch error or a failed negotiation ends the loop.
    #[instrument(skip_all, fields(session_id = %self.id))]
    pub async fn run<S>(&self, inbound: S)
    where
        S: Stream<Item = Result<String>> + Send,
    {
        let mut inbound = std::pin::pin!(inbound);

        while let Some(frame) = inbound.next().await {
            let text = match frame {
                Ok(text) => text,
                Err(e) => {
                    warn!("Control channel read failed: {}", e);
                    break;
                }
            };

            let mut negotiator = self.negotiator.lock().await;
            match negotiator.handle_text(&text).await {
                Ok(()) => {}
                Err(e) if e.is_fatal() => {
                    error!("{}", e);
                    break;
                }
                Err(e) => warn!("Skipping control message: {}", e),
            }

            if negotiator.state() == SignalingState::Failed {
                warn!("negotiation failed, ending session");
                break;
            }
        }

        debug!("control loop finished");
        self.close().await;
    }

    /// Release every owned resource
    ///
    /// Safe to call repeatedly and before ingest was ever started. The first
    /// call starts the teardown on its own task, so it runs to completion even
    /// if that caller is dropped; every call waits for it. Individual failures
    /// are logged.
    pub async fn close(&self) {
        let teardown = {
            let mut slot = self.teardown.lock().await;
            slot.get_or_insert_with(|| self.spawn_teardown()).clone()
        };
        teardown.await;
    }

    fn spawn_teardown(&self) -> Teardown {
        self.closed.store(true, Ordering::SeqCst);
        self.shutdown_tx.send_replace(true);

        let id = self.id.clone();
        let ingest = Arc::clone(&self.ingest);
        let transport = Arc::clone(&self.transport);
        let channel = self.channel.clone();

        let handle = tokio::spawn(async move {
            let task = ingest.lock().await.take();
            if let Some(task) = task {
                match task.handle.await {
                    Ok(stats) => debug!(
                        session_id = %id,
                        datagrams = stats.datagrams,
                        samples = stats.samples_written,
                        "ingest task joined"
                    ),
                    Err(e) => warn!(session_id = %id, "Ingest task failed: {}", e),
                }
            }

            if let Err(e) = transport.close().await {
                warn!(session_id = %id, "Failed to close transport: {}", e);
            }
            if let Err(e) = channel.close().await {
                debug!(session_id = %id, "Failed to close control channel: {}", e);
            }

            info!(session_id = %id, "session closed");
        });

        handle
            .map(|joined| {
                if let Err(e) = joined {
                    error!("Session teardown failed: {}", e);
                }
            })
            .boxed()
            .shared()
    }
}

fn as_setup(error: Error) -> Error {
    match error {
        Error::Setup(_) => error,
        other => Error::Setup(other.to_string()),
    }
}
