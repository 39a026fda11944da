// ── Live stream session ──
//
// Owns at most one live channel. State lives behind a single mutex
// together with a generation counter: every open/close bumps the
// generation, and any asynchronous result (handshake completion, inbound
// frame, transport loss) is applied only if its generation still matches.
// That is what keeps a late handshake or an in-flight frame from
// resurrecting a session that was already closed.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use base64::Engine as _;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::{Mutex, broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use camdeck_api::{StreamClient, StreamConnection, StreamEvent};

use crate::error::CoreError;

const STATUS_CHANNEL_SIZE: usize = 32;

// ── Connector seam ───────────────────────────────────────────────

/// Opens one live channel per call.
pub trait StreamConnector: Send + Sync + 'static {
    /// Resolve once the handshake has completed.
    fn connect(
        &self,
        serial: &str,
    ) -> impl Future<Output = Result<StreamConnection, CoreError>> + Send;
}

impl StreamConnector for StreamClient {
    async fn connect(&self, serial: &str) -> Result<StreamConnection, CoreError> {
        Ok(StreamClient::connect(self, serial).await?)
    }
}

// ── Observable state ─────────────────────────────────────────────

/// Lifecycle of the session slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SessionState {
    #[default]
    Idle,
    Connecting,
    Open,
    Closed,
}

impl SessionState {
    /// `Connecting` or `Open`.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Connecting | Self::Open)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        };
        f.write_str(label)
    }
}

/// How the most recent session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseKind {
    /// Closed by the caller.
    Clean,
    /// Handshake failure, transport error, or server-side close.
    Unexpected { reason: String },
}

/// Point-in-time view of the session slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    /// Serial the slot is (or was last) bound to.
    pub serial: Option<String>,
    pub last_close: Option<CloseKind>,
}

/// Discrete lifecycle notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Connecting { serial: String },
    Opened { serial: String },
    Closed { serial: String, kind: CloseKind },
}

/// The most recent frame received on the live channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveFrame {
    pub serial: String,
    /// Strictly increasing for the lifetime of the session manager.
    pub seq: u64,
    /// Encoded image exactly as delivered (base64).
    pub image: String,
    pub received_at: DateTime<Utc>,
}

impl LiveFrame {
    /// Raw image bytes.
    pub fn decode(&self) -> Result<Bytes, base64::DecodeError> {
        base64::engine::general_purpose::STANDARD
            .decode(self.image.as_bytes())
            .map(Bytes::from)
    }
}

/// Server-to-client message on the live channel.
#[derive(Debug, Deserialize)]
struct FrameMessage {
    #[serde(default)]
    image: Option<String>,
}

/// Proof that [`StreamSession::begin_open`] moved the slot to
/// `Connecting`. Consumed by [`StreamSession::complete_open`].
#[derive(Debug)]
#[must_use = "an open ticket does nothing until passed to complete_open"]
pub struct OpenTicket {
    generation: u64,
    serial: String,
}

impl OpenTicket {
    pub fn serial(&self) -> &str {
        &self.serial
    }
}

// ── StreamSession ────────────────────────────────────────────────

/// Single-slot live channel manager.
///
/// Cheaply cloneable. The latest frame is a single-slot `watch`; frames
/// overwrite each other and are never queued.
pub struct StreamSession<C> {
    inner: Arc<SessionInner<C>>,
}

impl<C> Clone for StreamSession<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct SessionInner<C> {
    connector: C,
    slot: Mutex<Slot>,
    snapshot: watch::Sender<SessionSnapshot>,
    frames: watch::Sender<Option<Arc<LiveFrame>>>,
    status: broadcast::Sender<SessionStatus>,
    seq: AtomicU64,
}

#[derive(Default)]
struct Slot {
    generation: u64,
    state: SessionState,
    serial: Option<String>,
    last_close: Option<CloseKind>,
    cancel: Option<CancellationToken>,
}

impl Slot {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            serial: self.serial.clone(),
            last_close: self.last_close.clone(),
        }
    }
}

impl<C: StreamConnector> StreamSession<C> {
    pub fn new(connector: C) -> Self {
        let (snapshot, _) = watch::channel(SessionSnapshot::default());
        let (frames, _) = watch::channel(None);
        let (status, _) = broadcast::channel(STATUS_CHANNEL_SIZE);

        Self {
            inner: Arc::new(SessionInner {
                connector,
                slot: Mutex::new(Slot::default()),
                snapshot,
                frames,
                status,
                seq: AtomicU64::new(0),
            }),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Open a live channel for `serial` and wait for the handshake.
    ///
    /// Valid only from `Idle` or `Closed`; otherwise fails with
    /// [`CoreError::SessionBusy`] and leaves the current session alone.
    pub async fn open(&self, serial: &str) -> Result<(), CoreError> {
        let ticket = self.begin_open(serial).await?;
        self.complete_open(ticket).await
    }

    /// First half of [`open`](Self::open): claim the slot and move it to
    /// `Connecting` without waiting on the network.
    pub async fn begin_open(&self, serial: &str) -> Result<OpenTicket, CoreError> {
        let mut slot = self.inner.slot.lock().await;
        if slot.state.is_live() {
            return Err(CoreError::SessionBusy {
                serial: slot.serial.clone().unwrap_or_default(),
            });
        }

        slot.generation += 1;
        slot.state = SessionState::Connecting;
        slot.serial = Some(serial.to_owned());
        slot.last_close = None;
        slot.cancel = None;

        self.inner.frames.send_replace(None);
        self.inner.snapshot.send_replace(slot.snapshot());
        let _ = self.inner.status.send(SessionStatus::Connecting {
            serial: serial.to_owned(),
        });
        debug!(serial, generation = slot.generation, "live session connecting");

        Ok(OpenTicket {
            generation: slot.generation,
            serial: serial.to_owned(),
        })
    }

    /// Second half of [`open`](Self::open): perform the handshake.
    ///
    /// If the slot was closed while the handshake was in flight, the new
    /// connection is released immediately and the slot stays `Closed`.
    pub async fn complete_open(&self, ticket: OpenTicket) -> Result<(), CoreError> {
        let result = self.inner.connector.connect(&ticket.serial).await;

        let mut slot = self.inner.slot.lock().await;
        if slot.generation != ticket.generation || slot.state != SessionState::Connecting {
            debug!(
                serial = ticket.serial,
                generation = ticket.generation,
                "discarding handshake result for superseded session"
            );
            if let Ok(conn) = result {
                conn.close();
            }
            return Ok(());
        }

        match result {
            Ok(conn) => {
                // Cancelling the connection's own token releases the socket
                // and stops the pump in one step.
                let cancel = conn.cancel_token();
                slot.state = SessionState::Open;
                slot.cancel = Some(cancel.clone());
                self.inner.snapshot.send_replace(slot.snapshot());
                let _ = self.inner.status.send(SessionStatus::Opened {
                    serial: ticket.serial.clone(),
                });
                info!(serial = ticket.serial, "live session open");

                let inner = Arc::clone(&self.inner);
                tokio::spawn(pump(inner, ticket.generation, ticket.serial, conn, cancel));
                Ok(())
            }
            Err(e) => {
                warn!(serial = ticket.serial, error = %e, "live session handshake failed");
                slot.mark_lost(&self.inner, e.detail());
                Err(e)
            }
        }
    }

    /// Close the session from any state. Idempotent.
    ///
    /// Emits a `Clean` close notification only when a session was
    /// actually connecting or open. The latest-frame slot is cleared.
    pub async fn close(&self) {
        let mut slot = self.inner.slot.lock().await;
        slot.generation += 1;
        if let Some(cancel) = slot.cancel.take() {
            cancel.cancel();
        }
        self.inner.frames.send_replace(None);

        let was_live = slot.state.is_live();
        slot.state = SessionState::Closed;
        if was_live {
            slot.last_close = Some(CloseKind::Clean);
            let serial = slot.serial.clone().unwrap_or_default();
            info!(serial, "live session closed");
            let _ = self.inner.status.send(SessionStatus::Closed {
                serial,
                kind: CloseKind::Clean,
            });
        }

        let snapshot = slot.snapshot();
        self.inner.snapshot.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }

    // ── Observation ──────────────────────────────────────────────

    pub fn connector(&self) -> &C {
        &self.inner.connector
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    pub fn state(&self) -> SessionState {
        self.inner.snapshot.borrow().state
    }

    /// Subscribe to snapshot changes.
    pub fn watch_snapshot(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.snapshot.subscribe()
    }

    pub fn latest_frame(&self) -> Option<Arc<LiveFrame>> {
        self.inner.frames.borrow().clone()
    }

    /// Subscribe to the single-slot latest-frame notification.
    pub fn watch_frames(&self) -> watch::Receiver<Option<Arc<LiveFrame>>> {
        self.inner.frames.subscribe()
    }

    /// Subscribe to discrete lifecycle notifications.
    pub fn subscribe_status(&self) -> broadcast::Receiver<SessionStatus> {
        self.inner.status.subscribe()
    }
}

impl Slot {
    /// Move an open or connecting slot to `Closed` after a failure the
    /// caller did not ask for.
    fn mark_lost<C>(&mut self, inner: &SessionInner<C>, reason: String) {
        self.state = SessionState::Closed;
        self.last_close = Some(CloseKind::Unexpected {
            reason: reason.clone(),
        });
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        inner.snapshot.send_replace(self.snapshot());
        let _ = inner.status.send(SessionStatus::Closed {
            serial: self.serial.clone().unwrap_or_default(),
            kind: CloseKind::Unexpected { reason },
        });
    }
}

// ── Background pump ──────────────────────────────────────────────

/// Drain one connection into the latest-frame slot until it ends or the
/// session is closed. Dropping `conn` on exit releases the socket.
async fn pump<C>(
    inner: Arc<SessionInner<C>>,
    generation: u64,
    serial: String,
    mut conn: StreamConnection,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(serial, generation, "live session pump cancelled");
                return;
            }
            event = conn.recv() => event,
        };

        let reason = match event {
            Some(StreamEvent::Message(text)) => {
                publish_frame(&inner, generation, &serial, &text).await;
                continue;
            }
            Some(StreamEvent::Closed { code, reason }) => match code {
                Some(code) => format!("server closed the stream (code {code}) {reason}")
                    .trim_end()
                    .to_owned(),
                None if reason.is_empty() => "server closed the stream".to_owned(),
                None => reason,
            },
            Some(StreamEvent::Failed(reason)) => reason,
            None => "stream ended".to_owned(),
        };

        let mut slot = inner.slot.lock().await;
        if slot.generation == generation && slot.state == SessionState::Open {
            warn!(serial, reason, "live session lost");
            slot.mark_lost(&inner, reason);
        }
        return;
    }
}

async fn publish_frame<C>(inner: &SessionInner<C>, generation: u64, serial: &str, text: &str) {
    let image = match serde_json::from_str::<FrameMessage>(text) {
        Ok(FrameMessage { image: Some(image) }) => image,
        Ok(FrameMessage { image: None }) => {
            debug!(serial, "skipping live message without image");
            return;
        }
        Err(e) => {
            debug!(serial, error = %e, "skipping malformed live message");
            return;
        }
    };

    // Hold the slot lock while publishing so close() cannot interleave.
    let slot = inner.slot.lock().await;
    if slot.generation != generation || slot.state != SessionState::Open {
        debug!(serial, "dropping frame for closed session");
        return;
    }

    let seq = inner.seq.fetch_add(1, Ordering::Relaxed) + 1;
    inner.frames.send_replace(Some(Arc::new(LiveFrame {
        serial: serial.to_owned(),
        seq,
        image,
        received_at: Utc::now(),
    })));
    drop(slot);
}
