//! Live frame channel transport.
//!
//! Opens the console's per-camera WebSocket and forwards every inbound
//! text message through an unbounded [`tokio::sync::mpsc`] channel. One
//! [`StreamConnection`] is one socket and never reconnects. The session
//! layer decides whether to open another.
//!
//! # Example
//!
//! ```rust,ignore
//! use camdeck_api::stream::{StreamClient, StreamEvent};
//!
//! let client = StreamClient::from_console_url(&"http://10.0.0.2:8000".parse()?)?;
//! let mut conn = client.connect("C1").await?;
//!
//! while let Some(event) = conn.recv().await {
//!     if let StreamEvent::Message(text) = event {
//!         println!("{} bytes", text.len());
//!     }
//! }
//! ```

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;

// ── StreamEvent ─────────────────────────────────────────────────────

/// What the transport observed on the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A text message, forwarded verbatim.
    Message(String),
    /// The server closed the socket, or the stream ended.
    Closed { code: Option<u16>, reason: String },
    /// Transport-level failure; the socket is gone.
    Failed(String),
}

// ── StreamConnection ────────────────────────────────────────────────

/// Handle to one open live channel.
///
/// Dropping the handle or calling [`close`](Self::close) tells the
/// background reader to send a close frame and release the socket.
pub struct StreamConnection {
    events: mpsc::UnboundedReceiver<StreamEvent>,
    cancel: CancellationToken,
}

impl StreamConnection {
    /// Wrap an event receiver and the token that stops its producer.
    ///
    /// [`StreamClient::connect`] uses this for real sockets; tests feed
    /// the receiver directly.
    pub fn new(events: mpsc::UnboundedReceiver<StreamEvent>, cancel: CancellationToken) -> Self {
        Self { events, cancel }
    }

    /// Receive the next event. `None` once the producer is gone.
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    /// Ask the producer to release the socket. Idempotent.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token that stops the producer when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Drop for StreamConnection {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── StreamClient ────────────────────────────────────────────────────

/// Opens live channels at `{ws_base}/ws/camera_stream/{serial}/`.
#[derive(Debug, Clone)]
pub struct StreamClient {
    ws_base: Url,
    cookie: Option<String>,
}

impl StreamClient {
    /// Use an explicit `ws://` / `wss://` base URL.
    pub fn new(ws_base: Url) -> Result<Self, Error> {
        match ws_base.scheme() {
            "ws" | "wss" => Ok(Self {
                ws_base,
                cookie: None,
            }),
            other => Err(Error::WebSocketConnect(format!(
                "unsupported live channel scheme '{other}'"
            ))),
        }
    }

    /// Derive the live channel base from the console's HTTP base URL
    /// (`http` → `ws`, `https` → `wss`).
    pub fn from_console_url(console: &Url) -> Result<Self, Error> {
        let scheme = match console.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(Error::WebSocketConnect(format!(
                    "cannot derive live channel from '{other}' URL"
                )));
            }
        };
        let mut ws_base = console.clone();
        ws_base
            .set_scheme(scheme)
            .map_err(|()| Error::InvalidBaseUrl(console.to_string()))?;
        Self::new(ws_base)
    }

    /// Send a `Cookie` header on the upgrade request (session-protected
    /// consoles).
    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = Some(cookie.into());
        self
    }

    pub fn ws_base(&self) -> &Url {
        &self.ws_base
    }

    /// Channel URL for one camera.
    pub fn stream_url(&self, serial: &str) -> Result<Url, Error> {
        let mut url = self.ws_base.clone();
        url.path_segments_mut()
            .map_err(|()| Error::InvalidBaseUrl(self.ws_base.to_string()))?
            .pop_if_empty()
            .extend(["ws", "camera_stream", serial])
            .push("");
        Ok(url)
    }

    /// Perform the handshake and spawn the reader.
    ///
    /// Returns once the server has accepted the upgrade. Events arrive
    /// on the returned connection in socket order.
    pub async fn connect(&self, serial: &str) -> Result<StreamConnection, Error> {
        let url = self.stream_url(serial)?;
        tracing::info!(url = %url, serial, "Connecting live channel");

        let uri: tungstenite::http::Uri = url
            .as_str()
            .parse()
            .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;

        let mut request = ClientRequestBuilder::new(uri);
        if let Some(ref cookie_val) = self.cookie {
            request = request.with_header("Cookie", cookie_val);
        }

        let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

        tracing::info!(serial, "Live channel open");

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            read_loop(ws_stream, events_tx, task_cancel).await;
        });

        Ok(StreamConnection::new(events_rx, cancel))
    }
}

// ── Reader ──────────────────────────────────────────────────────────

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Forward socket traffic until the socket ends or the handle is closed.
async fn read_loop(
    ws_stream: WsStream,
    events_tx: mpsc::UnboundedSender<StreamEvent>,
    cancel: CancellationToken,
) {
    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                if let Err(e) = write.send(tungstenite::Message::Close(None)).await {
                    tracing::debug!(error = %e, "close frame not delivered");
                }
                tracing::debug!("Live channel released by client");
                return;
            }
            frame = read.next() => {
                let event = match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        StreamEvent::Message(String::from(text.as_str()))
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite handles pong replies automatically
                        tracing::trace!("live channel ping");
                        continue;
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        let (code, reason) = match frame {
                            Some(cf) => (Some(u16::from(cf.code)), cf.reason.to_string()),
                            None => (None, String::new()),
                        };
                        tracing::info!(?code, reason, "Live channel close frame received");
                        StreamEvent::Closed { code, reason }
                    }
                    Some(Err(e)) => StreamEvent::Failed(e.to_string()),
                    None => StreamEvent::Closed {
                        code: None,
                        reason: "stream ended".into(),
                    },
                    Some(Ok(_)) => {
                        // Binary, Pong, Frame: not part of the protocol
                        continue;
                    }
                };

                let terminal = !matches!(event, StreamEvent::Message(_));
                if events_tx.send(event).is_err() || terminal {
                    return;
                }
            }
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────
