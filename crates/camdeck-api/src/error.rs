use thiserror::Error;

/// Top-level error type for the `camdeck-api` crate.
///
/// Covers every failure mode across both API surfaces: the REST gateway
/// and the live frame channel. `camdeck-core` maps these into the
/// user-facing error taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Credentials ─────────────────────────────────────────────────
    /// A mutating request was attempted without an anti-forgery token.
    #[error("No anti-forgery token available for a mutating request")]
    MissingCsrfToken,

    /// The console rejected the request (HTTP 401/403), usually a stale
    /// or missing anti-forgery token.
    #[error("Request rejected by console (HTTP {status}): {message}")]
    Authentication { status: u16, message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Base URL cannot carry path segments (e.g. `mailto:`).
    #[error("URL cannot be used as an API base: {0}")]
    InvalidBaseUrl(String),

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Gateway responses ───────────────────────────────────────────
    /// The requested resource does not exist (HTTP 404).
    #[error("Not found: {resource}")]
    NotFound { resource: String, message: String },

    /// The action is not possible in the camera's current state,
    /// typically because it went offline.
    #[error("Conflict (HTTP {status}): {message}")]
    Conflict { status: u16, message: String },

    /// The console rejected the request payload (HTTP 400).
    #[error("Request rejected (HTTP {status}): {message}")]
    Invalid { status: u16, message: String },

    /// Input rejected before any request was issued.
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// Any other non-success response.
    #[error("Console API error (HTTP {status}): {message}")]
    Http { status: u16, message: String },

    // ── Live channel ────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error means the credential is missing or
    /// was refused.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::MissingCsrfToken | Self::Authentication { .. })
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::NotFound { .. } => true,
            _ => false,
        }
    }

    /// HTTP status code carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            Self::Authentication { status, .. }
            | Self::Conflict { status, .. }
            | Self::Invalid { status, .. }
            | Self::Http { status, .. } => Some(*status),
            Self::NotFound { .. } => Some(404),
            _ => None,
        }
    }
}
