// ── Core error types ──
//
// User-facing errors from camdeck-core. Consumers never see reqwest or
// tungstenite errors directly; the `From<camdeck_api::Error>` impl folds
// transport-layer failures into the console's error taxonomy.

use std::fmt;

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Transport failure or unexpected HTTP response.
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// HTTP status code (if the console answered at all).
        status: Option<u16>,
    },

    /// Unknown serial number or profile id.
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    /// Input rejected, either before any request or by the console.
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// The action is not possible right now, typically because the
    /// camera is offline.
    #[error("Action not possible: {message}")]
    Conflict { message: String },

    /// Anti-forgery credential missing or refused.
    #[error("Not authorized: {message}")]
    Auth { message: String },

    /// The live channel could not be opened or closed unexpectedly.
    #[error("Live stream error: {reason}")]
    Stream { reason: String },

    /// `open` was called while a session is still connecting or open.
    #[error("A live session is already active for {serial}")]
    SessionBusy { serial: String },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Coarse classification of a [`CoreError`], for presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Network,
    NotFound,
    Validation,
    Conflict,
    Auth,
    Stream,
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Network => "network",
            Self::NotFound => "not found",
            Self::Validation => "invalid input",
            Self::Conflict => "conflict",
            Self::Auth => "not authorized",
            Self::Stream => "stream",
            Self::Config => "configuration",
        };
        f.write_str(label)
    }
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network { .. } => ErrorKind::Network,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Auth { .. } => ErrorKind::Auth,
            Self::Stream { .. } | Self::SessionBusy { .. } => ErrorKind::Stream,
            Self::Config { .. } => ErrorKind::Config,
        }
    }

    /// Human-readable detail without the category prefix.
    pub fn detail(&self) -> String {
        match self {
            Self::Network { message, .. }
            | Self::Validation { message }
            | Self::Conflict { message }
            | Self::Auth { message }
            | Self::Config { message } => message.clone(),
            Self::NotFound { resource } => format!("{resource} does not exist"),
            Self::Stream { reason } => reason.clone(),
            Self::SessionBusy { serial } => format!("session for {serial} is still active"),
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<camdeck_api::Error> for CoreError {
    fn from(err: camdeck_api::Error) -> Self {
        use camdeck_api::Error as Api;

        let status = err.status();
        match err {
            Api::MissingCsrfToken => CoreError::Auth {
                message: "no anti-forgery token available".into(),
            },
            Api::Authentication { message, .. } => CoreError::Auth { message },
            Api::Transport(e) => CoreError::Network {
                message: e.to_string(),
                status,
            },
            Api::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            Api::InvalidBaseUrl(url) => CoreError::Config {
                message: format!("URL cannot be used as a console base: {url}"),
            },
            Api::Tls(message) => CoreError::Network {
                message: format!("TLS error: {message}"),
                status: None,
            },
            Api::NotFound { resource, .. } => CoreError::NotFound { resource },
            Api::Conflict { message, .. } => CoreError::Conflict { message },
            Api::Invalid { message, .. } | Api::Validation { message } => {
                CoreError::Validation { message }
            }
            Api::Http { status, message } => CoreError::Network {
                message,
                status: Some(status),
            },
            Api::WebSocketConnect(reason) => CoreError::Stream { reason },
            Api::Deserialization { message, .. } => CoreError::Network {
                message: format!("unexpected response from console: {message}"),
                status: None,
            },
        }
    }
}
