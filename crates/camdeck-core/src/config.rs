// ── Runtime console configuration ──
//
// Describes *how* to reach a camera console. Carries the credential and
// connection tuning but never touches disk; the binary builds a
// `ConsoleConfig` (usually via camdeck-config) and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use camdeck_api::{TlsMode, TransportConfig};
use secrecy::SecretString;
use url::Url;

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed lab consoles).
    DangerAcceptInvalid,
}

/// Configuration for connecting to a single console.
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// Console base URL (e.g., `http://10.0.0.2:8000`).
    pub url: Url,
    /// Live channel base override. Derived from `url` when `None`.
    pub stream_url: Option<Url>,
    /// Anti-forgery token for mutating requests.
    pub csrf_token: Option<SecretString>,
    pub tls: TlsVerification,
    /// Request timeout.
    pub timeout: Duration,
    /// Fetch the token from the console's hosting page when none is
    /// configured.
    pub bootstrap_csrf: bool,
}

impl ConsoleConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            stream_url: None,
            csrf_token: None,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            bootstrap_csrf: true,
        }
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: match &self.tls {
                TlsVerification::SystemDefaults => TlsMode::System,
                TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
                TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
            },
            timeout: self.timeout,
            cookie_jar: None, // GatewayClient::new adds one automatically
        }
    }
}
