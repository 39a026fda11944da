// Gateway HTTP client
//
// Wraps `reqwest::Client` with console-specific URL construction,
// anti-forgery header injection, and status classification. One method
// call is exactly one request; nothing is cached or retried here.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use reqwest::StatusCode;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderValue, REFERER};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{Camera, ErrorBody, FeatureSet, Profile, ProfileId, SaveProfileRequest};
use crate::transport::TransportConfig;

/// Header carrying the anti-forgery token on mutating requests.
pub const CSRF_HEADER: &str = "X-CSRFToken";

/// Cookie the console sets alongside the hosting page.
const CSRF_COOKIE: &str = "csrftoken";

/// Hidden form field the hosting page embeds the token in.
const CSRF_FORM_FIELD: &str = "csrfmiddlewaretoken";

/// Longest slice of a non-JSON error body surfaced in error messages.
const MAX_ERROR_SNIPPET: usize = 200;

/// Which gateway call produced a response. Status classification
/// depends on it (a 400 from `apply` means the camera refused the
/// settings, a 400 from `save_profile` means the name was rejected).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Bootstrap,
    ListCameras,
    Scan,
    CameraDetail,
    Features,
    ApplyProfile,
    SaveProfile,
}

impl Operation {
    fn as_str(self) -> &'static str {
        match self {
            Self::Bootstrap => "bootstrap",
            Self::ListCameras => "list_cameras",
            Self::Scan => "scan",
            Self::CameraDetail => "camera_detail",
            Self::Features => "features",
            Self::ApplyProfile => "apply_profile",
            Self::SaveProfile => "save_profile",
        }
    }
}

/// Typed client for the console's REST gateway.
///
/// Read calls are plain GETs. Mutating calls (`scan`, `apply_profile`,
/// `save_profile`) carry the anti-forgery token in [`CSRF_HEADER`]; the
/// token is swappable at runtime so an expired one can be replaced
/// without rebuilding the client.
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: Url,
    csrf: ArcSwapOption<SecretString>,
    /// Present when built through [`new`](Self::new).
    cookies: Option<Arc<Jar>>,
}

impl GatewayClient {
    /// Create a new gateway client from a `TransportConfig`.
    ///
    /// If the config doesn't already include a cookie jar, one is created
    /// automatically: the console validates the anti-forgery header
    /// against its cookie. `base_url` is the console root, e.g.
    /// `http://10.0.0.2:8000/`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        if base_url.cannot_be_a_base() {
            return Err(Error::InvalidBaseUrl(base_url.to_string()));
        }
        let config = if transport.cookie_jar.is_some() {
            transport.clone()
        } else {
            transport.clone().with_cookie_jar()
        };
        let http = config.build_client()?;
        let mut client = Self::with_client(http, base_url);
        client.cookies = config.cookie_jar;
        Ok(client)
    }

    /// Create a gateway client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url,
            csrf: ArcSwapOption::empty(),
            cookies: None,
        }
    }

    /// Builder-style variant of [`set_csrf_token`](Self::set_csrf_token).
    pub fn with_csrf_token(self, token: SecretString) -> Self {
        self.set_csrf_token(Some(token));
        self
    }

    /// The console base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Replace (or clear) the anti-forgery token used for mutating calls.
    pub fn set_csrf_token(&self, token: Option<SecretString>) {
        self.csrf.store(token.map(Arc::new));
    }

    pub fn has_csrf_token(&self) -> bool {
        self.csrf.load().is_some()
    }

    /// `Cookie` header value the console has set so far (session and
    /// anti-forgery cookies), for requests made outside this client.
    ///
    /// `None` without a jar or before the console set any cookie.
    pub fn cookie_header(&self) -> Option<String> {
        let jar = self.cookies.as_ref()?;
        let value = jar.cookies(&self.base_url)?;
        value.to_str().ok().map(str::to_owned)
    }

    // ── Anti-forgery bootstrap ──────────────────────────────────────

    /// Fetch the console's hosting page and adopt the anti-forgery token
    /// it carries.
    ///
    /// The hidden form field is preferred; the `csrftoken` cookie set by
    /// the same response is the fallback. The cookie itself stays in the
    /// client's jar for subsequent requests.
    pub async fn bootstrap_csrf(&self) -> Result<(), Error> {
        let url = self.base_url.clone();
        debug!("GET {} (anti-forgery bootstrap)", url);

        let resp = self.http.get(url).send().await?;
        let resp = expect_success(Operation::Bootstrap, resp).await?;

        let cookie_token = resp
            .cookies()
            .find(|c| c.name() == CSRF_COOKIE)
            .map(|c| c.value().to_owned());
        let body = resp.text().await?;

        let token = extract_form_token(&body)
            .or(cookie_token)
            .ok_or(Error::MissingCsrfToken)?;
        self.set_csrf_token(Some(SecretString::from(token)));
        debug!("adopted anti-forgery token from hosting page");
        Ok(())
    }

    // ── Cameras ─────────────────────────────────────────────────────

    /// List cameras in backend order.
    pub async fn list_cameras(&self) -> Result<Vec<Camera>, Error> {
        let url = self.endpoint(&["api", "cameras"])?;
        self.get_json(Operation::ListCameras, url).await
    }

    /// Trigger backend discovery. The caller must re-list afterwards.
    pub async fn scan(&self) -> Result<(), Error> {
        let url = self.endpoint(&["api", "cameras", "scan"])?;
        let resp = self.mutating(url)?.send().await?;
        expect_success(Operation::Scan, resp).await?;
        Ok(())
    }

    /// Fetch a single camera by serial number.
    pub async fn get_camera(&self, serial: &str) -> Result<Camera, Error> {
        let url = self.endpoint(&["api", "cameras", serial])?;
        self.get_json(Operation::CameraDetail, url).await
    }

    /// Fetch the feature set for a camera.
    ///
    /// An offline camera with no saved profile is answered with a 404
    /// that still carries a well-formed offline feature set; that body
    /// is returned as a normal result. A 404 without one (unknown
    /// serial) is [`Error::NotFound`].
    pub async fn get_features(&self, serial: &str) -> Result<FeatureSet, Error> {
        let url = self.endpoint(&["api", "cameras", serial, "features"])?;
        debug!("GET {}", url);

        let resp = self.http.get(url).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            let resource = resp.url().path().to_owned();
            let body = resp.text().await?;
            if let Ok(set) = serde_json::from_str::<FeatureSet>(&body) {
                debug!(serial, "feature set delivered with 404 (offline, no saved profile)");
                return Ok(set);
            }
            return Err(classify(Operation::Features, StatusCode::NOT_FOUND, &resource, &body));
        }

        let resp = expect_success(Operation::Features, resp).await?;
        decode(resp).await
    }

    // ── Profiles ────────────────────────────────────────────────────

    /// Apply a saved profile to its camera. Acknowledgement only.
    pub async fn apply_profile(&self, profile_id: ProfileId) -> Result<(), Error> {
        let id = profile_id.to_string();
        let url = self.endpoint(&["api", "profiles", &id, "apply"])?;
        let resp = self.mutating(url)?.send().await?;
        expect_success(Operation::ApplyProfile, resp).await?;
        Ok(())
    }

    /// Save the camera's current settings as a new named profile.
    ///
    /// An empty (or all-whitespace) name is rejected before any request
    /// is issued.
    pub async fn save_profile(&self, serial: &str, name: &str) -> Result<Profile, Error> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation {
                message: "profile name must not be empty".into(),
            });
        }

        let url = self.endpoint(&["api", "cameras", serial, "save_profile"])?;
        let resp = self
            .mutating(url)?
            .json(&SaveProfileRequest { name })
            .send()
            .await?;
        let resp = expect_success(Operation::SaveProfile, resp).await?;
        decode(resp).await
    }

    // ── URL builders ────────────────────────────────────────────────

    /// Build `{base}/{segments...}/` with each segment percent-encoded.
    ///
    /// A path prefix on the base URL (console mounted under a
    /// sub-path) is preserved.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments)
            .push("");
        Ok(url)
    }

    // ── Request helpers ─────────────────────────────────────────────

    async fn get_json<T: DeserializeOwned>(&self, op: Operation, url: Url) -> Result<T, Error> {
        debug!(op = op.as_str(), "GET {}", url);
        let resp = self.http.get(url).send().await?;
        let resp = expect_success(op, resp).await?;
        decode(resp).await
    }

    /// Start a POST carrying the anti-forgery token.
    ///
    /// Fails with [`Error::MissingCsrfToken`] when no token is set, so no
    /// request is issued.
    fn mutating(&self, url: Url) -> Result<reqwest::RequestBuilder, Error> {
        let guard = self.csrf.load();
        let token = (*guard).as_deref().ok_or(Error::MissingCsrfToken)?;
        let mut value = HeaderValue::from_str(token.expose_secret()).map_err(|_| {
            Error::Validation {
                message: "anti-forgery token contains characters not valid in a header".into(),
            }
        })?;
        value.set_sensitive(true);

        debug!("POST {}", url);
        Ok(self
            .http
            .post(url)
            .header(CSRF_HEADER, value)
            .header(REFERER, self.base_url.as_str()))
    }
}

// ── Response handling ───────────────────────────────────────────────

/// Pass a successful response through; turn anything else into a
/// classified [`Error`].
async fn expect_success(op: Operation, resp: reqwest::Response) -> Result<reqwest::Response, Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let resource = resp.url().path().to_owned();
    let body = resp.text().await.unwrap_or_default();
    debug!(op = op.as_str(), status = status.as_u16(), "gateway request failed");
    Err(classify(op, status, &resource, &body))
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let body = resp.text().await?;
    serde_json::from_str(&body).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body,
    })
}

fn classify(op: Operation, status: StatusCode, resource: &str, body: &str) -> Error {
    let message = error_message(status, body);
    let code = status.as_u16();

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Authentication {
            status: code,
            message,
        },
        StatusCode::NOT_FOUND => Error::NotFound {
            resource: resource.to_owned(),
            message,
        },
        // The device refused the settings, which the backend reports as 400.
        StatusCode::BAD_REQUEST if op == Operation::ApplyProfile => Error::Conflict {
            status: code,
            message,
        },
        StatusCode::BAD_REQUEST => Error::Invalid {
            status: code,
            message,
        },
        StatusCode::CONFLICT | StatusCode::SERVICE_UNAVAILABLE
            if matches!(op, Operation::ApplyProfile | Operation::SaveProfile) =>
        {
            Error::Conflict {
                status: code,
                message,
            }
        }
        _ => Error::Http {
            status: code,
            message,
        },
    }
}

/// Best-effort human message from an error response body.
fn error_message(status: StatusCode, body: &str) -> String {
    if let Some(message) = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(ErrorBody::into_message)
    {
        return message;
    }

    let first_line = body.lines().map(str::trim).find(|l| !l.is_empty());
    match first_line {
        Some(line) if !line.starts_with('<') => line.chars().take(MAX_ERROR_SNIPPET).collect(),
        _ => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_owned(),
    }
}

/// Pull the token out of the hosting page's hidden form input.
fn extract_form_token(html: &str) -> Option<String> {
    let marker = html.find(CSRF_FORM_FIELD)?;
    let tag_start = html[..marker].rfind('<')?;
    let tag_end = marker + html[marker..].find('>')?;
    let tag = &html[tag_start..tag_end];

    let value_at = tag.find("value=")? + "value=".len();
    let rest = &tag[value_at..];
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let rest = &rest[1..];
    let token = &rest[..rest.find(quote)?];

    (!token.is_empty()).then(|| token.to_owned())
}

// ── Tests ───────────────────────────────────────────────────────────
