// Wire models for the console REST API.
//
// Field names follow the backend's JSON exactly (snake_case). Cameras are
// keyed by serial number; everything else hangs off a camera.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// ── Camera ──────────────────────────────────────────────────────────

/// Connectivity as last recorded by backend discovery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CameraStatus {
    Online,
    #[default]
    Offline,
}

impl fmt::Display for CameraStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => f.write_str("Online"),
            Self::Offline => f.write_str("Offline"),
        }
    }
}

/// A discovered camera with its saved profiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// Backend row id. Not used for addressing; serial is the stable key.
    #[serde(default)]
    pub id: Option<u64>,
    pub serial_number: String,
    /// User-assigned label. The backend sends `""` when unset.
    #[serde(default)]
    pub friendly_name: Option<String>,
    #[serde(default)]
    pub model_name: String,
    #[serde(default)]
    pub current_ip: Option<String>,
    #[serde(default)]
    pub status: CameraStatus,
    /// Saved profiles in backend order.
    #[serde(default)]
    pub profiles: Vec<ProfileSummary>,
}

impl Camera {
    /// Friendly name when set, otherwise the model name.
    pub fn display_name(&self) -> &str {
        match self.friendly_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.model_name,
        }
    }

    pub fn is_online(&self) -> bool {
        self.status == CameraStatus::Online
    }
}

// ── Profiles ────────────────────────────────────────────────────────

/// Opaque profile identifier assigned by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(pub u64);

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ProfileId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Naive layouts a backend without time-zone support emits.
const NAIVE_LAYOUTS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// RFC 3339, or a naive timestamp taken as UTC. A string in any other
/// shape reads as `None` instead of failing the enclosing record.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(raw, layout).ok())
        .map(|naive| naive.and_utc())
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

/// Profile as nested inside a [`Camera`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub id: ProfileId,
    pub name: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Full profile as returned by "save current settings".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    /// Backend row id of the owning camera.
    #[serde(default)]
    pub camera: Option<u64>,
    pub name: String,
    /// Snapshot of feature name → value at save time.
    #[serde(default)]
    pub settings_json: serde_json::Map<String, serde_json::Value>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<&Profile> for ProfileSummary {
    fn from(p: &Profile) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
            created_at: p.created_at,
        }
    }
}

/// Body for `save_profile`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct SaveProfileRequest<'a> {
    pub name: &'a str,
}

// ── Features ────────────────────────────────────────────────────────

/// Live reachability reported alongside a feature set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureStatus {
    Online,
    #[default]
    Offline,
}

/// A single named camera parameter reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl Feature {
    /// Human-readable value: strings unquoted, everything else as JSON.
    pub fn display_value(&self) -> String {
        match &self.value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => "-".into(),
            other => other.to_string(),
        }
    }
}

/// Feature readings for one camera. Superseded wholesale on every fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    pub status: FeatureStatus,
    /// Explanation from the backend, e.g. which saved profile the
    /// readings were taken from while the camera is offline.
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub features: Vec<Feature>,
}

impl FeatureSet {
    pub fn is_online(&self) -> bool {
        self.status == FeatureStatus::Online
    }
}

// ── Error bodies ────────────────────────────────────────────────────

/// Error payloads the backend produces: `{error}` from profile actions,
/// `{detail}` from framework-level rejections.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

impl ErrorBody {
    pub fn into_message(self) -> Option<String> {
        self.error.or(self.detail)
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_camera_with_profiles() {
        let json = r#"{
            "id": 3,
            "serial_number": "C1",
            "friendly_name": "",
            "model_name": "acA1920-40gm",
            "current_ip": null,
            "status": "Online",
            "profiles": [
                { "id": 42, "name": "High Speed", "created_at": "2025-03-01T10:15:00.123456Z" }
            ]
        }"#;

        let camera: Camera = serde_json::from_str(json).unwrap();
        assert_eq!(camera.serial_number, "C1");
        assert!(camera.is_online());
        assert_eq!(camera.display_name(), "acA1920-40gm");
        assert_eq!(camera.profiles.len(), 1);
        assert_eq!(camera.profiles[0].id, ProfileId(42));
        assert!(camera.profiles[0].created_at.is_some());
    }

    #[test]
    fn naive_and_malformed_timestamps_do_not_fail_the_camera() {
        let json = r#"{
            "serial_number": "C1",
            "model_name": "acA1920-40gm",
            "status": "Online",
            "profiles": [
                { "id": 1, "name": "Naive", "created_at": "2025-03-01T10:15:00.123456" },
                { "id": 2, "name": "Spaced", "created_at": "2025-03-01 10:15:00" },
                { "id": 3, "name": "Garbage", "created_at": "yesterday" },
                { "id": 4, "name": "Null", "created_at": null },
                { "id": 5, "name": "Missing" }
            ]
        }"#;

        let camera: Camera = serde_json::from_str(json).unwrap();
        let stamps: Vec<_> = camera.profiles.iter().map(|p| p.created_at).collect();
        let expected = "2025-03-01T10:15:00Z".parse::<DateTime<Utc>>().unwrap();

        assert_eq!(stamps[0].map(|t| t.timestamp()), Some(expected.timestamp()));
        assert_eq!(stamps[1], Some(expected));
        assert_eq!(stamps[2..], [None, None, None]);
    }

    #[test]
    fn offset_timestamps_are_normalized_to_utc() {
        let parsed = parse_timestamp("2025-03-01T12:15:00+02:00").unwrap();
        assert_eq!(parsed, "2025-03-01T10:15:00Z".parse::<DateTime<Utc>>().unwrap());
    }

    #[test]
    fn display_name_prefers_friendly_name() {
        let camera = Camera {
            id: None,
            serial_number: "C2".into(),
            friendly_name: Some("Conveyor Belt".into()),
            model_name: "acA640".into(),
            current_ip: Some("10.0.0.7".into()),
            status: CameraStatus::Offline,
            profiles: Vec::new(),
        };
        assert_eq!(camera.display_name(), "Conveyor Belt");
    }

    #[test]
    fn deserialize_offline_feature_set() {
        let json = r#"{
            "status": "offline",
            "message": "Camera is offline. Showing settings from profile 'Night'.",
            "features": [
                { "name": "ExposureTime", "value": 1200.5 },
                { "name": "PixelFormat", "value": "Mono8" }
            ]
        }"#;

        let set: FeatureSet = serde_json::from_str(json).unwrap();
        assert!(!set.is_online());
        assert_eq!(set.features.len(), 2);
        assert_eq!(set.features[0].display_value(), "1200.5");
        assert_eq!(set.features[1].display_value(), "Mono8");
    }

    #[test]
    fn minimal_feature_set_defaults() {
        let set: FeatureSet = serde_json::from_str(r#"{"status":"online"}"#).unwrap();
        assert!(set.is_online());
        assert!(set.message.is_none());
        assert!(set.features.is_empty());
    }

    #[test]
    fn error_body_prefers_error_field() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"error":"Profile name is required.","detail":"x"}"#).unwrap();
        assert_eq!(body.into_message().as_deref(), Some("Profile name is required."));

        let body: ErrorBody = serde_json::from_str(r#"{"detail":"Not found."}"#).unwrap();
        assert_eq!(body.into_message().as_deref(), Some("Not found."));
    }
}
