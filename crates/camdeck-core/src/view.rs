// ── View-models ──
//
// Everything the presentation layer renders. Produced by the view
// controller, published through a `watch` channel, never mutated by the
// renderer.

use std::fmt;
use std::sync::Arc;

use camdeck_api::{Camera, FeatureSet, ProfileSummary};

use crate::error::{CoreError, ErrorKind};
use crate::session::{CloseKind, SessionSnapshot, SessionState};

/// Which screen is visible. The single source of truth for navigation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum ViewState {
    #[default]
    List,
    Detail {
        serial: String,
    },
}

impl ViewState {
    pub fn selected_serial(&self) -> Option<&str> {
        match self {
            Self::List => None,
            Self::Detail { serial } => Some(serial.as_str()),
        }
    }
}

impl fmt::Display for ViewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List => f.write_str("cameras"),
            Self::Detail { serial } => write!(f, "camera {serial}"),
        }
    }
}

/// Error rendered in place of a panel or inside a notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&CoreError> for ViewError {
    fn from(err: &CoreError) -> Self {
        Self {
            kind: err.kind(),
            message: err.detail(),
        }
    }
}

impl fmt::Display for ViewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Fully-populated detail view. Built only when both the camera and
/// its feature set were fetched successfully.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraDetail {
    pub camera: Camera,
    pub features: FeatureSet,
    /// A live session is expected for this camera.
    pub live: bool,
}

impl CameraDetail {
    pub fn profiles(&self) -> &[ProfileSummary] {
        &self.camera.profiles
    }
}

/// Main content area.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Panel {
    #[default]
    Loading,
    Cameras(Arc<Vec<Camera>>),
    NoCameras,
    ListFailed(ViewError),
    Detail(Arc<CameraDetail>),
    DetailFailed(ViewError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// One-line outcome of the last user action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(err: &CoreError) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: ViewError::from(err).to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewModel {
    pub state: ViewState,
    pub panel: Panel,
    pub notice: Option<Notice>,
}

impl ViewModel {
    pub fn detail(&self) -> Option<&CameraDetail> {
        match &self.panel {
            Panel::Detail(detail) => Some(detail.as_ref()),
            _ => None,
        }
    }

    pub fn cameras(&self) -> &[Camera] {
        match &self.panel {
            Panel::Cameras(cameras) => cameras.as_slice(),
            _ => &[],
        }
    }
}

/// Connection status shown over the live feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamIndicator {
    /// No live feed for this view (list view, offline camera).
    Unavailable,
    Connecting,
    Live,
    /// The channel went away unexpectedly; the last frame is stale.
    Lost { reason: String },
    Closed,
}

impl StreamIndicator {
    /// Derive the indicator for `state` from a session snapshot.
    pub fn derive(state: &ViewState, session: &SessionSnapshot) -> Self {
        let Some(serial) = state.selected_serial() else {
            return Self::Unavailable;
        };
        if session.serial.as_deref() != Some(serial) {
            return Self::Unavailable;
        }
        match (session.state, &session.last_close) {
            (SessionState::Idle, _) => Self::Unavailable,
            (SessionState::Connecting, _) => Self::Connecting,
            (SessionState::Open, _) => Self::Live,
            (SessionState::Closed, Some(CloseKind::Unexpected { reason })) => Self::Lost {
                reason: reason.clone(),
            },
            (SessionState::Closed, _) => Self::Closed,
        }
    }
}
