// camdeck-core: View controller and live stream session between camdeck-api and the console UI.

pub mod config;
pub mod controller;
pub mod error;
pub mod gateway;
pub mod intent;
pub mod session;
pub mod view;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{ConsoleConfig, TlsVerification};
pub use controller::{Console, ViewController};
pub use error::{CoreError, ErrorKind};
pub use gateway::Gateway;
pub use intent::Intent;
pub use session::{
    CloseKind, LiveFrame, OpenTicket, SessionSnapshot, SessionState, SessionStatus,
    StreamConnector, StreamSession,
};
pub use view::{
    CameraDetail, Notice, NoticeLevel, Panel, StreamIndicator, ViewError, ViewModel, ViewState,
};

// Wire types consumers need alongside the view-models.
pub use camdeck_api::{
    Camera, CameraStatus, Feature, FeatureSet, FeatureStatus, Profile, ProfileId, ProfileSummary,
    StreamConnection, StreamEvent,
};
