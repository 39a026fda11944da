// camdeck-api: Async Rust client for the camera console backend (REST gateway + live frames)

pub mod client;
pub mod error;
pub mod models;
pub mod stream;
pub mod transport;

pub use client::{CSRF_HEADER, GatewayClient};
pub use error::Error;
pub use models::{
    Camera, CameraStatus, Feature, FeatureSet, FeatureStatus, Profile, ProfileId, ProfileSummary,
};
pub use stream::{StreamClient, StreamConnection, StreamEvent};
pub use transport::{TlsMode, TransportConfig};
