// ── Gateway seam ──
//
// The view controller talks to the console through this trait so that
// its state machine can be driven without a network. `GatewayClient`
// is the production implementation.

use std::future::Future;

use camdeck_api::{Camera, FeatureSet, GatewayClient, Profile, ProfileId};

use crate::error::CoreError;

/// Request/response operations the view controller needs.
///
/// One call is one request. Implementations must not cache or retry.
pub trait Gateway: Send + Sync + 'static {
    /// Cameras in backend order.
    fn list_cameras(&self) -> impl Future<Output = Result<Vec<Camera>, CoreError>> + Send;

    /// Trigger discovery. The caller re-lists afterwards.
    fn scan(&self) -> impl Future<Output = Result<(), CoreError>> + Send;

    fn camera_detail(&self, serial: &str)
    -> impl Future<Output = Result<Camera, CoreError>> + Send;

    fn features(&self, serial: &str) -> impl Future<Output = Result<FeatureSet, CoreError>> + Send;

    fn apply_profile(&self, id: ProfileId) -> impl Future<Output = Result<(), CoreError>> + Send;

    fn save_profile(
        &self,
        serial: &str,
        name: &str,
    ) -> impl Future<Output = Result<Profile, CoreError>> + Send;
}

impl Gateway for GatewayClient {
    async fn list_cameras(&self) -> Result<Vec<Camera>, CoreError> {
        Ok(GatewayClient::list_cameras(self).await?)
    }

    async fn scan(&self) -> Result<(), CoreError> {
        Ok(GatewayClient::scan(self).await?)
    }

    async fn camera_detail(&self, serial: &str) -> Result<Camera, CoreError> {
        Ok(self.get_camera(serial).await?)
    }

    async fn features(&self, serial: &str) -> Result<FeatureSet, CoreError> {
        Ok(self.get_features(serial).await?)
    }

    async fn apply_profile(&self, id: ProfileId) -> Result<(), CoreError> {
        Ok(GatewayClient::apply_profile(self, id).await?)
    }

    async fn save_profile(&self, serial: &str, name: &str) -> Result<Profile, CoreError> {
        Ok(GatewayClient::save_profile(self, serial, name).await?)
    }
}
