#![allow(clippy::unwrap_used, dead_code)]
// In-memory fakes for the gateway and live channel seams.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Notify, mpsc};
use tokio_util::sync::CancellationToken;

use camdeck_core::{
    Camera, CameraStatus, CoreError, FeatureSet, FeatureStatus, Gateway, Profile, ProfileId,
    ProfileSummary, SessionState, StreamConnection, StreamConnector, StreamEvent, StreamSession,
    ViewController,
};

pub const WAIT: Duration = Duration::from_secs(2);

// ── Fixtures ────────────────────────────────────────────────────────

pub fn camera(serial: &str, status: CameraStatus) -> Camera {
    Camera {
        id: Some(1),
        serial_number: serial.into(),
        friendly_name: None,
        model_name: "acA1920-40gm".into(),
        current_ip: Some("10.0.0.7".into()),
        status,
        profiles: Vec::new(),
    }
}

pub fn with_profile(mut camera: Camera, id: u64, name: &str) -> Camera {
    camera.profiles.push(ProfileSummary {
        id: ProfileId(id),
        name: name.into(),
        created_at: None,
    });
    camera
}

pub fn features(status: FeatureStatus) -> FeatureSet {
    FeatureSet {
        status,
        message: None,
        features: Vec::new(),
    }
}

/// Failure a fake call should produce. `CoreError` is not `Clone`, so
/// fakes keep this and build a fresh error per call.
#[derive(Debug, Clone)]
pub enum Failure {
    Network,
    NotFound,
    Conflict(String),
    Auth,
}

impl Failure {
    fn to_error(&self, resource: &str) -> CoreError {
        match self {
            Self::Network => CoreError::Network {
                message: "connection refused".into(),
                status: None,
            },
            Self::NotFound => CoreError::NotFound {
                resource: resource.into(),
            },
            Self::Conflict(message) => CoreError::Conflict {
                message: message.clone(),
            },
            Self::Auth => CoreError::Auth {
                message: "CSRF Failed".into(),
            },
        }
    }
}

// ── FakeGateway ─────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeGateway {
    cameras: Mutex<Vec<Camera>>,
    features: Mutex<HashMap<String, FeatureSet>>,
    failures: Mutex<HashMap<&'static str, Failure>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    calls: Mutex<Vec<String>>,
    next_profile_id: AtomicU64,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            next_profile_id: AtomicU64::new(100),
            ..Self::default()
        }
    }

    pub fn with_camera(self, camera: Camera, status: FeatureStatus) -> Self {
        self.features
            .lock()
            .unwrap()
            .insert(camera.serial_number.clone(), features(status));
        self.cameras.lock().unwrap().push(camera);
        self
    }

    /// Make every call of `op` fail until cleared.
    pub fn fail(&self, op: &'static str, failure: Failure) {
        self.failures.lock().unwrap().insert(op, failure);
    }

    pub fn clear_failure(&self, op: &'static str) {
        self.failures.lock().unwrap().remove(op);
    }

    pub fn set_feature_status(&self, serial: &str, status: FeatureStatus) {
        self.features
            .lock()
            .unwrap()
            .insert(serial.into(), features(status));
    }

    /// Block `camera_detail(serial)` until the returned gate is notified.
    pub fn hold(&self, serial: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates
            .lock()
            .unwrap()
            .insert(serial.into(), Arc::clone(&gate));
        gate
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn failure(&self, op: &str) -> Option<Failure> {
        self.failures.lock().unwrap().get(op).cloned()
    }
}

impl Gateway for FakeGateway {
    async fn list_cameras(&self) -> Result<Vec<Camera>, CoreError> {
        self.record("list_cameras".into());
        if let Some(f) = self.failure("list_cameras") {
            return Err(f.to_error("/api/cameras/"));
        }
        Ok(self.cameras.lock().unwrap().clone())
    }

    async fn scan(&self) -> Result<(), CoreError> {
        self.record("scan".into());
        match self.failure("scan") {
            Some(f) => Err(f.to_error("/api/cameras/scan/")),
            None => Ok(()),
        }
    }

    async fn camera_detail(&self, serial: &str) -> Result<Camera, CoreError> {
        self.record(format!("camera_detail:{serial}"));
        let gate = self.gates.lock().unwrap().remove(serial);
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if let Some(f) = self.failure("camera_detail") {
            return Err(f.to_error(serial));
        }
        self.cameras
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.serial_number == serial)
            .cloned()
            .ok_or_else(|| CoreError::NotFound {
                resource: serial.into(),
            })
    }

    async fn features(&self, serial: &str) -> Result<FeatureSet, CoreError> {
        self.record(format!("features:{serial}"));
        if let Some(f) = self.failure("features") {
            return Err(f.to_error(serial));
        }
        self.features
            .lock()
            .unwrap()
            .get(serial)
            .cloned()
            .ok_or_else(|| CoreError::NotFound {
                resource: serial.into(),
            })
    }

    async fn apply_profile(&self, id: ProfileId) -> Result<(), CoreError> {
        self.record(format!("apply_profile:{id}"));
        match self.failure("apply_profile") {
            Some(f) => Err(f.to_error(&id.to_string())),
            None => Ok(()),
        }
    }

    async fn save_profile(&self, serial: &str, name: &str) -> Result<Profile, CoreError> {
        self.record(format!("save_profile:{serial}:{name}"));
        if let Some(f) = self.failure("save_profile") {
            return Err(f.to_error(serial));
        }
        let id = self.next_profile_id.fetch_add(1, Ordering::SeqCst);
        let summary = ProfileSummary {
            id: ProfileId(id),
            name: name.into(),
            created_at: None,
        };
        if let Some(cam) = self
            .cameras
            .lock()
            .unwrap()
            .iter_mut()
            .find(|c| c.serial_number == serial)
        {
            cam.profiles.push(summary);
        }
        Ok(Profile {
            id: ProfileId(id),
            camera: Some(1),
            name: name.into(),
            settings_json: serde_json::Map::new(),
            created_at: None,
        })
    }
}

// ── FakeConnector ───────────────────────────────────────────────────

/// Server side of one fake live channel.
#[derive(Clone)]
pub struct Link {
    pub serial: String,
    pub tx: mpsc::UnboundedSender<StreamEvent>,
    pub cancel: CancellationToken,
}

impl Link {
    pub fn send_image(&self, image: &str) {
        let _ = self
            .tx
            .send(StreamEvent::Message(format!(r#"{{"image":"{image}"}}"#)));
    }

    pub fn send_raw(&self, text: &str) {
        let _ = self.tx.send(StreamEvent::Message(text.into()));
    }

    pub fn is_released(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[derive(Default)]
pub struct FakeConnector {
    links: Mutex<Vec<Link>>,
    fail_next: Mutex<Option<String>>,
    gate: Mutex<Option<Arc<Notify>>>,
    /// Connects observed while an earlier link was still unreleased.
    overlaps: AtomicUsize,
}

impl FakeConnector {
    pub fn links(&self) -> Vec<Link> {
        self.links.lock().unwrap().clone()
    }

    pub fn last_link(&self) -> Link {
        self.links.lock().unwrap().last().cloned().unwrap()
    }

    pub fn live_links(&self) -> usize {
        self.links
            .lock()
            .unwrap()
            .iter()
            .filter(|l| !l.is_released())
            .count()
    }

    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    pub fn fail_next(&self, reason: &str) {
        *self.fail_next.lock().unwrap() = Some(reason.into());
    }

    /// Block the next handshake until the returned gate is notified.
    pub fn hold(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }
}

impl StreamConnector for FakeConnector {
    async fn connect(&self, serial: &str) -> Result<StreamConnection, CoreError> {
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if let Some(reason) = self.fail_next.lock().unwrap().take() {
            return Err(CoreError::Stream { reason });
        }

        if self.live_links() > 0 {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        self.links.lock().unwrap().push(Link {
            serial: serial.into(),
            tx,
            cancel: cancel.clone(),
        });
        Ok(StreamConnection::new(rx, cancel))
    }
}

pub type TestController = ViewController<FakeGateway, FakeConnector>;

// ── Waiting helpers ─────────────────────────────────────────────────

pub async fn wait_state<C: StreamConnector>(session: &StreamSession<C>, state: SessionState) {
    let mut rx = session.watch_snapshot();
    tokio::time::timeout(WAIT, rx.wait_for(|s| s.state == state))
        .await
        .unwrap()
        .unwrap();
}

pub async fn wait_frame_seq<C: StreamConnector>(session: &StreamSession<C>, seq: u64) {
    let mut rx = session.watch_frames();
    tokio::time::timeout(WAIT, rx.wait_for(|f| f.as_ref().is_some_and(|f| f.seq >= seq)))
        .await
        .unwrap()
        .unwrap();
}

/// Give spawned tasks a chance to run.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
