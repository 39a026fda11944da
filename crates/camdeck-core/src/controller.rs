// ── View controller ──
//
// The navigation state machine (list ⇄ detail) and the owner of the
// single live stream session. Every navigation bumps a generation
// counter under the navigation lock; fetch results are applied only if
// their generation is still current, so a slow response never paints
// over a newer view. The session is closed under the same lock before a
// new view is published, which keeps "one session, bound to the visible
// camera" true at every instant.

use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, warn};

use camdeck_api::{GatewayClient, ProfileId, StreamClient};

use crate::config::ConsoleConfig;
use crate::error::CoreError;
use crate::gateway::Gateway;
use crate::intent::Intent;
use crate::session::{LiveFrame, SessionState, StreamConnector, StreamSession};
use crate::view::{CameraDetail, Notice, Panel, StreamIndicator, ViewError, ViewModel, ViewState};

/// Production controller wired to the real console.
pub type Console = ViewController<GatewayClient, StreamClient>;

// ── ViewController ───────────────────────────────────────────────

/// Coordinates views, gateway fetches, and the live session.
///
/// Cheaply cloneable via `Arc<ControllerInner>`; intents may be run on
/// spawned tasks concurrently.
pub struct ViewController<G, C> {
    inner: Arc<ControllerInner<G, C>>,
}

impl<G, C> Clone for ViewController<G, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct ControllerInner<G, C> {
    gateway: G,
    session: StreamSession<C>,
    nav: Mutex<Navigation>,
    view: watch::Sender<ViewModel>,
}

#[derive(Default)]
struct Navigation {
    generation: u64,
    state: ViewState,
}

impl<G: Gateway, C: StreamConnector> ViewController<G, C> {
    /// Create a controller in the list view. Nothing is fetched until
    /// the first intent.
    pub fn new(gateway: G, connector: C) -> Self {
        let (view, _) = watch::channel(ViewModel::default());
        Self {
            inner: Arc::new(ControllerInner {
                gateway,
                session: StreamSession::new(connector),
                nav: Mutex::new(Navigation::default()),
                view,
            }),
        }
    }

    pub fn gateway(&self) -> &G {
        &self.inner.gateway
    }

    pub fn session(&self) -> &StreamSession<C> {
        &self.inner.session
    }

    // ── Intents ──────────────────────────────────────────────────

    /// Run one intent to completion.
    pub async fn dispatch(&self, intent: Intent) -> Result<(), CoreError> {
        debug!(intent = intent.label(), "dispatching intent");
        match intent {
            Intent::ShowList | Intent::Back => self.show_list().await,
            Intent::ShowDetail(serial) => self.show_detail(&serial).await,
            Intent::Scan => self.request_scan().await,
            Intent::ApplyProfile(id) => self.apply_profile(id).await,
            Intent::SaveProfile { serial, name } => self.save_profile(&serial, &name).await,
            Intent::Refresh => self.refresh().await,
        }
    }

    /// Switch to the camera list and fetch it.
    ///
    /// Any live session is closed first. A failed fetch publishes
    /// [`Panel::ListFailed`] and is also returned.
    pub async fn show_list(&self) -> Result<(), CoreError> {
        self.enter_list(None).await
    }

    /// Switch to one camera's detail view.
    ///
    /// Closes any live session, then fetches the camera and its feature
    /// set concurrently. The detail is published only if both succeed;
    /// otherwise a single [`Panel::DetailFailed`] replaces it. When the
    /// feature set reports the camera online, a live session is opened
    /// for `serial`.
    pub async fn show_detail(&self, serial: &str) -> Result<(), CoreError> {
        self.enter_detail(serial.to_owned(), None).await
    }

    /// Trigger discovery, then re-list regardless of the scan outcome.
    ///
    /// A scan failure is reported in the notice; the returned result is
    /// that of the list fetch.
    pub async fn request_scan(&self) -> Result<(), CoreError> {
        let notice = match self.inner.gateway.scan().await {
            Ok(()) => {
                info!("camera scan complete");
                Notice::info("Scan complete")
            }
            Err(e) => {
                warn!(error = %e, "camera scan failed");
                Notice::error(&e)
            }
        };
        self.enter_list(Some(notice)).await
    }

    /// Apply a saved profile.
    ///
    /// On success the current view is re-entered so new settings show.
    /// On failure only the notice changes: no navigation, no re-fetch.
    pub async fn apply_profile(&self, id: ProfileId) -> Result<(), CoreError> {
        let label = self.profile_label(id);
        match self.inner.gateway.apply_profile(id).await {
            Ok(()) => {
                info!(profile = %id, "profile applied");
                self.reenter(Some(Notice::success(format!("Applied {label}"))))
                    .await
            }
            Err(e) => {
                warn!(profile = %id, error = %e, "apply profile failed");
                self.post_notice(Notice::error(&e));
                Err(e)
            }
        }
    }

    /// Save the camera's current settings under `name`, then re-enter
    /// its detail view.
    ///
    /// A blank name fails with [`CoreError::Validation`] before any
    /// request is issued.
    pub async fn save_profile(&self, serial: &str, name: &str) -> Result<(), CoreError> {
        let name = name.trim();
        if name.is_empty() {
            let err = CoreError::validation("profile name must not be empty");
            self.post_notice(Notice::error(&err));
            return Err(err);
        }

        match self.inner.gateway.save_profile(serial, name).await {
            Ok(profile) => {
                info!(serial, profile = %profile.id, "profile saved");
                let notice = Notice::success(format!("Saved profile '{}'", profile.name));
                self.enter_detail(serial.to_owned(), Some(notice)).await
            }
            Err(e) => {
                warn!(serial, error = %e, "save profile failed");
                self.post_notice(Notice::error(&e));
                Err(e)
            }
        }
    }

    /// Re-enter whatever view is current.
    pub async fn refresh(&self) -> Result<(), CoreError> {
        self.reenter(None).await
    }

    /// Close the live session. The view-model is left as is.
    pub async fn shutdown(&self) {
        self.inner.session.close().await;
        debug!("view controller shut down");
    }

    // ── Observation ──────────────────────────────────────────────

    /// Current view-model.
    pub fn view_model(&self) -> ViewModel {
        self.inner.view.borrow().clone()
    }

    pub fn view_state(&self) -> ViewState {
        self.inner.view.borrow().state.clone()
    }

    /// Subscribe to view-model changes.
    pub fn subscribe(&self) -> watch::Receiver<ViewModel> {
        self.inner.view.subscribe()
    }

    /// View-model changes as a `Stream`. The current view-model is
    /// yielded first.
    pub fn view_stream(&self) -> WatchStream<ViewModel> {
        WatchStream::new(self.subscribe())
    }

    /// Subscribe to the latest-frame slot.
    pub fn frames(&self) -> watch::Receiver<Option<Arc<LiveFrame>>> {
        self.inner.session.watch_frames()
    }

    /// The frame to draw right now, if any.
    ///
    /// Only a frame from the session bound to the visible camera
    /// qualifies. After an unexpected loss the last frame stays
    /// renderable (stale, under [`StreamIndicator::Lost`]); a clean close
    /// clears it.
    pub fn renderable_frame(&self) -> Option<Arc<LiveFrame>> {
        let state = self.view_state();
        let serial = state.selected_serial()?;
        let snapshot = self.inner.session.snapshot();
        let frame = self.inner.session.latest_frame()?;

        let bound = snapshot.serial.as_deref() == Some(serial) && frame.serial == serial;
        let drawable = matches!(snapshot.state, SessionState::Open | SessionState::Closed);
        (bound && drawable).then_some(frame)
    }

    /// Connection status for the live-feed panel.
    pub fn stream_indicator(&self) -> StreamIndicator {
        let vm = self.view_model();
        if vm.detail().is_some_and(|d| !d.live) {
            return StreamIndicator::Unavailable;
        }
        StreamIndicator::derive(&vm.state, &self.inner.session.snapshot())
    }

    // ── Transitions ──────────────────────────────────────────────

    async fn enter_list(&self, notice: Option<Notice>) -> Result<(), CoreError> {
        let generation = {
            let mut nav = self.inner.nav.lock().await;
            nav.generation += 1;
            nav.state = ViewState::List;
            self.inner.session.close().await;
            self.publish(ViewState::List, Panel::Loading, notice.clone());
            nav.generation
        };
        debug!(generation, "entering list view");

        let result = self.inner.gateway.list_cameras().await;

        let nav = self.inner.nav.lock().await;
        if nav.generation != generation {
            debug!(generation, "discarding stale camera list");
            return Ok(());
        }
        match result {
            Ok(cameras) if cameras.is_empty() => {
                self.publish(ViewState::List, Panel::NoCameras, notice);
                Ok(())
            }
            Ok(cameras) => {
                debug!(count = cameras.len(), "camera list loaded");
                self.publish(ViewState::List, Panel::Cameras(Arc::new(cameras)), notice);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "camera list fetch failed");
                self.publish(ViewState::List, Panel::ListFailed(ViewError::from(&e)), notice);
                Err(e)
            }
        }
    }

    async fn enter_detail(&self, serial: String, notice: Option<Notice>) -> Result<(), CoreError> {
        let state = ViewState::Detail {
            serial: serial.clone(),
        };
        let generation = {
            let mut nav = self.inner.nav.lock().await;
            nav.generation += 1;
            nav.state = state.clone();
            self.inner.session.close().await;
            self.publish(state.clone(), Panel::Loading, notice.clone());
            nav.generation
        };
        info!(serial, generation, "entering detail view");

        let gateway = &self.inner.gateway;
        let (camera, features) = tokio::join!(gateway.camera_detail(&serial), gateway.features(&serial));

        let ticket = {
            let nav = self.inner.nav.lock().await;
            if nav.generation != generation {
                debug!(serial, generation, "discarding stale detail fetch");
                return Ok(());
            }

            let (camera, features) = match (camera, features) {
                (Ok(camera), Ok(features)) => (camera, features),
                (Err(e), _) | (_, Err(e)) => {
                    warn!(serial, error = %e, "detail fetch failed");
                    self.publish(state, Panel::DetailFailed(ViewError::from(&e)), notice);
                    return Err(e);
                }
            };

            let live = features.is_online();
            let detail = CameraDetail {
                camera,
                features,
                live,
            };
            self.publish(state, Panel::Detail(Arc::new(detail)), notice);

            if live {
                Some(self.inner.session.begin_open(&serial).await?)
            } else {
                debug!(serial, "camera offline; no live session");
                None
            }
        };

        // The handshake runs outside the navigation lock. A navigation
        // that lands meanwhile closes the slot and the result is dropped.
        if let Some(ticket) = ticket {
            if let Err(e) = self.inner.session.complete_open(ticket).await {
                warn!(serial, error = %e, "live session did not open");
            }
        }
        Ok(())
    }

    async fn reenter(&self, notice: Option<Notice>) -> Result<(), CoreError> {
        let state = self.inner.nav.lock().await.state.clone();
        match state {
            ViewState::List => self.enter_list(notice).await,
            ViewState::Detail { serial } => self.enter_detail(serial, notice).await,
        }
    }

    // ── Publishing ───────────────────────────────────────────────

    fn publish(&self, state: ViewState, panel: Panel, notice: Option<Notice>) {
        self.inner.view.send_replace(ViewModel {
            state,
            panel,
            notice,
        });
    }

    /// Replace only the notice; view state and panel stay intact.
    fn post_notice(&self, notice: Notice) {
        self.inner.view.send_modify(|vm| vm.notice = Some(notice));
    }

    /// "profile 'Day'" when the visible detail knows the id, else "profile 42".
    fn profile_label(&self, id: ProfileId) -> String {
        self.inner
            .view
            .borrow()
            .detail()
            .and_then(|d| d.profiles().iter().find(|p| p.id == id))
            .map_or_else(|| format!("profile {id}"), |p| format!("profile '{}'", p.name))
    }
}

impl ViewController<GatewayClient, StreamClient> {
    /// Build a controller talking to a real console.
    ///
    /// Without a configured anti-forgery token (and with bootstrap
    /// enabled) the token is fetched from the console's hosting page; a
    /// failure there is logged and read-only use still works.
    pub async fn connect(config: &ConsoleConfig) -> Result<Self, CoreError> {
        let gateway = GatewayClient::new(config.url.clone(), &config.transport())?;

        match &config.csrf_token {
            Some(token) => gateway.set_csrf_token(Some(token.clone())),
            None if config.bootstrap_csrf => {
                if let Err(e) = gateway.bootstrap_csrf().await {
                    warn!(error = %e, "no anti-forgery token; mutating actions will fail");
                }
            }
            None => debug!("anti-forgery bootstrap disabled"),
        }

        let mut streams = match &config.stream_url {
            Some(url) => StreamClient::new(url.clone())?,
            None => StreamClient::from_console_url(&config.url)?,
        };
        // Session-protected consoles authenticate the upgrade by cookie.
        if let Some(cookie) = gateway.cookie_header() {
            streams = streams.with_cookie(cookie);
        }

        info!(url = %config.url, "console client ready");
        Ok(Self::new(gateway, streams))
    }
}
