//! Data bridge: connects the view controller's watch channels to TUI
//! actions.
//!
//! Runs as a background task. Every view-model change, frame, and session
//! transition is forwarded as an [`Action`] through the TUI's action
//! channel. Renderability is always decided by the controller; the bridge
//! only asks.

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use camdeck_core::{CloseKind, Console, SessionStatus};

use crate::action::Action;

fn push_stream_state(console: &Console, action_tx: &mpsc::UnboundedSender<Action>) {
    let _ = action_tx.send(Action::StreamUpdated(console.stream_indicator()));
    let _ = action_tx.send(Action::FrameUpdated(console.renderable_frame()));
}

/// Forward controller changes to the TUI until cancelled, then close the
/// live session.
pub async fn spawn_data_bridge(
    console: Console,
    action_tx: mpsc::UnboundedSender<Action>,
    cancel: CancellationToken,
) {
    // The view stream yields the current view-model first, so the
    // first render has something to draw.
    let mut views = console.view_stream();
    let mut frames = console.frames();
    let mut snapshots = console.session().watch_snapshot();
    let mut statuses = console.session().subscribe_status();

    frames.borrow_and_update();
    snapshots.borrow_and_update();

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => break,

            Some(vm) = views.next() => {
                debug!(view = %vm.state, "dispatching ViewUpdated");
                let _ = action_tx.send(Action::ViewUpdated(vm));
                push_stream_state(&console, &action_tx);
            }
            Ok(()) = snapshots.changed() => {
                let state = snapshots.borrow_and_update().state;
                debug!(%state, "session snapshot changed");
                push_stream_state(&console, &action_tx);
            }
            Ok(()) = frames.changed() => {
                frames.borrow_and_update();
                let _ = action_tx.send(Action::FrameUpdated(console.renderable_frame()));
            }
            Ok(status) = statuses.recv() => match status {
                SessionStatus::Closed { serial, kind: CloseKind::Unexpected { reason } } => {
                    warn!(serial, reason, "live feed lost");
                }
                other => debug!(status = ?other, "session status"),
            },
        }
    }

    console.shutdown().await;
    debug!("data bridge shut down");
}
