//! UI actions. Every state change in the console flows through one.

use std::sync::Arc;

use camdeck_core::{Intent, LiveFrame, StreamIndicator, ViewModel};

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Quit,
    Tick,
    Render,
    Resize(u16, u16),
    ToggleHelp,

    /// Run an intent against the view controller on a spawned task.
    Dispatch(Intent),
    /// A dispatched intent returned (its outcome is already in the view-model).
    IntentFinished,

    // ── Data bridge ──
    ViewUpdated(ViewModel),
    FrameUpdated(Option<Arc<LiveFrame>>),
    StreamUpdated(StreamIndicator),
}
