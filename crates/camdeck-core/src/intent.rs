// ── User intents ──
//
// What the presentation layer asks for. Dispatched through
// `ViewController::dispatch`; keeps the state machine drivable without a
// rendering surface.

use camdeck_api::ProfileId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    ShowList,
    ShowDetail(String),
    /// Leave the detail view. Same as [`Intent::ShowList`].
    Back,
    Scan,
    ApplyProfile(ProfileId),
    SaveProfile { serial: String, name: String },
    /// Re-enter the current view.
    Refresh,
}

impl Intent {
    /// Intents that replace the current view.
    pub fn is_navigation(&self) -> bool {
        matches!(
            self,
            Self::ShowList | Self::ShowDetail(_) | Self::Back | Self::Refresh
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::ShowList => "show_list",
            Self::ShowDetail(_) => "show_detail",
            Self::Back => "back",
            Self::Scan => "scan",
            Self::ApplyProfile(_) => "apply_profile",
            Self::SaveProfile { .. } => "save_profile",
            Self::Refresh => "refresh",
        }
    }
}
