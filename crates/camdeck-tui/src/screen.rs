//! Screen identifiers.

use std::fmt;

use camdeck_core::ViewState;

/// The two console screens. Which one is visible follows the
/// controller's [`ViewState`], never a local decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScreenId {
    #[default]
    Cameras,
    Detail,
}

impl ScreenId {
    pub fn label(self) -> &'static str {
        match self {
            Self::Cameras => "Cameras",
            Self::Detail => "Camera",
        }
    }
}

impl From<&ViewState> for ScreenId {
    fn from(state: &ViewState) -> Self {
        match state {
            ViewState::List => Self::Cameras,
            ViewState::Detail { .. } => Self::Detail,
        }
    }
}

impl fmt::Display for ScreenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
