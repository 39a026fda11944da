//! Darkroom palette and semantic styling for the console.

use ratatui::style::{Color, Modifier, Style};

use camdeck_core::{CameraStatus, FeatureStatus, NoticeLevel, StreamIndicator};

// ── Palette ───────────────────────────────────────────────────────────

pub const AMBER: Color = Color::Rgb(255, 176, 59); // #ffb03b
pub const SAFELIGHT_RED: Color = Color::Rgb(232, 72, 85); // #e84855
pub const FILM_GREEN: Color = Color::Rgb(110, 214, 135); // #6ed687
pub const LENS_BLUE: Color = Color::Rgb(102, 178, 255); // #66b2ff
pub const FOG: Color = Color::Rgb(198, 200, 209); // #c6c8d1
pub const SLATE: Color = Color::Rgb(107, 112, 137); // #6b7089
pub const BG_RAISED: Color = Color::Rgb(38, 40, 51); // #262833
pub const BG_DARK: Color = Color::Rgb(24, 25, 33); // #181921

// ── Semantic styles ───────────────────────────────────────────────────

pub fn title_style() -> Style {
    Style::default().fg(AMBER).add_modifier(Modifier::BOLD)
}

pub fn border_focused() -> Style {
    Style::default().fg(AMBER)
}

pub fn border_default() -> Style {
    Style::default().fg(SLATE)
}

pub fn table_header() -> Style {
    Style::default()
        .fg(LENS_BLUE)
        .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
}

pub fn table_row() -> Style {
    Style::default().fg(FOG)
}

pub fn table_selected() -> Style {
    Style::default()
        .fg(AMBER)
        .bg(BG_RAISED)
        .add_modifier(Modifier::BOLD)
}

pub fn dim() -> Style {
    Style::default().fg(SLATE)
}

pub fn error_text() -> Style {
    Style::default().fg(SAFELIGHT_RED)
}

pub fn key_hint() -> Style {
    Style::default().fg(SLATE)
}

pub fn key_hint_key() -> Style {
    Style::default().fg(LENS_BLUE).add_modifier(Modifier::BOLD)
}

// ── Badges ────────────────────────────────────────────────────────────

/// Badge text and style for a camera's discovery status.
pub fn camera_status(status: CameraStatus) -> (&'static str, Style) {
    match status {
        CameraStatus::Online => ("● Online", Style::default().fg(FILM_GREEN)),
        CameraStatus::Offline => ("○ Offline", Style::default().fg(SLATE)),
    }
}

/// Badge text and style for a feature set's live status.
pub fn feature_status(status: FeatureStatus) -> (&'static str, Style) {
    match status {
        FeatureStatus::Online => ("● online", Style::default().fg(FILM_GREEN)),
        FeatureStatus::Offline => ("○ offline", Style::default().fg(AMBER)),
    }
}

pub fn notice(level: NoticeLevel) -> (&'static str, Color) {
    match level {
        NoticeLevel::Info => ("·", LENS_BLUE),
        NoticeLevel::Success => ("✓", FILM_GREEN),
        NoticeLevel::Error => ("✗", SAFELIGHT_RED),
    }
}

pub fn stream_indicator(indicator: &StreamIndicator) -> (String, Style) {
    match indicator {
        StreamIndicator::Unavailable => ("no live feed".into(), dim()),
        StreamIndicator::Connecting => ("◐ connecting".into(), Style::default().fg(AMBER)),
        StreamIndicator::Live => (
            "● live".into(),
            Style::default().fg(FILM_GREEN).add_modifier(Modifier::BOLD),
        ),
        StreamIndicator::Lost { reason } => {
            (format!("✗ lost ({reason})"), Style::default().fg(SAFELIGHT_RED))
        }
        StreamIndicator::Closed => ("○ closed".into(), dim()),
    }
}
