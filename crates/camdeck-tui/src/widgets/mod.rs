//! Reusable rendering helpers shared by the screens.

pub mod frame_meter;

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Paragraph, Wrap};

use camdeck_core::ViewError;

use crate::theme;

/// Rounded panel block with a styled title.
pub fn panel(title: &str, focused: bool) -> Block<'static> {
    Block::default()
        .title(format!(" {title} "))
        .title_style(theme::title_style())
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(if focused {
            theme::border_focused()
        } else {
            theme::border_default()
        })
}

/// One dim line of placeholder text inside `area`.
pub fn placeholder(frame: &mut Frame, area: Rect, text: &str) {
    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(format!("  {text}"), theme::dim()))),
        area,
    );
}

/// Error kind and message, wrapped, with a retry hint.
pub fn error_panel(frame: &mut Frame, area: Rect, err: &ViewError, hint: &str) {
    let lines = vec![
        Line::from(""),
        Line::from(vec![
            Span::styled(format!("  ✗ {}", err.kind), theme::error_text()),
        ]),
        Line::from(Span::styled(format!("  {}", err.message), theme::table_row())),
        Line::from(""),
        Line::from(Span::styled(format!("  {hint}"), theme::key_hint())),
    ];
    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), area);
}
