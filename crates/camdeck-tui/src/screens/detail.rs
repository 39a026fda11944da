//! Camera detail screen: settings, feature readings, saved profiles,
//! live feed status, and the save-profile input.

use std::sync::Arc;
use std::time::Instant;

use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Cell, List, ListItem, ListState, Paragraph, Row, Table, Wrap};

use camdeck_core::{CameraDetail, Intent, LiveFrame, Panel, StreamIndicator, ViewState};

use crate::action::Action;
use crate::component::Component;
use crate::theme;
use crate::widgets::{self, frame_meter::FrameMeter};

pub struct DetailScreen {
    serial: Option<String>,
    panel: Panel,
    profile_state: ListState,
    /// Profile name being typed, while the input is open.
    input: Option<String>,
    indicator: StreamIndicator,
    frame: Option<Arc<LiveFrame>>,
    meter: FrameMeter,
}

impl DetailScreen {
    pub fn new() -> Self {
        Self {
            serial: None,
            panel: Panel::Loading,
            profile_state: ListState::default(),
            input: None,
            indicator: StreamIndicator::Unavailable,
            frame: None,
            meter: FrameMeter::default(),
        }
    }

    fn detail(&self) -> Option<&CameraDetail> {
        match &self.panel {
            Panel::Detail(detail) => Some(detail.as_ref()),
            _ => None,
        }
    }

    fn profile_count(&self) -> usize {
        self.detail().map_or(0, |d| d.profiles().len())
    }

    fn move_selection(&mut self, delta: isize) {
        let len = self.profile_count();
        if len == 0 {
            self.profile_state.select(None);
            return;
        }
        let current = self.profile_state.selected().unwrap_or(0);
        self.profile_state
            .select(Some(current.saturating_add_signed(delta).min(len - 1)));
    }

    fn set_view(&mut self, serial: &str, panel: Panel) {
        if self.serial.as_deref() != Some(serial) {
            self.serial = Some(serial.to_owned());
            self.input = None;
            self.profile_state = ListState::default();
            self.meter.reset();
        }
        self.panel = panel;
        // Keep the cursor inside the (possibly shorter) profile list
        self.move_selection(0);
    }

    fn leave(&mut self) {
        self.serial = None;
        self.input = None;
        self.meter.reset();
    }

    fn handle_input_key(&mut self, key: KeyEvent) -> Option<Action> {
        let input = self.input.as_mut()?;
        match key.code {
            KeyCode::Char(c) => input.push(c),
            KeyCode::Backspace => {
                input.pop();
            }
            KeyCode::Esc => self.input = None,
            KeyCode::Enter => {
                let name = self.input.take().unwrap_or_default();
                let serial = self.serial.clone()?;
                return Some(Action::Dispatch(Intent::SaveProfile { serial, name }));
            }
            _ => {}
        }
        None
    }

    // ── Rendering ───────────────────────────────────────────────────

    fn render_header(frame: &mut Frame, area: Rect, detail: &CameraDetail) {
        let cam = &detail.camera;
        let (badge, badge_style) = theme::camera_status(cam.status);
        let line = Line::from(vec![
            Span::styled(format!(" {} ", cam.display_name()), theme::title_style()),
            Span::styled(format!(" {}  ", cam.serial_number), theme::table_row()),
            Span::styled(format!("{}  ", cam.model_name), theme::dim()),
            Span::styled(
                format!("{}  ", cam.current_ip.as_deref().unwrap_or("-")),
                theme::dim(),
            ),
            Span::styled(badge, badge_style),
        ]);
        frame.render_widget(Paragraph::new(line), area);
    }

    fn render_settings(frame: &mut Frame, area: Rect, detail: &CameraDetail) {
        let block = widgets::panel("Settings", false);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let (badge, badge_style) = theme::feature_status(detail.features.status);
        let mut status_lines = vec![Line::from(vec![
            Span::styled(" Status ", theme::dim()),
            Span::styled(badge, badge_style),
        ])];
        if let Some(message) = &detail.features.message {
            status_lines.push(Line::from(Span::styled(
                format!(" {message}"),
                theme::table_row(),
            )));
        }
        let status_height = u16::try_from(status_lines.len() + 1).unwrap_or(u16::MAX);

        let layout = Layout::vertical([Constraint::Length(status_height), Constraint::Min(1)])
            .split(inner);
        frame.render_widget(
            Paragraph::new(status_lines).wrap(Wrap { trim: false }),
            layout[0],
        );

        if detail.features.features.is_empty() {
            widgets::placeholder(frame, layout[1], "No feature readings");
            return;
        }

        let header = Row::new(vec![
            Cell::from("Feature").style(theme::table_header()),
            Cell::from("Value").style(theme::table_header()),
        ]);
        let rows: Vec<Row> = detail
            .features
            .features
            .iter()
            .map(|f| {
                Row::new(vec![
                    Cell::from(f.name.clone()),
                    Cell::from(f.display_value()),
                ])
                .style(theme::table_row())
            })
            .collect();
        let table = Table::new(rows, [Constraint::Percentage(50), Constraint::Percentage(50)])
            .header(header);
        frame.render_widget(table, layout[1]);
    }

    fn render_live(&self, frame: &mut Frame, area: Rect, detail: &CameraDetail) {
        let block = widgets::panel("Live feed", matches!(self.indicator, StreamIndicator::Live));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let (label, style) = theme::stream_indicator(&self.indicator);
        let mut lines = vec![Line::from(Span::styled(format!(" {label}"), style))];

        if !detail.live {
            lines.push(Line::from(Span::styled(
                " Camera offline: no live feed",
                theme::dim(),
            )));
        } else if self.frame.is_some() {
            lines.push(Line::from(Span::styled(
                format!(" {}", self.meter.summary(Instant::now())),
                theme::table_row(),
            )));
            if let (StreamIndicator::Lost { .. }, Some(frame)) = (&self.indicator, &self.frame) {
                lines.push(Line::from(Span::styled(
                    format!(
                        " stale frame from {}",
                        frame.received_at.format("%H:%M:%S")
                    ),
                    Style::default().fg(theme::AMBER),
                )));
            }
        } else if matches!(self.indicator, StreamIndicator::Live) {
            lines.push(Line::from(Span::styled(
                " waiting for first frame",
                theme::dim(),
            )));
        }

        frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);
    }

    fn render_profiles(&self, frame: &mut Frame, area: Rect, detail: &CameraDetail) {
        let title = format!("Profiles ({})", detail.profiles().len());
        let block = widgets::panel(&title, self.input.is_none());
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let input_height = u16::from(self.input.is_some());
        let layout =
            Layout::vertical([Constraint::Min(1), Constraint::Length(input_height)]).split(inner);

        if detail.profiles().is_empty() {
            widgets::placeholder(frame, layout[0], "No saved profiles");
        } else {
            let items: Vec<ListItem> = detail
                .profiles()
                .iter()
                .map(|p| {
                    let created = p
                        .created_at
                        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_default();
                    ListItem::new(Line::from(vec![
                        Span::styled(p.name.clone(), theme::table_row()),
                        Span::styled(format!("  {created}"), theme::dim()),
                    ]))
                })
                .collect();
            let list = List::new(items)
                .highlight_style(theme::table_selected())
                .highlight_symbol("▸ ");
            let mut state = self.profile_state;
            frame.render_stateful_widget(list, layout[0], &mut state);
        }

        if let Some(input) = &self.input {
            let line = Line::from(vec![
                Span::styled(" name: ", theme::key_hint_key()),
                Span::styled(input.as_str(), Style::default().fg(theme::LENS_BLUE)),
                Span::styled("▎", Style::default().fg(theme::AMBER)),
            ]);
            frame.render_widget(Paragraph::new(line), layout[1]);
        }
    }

    fn render_hints(&self, frame: &mut Frame, area: Rect) {
        let pairs: &[(&str, &str)] = if self.input.is_some() {
            &[("Enter", " save  "), ("Esc", " cancel")]
        } else if self.detail().is_some_and(|d| d.live) {
            &[
                ("j/k", " move  "),
                ("Enter", " apply  "),
                ("n", " new profile  "),
                ("r", " refresh  "),
                ("Esc", " back"),
            ]
        } else {
            &[("j/k", " move  "), ("r", " refresh  "), ("Esc", " back")]
        };
        let mut spans = vec![Span::raw(" ")];
        for (key, label) in pairs {
            spans.push(Span::styled(*key, theme::key_hint_key()));
            spans.push(Span::styled(*label, theme::key_hint()));
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }
}

impl Component for DetailScreen {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        if self.input.is_some() {
            return Ok(self.handle_input_key(key));
        }

        match key.code {
            KeyCode::Char('j') | KeyCode::Down => self.move_selection(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_selection(-1),
            KeyCode::Enter => {
                // An offline camera cannot take settings
                let Some(detail) = self.detail().filter(|d| d.live) else {
                    return Ok(None);
                };
                let id = self
                    .profile_state
                    .selected()
                    .and_then(|i| detail.profiles().get(i))
                    .map(|p| p.id);
                return Ok(id.map(|id| Action::Dispatch(Intent::ApplyProfile(id))));
            }
            KeyCode::Char('n') => {
                if self.detail().is_some_and(|d| d.live) {
                    self.input = Some(String::new());
                }
            }
            KeyCode::Esc | KeyCode::Char('b') => return Ok(Some(Action::Dispatch(Intent::Back))),
            _ => {}
        }
        Ok(None)
    }

    fn update(&mut self, action: &Action) -> Result<Option<Action>> {
        match action {
            Action::ViewUpdated(vm) => match &vm.state {
                ViewState::Detail { serial } => self.set_view(serial, vm.panel.clone()),
                ViewState::List => self.leave(),
            },
            Action::StreamUpdated(indicator) => self.indicator = indicator.clone(),
            Action::FrameUpdated(frame) => {
                match frame {
                    Some(f) => self.meter.record(f, Instant::now()),
                    None => self.meter.reset(),
                }
                self.frame.clone_from(frame);
            }
            Action::Tick => self.meter.prune(Instant::now()),
            _ => {}
        }
        Ok(None)
    }

    fn render(&self, frame: &mut Frame, area: Rect) {
        let serial = self.serial.as_deref().unwrap_or("");
        let block = widgets::panel(&format!("Camera {serial}"), true);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let layout = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(4),
            Constraint::Length(1),
        ])
        .split(inner);

        match &self.panel {
            Panel::Detail(detail) => {
                Self::render_header(frame, layout[0], detail);

                let cols = Layout::horizontal([Constraint::Percentage(55), Constraint::Percentage(45)])
                    .split(layout[1]);
                Self::render_settings(frame, cols[0], detail);

                let right = Layout::vertical([Constraint::Length(5), Constraint::Min(3)])
                    .split(cols[1]);
                self.render_live(frame, right[0], detail);
                self.render_profiles(frame, right[1], detail);
            }
            Panel::DetailFailed(err) => {
                widgets::error_panel(frame, layout[1], err, "r retry  Esc back");
            }
            _ => {
                widgets::placeholder(frame, layout[1], &format!("Loading camera {serial}…"));
            }
        }

        self.render_hints(frame, layout[2]);
    }

    fn captures_input(&self) -> bool {
        self.input.is_some()
    }

    fn id(&self) -> &str {
        "detail"
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use chrono::Utc;
    use crossterm::event::KeyModifiers;
    use pretty_assertions::assert_eq;

    use camdeck_core::{
        CameraStatus, ErrorKind, Feature, FeatureSet, FeatureStatus, ProfileId, ViewError,
        ViewModel,
    };

    use super::*;
    use crate::screens::test_support::{camera, render_to_string, with_profile};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(screen: &mut DetailScreen, text: &str) {
        for c in text.chars() {
            screen.handle_key_event(key(KeyCode::Char(c))).unwrap();
        }
    }

    fn detail_view(live: bool) -> Action {
        let cam = with_profile(
            with_profile(camera("C1", CameraStatus::Online), 10, "Day"),
            11,
            "Night",
        );
        let status = if live {
            FeatureStatus::Online
        } else {
            FeatureStatus::Offline
        };
        Action::ViewUpdated(ViewModel {
            state: ViewState::Detail {
                serial: "C1".into(),
            },
            panel: Panel::Detail(Arc::new(CameraDetail {
                camera: cam,
                features: FeatureSet {
                    status,
                    message: (!live).then(|| "Showing saved profile 'Day'".into()),
                    features: vec![Feature {
                        name: "ExposureTime".into(),
                        value: serde_json::json!(5000),
                    }],
                },
                live,
            })),
            notice: None,
        })
    }

    fn screen_with(live: bool) -> DetailScreen {
        let mut screen = DetailScreen::new();
        screen.update(&detail_view(live)).unwrap();
        screen
    }

    fn frame(seq: u64) -> Arc<LiveFrame> {
        Arc::new(LiveFrame {
            serial: "C1".into(),
            seq,
            image: "AAAA".into(),
            received_at: Utc::now(),
        })
    }

    #[test]
    fn enter_applies_selected_profile() {
        let mut screen = screen_with(true);
        screen.handle_key_event(key(KeyCode::Char('j'))).unwrap();

        assert_eq!(
            screen.handle_key_event(key(KeyCode::Enter)).unwrap(),
            Some(Action::Dispatch(Intent::ApplyProfile(ProfileId(11))))
        );
    }

    #[test]
    fn offline_camera_does_not_apply_profiles() {
        let mut screen = screen_with(false);
        screen.handle_key_event(key(KeyCode::Char('j'))).unwrap();

        assert_eq!(screen.handle_key_event(key(KeyCode::Enter)).unwrap(), None);
        let out = render_to_string(&screen, 120, 24);
        assert!(!out.contains("apply"), "{out}");
    }

    #[test]
    fn new_profile_input_dispatches_save() {
        let mut screen = screen_with(true);
        screen.handle_key_event(key(KeyCode::Char('n'))).unwrap();
        assert!(screen.captures_input());

        type_text(&mut screen, "Dusk");
        screen.handle_key_event(key(KeyCode::Backspace)).unwrap();
        type_text(&mut screen, "k");

        let action = screen.handle_key_event(key(KeyCode::Enter)).unwrap();
        assert_eq!(
            action,
            Some(Action::Dispatch(Intent::SaveProfile {
                serial: "C1".into(),
                name: "Dusk".into(),
            }))
        );
        assert!(!screen.captures_input());
    }

    #[test]
    fn input_keys_do_not_navigate() {
        let mut screen = screen_with(true);
        screen.handle_key_event(key(KeyCode::Char('n'))).unwrap();

        // 'b' is text while typing, Esc only closes the input
        assert_eq!(screen.handle_key_event(key(KeyCode::Char('b'))).unwrap(), None);
        assert_eq!(screen.handle_key_event(key(KeyCode::Esc)).unwrap(), None);
        assert!(!screen.captures_input());

        assert_eq!(
            screen.handle_key_event(key(KeyCode::Esc)).unwrap(),
            Some(Action::Dispatch(Intent::Back))
        );
    }

    #[test]
    fn offline_camera_has_no_save_input() {
        let mut screen = screen_with(false);
        screen.handle_key_event(key(KeyCode::Char('n'))).unwrap();
        assert!(!screen.captures_input());
    }

    #[test]
    fn switching_camera_resets_input_and_meter() {
        let mut screen = screen_with(true);
        screen.update(&Action::FrameUpdated(Some(frame(3)))).unwrap();
        screen.handle_key_event(key(KeyCode::Char('n'))).unwrap();

        screen
            .update(&Action::ViewUpdated(ViewModel {
                state: ViewState::Detail {
                    serial: "C2".into(),
                },
                panel: Panel::Loading,
                notice: None,
            }))
            .unwrap();

        assert!(!screen.captures_input());
        assert_eq!(screen.meter.seq(), None);
    }

    #[test]
    fn renders_live_feed_meter() {
        let mut screen = screen_with(true);
        screen
            .update(&Action::StreamUpdated(StreamIndicator::Live))
            .unwrap();
        screen.update(&Action::FrameUpdated(Some(frame(3)))).unwrap();

        let out = render_to_string(&screen, 120, 20);
        assert!(out.contains("● live"), "{out}");
        assert!(out.contains("#3"), "{out}");
        assert!(out.contains("ExposureTime"));
        assert!(out.contains("Night"));
    }

    #[test]
    fn lost_feed_marks_frame_stale() {
        let mut screen = screen_with(true);
        screen.update(&Action::FrameUpdated(Some(frame(3)))).unwrap();
        screen
            .update(&Action::StreamUpdated(StreamIndicator::Lost {
                reason: "reset".into(),
            }))
            .unwrap();

        let out = render_to_string(&screen, 120, 20);
        assert!(out.contains("lost (reset)"), "{out}");
        assert!(out.contains("stale frame"), "{out}");
    }

    #[test]
    fn offline_detail_shows_backend_message() {
        let screen = screen_with(false);
        let out = render_to_string(&screen, 120, 20);
        assert!(out.contains("offline"), "{out}");
        assert!(out.contains("Showing saved profile"), "{out}");
        assert!(out.contains("no live feed"), "{out}");
    }

    #[test]
    fn failed_detail_renders_error() {
        let mut screen = DetailScreen::new();
        screen
            .update(&Action::ViewUpdated(ViewModel {
                state: ViewState::Detail {
                    serial: "C9".into(),
                },
                panel: Panel::DetailFailed(ViewError {
                    kind: ErrorKind::NotFound,
                    message: "camera C9".into(),
                }),
                notice: None,
            }))
            .unwrap();

        let out = render_to_string(&screen, 80, 12);
        assert!(out.contains("not found"), "{out}");
        assert!(out.contains("camera C9"));
    }
}
