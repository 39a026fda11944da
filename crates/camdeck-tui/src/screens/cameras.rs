//! Camera list screen: discovered cameras with status, scan trigger.

use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Cell, Paragraph, Row, Table, TableState};

use camdeck_core::{Camera, Intent, Panel, ViewState};

use crate::action::Action;
use crate::component::Component;
use crate::theme;
use crate::widgets;

pub struct CamerasScreen {
    panel: Panel,
    table_state: TableState,
}

impl CamerasScreen {
    pub fn new() -> Self {
        Self {
            panel: Panel::Loading,
            table_state: TableState::default(),
        }
    }

    fn cameras(&self) -> &[Camera] {
        match &self.panel {
            Panel::Cameras(cameras) => cameras.as_slice(),
            _ => &[],
        }
    }

    fn selected_index(&self) -> usize {
        self.table_state.selected().unwrap_or(0)
    }

    fn selected_camera(&self) -> Option<&Camera> {
        self.cameras().get(self.selected_index())
    }

    fn select(&mut self, idx: usize) {
        let len = self.cameras().len();
        if len == 0 {
            self.table_state.select(None);
        } else {
            self.table_state.select(Some(idx.min(len - 1)));
        }
    }

    fn move_selection(&mut self, delta: isize) {
        let next = self.selected_index().saturating_add_signed(delta);
        self.select(next);
    }

    /// Replace the list, keeping the same camera selected when it is
    /// still present.
    fn set_panel(&mut self, panel: Panel) {
        let previous = self.selected_camera().map(|c| c.serial_number.clone());
        self.panel = panel;
        let idx = previous
            .and_then(|serial| {
                self.cameras()
                    .iter()
                    .position(|c| c.serial_number == serial)
            })
            .unwrap_or_else(|| self.selected_index());
        self.select(idx);
    }

    fn render_table(&self, frame: &mut Frame, area: Rect, cameras: &[Camera]) {
        let header = Row::new(vec![
            Cell::from("Name").style(theme::table_header()),
            Cell::from("Serial").style(theme::table_header()),
            Cell::from("Model").style(theme::table_header()),
            Cell::from("IP").style(theme::table_header()),
            Cell::from("Status").style(theme::table_header()),
            Cell::from("Profiles").style(theme::table_header()),
        ]);

        let rows: Vec<Row> = cameras
            .iter()
            .map(|cam| {
                let (badge, badge_style) = theme::camera_status(cam.status);
                Row::new(vec![
                    Cell::from(cam.display_name().to_owned()),
                    Cell::from(cam.serial_number.clone()),
                    Cell::from(cam.model_name.clone()),
                    Cell::from(cam.current_ip.clone().unwrap_or_else(|| "-".into())),
                    Cell::from(badge).style(badge_style),
                    Cell::from(cam.profiles.len().to_string()),
                ])
                .style(theme::table_row())
            })
            .collect();

        let widths = [
            Constraint::Min(16),
            Constraint::Length(14),
            Constraint::Length(16),
            Constraint::Length(16),
            Constraint::Length(10),
            Constraint::Length(8),
        ];

        let table = Table::new(rows, widths)
            .header(header)
            .row_highlight_style(theme::table_selected())
            .highlight_symbol("▸ ");

        let mut state = self.table_state;
        frame.render_stateful_widget(table, area, &mut state);
    }
}

impl Component for CamerasScreen {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => self.move_selection(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_selection(-1),
            KeyCode::Char('g') | KeyCode::Home => self.select(0),
            KeyCode::Char('G') | KeyCode::End => self.select(usize::MAX),
            KeyCode::Enter => {
                return Ok(self
                    .selected_camera()
                    .map(|cam| Action::Dispatch(Intent::ShowDetail(cam.serial_number.clone()))));
            }
            KeyCode::Char('s') => return Ok(Some(Action::Dispatch(Intent::Scan))),
            _ => {}
        }
        Ok(None)
    }

    fn update(&mut self, action: &Action) -> Result<Option<Action>> {
        if let Action::ViewUpdated(vm) = action {
            if vm.state == ViewState::List {
                self.set_panel(vm.panel.clone());
            }
        }
        Ok(None)
    }

    fn render(&self, frame: &mut Frame, area: Rect) {
        let title = match &self.panel {
            Panel::Cameras(cameras) => format!("Cameras ({})", cameras.len()),
            _ => "Cameras".to_owned(),
        };
        let block = widgets::panel(&title, true);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let layout = Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).split(inner);

        match &self.panel {
            Panel::Cameras(cameras) => self.render_table(frame, layout[0], cameras),
            Panel::NoCameras => {
                widgets::placeholder(frame, layout[0], "No cameras found. Press s to scan.");
            }
            Panel::ListFailed(err) => {
                widgets::error_panel(frame, layout[0], err, "r retry  s scan");
            }
            Panel::Loading | Panel::Detail(_) | Panel::DetailFailed(_) => {
                widgets::placeholder(frame, layout[0], "Loading cameras…");
            }
        }

        let hints = Line::from(vec![
            Span::styled(" j/k", theme::key_hint_key()),
            Span::styled(" move  ", theme::key_hint()),
            Span::styled("Enter", theme::key_hint_key()),
            Span::styled(" open  ", theme::key_hint()),
            Span::styled("s", theme::key_hint_key()),
            Span::styled(" scan  ", theme::key_hint()),
            Span::styled("r", theme::key_hint_key()),
            Span::styled(" refresh", theme::key_hint()),
        ]);
        frame.render_widget(Paragraph::new(hints), layout[1]);
    }

    fn id(&self) -> &str {
        "cameras"
    }
}
