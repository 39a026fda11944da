//! Application core: event loop, screen selection, intent dispatch.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Paragraph},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use camdeck_core::{Console, Intent, Notice, ViewState};

use crate::action::Action;
use crate::component::Component;
use crate::event::{Cadence, Event, EventReader};
use crate::screen::ScreenId;
use crate::screens::create_screens;
use crate::theme;
use crate::tui::Tui;
use crate::widgets::frame_meter::RATE_WINDOW;

/// How long a notice stays on screen.
const NOTICE_TTL: Duration = Duration::from_secs(5);

const RENDER_FPS: u32 = 30;

pub struct App {
    /// Follows the controller's view state.
    active_screen: ScreenId,
    screens: HashMap<ScreenId, Box<dyn Component>>,
    running: bool,
    help_visible: bool,
    view_state: ViewState,
    /// Notice on screen and when it appeared.
    notice: Option<(Notice, Instant)>,
    /// Last notice received, shown or expired. A repeat is not re-shown.
    last_notice: Option<Notice>,
    /// Intents dispatched and not yet returned.
    in_flight: usize,
    action_tx: mpsc::UnboundedSender<Action>,
    action_rx: mpsc::UnboundedReceiver<Action>,
    console: Console,
    data_cancel: CancellationToken,
}

impl App {
    pub fn new(console: Console) -> Self {
        let (action_tx, action_rx) = mpsc::unbounded_channel();
        Self {
            active_screen: ScreenId::default(),
            screens: create_screens().into_iter().collect(),
            running: true,
            help_visible: false,
            view_state: ViewState::List,
            notice: None,
            last_notice: None,
            in_flight: 0,
            action_tx,
            action_rx,
            console,
            data_cancel: CancellationToken::new(),
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut tui = Tui::new()?;
        tui.enter()?;

        {
            let console = self.console.clone();
            let cancel = self.data_cancel.clone();
            let tx = self.action_tx.clone();
            tokio::spawn(async move {
                crate::data_bridge::spawn_data_bridge(console, tx, cancel).await;
            });
        }

        self.action_tx.send(Action::Dispatch(Intent::ShowList))?;

        let mut events = EventReader::new(Cadence::new(NOTICE_TTL.min(RATE_WINDOW), RENDER_FPS));

        info!("TUI event loop started");

        while self.running {
            let Some(event) = events.next().await else {
                break;
            };

            match event {
                Event::Key(key) => {
                    if let Some(action) = self.handle_key_event(key)? {
                        self.action_tx.send(action)?;
                    }
                }
                Event::Resize(w, h) => self.action_tx.send(Action::Resize(w, h))?,
                Event::Tick => self.action_tx.send(Action::Tick)?,
                Event::Render => self.action_tx.send(Action::Render)?,
            }

            while let Ok(action) = self.action_rx.try_recv() {
                self.process_action(&action)?;

                if let Action::Render = action {
                    tui.draw(|frame| self.render(frame))?;
                }
            }
        }

        self.data_cancel.cancel();
        events.stop();
        self.console.shutdown().await;
        info!("TUI event loop ended");
        Ok(())
    }

    fn active(&mut self) -> Option<&mut Box<dyn Component>> {
        self.screens.get_mut(&self.active_screen)
    }

    /// Global keys first, then the active screen. A screen taking text
    /// input sees every key except Ctrl+C.
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        if key.modifiers == KeyModifiers::CONTROL && key.code == KeyCode::Char('c') {
            return Ok(Some(Action::Quit));
        }

        if self.active().is_some_and(|s| s.captures_input()) {
            return match self.active() {
                Some(screen) => screen.handle_key_event(key),
                None => Ok(None),
            };
        }

        if self.help_visible {
            return match key.code {
                KeyCode::Esc | KeyCode::Char('?') => Ok(Some(Action::ToggleHelp)),
                _ => Ok(None),
            };
        }

        match key.code {
            KeyCode::Char('q') => return Ok(Some(Action::Quit)),
            KeyCode::Char('?') => return Ok(Some(Action::ToggleHelp)),
            KeyCode::Char('r') => return Ok(Some(Action::Dispatch(Intent::Refresh))),
            _ => {}
        }

        match self.active() {
            Some(screen) => screen.handle_key_event(key),
            None => Ok(None),
        }
    }

    fn process_action(&mut self, action: &Action) -> Result<()> {
        match action {
            Action::Quit => self.running = false,

            Action::Resize(w, h) => debug!(width = w, height = h, "terminal resized"),

            Action::ToggleHelp => self.help_visible = !self.help_visible,

            Action::Dispatch(intent) => self.dispatch(intent.clone()),

            Action::IntentFinished => self.in_flight = self.in_flight.saturating_sub(1),

            Action::Render => {}

            Action::Tick => {
                if self
                    .notice
                    .as_ref()
                    .is_some_and(|(_, shown)| shown.elapsed() > NOTICE_TTL)
                {
                    self.notice = None;
                }
                if let Some(screen) = self.active() {
                    screen.update(action)?;
                }
            }

            Action::ViewUpdated(vm) => {
                let target = ScreenId::from(&vm.state);
                if target != self.active_screen {
                    debug!("switching screen: {} → {}", self.active_screen, target);
                    self.active_screen = target;
                }
                self.view_state = vm.state.clone();

                if vm.notice != self.last_notice {
                    self.last_notice.clone_from(&vm.notice);
                    self.notice = vm.notice.clone().map(|n| (n, Instant::now()));
                }
                self.broadcast(action)?;
            }

            Action::StreamUpdated(_) | Action::FrameUpdated(_) => self.broadcast(action)?,
        }
        Ok(())
    }

    /// Deliver `action` to every screen and queue any follow-ups.
    fn broadcast(&mut self, action: &Action) -> Result<()> {
        for screen in self.screens.values_mut() {
            if let Some(follow_up) = screen.update(action)? {
                debug!(screen = screen.id(), "screen queued a follow-up action");
                self.action_tx.send(follow_up)?;
            }
        }
        Ok(())
    }

    /// Run an intent on its own task so rendering never waits on the
    /// network. Failures are already reflected in the view-model.
    fn dispatch(&mut self, intent: Intent) {
        self.in_flight += 1;
        let console = self.console.clone();
        let tx = self.action_tx.clone();
        tokio::spawn(async move {
            let label = intent.label();
            if let Err(e) = console.dispatch(intent).await {
                debug!(intent = label, error = %e, "intent failed");
            }
            let _ = tx.send(Action::IntentFinished);
        });
    }

    // ── Rendering ────────────────────────────────────────────────

    fn render(&self, frame: &mut Frame) {
        let area = frame.area();

        let layout = Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).split(area);

        if let Some(screen) = self.screens.get(&self.active_screen) {
            screen.render(frame, layout[0]);
        }
        self.render_status_bar(frame, layout[1]);

        if let Some((notice, _)) = &self.notice {
            Self::render_notice(frame, area, notice);
        }
        if self.help_visible {
            Self::render_help_overlay(frame, area);
        }
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        let location = match &self.view_state {
            ViewState::List => ScreenId::Cameras.label().to_owned(),
            ViewState::Detail { serial } => {
                format!("{} › {serial}", ScreenId::Cameras.label())
            }
        };

        let mut spans = vec![
            Span::raw(" "),
            Span::styled(location, theme::title_style()),
        ];
        if self.in_flight > 0 {
            spans.push(Span::styled(
                "  ◐ working",
                Style::default().fg(theme::AMBER),
            ));
        }
        let gateway = self.console.gateway();
        if !gateway.has_csrf_token() {
            spans.push(Span::styled("  read-only", theme::error_text()));
        }
        spans.push(Span::styled(
            format!("  │ {}  ? help  q quit", gateway.base_url()),
            theme::key_hint(),
        ));

        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    /// Toast in the bottom-right corner, above the status bar.
    fn render_notice(frame: &mut Frame, area: Rect, notice: &Notice) {
        let msg_len = u16::try_from(notice.message.chars().count()).unwrap_or(u16::MAX);
        let width = msg_len
            .saturating_add(6)
            .clamp(20, 70)
            .min(area.width.saturating_sub(2));
        let height = 3u16;

        let x = area.width.saturating_sub(width + 1);
        let y = area.height.saturating_sub(height + 1);
        let toast_area = Rect::new(area.x + x, area.y + y, width, height);

        let (icon, color) = theme::notice(notice.level);

        frame.render_widget(Clear, toast_area);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(color))
            .style(Style::default().bg(theme::BG_DARK));
        let inner = block.inner(toast_area);
        frame.render_widget(block, toast_area);

        let line = Line::from(vec![
            Span::styled(format!(" {icon} "), Style::default().fg(color)),
            Span::styled(notice.message.as_str(), theme::table_row()),
        ]);
        frame.render_widget(Paragraph::new(line), inner);
    }

    fn render_help_overlay(frame: &mut Frame, area: Rect) {
        let help_width = 50u16.min(area.width.saturating_sub(4));
        let help_height = 16u16.min(area.height.saturating_sub(2));
        let x = (area.width.saturating_sub(help_width)) / 2;
        let y = (area.height.saturating_sub(help_height)) / 2;
        let help_area = Rect::new(area.x + x, area.y + y, help_width, help_height);

        frame.render_widget(Clear, help_area);
        let block = Block::default()
            .title(" Keyboard Shortcuts ")
            .title_style(theme::title_style())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme::border_focused())
            .style(Style::default().bg(theme::BG_DARK));
        let inner = block.inner(help_area);
        frame.render_widget(block, help_area);

        let entry = |key: &'static str, what: &'static str| {
            Line::from(vec![
                Span::styled(format!("  {key:<10}"), theme::key_hint_key()),
                Span::styled(what, theme::key_hint()),
            ])
        };
        let section = |title: &'static str| {
            Line::from(Span::styled(
                format!("  {title}"),
                Style::default().fg(theme::LENS_BLUE),
            ))
        };

        let help_text = vec![
            Line::from(""),
            section("Cameras"),
            entry("j/k ↑/↓", "Move"),
            entry("Enter", "Open camera"),
            entry("s", "Scan for cameras"),
            Line::from(""),
            section("Camera"),
            entry("Enter", "Apply selected profile"),
            entry("n", "Save settings as new profile"),
            entry("Esc / b", "Back to list"),
            Line::from(""),
            section("Global"),
            entry("r", "Refresh"),
            entry("? / q", "Help / quit"),
        ];
        frame.render_widget(Paragraph::new(help_text), inner);
    }
}
