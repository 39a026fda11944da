//! Terminal input and timer events, merged onto one channel.
//!
//! A background task reads crossterm's event stream and two intervals:
//! a housekeeping tick (notice expiry, frame-rate decay) and a render
//! tick. Only key presses and resizes reach the app; everything else
//! crossterm reports is dropped in [`translate`].

use std::time::Duration;

use crossterm::event::{Event as CrosstermEvent, EventStream, KeyEvent, KeyEventKind};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Ticks per shortest time window the app tracks.
const TICKS_PER_WINDOW: u32 = 8;

/// Events consumed by the app loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A key was pressed (releases and repeats are dropped).
    Key(KeyEvent),
    /// Terminal was resized to (cols, rows).
    Resize(u16, u16),
    /// Housekeeping: expire notices, decay the frame rate.
    Tick,
    /// Redraw.
    Render,
}

/// How often [`Event::Tick`] and [`Event::Render`] fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    pub tick: Duration,
    pub render: Duration,
}

impl Cadence {
    /// Tick often enough to resolve `shortest_window` (the smallest of
    /// the notice lifetime and the frame-rate window) and render at
    /// `fps`.
    pub fn new(shortest_window: Duration, fps: u32) -> Self {
        Self {
            tick: shortest_window / TICKS_PER_WINDOW,
            render: Duration::from_secs(1) / fps.max(1),
        }
    }
}

/// Map one crossterm event to an app event, if the app cares about it.
pub fn translate(event: CrosstermEvent) -> Option<Event> {
    match event {
        CrosstermEvent::Key(key) if key.kind == KeyEventKind::Press => Some(Event::Key(key)),
        CrosstermEvent::Resize(cols, rows) => Some(Event::Resize(cols, rows)),
        _ => None,
    }
}

fn interval(period: Duration) -> Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

/// Owns the background reader. Dropping it stops the task.
pub struct EventReader {
    rx: mpsc::UnboundedReceiver<Event>,
    cancel: CancellationToken,
}

impl EventReader {
    pub fn new(cadence: Cadence) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            let mut terminal = EventStream::new();
            let mut tick = interval(cadence.tick);
            let mut render = interval(cadence.render);

            loop {
                let event = tokio::select! {
                    () = task_cancel.cancelled() => break,
                    _ = tick.tick() => Event::Tick,
                    _ = render.tick() => Event::Render,
                    read = terminal.next() => match read {
                        Some(Ok(raw)) => match translate(raw) {
                            Some(event) => event,
                            None => continue,
                        },
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "terminal read failed");
                            continue;
                        }
                        // stdin closed: nothing more will arrive
                        None => break,
                    },
                };

                if tx.send(event).is_err() {
                    break;
                }
            }
            tracing::debug!("event reader stopped");
        });

        Self { rx, cancel }
    }

    /// Next event, or `None` once the reader has stopped.
    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for EventReader {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
