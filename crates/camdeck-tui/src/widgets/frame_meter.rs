//! Live-feed meter: last frame sequence, decoded size, and arrival rate.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use bytesize::ByteSize;
use tracing::debug;

use camdeck_core::LiveFrame;

/// Sliding window the frame rate is averaged over.
pub const RATE_WINDOW: Duration = Duration::from_secs(2);

#[derive(Debug, Default)]
pub struct FrameMeter {
    arrivals: VecDeque<Instant>,
    last_seq: Option<u64>,
    /// `None` when the last payload did not decode.
    last_size: Option<ByteSize>,
}

impl FrameMeter {
    /// Count `frame` as arrived at `now`. A sequence number already seen
    /// is ignored, so re-delivering the same slot does not inflate the rate.
    pub fn record(&mut self, frame: &LiveFrame, now: Instant) {
        if self.last_seq.is_some_and(|seq| seq >= frame.seq) {
            return;
        }
        self.last_seq = Some(frame.seq);
        self.last_size = match frame.decode() {
            Ok(bytes) => Some(ByteSize::b(u64::try_from(bytes.len()).unwrap_or(u64::MAX))),
            Err(e) => {
                debug!(seq = frame.seq, error = %e, "frame payload is not valid base64");
                None
            }
        };
        self.arrivals.push_back(now);
        self.prune(now);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Drop arrivals older than the rate window.
    pub fn prune(&mut self, now: Instant) {
        while self
            .arrivals
            .front()
            .is_some_and(|t| now.saturating_duration_since(*t) > RATE_WINDOW)
        {
            self.arrivals.pop_front();
        }
    }

    pub fn seq(&self) -> Option<u64> {
        self.last_seq
    }

    pub fn size(&self) -> Option<ByteSize> {
        self.last_size
    }

    /// Frames per second over the last [`RATE_WINDOW`] ending at `now`.
    pub fn fps(&self, now: Instant) -> f64 {
        let recent = self
            .arrivals
            .iter()
            .filter(|t| now.saturating_duration_since(**t) <= RATE_WINDOW)
            .count();
        f64::from(u32::try_from(recent).unwrap_or(u32::MAX)) / RATE_WINDOW.as_secs_f64()
    }

    /// One-line summary, e.g. `#42 · 18.3 KiB · 12.5 fps`.
    pub fn summary(&self, now: Instant) -> String {
        let Some(seq) = self.last_seq else {
            return "waiting for first frame".into();
        };
        let size = self
            .last_size
            .map_or_else(|| "undecodable".to_owned(), |s| s.to_string());
        format!("#{seq} · {size} · {:.1} fps", self.fps(now))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use chrono::Utc;
    use pretty_assertions::assert_eq;

    use super::*;

    fn frame(seq: u64, image: &str) -> LiveFrame {
        LiveFrame {
            serial: "C1".into(),
            seq,
            image: image.into(),
            received_at: Utc::now(),
        }
    }

    #[test]
    fn empty_meter_waits_for_first_frame() {
        let meter = FrameMeter::default();
        assert_eq!(meter.summary(Instant::now()), "waiting for first frame");
        assert_eq!(meter.seq(), None);
    }

    #[test]
    fn records_seq_and_decoded_size() {
        let mut meter = FrameMeter::default();
        // "AAAA" decodes to three zero bytes
        meter.record(&frame(7, "AAAA"), Instant::now());

        assert_eq!(meter.seq(), Some(7));
        assert_eq!(meter.size(), Some(ByteSize::b(3)));
    }

    #[test]
    fn rate_is_averaged_over_window() {
        let t0 = Instant::now();
        let mut meter = FrameMeter::default();
        meter.record(&frame(1, "AAAA"), t0);
        meter.record(&frame(2, "AAAA"), t0 + Duration::from_millis(500));
        meter.record(&frame(3, "AAAA"), t0 + Duration::from_millis(1000));

        let fps = meter.fps(t0 + Duration::from_millis(1000));
        assert!((fps - 1.5).abs() < f64::EPSILON, "fps = {fps}");
    }

    #[test]
    fn rate_decays_to_zero_without_frames() {
        let t0 = Instant::now();
        let mut meter = FrameMeter::default();
        meter.record(&frame(1, "AAAA"), t0);

        let later = t0 + Duration::from_secs(5);
        meter.prune(later);
        assert!(meter.fps(later).abs() < f64::EPSILON);
        assert_eq!(meter.seq(), Some(1), "last frame info survives decay");
    }

    #[test]
    fn repeated_seq_is_not_counted_twice() {
        let t0 = Instant::now();
        let mut meter = FrameMeter::default();
        let f = frame(4, "AAAA");
        meter.record(&f, t0);
        meter.record(&f, t0);

        assert!((meter.fps(t0) - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn undecodable_payload_is_reported() {
        let now = Instant::now();
        let mut meter = FrameMeter::default();
        meter.record(&frame(9, "not base64!"), now);

        assert_eq!(meter.size(), None);
        assert!(meter.summary(now).starts_with("#9 · undecodable"));
    }

    #[test]
    fn reset_forgets_everything() {
        let now = Instant::now();
        let mut meter = FrameMeter::default();
        meter.record(&frame(1, "AAAA"), now);
        meter.reset();

        assert_eq!(meter.seq(), None);
        assert!(meter.fps(now).abs() < f64::EPSILON);
    }
}
