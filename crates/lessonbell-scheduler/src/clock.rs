//! Wall clock used by the tracker to compute alert thresholds.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

/// Source of local wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

/// The host's local time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

/// Wall time pinned to a start value and advanced by tokio's monotonic clock.
///
/// Under a paused tokio runtime the wall time moves exactly as far as the
/// runtime's auto-advance does, which makes whole-day schedules testable.
#[derive(Debug, Clone, Copy)]
pub struct AnchoredClock {
    wall: NaiveDateTime,
    anchor: tokio::time::Instant,
}

impl AnchoredClock {
    pub fn new(wall: NaiveDateTime) -> Self {
        Self {
            wall,
            anchor: tokio::time::Instant::now(),
        }
    }
}

impl Clock for AnchoredClock {
    fn now(&self) -> NaiveDateTime {
        TimeDelta::from_std(self.anchor.elapsed())
            .ok()
            .and_then(|elapsed| self.wall.checked_add_signed(elapsed))
            .unwrap_or(self.wall)
    }
}
