//! Session clock.
//!
//! Pairs a monotonic start instant with the wall-clock time it was taken,
//! so monotonic event instants can be rendered as local timestamps
//! without a second clock read.

use std::time::{Duration, Instant};

use chrono::{DateTime, Local, TimeDelta};

#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    start: Instant,
    wall_start: DateTime<Local>,
}

impl SessionClock {
    /// Start the clock now.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
            wall_start: Local::now(),
        }
    }

    /// Time from the clock start to `at`; zero if `at` is earlier.
    pub fn elapsed_at(&self, at: Instant) -> Duration {
        at.saturating_duration_since(self.start)
    }

    /// Local wall time corresponding to the monotonic instant `at`.
    pub fn wall_at(&self, at: Instant) -> DateTime<Local> {
        let offset = TimeDelta::from_std(self.elapsed_at(at)).unwrap_or_else(|_| TimeDelta::zero());
        self.wall_start
            .checked_add_signed(offset)
            .unwrap_or(self.wall_start)
    }

    /// Session date as `YYYY-MM-DD`.
    pub fn date_stamp(&self) -> String {
        self.wall_start.format("%Y-%m-%d").to_string()
    }
}
