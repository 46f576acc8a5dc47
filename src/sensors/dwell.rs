//! Dwell-time accumulation for sampling intervals.
//!
//! Sums disjoint triggered→cleared periods on one channel using the
//! registry's transition timestamps rather than the poll times, so the
//! result does not depend on the polling cadence.  A period still open when
//! the window ends is truncated at the window end.

use std::time::{Duration, Instant};

use super::{ChannelReading, SensorState};

/// Result of a sampling window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dwell {
    pub total: Duration,
    /// Number of triggered periods seen (including a truncated one).
    pub visits: u32,
}

/// Incremental accumulator fed with polled channel readings.
#[derive(Debug, Clone, Copy)]
pub struct DwellAccumulator {
    window_start: Instant,
    window_end: Option<Instant>,
    open_since: Option<Instant>,
    dwell: Dwell,
}

impl DwellAccumulator {
    pub fn new(window_start: Instant) -> Self {
        Self {
            window_start,
            window_end: None,
            open_since: None,
            dwell: Dwell::default(),
        }
    }

    /// Ignore transitions stamped after `end`.
    pub fn until(mut self, end: Option<Instant>) -> Self {
        self.window_end = end;
        self
    }

    /// Feed the latest reading of the sampled channel.
    pub fn observe(&mut self, reading: ChannelReading) {
        if matches!((reading.changed_at, self.window_end), (Some(t), Some(end)) if t > end) {
            return;
        }
        let at = reading
            .changed_at
            .map_or(self.window_start, |t| t.max(self.window_start));

        match (reading.state, self.open_since) {
            (SensorState::Triggered, None) => self.open_since = Some(at),
            (SensorState::Cleared, Some(start)) => {
                self.dwell.total += at.saturating_duration_since(start);
                self.dwell.visits += 1;
                self.open_since = None;
            }
            _ => {}
        }
    }

    /// Whether a triggered period is currently open.
    pub fn is_open(&self) -> bool {
        self.open_since.is_some()
    }

    /// Close the window at `end`, truncating any open period.
    pub fn finish(mut self, end: Instant) -> Dwell {
        if let Some(start) = self.open_since.take() {
            self.dwell.total += end.saturating_duration_since(start);
            self.dwell.visits += 1;
        }
        self.dwell
    }
}
