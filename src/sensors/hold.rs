//! Debounced hold detection.
//!
//! All waits here poll the [`SensorRegistry`] at a fixed short cadence
//! (5 ms by default) and re-check the [`CancelToken`] on every sample.
//! There is no blocking on condition variables.
//!
//! | Operation        | Returns                                          |
//! |------------------|--------------------------------------------------|
//! | `holds_for`      | `true` iff every sample over the window is triggered |
//! | `measure_hold`   | length of the next full triggered period         |
//! | `wait_for_clear` | whether the channel cleared before a timeout     |

use std::thread;
use std::time::{Duration, Instant};

use super::{Channel, SensorRegistry};
use crate::stop::CancelToken;

/// Default sampling interval for hold checks.
pub const DEFAULT_HOLD_POLL: Duration = Duration::from_millis(5);

/// Outcome of [`HoldDetector::wait_for_clear`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearWait {
    Cleared,
    TimedOut,
    Cancelled,
}

/// Samples one registry at a fixed cadence.
#[derive(Debug, Clone, Copy)]
pub struct HoldDetector<'a> {
    registry: &'a SensorRegistry,
    poll: Duration,
}

impl<'a> HoldDetector<'a> {
    pub fn new(registry: &'a SensorRegistry) -> Self {
        Self::with_poll(registry, DEFAULT_HOLD_POLL)
    }

    pub fn with_poll(registry: &'a SensorRegistry, poll: Duration) -> Self {
        Self { registry, poll }
    }

    /// Confirm `channel` stays triggered for the whole of `duration`.
    ///
    /// Sampling starts immediately.  Returns `false` on the first cleared
    /// sample or on cancellation; returns `true` no earlier than `duration`
    /// after the call.
    pub fn holds_for(&self, channel: Channel, duration: Duration, cancel: &CancelToken) -> bool {
        let start = Instant::now();
        loop {
            if cancel.is_cancelled() || !self.registry.state(channel).is_triggered() {
                return false;
            }
            let elapsed = start.elapsed();
            if elapsed >= duration {
                return true;
            }
            thread::sleep(self.poll.min(duration - elapsed));
        }
    }

    /// Wait for `channel` to trigger, then measure how long it stays
    /// triggered.  `None` if cancelled before the period completes.
    pub fn measure_hold(&self, channel: Channel, cancel: &CancelToken) -> Option<Duration> {
        while !self.registry.state(channel).is_triggered() {
            if cancel.is_cancelled() {
                return None;
            }
            thread::sleep(self.poll);
        }

        let start = Instant::now();
        while self.registry.state(channel).is_triggered() {
            if cancel.is_cancelled() {
                return None;
            }
            thread::sleep(self.poll);
        }
        Some(start.elapsed())
    }

    /// Wait until `channel` reads cleared, optionally giving up after
    /// `timeout`.
    pub fn wait_for_clear(
        &self,
        channel: Channel,
        timeout: Option<Duration>,
        cancel: &CancelToken,
    ) -> ClearWait {
        let start = Instant::now();
        loop {
            if !self.registry.state(channel).is_triggered() {
                return ClearWait::Cleared;
            }
            if cancel.is_cancelled() {
                return ClearWait::Cancelled;
            }
            if timeout.is_some_and(|t| start.elapsed() >= t) {
                return ClearWait::TimedOut;
            }
            thread::sleep(self.poll);
        }
    }
}
