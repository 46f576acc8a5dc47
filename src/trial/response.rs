//! Response waiting.
//!
//! Polls the chosen channel at the protocol's response cadence until a
//! qualifying response, the deadline, or cancellation.

use std::thread;
use std::time::{Duration, Instant};

use crate::config::{ProtocolConfig, ResponseCriterion};
use crate::sensors::hold::HoldDetector;
use crate::sensors::{Channel, SensorRegistry};
use crate::stop::CancelToken;

/// How a response wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseWait {
    /// Qualifying response; carries the time from onset to its first
    /// triggered sample.
    Responded(Duration),
    Expired,
    Cancelled,
}

/// Wait for a qualifying response on `channel`, measuring from `onset`.
///
/// A hold that starts before the deadline is allowed to finish after it.
pub fn await_response(
    config: &ProtocolConfig,
    registry: &SensorRegistry,
    channel: Channel,
    onset: Instant,
    cancel: &CancelToken,
) -> ResponseWait {
    let deadline = config.response_deadline();
    let detector = HoldDetector::with_poll(registry, config.hold_poll());

    loop {
        if cancel.is_cancelled() {
            return ResponseWait::Cancelled;
        }
        let elapsed = onset.elapsed();
        if deadline.is_some_and(|d| elapsed >= d) {
            return ResponseWait::Expired;
        }

        if registry.state(channel).is_triggered() {
            let qualifies = match config.criterion {
                ResponseCriterion::Simple => true,
                ResponseCriterion::HoldGated => {
                    detector.holds_for(channel, config.hold_duration(), cancel)
                }
            };
            if qualifies {
                return ResponseWait::Responded(elapsed);
            }
            continue;
        }

        thread::sleep(config.response_poll());
    }
}
