//! Outbound application events.
//!
//! Sessions emit these through the [`EventSink`](super::ports::EventSink)
//! port.  Adapters on the other side decide what to do with them; the
//! shipped one logs them.

use std::time::Duration;

use crate::sensors::Port;
use crate::session::results::PerformanceSummary;
use crate::trial::TrialState;

/// Structured events emitted by the trial and session layers.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// A session began running `protocol`.
    SessionStarted { protocol: String },

    /// A named sub-phase of a composite session began.
    PeriodStarted { label: String },

    /// The stimulus went on.
    TrialStarted { trial: u32, port: Port, forced: bool },

    /// The trial state machine moved between states.
    StateChanged { from: TrialState, to: TrialState },

    /// A trial outcome was appended to the results log.
    TrialCompleted {
        trial: u32,
        port: Port,
        rewarded: bool,
        reaction_time: Duration,
    },

    /// A sampling interval finished.
    SamplingCompleted {
        label: String,
        dwell: Duration,
        visits: u32,
    },

    /// The table reached a new logical position.
    TableMoved { from: u8, to: u8, steps: i32 },

    /// The doorway did not clear in time; the session carried on.
    DoorClearTimedOut,

    /// The session finished (normally or by stop).
    SessionEnded(PerformanceSummary),
}
