//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   EventSource ──▶ ingest ──▶ SensorRegistry ──▶ trial / session
//!                     │                               │
//!                     ▼                               ├──▶ ActuatorPort
//!                 SensorLog                           ├──▶ EventSink
//!                                                     └──▶ ResultsSink
//! ```
//!
//! Driven adapters (serial link, CSV files, log output) implement these
//! traits.  Sessions consume them via generics.

use std::time::Duration;

use chrono::{DateTime, Local};

use crate::error::{HardwareError, Result};
use crate::sensors::{Channel, Port, SensorSnapshot, SensorState};
use crate::session::results::{PerformanceSummary, RecordLayout, TrialRecord};

// ───────────────────────────────────────────────────────────────
// Actuator port (domain → apparatus)
// ───────────────────────────────────────────────────────────────

/// Write-side port: the domain calls this to command the apparatus.
///
/// Every method is one complete command.  Implementations must not
/// interleave the bytes of two commands on the wire.
pub trait ActuatorPort {
    /// Switch the cue LED at `port`.
    fn set_led(&mut self, port: Port, on: bool) -> core::result::Result<(), HardwareError>;

    /// Open or close the reward valve at `port`.
    fn set_valve(&mut self, port: Port, open: bool) -> core::result::Result<(), HardwareError>;

    fn set_door(&mut self, open: bool) -> core::result::Result<(), HardwareError>;

    /// Relative table rotation; positive is clockwise.  Zero is a no-op.
    fn rotate_table(&mut self, steps: i32) -> core::result::Result<(), HardwareError>;

    /// Every LED and valve off.  Attempts all ports and reports the first
    /// failure.
    fn all_off(&mut self) -> core::result::Result<(), HardwareError> {
        let mut first_err = None;
        for port in [Port::A, Port::B, Port::C] {
            for res in [self.set_led(port, false), self.set_valve(port, false)] {
                if let Err(e) = res {
                    first_err.get_or_insert(e);
                }
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

impl<T: ActuatorPort + ?Sized> ActuatorPort for &mut T {
    fn set_led(&mut self, port: Port, on: bool) -> core::result::Result<(), HardwareError> {
        (**self).set_led(port, on)
    }

    fn set_valve(&mut self, port: Port, open: bool) -> core::result::Result<(), HardwareError> {
        (**self).set_valve(port, open)
    }

    fn set_door(&mut self, open: bool) -> core::result::Result<(), HardwareError> {
        (**self).set_door(open)
    }

    fn rotate_table(&mut self, steps: i32) -> core::result::Result<(), HardwareError> {
        (**self).rotate_table(steps)
    }

    fn all_off(&mut self) -> core::result::Result<(), HardwareError> {
        (**self).all_off()
    }
}

// ───────────────────────────────────────────────────────────────
// Event source (apparatus → ingestion)
// ───────────────────────────────────────────────────────────────

/// Line-oriented inbound text from the apparatus.
pub trait EventSource {
    /// Next line without its terminator.  `Ok(None)` means nothing arrived
    /// yet; the caller polls again.  An `Err` is a transport fault.
    fn read_line(&mut self) -> core::result::Result<Option<String>, HardwareError>;
}

// ───────────────────────────────────────────────────────────────
// Sensor event log (ingestion → durable storage)
// ───────────────────────────────────────────────────────────────

/// One accepted sensor event as it is persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorLogEntry {
    pub timestamp: DateTime<Local>,
    /// Time since the session clock started.
    pub elapsed: Duration,
    pub channel: Channel,
    pub state: SensorState,
    pub raw: String,
}

/// Append-only sink for accepted sensor events.  Each call must be durable
/// before it returns.
pub trait SensorLog {
    fn record(&mut self, entry: &SensorLogEntry) -> Result<()>;
}

// ───────────────────────────────────────────────────────────────
// Results sink (session → results file)
// ───────────────────────────────────────────────────────────────

/// Receives the finished results log at the end of a session.
pub trait ResultsSink {
    fn write_results(&mut self, layout: RecordLayout, records: &[TrialRecord]) -> Result<()>;
}

// ───────────────────────────────────────────────────────────────
// Event sink (domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

impl<T: EventSink + ?Sized> EventSink for &mut T {
    fn emit(&mut self, event: &super::events::AppEvent) {
        (**self).emit(event)
    }
}

// ───────────────────────────────────────────────────────────────
// Telemetry sink (live view, polled by the main thread)
// ───────────────────────────────────────────────────────────────

/// What the main thread hands to the live view every tick.
#[derive(Debug, Clone)]
pub struct TelemetryFrame {
    pub sensors: SensorSnapshot,
    /// Records in the results log, sampling rows included.
    pub records: usize,
    pub summary: PerformanceSummary,
    /// Most recent record, if any.
    pub last: Option<TrialRecord>,
}

/// Live view of a running session.  Failures stay inside the sink.
pub trait TelemetrySink {
    fn report(&mut self, frame: &TelemetryFrame);
}
