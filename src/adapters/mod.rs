//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements     | Connects to                    |
//! |---------------|----------------|--------------------------------|
//! | `serial`      | EventSource    | apparatus serial device (read) |
//! | `hardware`    | ActuatorPort   | apparatus serial device (write)|
//! | `event_log`   | SensorLog      | `sensor_events.csv`            |
//! | `results_csv` | ResultsSink    | `trials.csv`                   |
//! | `log_sink`    | EventSink      | `log` output                   |
//! | `telemetry`   | TelemetrySink  | `log` output                   |
//! | `time`        | -              | monotonic + wall clock         |

pub mod event_log;
pub mod hardware;
pub mod log_sink;
pub mod results_csv;
pub mod serial;
pub mod telemetry;
pub mod time;
pub mod utils;
