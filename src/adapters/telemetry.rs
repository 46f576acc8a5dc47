//! Live telemetry.
//!
//! [`TelemetryPump`] is driven by the main thread: each tick it copies the
//! registry snapshot and the results summary and hands them to a
//! [`TelemetrySink`].  The pump only reads shared state, so a slow or
//! failing sink cannot disturb trial timing.
//!
//! [`LogTelemetrySink`] writes a `TELEM |` line whenever the sensors or the
//! results changed since the last report.

use std::sync::Arc;

use log::info;

use crate::app::ports::{TelemetryFrame, TelemetrySink};
use crate::sensors::{Channel, SensorRegistry};
use crate::session::results::ResultsReader;

/// Polls shared state for the live view.
pub struct TelemetryPump<T> {
    registry: Arc<SensorRegistry>,
    results: ResultsReader,
    sink: T,
}

impl<T: TelemetrySink> TelemetryPump<T> {
    pub fn new(registry: Arc<SensorRegistry>, results: ResultsReader, sink: T) -> Self {
        Self {
            registry,
            results,
            sink,
        }
    }

    pub fn tick(&mut self) {
        let frame = TelemetryFrame {
            sensors: self.registry.snapshot(),
            records: self.results.len(),
            summary: self.results.summary(),
            last: self.results.last(),
        };
        self.sink.report(&frame);
    }

    pub fn sink(&self) -> &T {
        &self.sink
    }
}

/// Logs a frame only when something changed.
#[derive(Debug, Default)]
pub struct LogTelemetrySink {
    last_seen: Option<(u64, usize)>,
    reports: u64,
}

impl LogTelemetrySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames actually logged so far.
    pub fn reports(&self) -> u64 {
        self.reports
    }
}

impl TelemetrySink for LogTelemetrySink {
    fn report(&mut self, frame: &TelemetryFrame) {
        let key = (frame.sensors.sequence, frame.records);
        if self.last_seen == Some(key) {
            return;
        }
        self.last_seen = Some(key);
        self.reports += 1;

        let sensors: Vec<String> = Channel::ALL
            .iter()
            .map(|&c| format!("{c}={}", frame.sensors.state(c)))
            .collect();
        let recent = frame
            .summary
            .block_hit_rates
            .last()
            .map_or_else(|| "-".to_owned(), |r| format!("{:.0}%", r * 100.0));
        info!(
            "TELEM | {} | trials={} hit={:.1}% block={} | mean_rt={}",
            sensors.join(" "),
            frame.summary.trials,
            frame.summary.hit_rate * 100.0,
            recent,
            frame
                .summary
                .mean_rt_secs
                .map_or_else(|| "-".to_owned(), |rt| format!("{rt:.3}s")),
        );
    }
}
