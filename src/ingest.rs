//! Event ingestion loop.
//!
//! Runs on its own thread for the life of the process:
//!
//! ```text
//!   EventSource::read_line ─▶ parse_event ─▶ SensorRegistry::update
//!                                       └──▶ SensorLog::record (flushed)
//! ```
//!
//! Lines that are not sensor events are skipped without comment.  A read
//! failure is the only fatal condition: it latches the global stop and
//! ends the loop.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::adapters::time::SessionClock;
use crate::app::ports::{EventSource, SensorLog, SensorLogEntry};
use crate::error::Result;
use crate::sensors::SensorRegistry;
use crate::sensors::parse::parse_event;
use crate::stop::StopSignal;

/// Back-off when the source has nothing to deliver.
pub const IDLE_BACKOFF: Duration = Duration::from_millis(2);

/// Counters reported when the loop ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IngestStats {
    pub lines: u64,
    pub events: u64,
    pub log_failures: u64,
}

/// The ingestion loop and everything it owns.
pub struct Ingestor<S, L> {
    source: S,
    log: L,
    registry: Arc<SensorRegistry>,
    clock: SessionClock,
    stop: StopSignal,
    stats: IngestStats,
}

impl<S: EventSource, L: SensorLog> Ingestor<S, L> {
    pub fn new(
        source: S,
        log: L,
        registry: Arc<SensorRegistry>,
        clock: SessionClock,
        stop: StopSignal,
    ) -> Self {
        Self {
            source,
            log,
            registry,
            clock,
            stop,
            stats: IngestStats::default(),
        }
    }

    /// Handle one raw line.  Returns `true` if it was a sensor event.
    pub fn handle_line(&mut self, raw: &str) -> bool {
        self.stats.lines += 1;
        let raw = raw.trim();
        let Some(event) = parse_event(raw) else {
            return false;
        };

        let at = Instant::now();
        self.registry.update(event.channel, event.state, at);
        self.stats.events += 1;
        debug!("Ingest: {} {}", event.channel, event.state);

        let entry = SensorLogEntry {
            timestamp: self.clock.wall_at(at),
            elapsed: self.clock.elapsed_at(at),
            channel: event.channel,
            state: event.state,
            raw: raw.to_owned(),
        };
        if let Err(e) = self.log.record(&entry) {
            self.stats.log_failures += 1;
            warn!("Ingest: sensor log write failed: {e}");
        }
        true
    }

    /// Run until the stop latches or the source fails.
    pub fn run(mut self) -> Result<IngestStats> {
        info!("Ingest: started");
        while !self.stop.is_set() {
            match self.source.read_line() {
                Ok(Some(line)) => {
                    self.handle_line(&line);
                }
                Ok(None) => thread::sleep(IDLE_BACKOFF),
                Err(e) => {
                    error!("Ingest: transport fault: {e}");
                    self.stop.trigger();
                    return Err(e.into());
                }
            }
        }
        info!(
            "Ingest: stopped after {} lines, {} events",
            self.stats.lines, self.stats.events
        );
        Ok(self.stats)
    }
}

impl<S, L> Ingestor<S, L>
where
    S: EventSource + Send + 'static,
    L: SensorLog + Send + 'static,
{
    /// Run the loop on a named background thread.
    pub fn spawn(self) -> std::io::Result<JoinHandle<Result<IngestStats>>> {
        thread::Builder::new()
            .name("ingest".into())
            .spawn(move || self.run())
    }
}

/// Wait up to `grace` for the ingestion thread to finish, then detach it.
///
/// A blocked read cannot be interrupted, so the thread may outlive the
/// session.  Returns the loop's result if it finished in time.
pub fn join_with_grace(
    handle: JoinHandle<Result<IngestStats>>,
    grace: Duration,
) -> Option<Result<IngestStats>> {
    let deadline = Instant::now() + grace;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            warn!("Ingest: thread still blocked in read, detaching");
            return None;
        }
        thread::sleep(Duration::from_millis(10));
    }
    match handle.join() {
        Ok(res) => Some(res),
        Err(_) => {
            error!("Ingest: thread panicked");
            None
        }
    }
}
