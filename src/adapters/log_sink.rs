//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing each application event as one
//! `log::info!` line.  State transitions go out at debug level.

use log::{debug, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::SessionStarted { protocol } => {
                info!("START | protocol={protocol}");
            }
            AppEvent::PeriodStarted { label } => {
                info!("PERIOD | {label}");
            }
            AppEvent::TrialStarted { trial, port, forced } => {
                info!("TRIAL | #{trial} start | port={port} forced={forced}");
            }
            AppEvent::StateChanged { from, to } => {
                debug!("STATE | {from} -> {to}");
            }
            AppEvent::TrialCompleted {
                trial,
                port,
                rewarded,
                reaction_time,
            } => {
                info!(
                    "TRIAL | #{trial} done | port={port} | {} | rt={:.3}s",
                    if *rewarded { "REWARD" } else { "MISS" },
                    reaction_time.as_secs_f64(),
                );
            }
            AppEvent::SamplingCompleted { label, dwell, visits } => {
                info!(
                    "SAMPLE | {label} | dwell={:.3}s | visits={visits}",
                    dwell.as_secs_f64()
                );
            }
            AppEvent::TableMoved { from, to, steps } => {
                info!("TABLE | {from} -> {to} ({steps:+} steps)");
            }
            AppEvent::DoorClearTimedOut => {
                warn!("DOOR | clear wait timed out");
            }
            AppEvent::SessionEnded(s) => {
                info!(
                    "END | trials={} rewarded={} hit={:.1}% mean_rt={}",
                    s.trials,
                    s.rewarded,
                    s.hit_rate * 100.0,
                    s.mean_rt_secs
                        .map_or_else(|| "-".to_owned(), |rt| format!("{rt:.3}s")),
                );
            }
        }
    }
}
