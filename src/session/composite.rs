//! Composite session: conditioning bursts interleaved with sampling
//! intervals.
//!
//! ```text
//!   CC1 ─▶ Sampling_1 ─▶ CC2 ─▶ … ─▶ Sampling_4 ─▶ CC5 ─▶ Sampling_5
//!          (familiar)                (familiar)          (novel)
//! ```
//!
//! Every record goes into the one results log with its period label, so
//! trial numbers run on across periods.  A trial cut short when its burst
//! ends is dropped.

use core::fmt;
use std::time::Instant;

use log::{info, warn};

use super::Session;
use super::results::TrialRecord;
use crate::app::events::AppEvent;
use crate::app::ports::{ActuatorPort, EventSink};
use crate::config::CompositeConfig;
use crate::drivers::table::TablePosition;
use crate::error::Result;
use crate::policy::PortSelector;
use crate::sensors::Channel;
use crate::sensors::dwell::DwellAccumulator;
use crate::sensors::hold::{ClearWait, HoldDetector};
use crate::trial::{InterruptedTrials, run_trial};

/// One step of the composite schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Conditioning { index: u8 },
    Sampling { index: u8, position: TablePosition },
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conditioning { index } => write!(f, "CC{index}"),
            Self::Sampling { index, .. } => write!(f, "Sampling_{index}"),
        }
    }
}

/// The ordered periods of a composite session.
pub fn schedule(config: &CompositeConfig) -> Result<Vec<Period>> {
    let familiar = config.familiar_position()?;
    let novel = config.novel_position()?;

    let mut periods = vec![Period::Conditioning { index: 1 }];
    for i in 1..=config.repetitions {
        periods.push(Period::Sampling { index: i, position: familiar });
        periods.push(Period::Conditioning { index: i + 1 });
    }
    periods.push(Period::Sampling {
        index: config.repetitions + 1,
        position: novel,
    });
    Ok(periods)
}

impl<A: ActuatorPort, E: EventSink> Session<A, E> {
    pub(super) fn run_composite(&mut self, config: &CompositeConfig) -> Result<()> {
        for period in schedule(config)? {
            if self.stop.is_set() {
                info!("Session: stopped before {period}");
                break;
            }
            let label = period.to_string();
            info!("Session: period {label}");
            self.events.emit(&AppEvent::PeriodStarted { label: label.clone() });

            match period {
                Period::Conditioning { .. } => self.run_conditioning(config, &label)?,
                Period::Sampling { position, .. } => self.run_sampling(config, position, &label)?,
            }
        }
        Ok(())
    }

    /// A fixed-length burst of trials with a fresh selector.
    fn run_conditioning(&mut self, config: &CompositeConfig, label: &str) -> Result<()> {
        let trial_config = &config.conditioning;
        let mut selector = PortSelector::new(trial_config);
        let cancel = self.stop.token_for(config.conditioning_burst());

        while !cancel.is_cancelled() {
            let (mut rig, rng) = self.split();
            let selection = selector.next(rng)?;
            let run = run_trial(
                trial_config,
                &mut rig,
                selection,
                Some(label),
                InterruptedTrials::Drop,
                rng,
                &cancel,
            )?;
            if run.trial.is_some() {
                selector.record_outcome(selection.port, run.response.rewarded);
            }
        }
        Ok(())
    }

    /// Table to `position`, door open, accumulate table dwell, wait for the
    /// doorway to clear, door closed, table home, one record.
    fn run_sampling(
        &mut self,
        config: &CompositeConfig,
        position: TablePosition,
        label: &str,
    ) -> Result<()> {
        self.move_table(position)?;
        self.actuators.set_door(true)?;

        let start = Instant::now();
        let cancel = self.stop.token_for(config.sampling());
        let end = cancel.until();
        let poll = config.sampling_poll();

        let mut dwell = DwellAccumulator::new(start).until(end);
        loop {
            dwell.observe(self.registry.get(Channel::Table));
            if cancel.is_cancelled() {
                break;
            }
            std::thread::sleep(poll);
        }
        let now = Instant::now();
        let dwell = dwell.finish(end.map_or(now, |end| now.min(end)));

        let detector = HoldDetector::with_poll(&self.registry, poll);
        if detector.wait_for_clear(Channel::Door, config.door_clear_timeout(), &self.stop.token())
            == ClearWait::TimedOut
        {
            warn!("Session: doorway still occupied after timeout, closing anyway");
            self.events.emit(&AppEvent::DoorClearTimedOut);
        }
        self.actuators.set_door(false)?;
        self.move_table(TablePosition::HOME)?;

        self.results.append(TrialRecord::sampling(dwell.total).with_period(label));
        self.events.emit(&AppEvent::SamplingCompleted {
            label: label.to_owned(),
            dwell: dwell.total,
            visits: dwell.visits,
        });
        Ok(())
    }
}
