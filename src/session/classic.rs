//! Classic session: one trial machine run back to back.

use std::time::Instant;

use log::info;

use super::Session;
use crate::app::ports::{ActuatorPort, EventSink};
use crate::config::ProtocolConfig;
use crate::error::Result;
use crate::policy::PortSelector;
use crate::trial::{InterruptedTrials, run_trial};

impl<A: ActuatorPort, E: EventSink> Session<A, E> {
    /// Run trials until the trial limit, the session duration or a stop.
    ///
    /// Limits are checked between trials; a trial in progress always
    /// finishes.  A trial cut short by a stop is recorded unrewarded.
    pub(super) fn run_classic(&mut self, config: &ProtocolConfig) -> Result<()> {
        let mut selector = PortSelector::new(config);
        let cancel = self.stop.token();
        let started = Instant::now();
        let mut completed: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                info!("Session: stopped after {completed} trials");
                break;
            }
            if config.trial_limit.is_some_and(|limit| completed >= limit) {
                info!("Session: trial limit of {completed} reached");
                break;
            }
            if config.session_duration().is_some_and(|d| started.elapsed() >= d) {
                info!("Session: duration reached after {completed} trials");
                break;
            }

            let (mut rig, rng) = self.split();
            let selection = selector.next(rng)?;
            let run = run_trial(
                config,
                &mut rig,
                selection,
                None,
                InterruptedTrials::Record,
                rng,
                &cancel,
            )?;
            selector.record_outcome(selection.port, run.response.rewarded);
            completed += 1;
        }
        Ok(())
    }
}
