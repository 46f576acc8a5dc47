//! Social session: the two-location handshake.
//!
//! Each trial runs these steps in order; a deadline expiry at either poke
//! ends the trial without reward and goes straight to the ITI.
//!
//! 1. hold-gated poke at the first port (optional deadline)
//! 2. table hold, re-measured until it reaches the minimum
//! 3. door open
//! 4. wait for the doorway to clear (optional timeout, then carry on)
//! 5. door close
//! 6. hold-gated poke at the second port (optional deadline)
//! 7. reward at the second port
//!
//! Only trials that reach step 6 are recorded.  A stop during steps 1–5
//! ends the trial without a record.

use std::time::{Duration, Instant};

use log::{info, warn};

use super::Session;
use crate::app::events::AppEvent;
use crate::app::ports::{ActuatorPort, EventSink};
use crate::config::{ProtocolConfig, SocialConfig};
use crate::error::Result;
use crate::sensors::Channel;
use crate::sensors::hold::{ClearWait, HoldDetector};
use crate::stop::CancelToken;
use crate::trial::response::ResponseWait;
use crate::trial::{TrialMachine, draw_iti};

impl<A: ActuatorPort, E: EventSink> Session<A, E> {
    pub(super) fn run_social(&mut self, config: &SocialConfig) -> Result<()> {
        let first = config.poke_config(config.first_port, config.first_deadline_ms);
        let second = config.poke_config(config.second_port, config.second_deadline_ms);
        let cancel = self.stop.token();
        let started = Instant::now();

        while !cancel.is_cancelled() {
            if config.session_duration().is_some_and(|d| started.elapsed() >= d) {
                info!("Session: duration reached");
                break;
            }
            self.social_trial(config, &first, &second, &cancel)?;
        }
        Ok(())
    }

    fn social_trial(
        &mut self,
        config: &SocialConfig,
        first: &ProtocolConfig,
        second: &ProtocolConfig,
        cancel: &CancelToken,
    ) -> Result<()> {
        self.events.emit(&AppEvent::TrialStarted {
            trial: self.results.next_trial_num(),
            port: config.second_port,
            forced: false,
        });

        // 1. First location.
        let mut gate = TrialMachine::new(first);
        match gate.gate(
            config.first_port,
            &self.registry,
            &mut self.actuators,
            &mut self.events,
            cancel,
        )? {
            ResponseWait::Responded(_) => {}
            ResponseWait::Cancelled => return Ok(()),
            ResponseWait::Expired => {
                info!("Session: no poke at port {} in time", config.first_port);
                gate.rest(&mut self.events, draw_iti(first.iti_bounds(), &mut self.rng), cancel);
                return Ok(());
            }
        }

        // 2. Table hold.
        let Some(table_hold) = self.measure_table_hold(config, cancel) else {
            return Ok(());
        };

        // 3–5. Door.
        self.actuators.set_door(true)?;
        let detector = HoldDetector::with_poll(&self.registry, config.idle_poll());
        match detector.wait_for_clear(Channel::Door, config.door_clear_timeout(), cancel) {
            ClearWait::Cleared => {}
            ClearWait::TimedOut => {
                warn!("Session: doorway still occupied after timeout, closing anyway");
                self.events.emit(&AppEvent::DoorClearTimedOut);
            }
            ClearWait::Cancelled => return Ok(()),
        }
        self.actuators.set_door(false)?;

        // 6–7. Second location and reward.
        let mut machine = TrialMachine::new(second);
        let response = machine.respond(
            config.second_port,
            &self.registry,
            &mut self.actuators,
            &mut self.events,
            cancel,
        )?;

        let iti = draw_iti(second.iti_bounds(), &mut self.rng);
        let mut record = response.to_record(None, iti);
        record.sampling_secs = Some(table_hold.as_secs_f64());
        machine.record(&mut self.events, &mut self.results, record);
        machine.rest(&mut self.events, iti, cancel);
        Ok(())
    }

    /// Measure table holds until one reaches the minimum.  `None` if
    /// cancelled first.
    fn measure_table_hold(&self, config: &SocialConfig, cancel: &CancelToken) -> Option<Duration> {
        let detector = HoldDetector::with_poll(&self.registry, config.hold_poll());
        loop {
            let held = detector.measure_hold(Channel::Table, cancel)?;
            if held >= config.min_table_hold() {
                info!("Session: table hold {:.3}s", held.as_secs_f64());
                return Some(held);
            }
            info!(
                "Session: table hold too short ({:.3}s < {:.3}s), retrying",
                held.as_secs_f64(),
                config.min_table_hold().as_secs_f64()
            );
        }
    }
}
