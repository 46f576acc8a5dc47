//! Trial state machine.
//!
//! ```text
//!   Presenting ──▶ AwaitingResponse ──┬──▶ Rewarded ───┐
//!                                     └──▶ Unrewarded ─┴──▶ Recording ──▶ Iti
//! ```
//!
//! | State              | Entry action                                   |
//! |--------------------|------------------------------------------------|
//! | `Presenting`       | stimulus LED on                                |
//! | `AwaitingResponse` | poll the port until response / deadline / stop |
//! | `Rewarded`         | LED off, valve pulse                           |
//! | `Unrewarded`       | LED off                                        |
//! | `Recording`        | append a [`TrialRecord`] to the results log    |
//! | `Iti`              | interruptible rest drawn from the ITI range    |
//!
//! Every transition is logged at debug level and emitted as
//! [`AppEvent::StateChanged`].  A stop observed while awaiting a response
//! still passes through `Unrewarded`, so the stimulus is always switched
//! off.

pub mod response;

use core::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use log::debug;
use rand::Rng;

use crate::app::events::AppEvent;
use crate::app::ports::{ActuatorPort, EventSink};
use crate::config::ProtocolConfig;
use crate::drivers::valve::deliver_reward;
use crate::error::Result;
use crate::policy::Selection;
use crate::sensors::{Port, SensorRegistry};
use crate::session::results::{ResultsLog, TrialRecord};
use crate::stop::CancelToken;
use response::{ResponseWait, await_response};

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrialState {
    Presenting,
    AwaitingResponse,
    Rewarded,
    Unrewarded,
    Recording,
    Iti,
}

impl TrialState {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Presenting => "Presenting",
            Self::AwaitingResponse => "AwaitingResponse",
            Self::Rewarded => "Rewarded",
            Self::Unrewarded => "Unrewarded",
            Self::Recording => "Recording",
            Self::Iti => "Iti",
        }
    }
}

impl fmt::Display for TrialState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// Outcome of the presenting/awaiting part of a trial.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub port: Port,
    pub rewarded: bool,
    /// Onset to response when rewarded; the full deadline (or zero without
    /// one) otherwise.
    pub reaction_time: Duration,
    pub started: DateTime<Local>,
    pub ended: DateTime<Local>,
    /// The wait ended by cancellation rather than response or deadline.
    pub interrupted: bool,
}

impl Response {
    /// Results row for this response.  The trial number is assigned on
    /// append.
    pub fn to_record(&self, forced: Option<bool>, iti: Duration) -> TrialRecord {
        TrialRecord {
            port: Some(self.port),
            forced,
            rewarded: Some(self.rewarded),
            trial_start: Some(self.started),
            trial_end: Some(self.ended),
            rt_secs: Some(self.reaction_time.as_secs_f64()),
            iti_secs: Some(iti.as_secs_f64()),
            ..TrialRecord::default()
        }
    }
}

/// Draw an inter-trial interval uniformly from `[min, max]`.
pub fn draw_iti<R: Rng + ?Sized>((min, max): (Duration, Duration), rng: &mut R) -> Duration {
    if max <= min {
        return min;
    }
    Duration::from_secs_f64(rng.random_range(min.as_secs_f64()..=max.as_secs_f64()))
}

// ---------------------------------------------------------------------------
// Machine
// ---------------------------------------------------------------------------

/// One trial's state machine, borrowed from the protocol configuration.
#[derive(Debug)]
pub struct TrialMachine<'c> {
    config: &'c ProtocolConfig,
    state: TrialState,
}

impl<'c> TrialMachine<'c> {
    pub fn new(config: &'c ProtocolConfig) -> Self {
        Self {
            config,
            state: TrialState::Presenting,
        }
    }

    fn enter<E: EventSink + ?Sized>(&mut self, next: TrialState, events: &mut E) {
        debug!("TRIAL transition: {} -> {}", self.state, next);
        events.emit(&AppEvent::StateChanged {
            from: self.state,
            to: next,
        });
        self.state = next;
    }

    /// Present `port` and wait, staying in `AwaitingResponse`.  The
    /// stimulus is off again when this returns `Ok`; no reward is given.
    pub fn gate<A, E>(
        &mut self,
        port: Port,
        registry: &SensorRegistry,
        actuators: &mut A,
        events: &mut E,
        cancel: &CancelToken,
    ) -> Result<ResponseWait>
    where
        A: ActuatorPort + ?Sized,
        E: EventSink + ?Sized,
    {
        let onset = Instant::now();
        actuators.set_led(port, true)?;
        self.enter(TrialState::AwaitingResponse, events);
        let wait = await_response(self.config, registry, port.channel(), onset, cancel);
        actuators.set_led(port, false)?;
        Ok(wait)
    }

    /// Present `port` and wait for the outcome, ending in `Rewarded` or
    /// `Unrewarded`.  The stimulus is off when this returns `Ok`.
    pub fn respond<A, E>(
        &mut self,
        port: Port,
        registry: &SensorRegistry,
        actuators: &mut A,
        events: &mut E,
        cancel: &CancelToken,
    ) -> Result<Response>
    where
        A: ActuatorPort + ?Sized,
        E: EventSink + ?Sized,
    {
        let started = Local::now();
        let wait = self.gate(port, registry, &mut *actuators, &mut *events, cancel)?;
        let ended = Local::now();

        let response = match wait {
            ResponseWait::Responded(rt) => {
                self.enter(TrialState::Rewarded, events);
                deliver_reward(&mut *actuators, port, self.config.reward_pulse())?;
                Response {
                    port,
                    rewarded: true,
                    reaction_time: rt,
                    started,
                    ended,
                    interrupted: false,
                }
            }
            ResponseWait::Expired | ResponseWait::Cancelled => {
                self.enter(TrialState::Unrewarded, events);
                Response {
                    port,
                    rewarded: false,
                    reaction_time: self.config.response_deadline().unwrap_or_default(),
                    started,
                    ended,
                    interrupted: wait == ResponseWait::Cancelled,
                }
            }
        };
        Ok(response)
    }

    /// Append `record` to the results log; returns its trial number.
    pub fn record<E: EventSink + ?Sized>(
        &mut self,
        events: &mut E,
        results: &mut ResultsLog,
        record: TrialRecord,
    ) -> u32 {
        self.enter(TrialState::Recording, events);
        let port = record.port;
        let rewarded = record.rewarded.unwrap_or(false);
        let rt = record.rt_secs.map(Duration::from_secs_f64).unwrap_or_default();
        let trial = results.append(record);
        if let Some(port) = port {
            events.emit(&AppEvent::TrialCompleted {
                trial,
                port,
                rewarded,
                reaction_time: rt,
            });
        }
        trial
    }

    /// Rest for `iti`, polling cancellation at the idle cadence.  Returns
    /// `false` if cancelled.
    pub fn rest<E: EventSink + ?Sized>(
        &mut self,
        events: &mut E,
        iti: Duration,
        cancel: &CancelToken,
    ) -> bool {
        self.enter(TrialState::Iti, events);
        cancel.sleep(iti, self.config.idle_poll())
    }
}

// ---------------------------------------------------------------------------
// Full trial
// ---------------------------------------------------------------------------

/// Everything one full trial needs besides its configuration.
pub struct TrialRig<'r, A: ?Sized, E: ?Sized> {
    pub registry: &'r SensorRegistry,
    pub actuators: &'r mut A,
    pub events: &'r mut E,
    pub results: &'r mut ResultsLog,
}

/// Result of [`run_trial`].
#[derive(Debug, Clone, PartialEq)]
pub struct TrialRun {
    /// Trial number assigned, `None` when the trial was dropped.
    pub trial: Option<u32>,
    pub response: Response,
    /// The ITI rest was cut short.
    pub rest_cancelled: bool,
}

/// When a trial cut short by cancellation is still recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptedTrials {
    Record,
    Drop,
}

/// Run one complete trial: present, await, reward, record, rest.
///
/// `period` tags the record.  With [`InterruptedTrials::Drop`] a trial
/// whose wait was cancelled is not recorded and no rest follows.
pub fn run_trial<A, E, R>(
    config: &ProtocolConfig,
    rig: &mut TrialRig<'_, A, E>,
    selection: Selection,
    period: Option<&str>,
    interrupted: InterruptedTrials,
    rng: &mut R,
    cancel: &CancelToken,
) -> Result<TrialRun>
where
    A: ActuatorPort + ?Sized,
    E: EventSink + ?Sized,
    R: Rng + ?Sized,
{
    let mut machine = TrialMachine::new(config);
    rig.events.emit(&AppEvent::TrialStarted {
        trial: rig.results.next_trial_num(),
        port: selection.port,
        forced: selection.forced,
    });

    let response = machine.respond(
        selection.port,
        rig.registry,
        &mut *rig.actuators,
        &mut *rig.events,
        cancel,
    )?;

    if response.interrupted && interrupted == InterruptedTrials::Drop {
        debug!("TRIAL dropped: cancelled while awaiting response");
        return Ok(TrialRun {
            trial: None,
            response,
            rest_cancelled: true,
        });
    }

    let iti = draw_iti(config.iti_bounds(), rng);
    let mut record = response.to_record(Some(selection.forced), iti);
    if let Some(label) = period {
        record = record.with_period(label);
    }
    let trial = machine.record(&mut *rig.events, &mut *rig.results, record);

    let rest_cancelled = !machine.rest(&mut *rig.events, iti, cancel);
    Ok(TrialRun {
        trial: Some(trial),
        response,
        rest_cancelled,
    })
}
