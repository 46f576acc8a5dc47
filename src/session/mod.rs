//! Session orchestrator.
//!
//! A [`Session`] owns everything a protocol run mutates: the actuator port,
//! the event sink, the table controller, the results log and the random
//! source.  It only reads the shared [`SensorRegistry`].
//!
//! ```text
//!   Session::run(plan)
//!     ├── Classic   ── trials until limit / duration / stop
//!     ├── Composite ── CC1, 4 × (Sampling_i, CC_i+1), Sampling_5
//!     └── Social    ── A poke → table hold → door → C poke → reward
//!     └── shutdown_outputs   (always)
//! ```
//!
//! Any hardware fault latches the global stop before it is returned.

pub mod classic;
pub mod composite;
pub mod results;
pub mod social;

use std::sync::Arc;

use log::{error, info};
use rand::rngs::StdRng;

use crate::app::events::AppEvent;
use crate::app::ports::{ActuatorPort, EventSink};
use crate::config::ProtocolPlan;
use crate::drivers::shutdown_outputs;
use crate::drivers::table::{TableController, TablePosition};
use crate::error::{Error, Result};
use crate::sensors::SensorRegistry;
use crate::stop::StopSignal;
use crate::trial::TrialRig;
use results::{RecordLayout, ResultsLog, ResultsReader};

/// One protocol run.
pub struct Session<A, E> {
    registry: Arc<SensorRegistry>,
    actuators: A,
    events: E,
    table: TableController,
    results: ResultsLog,
    rng: StdRng,
    stop: StopSignal,
}

impl<A: ActuatorPort, E: EventSink> Session<A, E> {
    pub fn new(
        registry: Arc<SensorRegistry>,
        actuators: A,
        events: E,
        stop: StopSignal,
        rng: StdRng,
    ) -> Self {
        Self {
            registry,
            actuators,
            events,
            table: TableController::new(),
            results: ResultsLog::new(),
            rng,
            stop,
        }
    }

    /// Read-only view of the results log for pollers on other threads.
    pub fn results(&self) -> ResultsReader {
        self.results.reader()
    }

    pub fn actuators(&self) -> &A {
        &self.actuators
    }

    pub fn events(&self) -> &E {
        &self.events
    }

    pub fn table_position(&self) -> TablePosition {
        self.table.position()
    }

    /// Run `plan` to completion, then bring every output to a safe state.
    ///
    /// The shutdown path runs whatever ended the session.  A protocol error
    /// takes precedence over a shutdown error.
    pub fn run(&mut self, protocol: &str, plan: &ProtocolPlan) -> Result<()> {
        info!("Session: starting protocol {protocol}");
        self.events.emit(&AppEvent::SessionStarted {
            protocol: protocol.to_owned(),
        });

        let outcome = plan.validate().and_then(|()| match plan {
            ProtocolPlan::Classic(c) => self.run_classic(c),
            ProtocolPlan::Composite(c) => self.run_composite(c),
            ProtocolPlan::Social(c) => self.run_social(c),
        });

        if let Err(e) = outcome {
            error!("Session: aborted: {e}");
            if matches!(e, Error::Hardware(_)) {
                self.stop.trigger();
            }
        }

        let cleanup = shutdown_outputs(&mut self.actuators, &mut self.table);
        if let Err(Error::Hardware(_)) = cleanup {
            self.stop.trigger();
        }

        let summary = self.results.reader().summary();
        info!(
            "Session: finished, {} trials, hit rate {:.1}%",
            summary.trials,
            summary.hit_rate * 100.0
        );
        self.events.emit(&AppEvent::SessionEnded(summary));
        outcome.and(cleanup)
    }

    /// Borrow the parts a trial needs, alongside the random source.
    fn split(&mut self) -> (TrialRig<'_, A, E>, &mut StdRng) {
        (
            TrialRig {
                registry: &self.registry,
                actuators: &mut self.actuators,
                events: &mut self.events,
                results: &mut self.results,
            },
            &mut self.rng,
        )
    }

    fn move_table(&mut self, target: TablePosition) -> Result<()> {
        let from = self.table.position();
        let steps = self.table.move_to(&mut self.actuators, target)?;
        if steps != 0 {
            self.events.emit(&AppEvent::TableMoved {
                from: from.index(),
                to: target.index(),
                steps,
            });
        }
        Ok(())
    }
}

/// Column set of the results file for `plan`.
pub fn layout_for(plan: &ProtocolPlan) -> RecordLayout {
    match plan {
        ProtocolPlan::Classic(_) => RecordLayout::Classic,
        ProtocolPlan::Composite(_) => RecordLayout::Composite,
        ProtocolPlan::Social(_) => RecordLayout::Social,
    }
}
