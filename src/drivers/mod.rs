//! Apparatus drivers: command encoding, reward valve, table, shutdown.

pub mod opcodes;
pub mod table;
pub mod valve;

use log::{error, info};

use crate::app::ports::ActuatorPort;
use crate::error::{Error, Result};
use table::TableController;

/// Bring every output to a safe state: LEDs and valves off, door closed,
/// table home, in that order.
///
/// Each step is attempted even if an earlier one failed.  Failures are
/// logged; the first one is returned.
pub fn shutdown_outputs<A: ActuatorPort + ?Sized>(
    actuators: &mut A,
    table: &mut TableController,
) -> Result<()> {
    let mut first_err: Option<Error> = None;

    if let Err(e) = actuators.all_off() {
        error!("Shutdown: LED/valve off failed: {e}");
        first_err.get_or_insert(e.into());
    }
    if let Err(e) = actuators.set_door(false) {
        error!("Shutdown: door close failed: {e}");
        first_err.get_or_insert(e.into());
    }
    if let Err(e) = table.reset(actuators) {
        error!("Shutdown: table home failed: {e}");
        first_err.get_or_insert(e);
    }

    info!("Shutdown: outputs deactivated");
    first_err.map_or(Ok(()), Err)
}
