//! Reward delivery.

use std::thread;
use std::time::Duration;

use log::debug;

use crate::app::ports::ActuatorPort;
use crate::error::HardwareError;
use crate::sensors::Port;

/// Open the valve at `port` for `pulse`, then close it.
///
/// The pulse is short and not interruptible.  If the open command fails
/// no close is attempted; the shutdown path closes every valve anyway.
pub fn deliver_reward<A: ActuatorPort + ?Sized>(
    actuators: &mut A,
    port: Port,
    pulse: Duration,
) -> Result<(), HardwareError> {
    actuators.set_valve(port, true)?;
    thread::sleep(pulse);
    actuators.set_valve(port, false)?;
    debug!("Reward: port {} valve pulsed {} ms", port, pulse.as_millis());
    Ok(())
}
