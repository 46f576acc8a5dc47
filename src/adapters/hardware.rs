//! Serial actuator adapter: implements [`ActuatorPort`] over the link.
//!
//! Every command is encoded, written whole and flushed under one lock, so
//! clones of the adapter held by different actors can never interleave
//! bytes on the wire.  Write failures are returned as-is; there are no
//! retries.

use std::io::Write;
use std::sync::Arc;

use log::trace;
use parking_lot::Mutex;

use crate::app::ports::ActuatorPort;
use crate::drivers::opcodes::Command;
use crate::error::HardwareError;
use crate::sensors::Port;

/// Single-writer command channel.
pub struct SerialActuator<W> {
    writer: Arc<Mutex<W>>,
}

impl<W> Clone for SerialActuator<W> {
    fn clone(&self) -> Self {
        Self {
            writer: Arc::clone(&self.writer),
        }
    }
}

impl<W: Write> SerialActuator<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
        }
    }

    /// Encode and write one command.
    pub fn send(&self, command: Command) -> Result<(), HardwareError> {
        let frame = command.encode()?;
        if frame.is_empty() {
            return Ok(());
        }
        let mut writer = self.writer.lock();
        writer
            .write_all(&frame)
            .and_then(|()| writer.flush())
            .map_err(|e| HardwareError::Write(e.kind()))?;
        trace!("Serial: sent {command:?} as {:02X?}", frame.as_slice());
        Ok(())
    }
}

impl<W: Write> ActuatorPort for SerialActuator<W> {
    fn set_led(&mut self, port: Port, on: bool) -> Result<(), HardwareError> {
        self.send(Command::Led { port, on })
    }

    fn set_valve(&mut self, port: Port, open: bool) -> Result<(), HardwareError> {
        self.send(Command::Valve { port, open })
    }

    fn set_door(&mut self, open: bool) -> Result<(), HardwareError> {
        self.send(Command::Door { open })
    }

    fn rotate_table(&mut self, steps: i32) -> Result<(), HardwareError> {
        self.send(Command::Rotate { steps })
    }
}
