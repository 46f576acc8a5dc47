//! Apparatus command encoding.
//!
//! Every command is one opcode byte; the table rotation appends a single
//! magnitude byte.
//!
//! | Target | LED on | LED off | Valve on | Valve off |
//! |--------|--------|---------|----------|-----------|
//! | A      | 0x21   | 0x22    | 0x23     | 0x24      |
//! | B      | 0x25   | 0x26    | 0x27     | 0x28      |
//! | C      | 0x29   | 0x2A    | 0x2B     | 0x2C      |
//!
//! Door open/close: 0x30/0x31.  Table: 0x32 (CW) or 0x33 (CCW) + steps.

use heapless::Vec as HVec;

use crate::error::HardwareError;
use crate::sensors::Port;

pub const DOOR_OPEN: u8 = 0x30;
pub const DOOR_CLOSE: u8 = 0x31;
pub const TABLE_CW: u8 = 0x32;
pub const TABLE_CCW: u8 = 0x33;

/// Longest encoded command.
pub const MAX_COMMAND_LEN: usize = 2;

/// Encoded bytes of one command.
pub type Frame = HVec<u8, MAX_COMMAND_LEN>;

/// One apparatus command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Led { port: Port, on: bool },
    Valve { port: Port, open: bool },
    Door { open: bool },
    /// Relative rotation; positive is clockwise.
    Rotate { steps: i32 },
}

const fn port_base(port: Port) -> u8 {
    match port {
        Port::A => 0x21,
        Port::B => 0x25,
        Port::C => 0x29,
    }
}

impl Command {
    /// Encode to wire bytes.  A zero rotation encodes to nothing.
    pub fn encode(self) -> Result<Frame, HardwareError> {
        let mut frame = Frame::new();
        match self {
            Self::Led { port, on } => push(&mut frame, port_base(port) + if on { 0 } else { 1 }),
            Self::Valve { port, open } => {
                push(&mut frame, port_base(port) + if open { 2 } else { 3 })
            }
            Self::Door { open } => push(&mut frame, if open { DOOR_OPEN } else { DOOR_CLOSE }),
            Self::Rotate { steps: 0 } => {}
            Self::Rotate { steps } => {
                let magnitude = u8::try_from(steps.unsigned_abs())
                    .map_err(|_| HardwareError::StepOutOfRange(steps))?;
                push(&mut frame, if steps > 0 { TABLE_CW } else { TABLE_CCW });
                push(&mut frame, magnitude);
            }
        }
        Ok(frame)
    }
}

fn push(frame: &mut Frame, byte: u8) {
    // Capacity covers the longest command.
    let _ = frame.push(byte);
}
