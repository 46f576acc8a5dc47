//! Rotating table.
//!
//! Five logical positions on a 200 step/rev drive, measured from home:
//!
//! | Position | Angle     | Steps |
//! |----------|-----------|-------|
//! | 0        | home      | 0     |
//! | 1        | 90° CW    | 50    |
//! | 2        | 180° CW   | 100   |
//! | 3        | 270° CW   | 150   |
//! | 4        | 90° CCW   | -50   |
//!
//! The controller remembers the current position and issues one relative
//! rotation per move.  Positions are validated before any command is sent.

use log::info;

use crate::app::ports::ActuatorPort;
use crate::error::{Error, Result};

pub const STEPS_PER_REV: i32 = 200;

const QUARTER: i32 = STEPS_PER_REV / 4;

const POSITION_STEPS: [i32; 5] = [0, QUARTER, 2 * QUARTER, 3 * QUARTER, -QUARTER];

/// A validated logical table position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TablePosition(u8);

impl TablePosition {
    pub const HOME: TablePosition = TablePosition(0);

    pub fn new(index: u8) -> Result<Self> {
        if usize::from(index) < POSITION_STEPS.len() {
            Ok(Self(index))
        } else {
            Err(Error::InvalidTablePosition(index))
        }
    }

    pub const fn index(self) -> u8 {
        self.0
    }

    /// Signed offset from home.
    pub const fn steps(self) -> i32 {
        POSITION_STEPS[self.0 as usize]
    }
}

/// Owner of the table's logical position.
#[derive(Debug, Default)]
pub struct TableController {
    current: TablePosition,
}

impl TableController {
    /// Assumes the table is at home.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> TablePosition {
        self.current
    }

    /// Rotate to `target`; returns the relative steps commanded.
    ///
    /// The command is the signed difference between the two offsets, never
    /// the shorter way round, so the table stays within one revolution and
    /// any walk that ends at home nets zero steps (4 -> 3 is +200, not -100).
    /// A zero delta sends nothing.  The stored position changes only after
    /// the command was written.
    pub fn move_to<A: ActuatorPort + ?Sized>(
        &mut self,
        actuators: &mut A,
        target: TablePosition,
    ) -> Result<i32> {
        let delta = target.steps() - self.current.steps();
        if delta != 0 {
            actuators.rotate_table(delta)?;
            info!(
                "Table: position {} -> {} ({delta:+} steps)",
                self.current.index(),
                target.index()
            );
        }
        self.current = target;
        Ok(delta)
    }

    /// Return home.
    pub fn reset<A: ActuatorPort + ?Sized>(&mut self, actuators: &mut A) -> Result<i32> {
        self.move_to(actuators, TablePosition::HOME)
    }
}
