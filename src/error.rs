//! Unified error types for the apparatus controller.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! session orchestrator's error handling uniform.  All variants are `Copy`
//! so they can be passed between the ingestion thread, the session thread
//! and the cleanup path without allocation.

use core::fmt;
use std::io;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the crate funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The hardware link failed.  Always fatal: escalates to global stop.
    Hardware(HardwareError),
    /// Configuration is invalid.
    Config(&'static str),
    /// A table move was requested to a position outside 0..=4.
    InvalidTablePosition(u8),
    /// A channel identifier did not name a known sensor location.
    UnknownChannel,
    /// Local file I/O failed (logs, results).
    Io(io::ErrorKind),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hardware(e) => write!(f, "hardware: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::InvalidTablePosition(pos) => {
                write!(f, "invalid table position {pos} (expected 0..=4)")
            }
            Self::UnknownChannel => write!(f, "unknown sensor channel"),
            Self::Io(kind) => write!(f, "I/O: {kind}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(e.kind())
    }
}

// ---------------------------------------------------------------------------
// Hardware link errors
// ---------------------------------------------------------------------------

/// Faults on the serial link to the apparatus.  No retries are attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareError {
    /// Writing or flushing a command failed.
    Write(io::ErrorKind),
    /// Reading an event line failed.
    Read(io::ErrorKind),
    /// A table rotation does not fit in the single magnitude byte.
    StepOutOfRange(i32),
}

impl fmt::Display for HardwareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Write(kind) => write!(f, "command write failed ({kind})"),
            Self::Read(kind) => write!(f, "event read failed ({kind})"),
            Self::StepOutOfRange(steps) => write!(f, "table step count {steps} out of range"),
        }
    }
}

impl std::error::Error for HardwareError {}

impl From<HardwareError> for Error {
    fn from(e: HardwareError) -> Self {
        Self::Hardware(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
