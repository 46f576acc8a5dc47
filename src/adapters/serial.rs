//! Serial link to the apparatus.
//!
//! The device node is opened as a plain file for reading and writing; line
//! settings (baud rate, raw mode, read timeout) are expected to be
//! configured on the device beforehand.  The handle is split into a
//! [`LineReader`] for the ingestion thread and a writer for the actuator
//! adapter.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read};
use std::path::Path;

use log::{info, warn};

use crate::app::ports::EventSource;
use crate::error::{HardwareError, Result};

/// Longest line kept before a newline arrives.
pub const MAX_LINE: usize = 1024;

/// Open `path` and split it into reader and writer halves.
pub fn open(path: &Path) -> Result<(LineReader<File>, File)> {
    let file = OpenOptions::new().read(true).write(true).open(path)?;
    let writer = file.try_clone()?;
    info!("Serial: opened {}", path.display());
    Ok((LineReader::new(file), writer))
}

/// Splits a byte stream into text lines.
pub struct LineReader<R> {
    inner: R,
    pending: Vec<u8>,
    scratch: [u8; 256],
}

impl<R: Read> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            pending: Vec::with_capacity(MAX_LINE),
            scratch: [0; 256],
        }
    }

    fn take_line(&mut self) -> Option<String> {
        let end = self.pending.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.pending.drain(..=end).collect();
        // Non-ASCII bytes are line noise.
        let text: String = line
            .iter()
            .filter(|b| b.is_ascii() && **b != b'\n' && **b != b'\r')
            .map(|&b| char::from(b))
            .collect();
        Some(text)
    }
}

impl<R: Read> EventSource for LineReader<R> {
    fn read_line(&mut self) -> core::result::Result<Option<String>, HardwareError> {
        if let Some(line) = self.take_line() {
            return Ok(Some(line));
        }
        match self.inner.read(&mut self.scratch) {
            Ok(0) => Ok(None),
            Ok(n) => {
                self.pending.extend_from_slice(&self.scratch[..n]);
                if self.pending.len() > MAX_LINE && !self.pending.contains(&b'\n') {
                    warn!("Serial: dropping {} bytes without a line break", self.pending.len());
                    self.pending.clear();
                }
                Ok(self.take_line())
            }
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut
                ) =>
            {
                Ok(None)
            }
            Err(e) => Err(HardwareError::Read(e.kind())),
        }
    }
}
