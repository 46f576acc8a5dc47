//! CSV sensor-event log: implements [`SensorLog`].
//!
//! One row per accepted event, written and flushed before `record`
//! returns.  The header is written only when the file is new or empty, so
//! an existing log is appended to.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use log::info;

use super::utils::csv_field;
use crate::app::ports::{SensorLog, SensorLogEntry};
use crate::error::Result;

pub const HEADER: &str = "timestamp,elapsed_s,channel,state,raw";

pub struct CsvSensorLog {
    file: File,
}

impl CsvSensorLog {
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        if file.metadata()?.len() == 0 {
            writeln!(file, "{HEADER}")?;
            file.flush()?;
        }
        info!("Sensor log: {}", path.display());
        Ok(Self { file })
    }
}

impl SensorLog for CsvSensorLog {
    fn record(&mut self, entry: &SensorLogEntry) -> Result<()> {
        let line = format!(
            "{},{:.3},{},{},{}\n",
            entry.timestamp.format("%Y-%m-%dT%H:%M:%S%.6f"),
            entry.elapsed.as_secs_f64(),
            entry.channel,
            entry.state,
            csv_field(&entry.raw),
        );
        self.file.write_all(line.as_bytes())?;
        self.file.flush()?;
        Ok(())
    }
}
