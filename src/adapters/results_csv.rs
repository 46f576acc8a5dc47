//! CSV results sink: implements [`ResultsSink`].
//!
//! Writes the whole results log in one go with the column set of the
//! session variant.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::info;

use super::utils::csv_field;
use crate::app::ports::ResultsSink;
use crate::error::Result;
use crate::session::results::{RecordLayout, TrialRecord};

pub struct CsvResultsSink {
    path: PathBuf,
}

impl CsvResultsSink {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl ResultsSink for CsvResultsSink {
    fn write_results(&mut self, layout: RecordLayout, records: &[TrialRecord]) -> Result<()> {
        let mut out = BufWriter::new(File::create(&self.path)?);
        let columns = layout.columns();
        writeln!(out, "{}", columns.join(","))?;
        for record in records {
            let row: Vec<String> = columns
                .iter()
                .map(|c| csv_field(&record.field(c)).into_owned())
                .collect();
            writeln!(out, "{}", row.join(","))?;
        }
        out.flush()?;
        info!("Results: {} rows written to {}", records.len(), self.path.display());
        Ok(())
    }
}
