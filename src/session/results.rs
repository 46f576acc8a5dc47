//! Results log.
//!
//! An append-only sequence of [`TrialRecord`]s with a single owner, the
//! running session.  The owner assigns every record its 1-based trial
//! number at append time; records are never changed afterwards.  Other
//! threads observe the log through a read-only [`ResultsReader`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::sensors::Port;

/// Trials per block in the per-block hit rate.
pub const BLOCK_SIZE: usize = 10;

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// One row of the results file.  Fields a protocol does not use stay `None`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrialRecord {
    pub trial_num: u32,
    pub period: Option<String>,
    pub port: Option<Port>,
    #[serde(rename = "forced_port")]
    pub forced: Option<bool>,
    #[serde(rename = "reward_triggered")]
    pub rewarded: Option<bool>,
    pub trial_start: Option<DateTime<Local>>,
    pub trial_end: Option<DateTime<Local>>,
    #[serde(rename = "rt")]
    pub rt_secs: Option<f64>,
    #[serde(rename = "iti")]
    pub iti_secs: Option<f64>,
    #[serde(rename = "sampling_time")]
    pub sampling_secs: Option<f64>,
}

impl TrialRecord {
    /// A sampling-interval record: only the accumulated dwell is set.
    pub fn sampling(dwell: Duration) -> Self {
        Self {
            sampling_secs: Some(dwell.as_secs_f64()),
            ..Self::default()
        }
    }

    pub fn with_period(mut self, label: impl Into<String>) -> Self {
        self.period = Some(label.into());
        self
    }

    /// Render one column for the tabular sink.  Empty for `None`.
    pub fn field(&self, column: &str) -> String {
        fn opt<T: ToString>(v: &Option<T>) -> String {
            v.as_ref().map(ToString::to_string).unwrap_or_default()
        }
        fn secs(v: Option<f64>) -> String {
            v.map(|s| format!("{s:.3}")).unwrap_or_default()
        }
        fn time(v: Option<DateTime<Local>>) -> String {
            v.map(|t| t.format("%Y-%m-%dT%H:%M:%S%.6f").to_string())
                .unwrap_or_default()
        }

        match column {
            "trial_num" => self.trial_num.to_string(),
            "period" => opt(&self.period),
            "port" => opt(&self.port),
            "forced_port" => opt(&self.forced),
            "reward_triggered" => opt(&self.rewarded),
            "trial_start" => time(self.trial_start),
            "trial_end" => time(self.trial_end),
            "rt" => secs(self.rt_secs),
            "iti" => secs(self.iti_secs),
            "sampling_time" => secs(self.sampling_secs),
            _ => String::new(),
        }
    }
}

/// Column set of the results file, one per session variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordLayout {
    Classic,
    Composite,
    Social,
}

impl RecordLayout {
    pub const fn columns(self) -> &'static [&'static str] {
        match self {
            Self::Classic => &[
                "trial_num",
                "port",
                "forced_port",
                "reward_triggered",
                "trial_start",
                "trial_end",
                "rt",
                "iti",
            ],
            Self::Composite => &[
                "trial_num",
                "period",
                "port",
                "forced_port",
                "reward_triggered",
                "rt",
                "sampling_time",
                "trial_start",
                "trial_end",
                "iti",
            ],
            Self::Social => &[
                "trial_num",
                "port",
                "trial_start",
                "trial_end",
                "rt",
                "iti",
                "reward_triggered",
                "sampling_time",
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// Log + reader
// ---------------------------------------------------------------------------

/// The owning, append-only results log.  Not `Clone`: there is one writer.
#[derive(Debug, Default)]
pub struct ResultsLog {
    records: Arc<RwLock<Vec<TrialRecord>>>,
}

impl ResultsLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `record`, assigning the next trial number.  Returns it.
    pub fn append(&mut self, mut record: TrialRecord) -> u32 {
        let mut records = self.records.write();
        let next = u32::try_from(records.len()).map_or(u32::MAX, |n| n.saturating_add(1));
        record.trial_num = next;
        records.push(record);
        next
    }

    /// Trial number the next append will receive.
    pub fn next_trial_num(&self) -> u32 {
        u32::try_from(self.records.read().len()).map_or(u32::MAX, |n| n.saturating_add(1))
    }

    pub fn reader(&self) -> ResultsReader {
        ResultsReader {
            records: Arc::clone(&self.records),
        }
    }
}

/// Read-only handle, safe to poll from any thread.
#[derive(Debug, Clone)]
pub struct ResultsReader {
    records: Arc<RwLock<Vec<TrialRecord>>>,
}

impl ResultsReader {
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last(&self) -> Option<TrialRecord> {
        self.records.read().last().cloned()
    }

    /// Copy of every record appended so far.
    pub fn snapshot(&self) -> Vec<TrialRecord> {
        self.records.read().clone()
    }

    pub fn summary(&self) -> PerformanceSummary {
        PerformanceSummary::from_records(&self.records.read())
    }
}

// ---------------------------------------------------------------------------
// Performance summary
// ---------------------------------------------------------------------------

/// Aggregate over records that carry an outcome.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PerformanceSummary {
    /// Records with an outcome (sampling rows excluded).
    pub trials: usize,
    pub rewarded: usize,
    pub hit_rate: f64,
    /// Mean reaction time of rewarded trials, seconds.
    pub mean_rt_secs: Option<f64>,
    /// Hit rate of each consecutive block of [`BLOCK_SIZE`] trials; the
    /// final block may be partial.
    pub block_hit_rates: Vec<f64>,
}

impl PerformanceSummary {
    pub fn from_records(records: &[TrialRecord]) -> Self {
        let outcomes: Vec<(bool, Option<f64>)> = records
            .iter()
            .filter_map(|r| r.rewarded.map(|hit| (hit, r.rt_secs)))
            .collect();

        let trials = outcomes.len();
        let rewarded = outcomes.iter().filter(|(hit, _)| *hit).count();
        let rewarded_rts: Vec<f64> = outcomes
            .iter()
            .filter(|(hit, _)| *hit)
            .filter_map(|(_, rt)| *rt)
            .collect();

        Self {
            trials,
            rewarded,
            hit_rate: ratio(rewarded, trials),
            mean_rt_secs: (!rewarded_rts.is_empty())
                .then(|| rewarded_rts.iter().sum::<f64>() / rewarded_rts.len() as f64),
            block_hit_rates: outcomes
                .chunks(BLOCK_SIZE)
                .map(|block| ratio(block.iter().filter(|(hit, _)| *hit).count(), block.len()))
                .collect(),
        }
    }
}

fn ratio(n: usize, d: usize) -> f64 {
    if d == 0 { 0.0 } else { n as f64 / d as f64 }
}
