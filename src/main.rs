//! BehaviorBox command-line entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │  ingest thread   LineReader ─▶ SensorRegistry ─▶ CsvSensorLog   │
//! │                                    │                            │
//! │  session thread  Session ◀─────────┤ ─▶ SerialActuator          │
//! │                    │               │                            │
//! │  main thread     TelemetryPump ◀───┘ (50 ms) · Ctrl-C · results │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{error, info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;

use behaviorbox::adapters::event_log::CsvSensorLog;
use behaviorbox::adapters::hardware::SerialActuator;
use behaviorbox::adapters::log_sink::LogEventSink;
use behaviorbox::adapters::results_csv::CsvResultsSink;
use behaviorbox::adapters::serial;
use behaviorbox::adapters::telemetry::{LogTelemetrySink, TelemetryPump};
use behaviorbox::adapters::time::SessionClock;
use behaviorbox::adapters::utils::{safe_filename, session_dir};
use behaviorbox::app::ports::ResultsSink;
use behaviorbox::config::{Protocol, ProtocolPlan};
use behaviorbox::ingest::{Ingestor, join_with_grace};
use behaviorbox::sensors::SensorRegistry;
use behaviorbox::session::{Session, layout_for};
use behaviorbox::stop::StopSignal;

const TELEMETRY_PERIOD: Duration = Duration::from_millis(50);
const INGEST_GRACE: Duration = Duration::from_secs(1);

/// Run a training protocol on the behavior box.
#[derive(Parser, Debug)]
#[command(name = "behaviorbox", version, long_about = None)]
struct Args {
    /// Serial device of the apparatus (line settings preconfigured)
    #[arg(short, long)]
    device: PathBuf,

    /// Protocol preset: stage1..stage4, social1..social4
    #[arg(short, long, value_parser = parse_protocol)]
    protocol: Protocol,

    /// Animal identifier used in the output directory name
    #[arg(short, long)]
    animal: String,

    /// Root directory for session outputs
    #[arg(long, default_value = "data")]
    out_dir: PathBuf,

    /// JSON file overriding the preset's configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seed for port selection and ITI draws
    #[arg(long)]
    seed: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn parse_protocol(s: &str) -> Result<Protocol, String> {
    s.parse().map_err(|e| format!("{e}"))
}

fn load_plan(args: &Args) -> Result<(String, ProtocolPlan)> {
    match &args.config {
        None => {
            let plan = args.protocol.plan();
            plan.validate()?;
            Ok((args.protocol.to_string(), plan))
        }
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("reading protocol config {}", path.display()))?;
            let plan = ProtocolPlan::from_json(&json)
                .with_context(|| format!("loading protocol config {}", path.display()))?;
            Ok((format!("{} (custom)", args.protocol), plan))
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_default_env()
        .filter_level(if args.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    let (protocol, plan) = load_plan(&args)?;
    info!(
        "BehaviorBox v{}: protocol {protocol}, animal {}",
        env!("CARGO_PKG_VERSION"),
        args.animal
    );

    // ── Outputs ───────────────────────────────────────────────
    let clock = SessionClock::start();
    let dir = session_dir(&args.out_dir, &args.animal, &clock.date_stamp())
        .with_context(|| format!("creating output directory under {}", args.out_dir.display()))?;
    let sensor_log = CsvSensorLog::open(&safe_filename(&dir, "sensor_events", "csv"))
        .context("opening sensor event log")?;
    let results_path = safe_filename(&dir, "trials", "csv");

    // ── Stop latch ────────────────────────────────────────────
    let stop = StopSignal::new();
    let on_signal = stop.clone();
    ctrlc::set_handler(move || {
        info!("Shutdown signal received...");
        on_signal.trigger();
    })?;

    // ── Serial link + ingestion ───────────────────────────────
    let (reader, writer) = serial::open(&args.device)
        .with_context(|| format!("opening serial device {}", args.device.display()))?;
    let registry = Arc::new(SensorRegistry::new());
    let ingest = Ingestor::new(reader, sensor_log, Arc::clone(&registry), clock, stop.clone())
        .spawn()
        .context("spawning ingestion thread")?;

    // ── Session ───────────────────────────────────────────────
    let rng = args.seed.map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
    let mut session = Session::new(
        Arc::clone(&registry),
        SerialActuator::new(writer),
        LogEventSink::new(),
        stop.clone(),
        rng,
    );
    let results = session.results();
    let session_plan = plan.clone();
    let session_thread = thread::Builder::new()
        .name("session".into())
        .spawn(move || session.run(&protocol, &session_plan))
        .context("spawning session thread")?;

    // ── Live telemetry until the session ends ─────────────────
    let mut pump =
        TelemetryPump::new(Arc::clone(&registry), results.clone(), LogTelemetrySink::new());
    while !session_thread.is_finished() {
        pump.tick();
        thread::sleep(TELEMETRY_PERIOD);
    }
    pump.tick();

    let outcome = session_thread
        .join()
        .map_err(|_| anyhow!("session thread panicked"))?;

    // ── Teardown ──────────────────────────────────────────────
    stop.trigger();
    match join_with_grace(ingest, INGEST_GRACE) {
        Some(Ok(stats)) => info!("Ingest: {} events from {} lines", stats.events, stats.lines),
        Some(Err(e)) => warn!("Ingest ended with fault: {e}"),
        None => {}
    }

    CsvResultsSink::new(&results_path)
        .write_results(layout_for(&plan), &results.snapshot())
        .context("writing results")?;

    if let Err(e) = outcome {
        error!("Session failed: {e}");
        return Err(e.into());
    }
    info!("Session complete, outputs in {}", dir.display());
    Ok(())
}
