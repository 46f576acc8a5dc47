//! Ingestion thread end to end: lines in, registry and CSV log out.

use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use behaviorbox::adapters::event_log::{CsvSensorLog, HEADER};
use behaviorbox::adapters::time::SessionClock;
use behaviorbox::error::{Error, HardwareError};
use behaviorbox::ingest::{Ingestor, join_with_grace};
use behaviorbox::sensors::{Channel, SensorRegistry, SensorState};
use behaviorbox::stop::StopSignal;

use crate::mock_hw::ChannelSource;

fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    false
}

#[test]
fn events_reach_registry_and_log_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sensor_events.csv");
    let registry = Arc::new(SensorRegistry::new());
    let stop = StopSignal::new();
    let (tx, source) = ChannelSource::new();

    let log = CsvSensorLog::open(&path).unwrap();
    let clock = SessionClock::start();
    let ingest = Ingestor::new(source, log, Arc::clone(&registry), clock, stop.clone());
    let handle = ingest.spawn().unwrap();

    for line in [
        "Arduino boot",
        "Beambreak triggered at Port A",
        "sensor door triggered",
        "",
        "Beambreak cleared at Port A",
    ] {
        tx.send(line.to_owned()).unwrap();
    }

    assert!(wait_for(|| registry.sequence() >= 3));
    assert_eq!(registry.state(Channel::A), SensorState::Cleared);
    assert_eq!(registry.state(Channel::Door), SensorState::Triggered);
    assert!(registry.get(Channel::A).changed_at.is_some());

    stop.trigger();
    let stats = join_with_grace(handle, Duration::from_secs(1))
        .expect("ingest thread finished")
        .unwrap();
    assert_eq!(stats.events, 3);
    assert_eq!(stats.lines, 5);
    assert_eq!(stats.log_failures, 0);

    let text = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], HEADER);
    assert!(lines[1].ends_with(",A,triggered,Beambreak triggered at Port A"), "{}", lines[1]);
    assert!(lines[2].contains(",door,triggered,"), "{}", lines[2]);
    assert!(lines[3].contains(",A,cleared,"), "{}", lines[3]);
}

#[test]
fn lost_link_latches_stop() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(SensorRegistry::new());
    let stop = StopSignal::new();
    let (tx, source) = ChannelSource::new();

    let log = CsvSensorLog::open(&dir.path().join("events.csv")).unwrap();
    let handle = Ingestor::new(source, log, registry, SessionClock::start(), stop.clone())
        .spawn()
        .unwrap();

    drop(tx);
    assert!(wait_for(|| stop.is_set()));
    let result = join_with_grace(handle, Duration::from_secs(1)).expect("ingest thread finished");
    assert_eq!(
        result,
        Err(Error::Hardware(HardwareError::Read(std::io::ErrorKind::BrokenPipe)))
    );
}

#[test]
fn existing_log_is_appended_without_second_header() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sensor_events.csv");

    for _ in 0..2 {
        let registry = Arc::new(SensorRegistry::new());
        let stop = StopSignal::new();
        let (tx, source) = ChannelSource::new();
        let log = CsvSensorLog::open(&path).unwrap();
        let clock = SessionClock::start();
        let ingest = Ingestor::new(source, log, Arc::clone(&registry), clock, stop.clone());
        let handle = ingest.spawn().unwrap();
        tx.send("sensor table triggered".to_owned()).unwrap();
        assert!(wait_for(|| registry.state(Channel::Table).is_triggered()));
        stop.trigger();
        assert!(join_with_grace(handle, Duration::from_secs(1)).is_some());
    }

    let text = fs::read_to_string(&path).unwrap();
    assert_eq!(text.lines().filter(|l| *l == HEADER).count(), 1);
    assert_eq!(text.lines().count(), 3);
}
