//! Whole-session runs: classic, composite, social, and the shutdown path.

use std::sync::Arc;
use std::time::Instant;

use rand::SeedableRng;
use rand::rngs::StdRng;

use behaviorbox::app::events::AppEvent;
use behaviorbox::config::{CompositeConfig, ProtocolConfig, ProtocolPlan, SocialConfig};
use behaviorbox::drivers::table::TablePosition;
use behaviorbox::error::{Error, HardwareError};
use behaviorbox::sensors::{Channel, Port, SensorRegistry, SensorState};
use behaviorbox::session::Session;
use behaviorbox::stop::StopSignal;

use crate::mock_hw::{ActuatorCall, MockHardware, RecordingSink, SensorScript};

fn session(
    registry: &Arc<SensorRegistry>,
    hw: MockHardware,
    stop: &StopSignal,
) -> Session<MockHardware, RecordingSink> {
    Session::new(
        Arc::clone(registry),
        hw,
        RecordingSink::new(),
        stop.clone(),
        StdRng::seed_from_u64(42),
    )
}

fn quick_classic() -> ProtocolConfig {
    ProtocolConfig {
        response_deadline_ms: Some(100),
        reward_pulse_ms: 20,
        iti_range_ms: (10, 20),
        trial_limit: Some(3),
        ..ProtocolConfig::stage_phase2()
    }
}

/// The tail every session ends with: all off, door closed.
fn assert_shutdown_tail(calls: &[ActuatorCall]) {
    let mut expected = Vec::new();
    for port in [Port::A, Port::B, Port::C] {
        expected.push(ActuatorCall::Led { port, on: false });
        expected.push(ActuatorCall::Valve { port, open: false });
    }
    expected.push(ActuatorCall::Door { open: false });
    assert!(calls.len() >= expected.len());
    assert_eq!(&calls[calls.len() - expected.len()..], expected.as_slice());
}

// ── Classic ───────────────────────────────────────────────────

#[test]
fn classic_stops_at_trial_limit() {
    let registry = Arc::new(SensorRegistry::new());
    let stop = StopSignal::new();
    let mut s = session(&registry, MockHardware::new(), &stop);

    s.run("stage3", &ProtocolPlan::Classic(quick_classic())).unwrap();

    let records = s.results().snapshot();
    assert_eq!(records.len(), 3);
    for (i, rec) in records.iter().enumerate() {
        assert_eq!(rec.trial_num, i as u32 + 1);
        assert_eq!(rec.rewarded, Some(false));
        assert_eq!(rec.rt_secs, Some(0.1));
        assert!(matches!(rec.port, Some(Port::A | Port::B)));
    }
    assert!(!stop.is_set());
    assert_shutdown_tail(&s.actuators().commands());
    assert_eq!(
        s.events().count(|e| matches!(e, AppEvent::SessionEnded(sum) if sum.trials == 3)),
        1
    );
}

#[test]
fn classic_records_rewarded_trial() {
    let registry = Arc::new(SensorRegistry::new());
    let stop = StopSignal::new();
    let config = ProtocolConfig {
        ports: heapless::Vec::from_slice(&[Port::C]).unwrap(),
        trial_limit: Some(1),
        response_deadline_ms: Some(1_000),
        ..quick_classic()
    };
    let mut s = session(&registry, MockHardware::new(), &stop);

    let script = SensorScript::new().trigger(100, Channel::C).play(&registry, &stop);
    s.run("social1", &ProtocolPlan::Classic(config)).unwrap();
    script.join().unwrap();

    let records = s.results().snapshot();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].port, Some(Port::C));
    assert_eq!(records[0].rewarded, Some(true));
    assert_eq!(s.actuators().reward_pulses().len(), 1);
}

#[test]
fn stop_mid_trial_records_interrupted_trial() {
    let registry = Arc::new(SensorRegistry::new());
    let stop = StopSignal::new();
    let config = ProtocolConfig {
        response_deadline_ms: None,
        trial_limit: None,
        ..quick_classic()
    };
    let mut s = session(&registry, MockHardware::new(), &stop);

    let script = SensorScript::new().stop_at(150).play(&registry, &stop);
    s.run("stage1", &ProtocolPlan::Classic(config)).unwrap();
    script.join().unwrap();

    let records = s.results().snapshot();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].rewarded, Some(false));
    assert_eq!(records[0].rt_secs, Some(0.0));
    assert_shutdown_tail(&s.actuators().commands());
}

#[test]
fn hardware_fault_latches_stop_and_still_cleans_up() {
    let registry = Arc::new(SensorRegistry::new());
    let stop = StopSignal::new();
    let mut s = session(&registry, MockHardware::failing_after(0), &stop);

    let err = s.run("stage2", &ProtocolPlan::Classic(quick_classic())).unwrap_err();

    assert_eq!(err, Error::Hardware(HardwareError::Write(std::io::ErrorKind::BrokenPipe)));
    assert!(stop.is_set());
    assert!(s.results().is_empty());
    assert_eq!(s.events().count(|e| matches!(e, AppEvent::SessionEnded(_))), 1);
}

#[test]
fn invalid_plan_is_rejected_before_any_trial() {
    let registry = Arc::new(SensorRegistry::new());
    let stop = StopSignal::new();
    let config = ProtocolConfig {
        max_consecutive_same_port: 0,
        ..quick_classic()
    };
    let mut s = session(&registry, MockHardware::new(), &stop);

    assert!(matches!(
        s.run("custom", &ProtocolPlan::Classic(config)),
        Err(Error::Config(_))
    ));
    assert!(s.results().is_empty());
    assert!(!stop.is_set());
    assert_shutdown_tail(&s.actuators().commands());
}

// ── Composite ─────────────────────────────────────────────────

#[test]
fn composite_runs_schedule_and_returns_table_home() {
    let registry = Arc::new(SensorRegistry::new());
    let stop = StopSignal::new();
    let config = CompositeConfig {
        conditioning: ProtocolConfig {
            response_deadline_ms: Some(200),
            iti_range_ms: (20, 40),
            trial_limit: None,
            ..quick_classic()
        },
        conditioning_burst_secs: 1,
        sampling_secs: 1,
        repetitions: 1,
        ..CompositeConfig::default()
    };
    // Animal sits on the table for the whole run.
    registry.update(Channel::Table, SensorState::Triggered, Instant::now());

    let mut s = session(&registry, MockHardware::new(), &stop);
    s.run("composite", &ProtocolPlan::Composite(config)).unwrap();

    let records = s.results().snapshot();
    let periods: Vec<&str> = records
        .iter()
        .filter_map(|r| r.period.as_deref())
        .collect();
    let mut order: Vec<&str> = periods.clone();
    order.dedup();
    assert_eq!(order, vec!["CC1", "Sampling_1", "CC2", "Sampling_2"]);

    for (i, rec) in records.iter().enumerate() {
        assert_eq!(rec.trial_num, i as u32 + 1);
    }

    let sampling: Vec<f64> = records
        .iter()
        .filter(|r| r.period.as_deref().is_some_and(|p| p.starts_with("Sampling")))
        .map(|r| {
            assert!(r.port.is_none());
            r.sampling_secs.unwrap()
        })
        .collect();
    assert_eq!(sampling.len(), 2);
    for dwell in sampling {
        assert!((0.9..=1.1).contains(&dwell), "dwell = {dwell}");
    }

    let hw = s.actuators();
    assert_eq!(hw.rotations(), vec![50, -50, -50, 50]);
    assert_eq!(hw.rotations().iter().sum::<i32>(), 0);
    assert_eq!(hw.door_commands(), vec![true, false, true, false, false]);
    assert_eq!(s.table_position(), TablePosition::HOME);
    assert_eq!(
        s.events().count(|e| matches!(e, AppEvent::PeriodStarted { .. })),
        4
    );
}

#[test]
fn composite_stop_skips_remaining_periods() {
    let registry = Arc::new(SensorRegistry::new());
    let stop = StopSignal::new();
    let config = CompositeConfig {
        conditioning: ProtocolConfig {
            response_deadline_ms: Some(100),
            trial_limit: None,
            ..quick_classic()
        },
        conditioning_burst_secs: 1,
        sampling_secs: 1,
        repetitions: 4,
        ..CompositeConfig::default()
    };
    let mut s = session(&registry, MockHardware::new(), &stop);

    let script = SensorScript::new().stop_at(300).play(&registry, &stop);
    s.run("composite", &ProtocolPlan::Composite(config)).unwrap();
    script.join().unwrap();

    assert!(s
        .results()
        .snapshot()
        .iter()
        .all(|r| r.period.as_deref() == Some("CC1")));
    assert!(s.actuators().rotations().is_empty());
    assert_eq!(s.events().count(|e| matches!(e, AppEvent::PeriodStarted { .. })), 1);
}

#[test]
fn oversized_sampling_period_is_rejected_and_outputs_shut_down() {
    let registry = Arc::new(SensorRegistry::new());
    let stop = StopSignal::new();
    let config = CompositeConfig {
        conditioning: quick_classic(),
        sampling_secs: u64::MAX,
        ..CompositeConfig::default()
    };
    let mut s = session(&registry, MockHardware::new(), &stop);

    assert!(matches!(
        s.run("composite", &ProtocolPlan::Composite(config)),
        Err(Error::Config(_))
    ));
    assert!(s.results().is_empty());
    let hw = s.actuators();
    assert_shutdown_tail(&hw.commands());
    assert_eq!(hw.door_commands(), vec![false]);
    assert!(hw.rotations().is_empty());
    assert_eq!(s.table_position(), TablePosition::HOME);
    assert_eq!(s.events().count(|e| matches!(e, AppEvent::PeriodStarted { .. })), 0);
}

#[test]
fn composite_blocked_doorway_times_out_and_session_continues() {
    let registry = Arc::new(SensorRegistry::new());
    let stop = StopSignal::new();
    let config = CompositeConfig {
        conditioning: ProtocolConfig {
            response_deadline_ms: Some(200),
            iti_range_ms: (20, 40),
            trial_limit: None,
            ..quick_classic()
        },
        conditioning_burst_secs: 1,
        sampling_secs: 1,
        repetitions: 1,
        door_clear_timeout_secs: Some(1),
        ..CompositeConfig::default()
    };
    // Doorway beam blocked for the whole run.
    registry.update(Channel::Door, SensorState::Triggered, Instant::now());

    let mut s = session(&registry, MockHardware::new(), &stop);
    // CC1 ends near 1 s, Sampling_1 near 2 s, the doorway wait near 3 s.
    let script = SensorScript::new().stop_at(3_500).play(&registry, &stop);
    s.run("composite", &ProtocolPlan::Composite(config)).unwrap();
    script.join().unwrap();

    assert_eq!(s.events().count(|e| matches!(e, AppEvent::DoorClearTimedOut)), 1);
    assert_eq!(
        s.events()
            .count(|e| matches!(e, AppEvent::PeriodStarted { label } if label == "CC2")),
        1
    );
    let sampling: Vec<_> = s
        .results()
        .snapshot()
        .into_iter()
        .filter(|r| r.period.as_deref() == Some("Sampling_1"))
        .collect();
    assert_eq!(sampling.len(), 1);
    assert_eq!(sampling[0].sampling_secs, Some(0.0));

    let hw = s.actuators();
    // Sampling open/close despite the blocked beam, then the shutdown close.
    assert_eq!(hw.door_commands(), vec![true, false, false]);
    assert_eq!(hw.rotations(), vec![50, -50]);
    assert_eq!(s.table_position(), TablePosition::HOME);
}

// ── Social ────────────────────────────────────────────────────

#[test]
fn social_trial_walks_the_handshake() {
    let registry = Arc::new(SensorRegistry::new());
    let stop = StopSignal::new();
    let config = SocialConfig {
        hold_duration_ms: 50,
        min_table_hold_ms: 100,
        reward_pulse_ms: 20,
        iti_range_ms: (10, 20),
        ..SocialConfig::social_phase2()
    };

    let script = SensorScript::new()
        .trigger(100, Channel::A)
        .clear(250, Channel::A)
        // too short, measured again
        .trigger(300, Channel::Table)
        .clear(350, Channel::Table)
        .trigger(400, Channel::Table)
        .clear(600, Channel::Table)
        .trigger(700, Channel::C)
        .clear(850, Channel::C)
        .stop_at(1_100);

    let mut s = session(&registry, MockHardware::new(), &stop);
    let handle = script.play(&registry, &stop);
    s.run("social2", &ProtocolPlan::Social(config)).unwrap();
    handle.join().unwrap();

    let records = s.results().snapshot();
    assert_eq!(records.len(), 1);
    let rec = &records[0];
    assert_eq!(rec.trial_num, 1);
    assert_eq!(rec.port, Some(Port::C));
    assert_eq!(rec.forced, None);
    assert_eq!(rec.rewarded, Some(true));
    let hold = rec.sampling_secs.unwrap();
    assert!((0.17..0.28).contains(&hold), "table hold = {hold}");
    let rt = rec.rt_secs.unwrap();
    assert!(rt < 0.2, "rt = {rt}");

    let hw = s.actuators();
    let pulses = hw.reward_pulses();
    assert_eq!(pulses.len(), 1);
    assert_eq!(pulses[0].0, Port::C);
    // Trial door open/close, then the shutdown close.
    assert_eq!(hw.door_commands(), vec![true, false, false]);
}

#[test]
fn social_first_poke_timeout_leaves_no_record() {
    let registry = Arc::new(SensorRegistry::new());
    let stop = StopSignal::new();
    let config = SocialConfig {
        first_deadline_ms: Some(100),
        iti_range_ms: (10, 20),
        ..SocialConfig::social_phase2()
    };

    let mut s = session(&registry, MockHardware::new(), &stop);
    let handle = SensorScript::new().stop_at(400).play(&registry, &stop);
    s.run("social2", &ProtocolPlan::Social(config)).unwrap();
    handle.join().unwrap();

    assert!(s.results().is_empty());
    let hw = s.actuators();
    assert!(hw.reward_pulses().is_empty());
    assert_eq!(hw.door_commands(), vec![false]);
    assert!(
        s.events()
            .count(|e| matches!(e, AppEvent::TrialStarted { .. }))
            >= 2
    );
}

#[test]
fn social_blocked_doorway_times_out_then_trial_completes() {
    let registry = Arc::new(SensorRegistry::new());
    let stop = StopSignal::new();
    let config = SocialConfig {
        hold_duration_ms: 50,
        min_table_hold_ms: 100,
        reward_pulse_ms: 20,
        iti_range_ms: (10, 20),
        door_clear_timeout_secs: Some(1),
        ..SocialConfig::social_phase2()
    };
    registry.update(Channel::Door, SensorState::Triggered, Instant::now());

    // Door opens near 500 ms and is closed anyway near 1500 ms.
    let script = SensorScript::new()
        .trigger(100, Channel::A)
        .clear(250, Channel::A)
        .trigger(300, Channel::Table)
        .clear(500, Channel::Table)
        .trigger(1_700, Channel::C)
        .clear(1_850, Channel::C)
        .stop_at(2_100);

    let mut s = session(&registry, MockHardware::new(), &stop);
    let handle = script.play(&registry, &stop);
    s.run("social2", &ProtocolPlan::Social(config)).unwrap();
    handle.join().unwrap();

    assert_eq!(s.events().count(|e| matches!(e, AppEvent::DoorClearTimedOut)), 1);
    let records = s.results().snapshot();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].port, Some(Port::C));
    assert_eq!(records[0].rewarded, Some(true));

    let hw = s.actuators();
    assert_eq!(hw.reward_pulses().len(), 1);
    assert_eq!(hw.door_commands(), vec![true, false, false]);
}

#[test]
fn social_second_poke_deadline_records_unrewarded_trial() {
    let registry = Arc::new(SensorRegistry::new());
    let stop = StopSignal::new();
    let config = SocialConfig {
        hold_duration_ms: 50,
        min_table_hold_ms: 100,
        second_deadline_ms: Some(100),
        reward_pulse_ms: 20,
        iti_range_ms: (10, 20),
        ..SocialConfig::social_phase2()
    };

    // No poke at C: the second deadline runs out near 600 ms.
    let script = SensorScript::new()
        .trigger(100, Channel::A)
        .clear(250, Channel::A)
        .trigger(300, Channel::Table)
        .clear(500, Channel::Table)
        .stop_at(900);

    let mut s = session(&registry, MockHardware::new(), &stop);
    let handle = script.play(&registry, &stop);
    s.run("social3", &ProtocolPlan::Social(config)).unwrap();
    handle.join().unwrap();

    let records = s.results().snapshot();
    assert_eq!(records.len(), 1);
    let rec = &records[0];
    assert_eq!(rec.port, Some(Port::C));
    assert_eq!(rec.rewarded, Some(false));
    assert_eq!(rec.rt_secs, Some(0.1));

    let hw = s.actuators();
    assert!(hw.reward_pulses().is_empty());
    assert!(!hw.led_on(Port::C));
    assert_eq!(hw.door_commands(), vec![true, false, false]);
}
