//! Single-trial scenarios on the trial machine.

use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;

use behaviorbox::app::events::AppEvent;
use behaviorbox::config::{ProtocolConfig, ResponseCriterion};
use behaviorbox::policy::Selection;
use behaviorbox::sensors::{Channel, Port, SensorRegistry};
use behaviorbox::session::results::ResultsLog;
use behaviorbox::stop::StopSignal;
use behaviorbox::trial::{InterruptedTrials, TrialMachine, TrialRig, TrialState, run_trial};

use crate::mock_hw::{MockHardware, RecordingSink, SensorScript};

fn fast_config() -> ProtocolConfig {
    ProtocolConfig {
        hold_duration_ms: 100,
        response_deadline_ms: Some(1_000),
        reward_pulse_ms: 30,
        iti_range_ms: (10, 20),
        ..ProtocolConfig::stage_phase2()
    }
}

fn transitions(sink: &RecordingSink) -> Vec<(TrialState, TrialState)> {
    sink.events
        .iter()
        .filter_map(|e| match e {
            AppEvent::StateChanged { from, to } => Some((*from, *to)),
            _ => None,
        })
        .collect()
}

fn secs(d: Duration) -> f64 {
    d.as_secs_f64()
}

#[test]
fn sustained_hold_is_rewarded_with_one_pulse() {
    let config = fast_config();
    let registry = Arc::new(SensorRegistry::new());
    let stop = StopSignal::new();
    let mut hw = MockHardware::new();
    let mut sink = RecordingSink::new();

    let script = SensorScript::new().trigger(200, Channel::A).play(&registry, &stop);
    let response = TrialMachine::new(&config)
        .respond(Port::A, &registry, &mut hw, &mut sink, &stop.token())
        .unwrap();
    script.join().unwrap();

    assert!(response.rewarded);
    assert!(!response.interrupted);
    let rt = secs(response.reaction_time);
    assert!((0.19..0.30).contains(&rt), "rt = {rt}");

    let pulses = hw.reward_pulses();
    assert_eq!(pulses.len(), 1);
    assert_eq!(pulses[0].0, Port::A);
    assert!(pulses[0].1 >= Duration::from_millis(30));
    assert!(!hw.led_on(Port::A));

    assert_eq!(
        transitions(&sink),
        vec![
            (TrialState::Presenting, TrialState::AwaitingResponse),
            (TrialState::AwaitingResponse, TrialState::Rewarded),
        ]
    );
}

#[test]
fn broken_hold_runs_to_deadline_unrewarded() {
    let config = fast_config();
    let registry = Arc::new(SensorRegistry::new());
    let stop = StopSignal::new();
    let mut hw = MockHardware::new();
    let mut sink = RecordingSink::new();

    let script = SensorScript::new()
        .trigger(200, Channel::A)
        .clear(250, Channel::A)
        .play(&registry, &stop);
    let response = TrialMachine::new(&config)
        .respond(Port::A, &registry, &mut hw, &mut sink, &stop.token())
        .unwrap();
    script.join().unwrap();

    assert!(!response.rewarded);
    assert!(!response.interrupted);
    assert_eq!(response.reaction_time, Duration::from_secs(1));
    assert!(hw.reward_pulses().is_empty());
    assert!(!hw.led_on(Port::A));
    assert_eq!(
        transitions(&sink).last(),
        Some(&(TrialState::AwaitingResponse, TrialState::Unrewarded))
    );
}

#[test]
fn hold_started_before_deadline_may_finish_after_it() {
    let config = ProtocolConfig {
        response_deadline_ms: Some(300),
        ..fast_config()
    };
    let registry = Arc::new(SensorRegistry::new());
    let stop = StopSignal::new();
    let mut hw = MockHardware::new();

    let script = SensorScript::new().trigger(250, Channel::B).play(&registry, &stop);
    let response = TrialMachine::new(&config)
        .respond(Port::B, &registry, &mut hw, &mut RecordingSink::new(), &stop.token())
        .unwrap();
    script.join().unwrap();

    assert!(response.rewarded);
    assert!(response.reaction_time < Duration::from_millis(300));
}

#[test]
fn poke_at_other_port_is_ignored() {
    let config = ProtocolConfig {
        response_deadline_ms: Some(300),
        ..fast_config()
    };
    let registry = Arc::new(SensorRegistry::new());
    let stop = StopSignal::new();
    let mut hw = MockHardware::new();

    let script = SensorScript::new().trigger(50, Channel::B).play(&registry, &stop);
    let response = TrialMachine::new(&config)
        .respond(Port::A, &registry, &mut hw, &mut RecordingSink::new(), &stop.token())
        .unwrap();
    script.join().unwrap();

    assert!(!response.rewarded);
    assert_eq!(response.reaction_time, Duration::from_millis(300));
}

#[test]
fn simple_criterion_rewards_first_trigger() {
    let config = ProtocolConfig {
        criterion: ResponseCriterion::Simple,
        response_deadline_ms: None,
        ..fast_config()
    };
    let registry = Arc::new(SensorRegistry::new());
    let stop = StopSignal::new();
    let mut hw = MockHardware::new();

    let script = SensorScript::new()
        .trigger(100, Channel::A)
        .clear(110, Channel::A)
        .play(&registry, &stop);
    let response = TrialMachine::new(&config)
        .respond(Port::A, &registry, &mut hw, &mut RecordingSink::new(), &stop.token())
        .unwrap();
    script.join().unwrap();

    assert!(response.rewarded);
    let rt = secs(response.reaction_time);
    assert!((0.09..0.15).contains(&rt), "rt = {rt}");
    assert_eq!(hw.reward_pulses().len(), 1);
}

#[test]
fn stop_without_deadline_ends_unrewarded_with_zero_rt() {
    let config = ProtocolConfig {
        response_deadline_ms: None,
        ..fast_config()
    };
    let registry = Arc::new(SensorRegistry::new());
    let stop = StopSignal::new();
    let mut hw = MockHardware::new();

    let script = SensorScript::new().stop_at(150).play(&registry, &stop);
    let response = TrialMachine::new(&config)
        .respond(Port::A, &registry, &mut hw, &mut RecordingSink::new(), &stop.token())
        .unwrap();
    script.join().unwrap();

    assert!(!response.rewarded);
    assert!(response.interrupted);
    assert_eq!(response.reaction_time, Duration::ZERO);
    assert!(!hw.led_on(Port::A));
}

#[test]
fn full_trial_records_and_rests() {
    let config = fast_config();
    let registry = Arc::new(SensorRegistry::new());
    let stop = StopSignal::new();
    let mut hw = MockHardware::new();
    let mut sink = RecordingSink::new();
    let mut results = ResultsLog::new();
    let mut rng = StdRng::seed_from_u64(1);

    let script = SensorScript::new().trigger(50, Channel::B).play(&registry, &stop);
    let mut rig = TrialRig {
        registry: &registry,
        actuators: &mut hw,
        events: &mut sink,
        results: &mut results,
    };
    let run = run_trial(
        &config,
        &mut rig,
        Selection { port: Port::B, forced: true },
        None,
        InterruptedTrials::Record,
        &mut rng,
        &stop.token(),
    )
    .unwrap();
    script.join().unwrap();

    assert_eq!(run.trial, Some(1));
    assert!(!run.rest_cancelled);

    let records = results.reader().snapshot();
    assert_eq!(records.len(), 1);
    let rec = &records[0];
    assert_eq!(rec.port, Some(Port::B));
    assert_eq!(rec.forced, Some(true));
    assert_eq!(rec.rewarded, Some(true));
    let iti = rec.iti_secs.unwrap();
    assert!((0.010..=0.020).contains(&iti), "iti = {iti}");

    let states: Vec<TrialState> = transitions(&sink).into_iter().map(|(_, to)| to).collect();
    assert_eq!(
        states,
        vec![
            TrialState::AwaitingResponse,
            TrialState::Rewarded,
            TrialState::Recording,
            TrialState::Iti,
        ]
    );
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::TrialCompleted { trial: 1, rewarded: true, .. })),
        1
    );
}

#[test]
fn dropped_trial_leaves_no_record() {
    let config = ProtocolConfig {
        response_deadline_ms: None,
        ..fast_config()
    };
    let registry = Arc::new(SensorRegistry::new());
    let stop = StopSignal::new();
    let mut hw = MockHardware::new();
    let mut sink = RecordingSink::new();
    let mut results = ResultsLog::new();
    let mut rng = StdRng::seed_from_u64(2);

    let cancel = stop.token_for(Duration::from_millis(100));
    let mut rig = TrialRig {
        registry: &registry,
        actuators: &mut hw,
        events: &mut sink,
        results: &mut results,
    };
    let run = run_trial(
        &config,
        &mut rig,
        Selection { port: Port::A, forced: false },
        Some("CC1"),
        InterruptedTrials::Drop,
        &mut rng,
        &cancel,
    )
    .unwrap();

    assert_eq!(run.trial, None);
    assert!(run.response.interrupted);
    assert!(results.reader().is_empty());
    assert!(!stop.is_set());
    assert!(!hw.led_on(Port::A));
}
