//! Protocol configuration.
//!
//! Every timing constant a protocol uses lives in a named field here.
//! Durations are stored as integer milliseconds (seconds for session-scale
//! values) so the structures serialise cleanly to JSON; accessor methods
//! hand out [`Duration`]s.
//!
//! [`Protocol`] names the presets shipped with the apparatus and
//! [`ProtocolPlan`] is what a session actually runs: a preset, or a JSON
//! override of one.

use core::fmt;
use core::str::FromStr;
use std::time::Duration;

use heapless::Vec as HVec;
use serde::{Deserialize, Serialize};

use crate::drivers::table::TablePosition;
use crate::error::{Error, Result};
use crate::sensors::Port;

/// Largest accepted anti-streak window.
pub const MAX_STREAK_LIMIT: u8 = 8;

/// Longest accepted conditioning burst or sampling interval.
pub const MAX_PERIOD_SECS: u64 = 24 * 3_600;

// ---------------------------------------------------------------------------
// Shared enums
// ---------------------------------------------------------------------------

/// What counts as a response while the stimulus is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseCriterion {
    /// Any triggered reading satisfies the trial.
    Simple,
    /// A triggered reading must also pass the hold detector.
    HoldGated,
}

/// Which port-selection rules apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionRule {
    /// Only the consecutive-same-port limit.
    ConsecutiveLimit,
    /// Consecutive limit plus forced correction after a skewed streak.
    AntiBias,
}

// ---------------------------------------------------------------------------
// Classic (single trial machine) protocol
// ---------------------------------------------------------------------------

/// Configuration of one trial machine and the session loop around it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    // --- Stimulus ---
    /// Ports the selector chooses from (one or two).
    pub ports: HVec<Port, 3>,
    pub criterion: ResponseCriterion,
    pub selection: SelectionRule,
    /// Longest permitted run of the same port.
    pub max_consecutive_same_port: u8,

    // --- Response ---
    /// Continuous trigger required by `HoldGated` (milliseconds).
    pub hold_duration_ms: u64,
    /// Response window from stimulus onset; `None` waits until stopped.
    pub response_deadline_ms: Option<u64>,

    // --- Reward ---
    /// Valve-open time per reward (milliseconds).
    pub reward_pulse_ms: u64,

    // --- Pacing ---
    /// Inter-trial interval drawn uniformly from this range (milliseconds).
    pub iti_range_ms: (u64, u64),
    pub trial_limit: Option<u32>,
    pub session_duration_secs: Option<u64>,

    // --- Polling ---
    pub response_poll_ms: u64,
    pub hold_poll_ms: u64,
    pub idle_poll_ms: u64,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self::stage_phase2()
    }
}

impl ProtocolConfig {
    /// Stage 1: any poke at the lit port is rewarded, no response window.
    pub fn stage_phase1() -> Self {
        Self {
            ports: ports(&[Port::A, Port::B]),
            criterion: ResponseCriterion::Simple,
            selection: SelectionRule::ConsecutiveLimit,
            max_consecutive_same_port: 3,
            hold_duration_ms: 0,
            response_deadline_ms: None,
            reward_pulse_ms: 150,
            iti_range_ms: (3_000, 6_000),
            trial_limit: Some(60),
            session_duration_secs: None,
            response_poll_ms: 10,
            hold_poll_ms: 5,
            idle_poll_ms: 50,
        }
    }

    /// Stage 2: 100 ms hold, 10 s response window, anti-bias selection.
    pub fn stage_phase2() -> Self {
        Self {
            ports: ports(&[Port::A, Port::B]),
            criterion: ResponseCriterion::HoldGated,
            selection: SelectionRule::AntiBias,
            max_consecutive_same_port: 3,
            hold_duration_ms: 100,
            response_deadline_ms: Some(10_000),
            reward_pulse_ms: 150,
            iti_range_ms: (5_000, 10_000),
            trial_limit: None,
            session_duration_secs: None,
            response_poll_ms: 10,
            hold_poll_ms: 5,
            idle_poll_ms: 50,
        }
    }

    /// Stage 3: as stage 2 with a 5 s response window.
    pub fn stage_phase3() -> Self {
        Self {
            response_deadline_ms: Some(5_000),
            ..Self::stage_phase2()
        }
    }

    /// Social stage 1: hold-gated pokes at port C only, one hour.
    pub fn social_phase1() -> Self {
        Self {
            ports: ports(&[Port::C]),
            criterion: ResponseCriterion::HoldGated,
            selection: SelectionRule::ConsecutiveLimit,
            max_consecutive_same_port: 3,
            hold_duration_ms: 100,
            response_deadline_ms: None,
            reward_pulse_ms: 150,
            iti_range_ms: (5_000, 10_000),
            trial_limit: None,
            session_duration_secs: Some(3_600),
            response_poll_ms: 10,
            hold_poll_ms: 5,
            idle_poll_ms: 50,
        }
    }

    pub fn hold_duration(&self) -> Duration {
        Duration::from_millis(self.hold_duration_ms)
    }

    pub fn response_deadline(&self) -> Option<Duration> {
        self.response_deadline_ms.map(Duration::from_millis)
    }

    pub fn reward_pulse(&self) -> Duration {
        Duration::from_millis(self.reward_pulse_ms)
    }

    pub fn iti_bounds(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.iti_range_ms.0),
            Duration::from_millis(self.iti_range_ms.1),
        )
    }

    pub fn session_duration(&self) -> Option<Duration> {
        self.session_duration_secs.map(Duration::from_secs)
    }

    pub fn response_poll(&self) -> Duration {
        Duration::from_millis(self.response_poll_ms)
    }

    pub fn hold_poll(&self) -> Duration {
        Duration::from_millis(self.hold_poll_ms)
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }

    /// Reject inconsistent values before a session starts.
    pub fn validate(&self) -> Result<()> {
        if self.ports.is_empty() {
            return Err(Error::Config("ports must not be empty"));
        }
        if self.ports.len() > 2 {
            return Err(Error::Config("at most two ports can alternate"));
        }
        if self.ports.len() == 2 && self.ports[0] == self.ports[1] {
            return Err(Error::Config("ports must be distinct"));
        }
        if self.ports.len() == 2 && self.ports[0].opposite() != Some(self.ports[1]) {
            return Err(Error::Config("two-port protocols must use ports A and B"));
        }
        if !(1..=MAX_STREAK_LIMIT).contains(&self.max_consecutive_same_port) {
            return Err(Error::Config("max_consecutive_same_port must be within 1..=8"));
        }
        if self.criterion == ResponseCriterion::HoldGated && self.hold_duration_ms == 0 {
            return Err(Error::Config("hold-gated protocols need a non-zero hold duration"));
        }
        if self.response_deadline_ms == Some(0) {
            return Err(Error::Config("response deadline must be non-zero"));
        }
        if self.reward_pulse_ms == 0 {
            return Err(Error::Config("reward pulse must be non-zero"));
        }
        validate_iti(self.iti_range_ms)?;
        validate_polls(&[self.response_poll_ms, self.hold_poll_ms, self.idle_poll_ms])
    }
}

// ---------------------------------------------------------------------------
// Composite (conditioning + sampling) protocol
// ---------------------------------------------------------------------------

/// Conditioning bursts interleaved with door/table sampling intervals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeConfig {
    /// Trial machine used inside every conditioning burst.
    pub conditioning: ProtocolConfig,
    pub conditioning_burst_secs: u64,
    pub sampling_secs: u64,
    /// Table position used for the repeated sampling intervals.
    pub familiar_table_position: u8,
    /// Table position used for the final sampling interval.
    pub novel_table_position: u8,
    /// Number of (sampling, conditioning) repetitions after the first burst.
    pub repetitions: u8,
    /// Give up waiting for the doorway to clear after this long.
    pub door_clear_timeout_secs: Option<u64>,
    pub sampling_poll_ms: u64,
}

impl Default for CompositeConfig {
    fn default() -> Self {
        Self {
            conditioning: ProtocolConfig {
                response_deadline_ms: Some(5_000),
                trial_limit: None,
                session_duration_secs: None,
                ..ProtocolConfig::stage_phase2()
            },
            conditioning_burst_secs: 60,
            sampling_secs: 60,
            familiar_table_position: 1,
            novel_table_position: 4,
            repetitions: 4,
            door_clear_timeout_secs: None,
            sampling_poll_ms: 50,
        }
    }
}

impl CompositeConfig {
    pub fn conditioning_burst(&self) -> Duration {
        Duration::from_secs(self.conditioning_burst_secs)
    }

    pub fn sampling(&self) -> Duration {
        Duration::from_secs(self.sampling_secs)
    }

    pub fn door_clear_timeout(&self) -> Option<Duration> {
        self.door_clear_timeout_secs.map(Duration::from_secs)
    }

    pub fn sampling_poll(&self) -> Duration {
        Duration::from_millis(self.sampling_poll_ms)
    }

    pub fn familiar_position(&self) -> Result<TablePosition> {
        TablePosition::new(self.familiar_table_position)
    }

    pub fn novel_position(&self) -> Result<TablePosition> {
        TablePosition::new(self.novel_table_position)
    }

    pub fn validate(&self) -> Result<()> {
        self.conditioning.validate()?;
        if self.conditioning_burst_secs == 0 || self.sampling_secs == 0 {
            return Err(Error::Config("burst and sampling lengths must be non-zero"));
        }
        if self.conditioning_burst_secs > MAX_PERIOD_SECS || self.sampling_secs > MAX_PERIOD_SECS {
            return Err(Error::Config("burst and sampling lengths must be at most 24 h"));
        }
        if self.repetitions > 99 {
            return Err(Error::Config("repetitions must be at most 99"));
        }
        self.familiar_position()?;
        self.novel_position()?;
        validate_polls(&[self.sampling_poll_ms])
    }
}

// ---------------------------------------------------------------------------
// Social (two-location handshake) protocol
// ---------------------------------------------------------------------------

/// Location-1 poke → table hold → door → location-2 poke → reward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialConfig {
    pub first_port: Port,
    pub second_port: Port,
    /// Hold required for a poke at either port (milliseconds).
    pub hold_duration_ms: u64,
    pub first_deadline_ms: Option<u64>,
    pub second_deadline_ms: Option<u64>,
    /// A table hold shorter than this is retried.
    pub min_table_hold_ms: u64,
    pub reward_pulse_ms: u64,
    pub iti_range_ms: (u64, u64),
    pub session_duration_secs: Option<u64>,
    pub door_clear_timeout_secs: Option<u64>,
    pub response_poll_ms: u64,
    pub hold_poll_ms: u64,
    pub idle_poll_ms: u64,
}

impl Default for SocialConfig {
    fn default() -> Self {
        Self::social_phase2()
    }
}

impl SocialConfig {
    /// 100 ms table hold, unlimited port-C window.
    pub fn social_phase2() -> Self {
        Self {
            first_port: Port::A,
            second_port: Port::C,
            hold_duration_ms: 100,
            first_deadline_ms: None,
            second_deadline_ms: None,
            min_table_hold_ms: 100,
            reward_pulse_ms: 150,
            iti_range_ms: (5_000, 10_000),
            session_duration_secs: Some(3_600),
            door_clear_timeout_secs: None,
            response_poll_ms: 10,
            hold_poll_ms: 5,
            idle_poll_ms: 50,
        }
    }

    /// 2 s table hold, unlimited port-C window.
    pub fn social_phase3() -> Self {
        Self {
            min_table_hold_ms: 2_000,
            ..Self::social_phase2()
        }
    }

    /// 2 s table hold, 5 s port-C window.
    pub fn social_phase4() -> Self {
        Self {
            second_deadline_ms: Some(5_000),
            ..Self::social_phase3()
        }
    }

    /// The trial-machine settings used for each poke step.
    pub fn poke_config(&self, port: Port, deadline_ms: Option<u64>) -> ProtocolConfig {
        ProtocolConfig {
            ports: ports(&[port]),
            criterion: ResponseCriterion::HoldGated,
            selection: SelectionRule::ConsecutiveLimit,
            max_consecutive_same_port: 1,
            hold_duration_ms: self.hold_duration_ms,
            response_deadline_ms: deadline_ms,
            reward_pulse_ms: self.reward_pulse_ms,
            iti_range_ms: self.iti_range_ms,
            trial_limit: None,
            session_duration_secs: None,
            response_poll_ms: self.response_poll_ms,
            hold_poll_ms: self.hold_poll_ms,
            idle_poll_ms: self.idle_poll_ms,
        }
    }

    pub fn min_table_hold(&self) -> Duration {
        Duration::from_millis(self.min_table_hold_ms)
    }

    pub fn reward_pulse(&self) -> Duration {
        Duration::from_millis(self.reward_pulse_ms)
    }

    pub fn session_duration(&self) -> Option<Duration> {
        self.session_duration_secs.map(Duration::from_secs)
    }

    pub fn door_clear_timeout(&self) -> Option<Duration> {
        self.door_clear_timeout_secs.map(Duration::from_secs)
    }

    pub fn hold_poll(&self) -> Duration {
        Duration::from_millis(self.hold_poll_ms)
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.first_port == self.second_port {
            return Err(Error::Config("social ports must differ"));
        }
        if self.hold_duration_ms == 0 || self.reward_pulse_ms == 0 {
            return Err(Error::Config("hold and reward durations must be non-zero"));
        }
        if self.first_deadline_ms == Some(0) || self.second_deadline_ms == Some(0) {
            return Err(Error::Config("response deadlines must be non-zero"));
        }
        validate_iti(self.iti_range_ms)?;
        validate_polls(&[self.response_poll_ms, self.hold_poll_ms, self.idle_poll_ms])
    }
}

// ---------------------------------------------------------------------------
// Presets
// ---------------------------------------------------------------------------

/// Named training stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    StagePhase1,
    StagePhase2,
    StagePhase3,
    StagePhase4,
    SocialPhase1,
    SocialPhase2,
    SocialPhase3,
    SocialPhase4,
}

impl Protocol {
    pub const ALL: [Protocol; 8] = [
        Protocol::StagePhase1,
        Protocol::StagePhase2,
        Protocol::StagePhase3,
        Protocol::StagePhase4,
        Protocol::SocialPhase1,
        Protocol::SocialPhase2,
        Protocol::SocialPhase3,
        Protocol::SocialPhase4,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::StagePhase1 => "stage1",
            Self::StagePhase2 => "stage2",
            Self::StagePhase3 => "stage3",
            Self::StagePhase4 => "stage4",
            Self::SocialPhase1 => "social1",
            Self::SocialPhase2 => "social2",
            Self::SocialPhase3 => "social3",
            Self::SocialPhase4 => "social4",
        }
    }

    /// The preset plan for this stage.
    pub fn plan(self) -> ProtocolPlan {
        match self {
            Self::StagePhase1 => ProtocolPlan::Classic(ProtocolConfig::stage_phase1()),
            Self::StagePhase2 => ProtocolPlan::Classic(ProtocolConfig::stage_phase2()),
            Self::StagePhase3 => ProtocolPlan::Classic(ProtocolConfig::stage_phase3()),
            Self::StagePhase4 => ProtocolPlan::Composite(CompositeConfig::default()),
            Self::SocialPhase1 => ProtocolPlan::Classic(ProtocolConfig::social_phase1()),
            Self::SocialPhase2 => ProtocolPlan::Social(SocialConfig::social_phase2()),
            Self::SocialPhase3 => ProtocolPlan::Social(SocialConfig::social_phase3()),
            Self::SocialPhase4 => ProtocolPlan::Social(SocialConfig::social_phase4()),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Protocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s.trim()))
            .ok_or(Error::Config("unknown protocol name"))
    }
}

/// What a session runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum ProtocolPlan {
    Classic(ProtocolConfig),
    Composite(CompositeConfig),
    Social(SocialConfig),
}

impl ProtocolPlan {
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Classic(c) => c.validate(),
            Self::Composite(c) => c.validate(),
            Self::Social(c) => c.validate(),
        }
    }

    /// Parse a JSON override and validate it.
    pub fn from_json(json: &str) -> Result<Self> {
        let plan: Self =
            serde_json::from_str(json).map_err(|_| Error::Config("malformed protocol JSON"))?;
        plan.validate()?;
        Ok(plan)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn ports(list: &[Port]) -> HVec<Port, 3> {
    list.iter().copied().collect()
}

fn validate_iti((min, max): (u64, u64)) -> Result<()> {
    if min > max {
        return Err(Error::Config("iti_range_ms minimum exceeds maximum"));
    }
    Ok(())
}

fn validate_polls(polls: &[u64]) -> Result<()> {
    if polls.iter().any(|&p| p == 0 || p > 50) {
        return Err(Error::Config("poll intervals must be within 1..=50 ms"));
    }
    Ok(())
}
