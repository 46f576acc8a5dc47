//! Sensor subsystem: channel identities and the shared [`SensorRegistry`].
//!
//! The registry holds the latest known state of every beam-break channel.
//! It is written exclusively by the ingestion thread and read by any number
//! of concurrent readers (trial logic, hold detector, telemetry).  A reader
//! either asks for one channel or takes a [`SensorSnapshot`] copied under a
//! single lock acquisition.

pub mod dwell;
pub mod hold;
pub mod parse;

use core::fmt;
use core::str::FromStr;
use std::time::Instant;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::Error;

// ---------------------------------------------------------------------------
// Channel identity
// ---------------------------------------------------------------------------

/// A named sensor location on the apparatus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    A,
    B,
    C,
    #[serde(rename = "door")]
    Door,
    #[serde(rename = "table")]
    Table,
}

impl Channel {
    pub const COUNT: usize = 5;
    pub const ALL: [Channel; Channel::COUNT] =
        [Channel::A, Channel::B, Channel::C, Channel::Door, Channel::Table];

    const fn index(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::Door => "door",
            Self::Table => "table",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Channel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a" => Ok(Self::A),
            "b" => Ok(Self::B),
            "c" => Ok(Self::C),
            "door" => Ok(Self::Door),
            "table" => Ok(Self::Table),
            _ => Err(Error::UnknownChannel),
        }
    }
}

/// A stimulus/reward location: the subset of channels with an LED and a valve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Port {
    A,
    B,
    C,
}

impl Port {
    /// The other port of the A/B pair.  Port C has no partner.
    pub const fn opposite(self) -> Option<Port> {
        match self {
            Self::A => Some(Self::B),
            Self::B => Some(Self::A),
            Self::C => None,
        }
    }

    pub const fn channel(self) -> Channel {
        match self {
            Self::A => Channel::A,
            Self::B => Channel::B,
            Self::C => Channel::C,
        }
    }

    pub const fn name(self) -> &'static str {
        self.channel().name()
    }
}

impl From<Port> for Channel {
    fn from(port: Port) -> Self {
        port.channel()
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Channel state
// ---------------------------------------------------------------------------

/// The two beam-break states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorState {
    #[default]
    Cleared,
    Triggered,
}

impl SensorState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cleared => "cleared",
            Self::Triggered => "triggered",
        }
    }

    pub const fn is_triggered(self) -> bool {
        matches!(self, Self::Triggered)
    }
}

impl fmt::Display for SensorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latest known state of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelReading {
    pub state: SensorState,
    /// Time of the last transition; `None` until the first event arrives.
    pub changed_at: Option<Instant>,
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// An immutable copy of every channel taken under one lock acquisition.
#[derive(Debug, Clone, Copy)]
pub struct SensorSnapshot {
    readings: [ChannelReading; Channel::COUNT],
    /// Number of updates the registry had applied when this was taken.
    pub sequence: u64,
    pub taken_at: Instant,
}

impl SensorSnapshot {
    pub fn get(&self, channel: Channel) -> ChannelReading {
        self.readings[channel.index()]
    }

    pub fn state(&self, channel: Channel) -> SensorState {
        self.readings[channel.index()].state
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct RegistryInner {
    readings: [ChannelReading; Channel::COUNT],
    sequence: u64,
}

/// Thread-safe latest-state store, shared behind an `Arc`.
#[derive(Debug, Default)]
pub struct SensorRegistry {
    inner: RwLock<RegistryInner>,
}

impl SensorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a channel's state and transition time.
    ///
    /// Timestamps never move backwards for a channel: an event stamped
    /// earlier than the stored one keeps the stored time but still applies
    /// its state.
    pub fn update(&self, channel: Channel, state: SensorState, at: Instant) {
        let mut inner = self.inner.write();
        let slot = &mut inner.readings[channel.index()];
        slot.state = state;
        slot.changed_at = Some(slot.changed_at.map_or(at, |prev| prev.max(at)));
        inner.sequence += 1;
    }

    pub fn get(&self, channel: Channel) -> ChannelReading {
        self.inner.read().readings[channel.index()]
    }

    pub fn state(&self, channel: Channel) -> SensorState {
        self.get(channel).state
    }

    pub fn snapshot(&self) -> SensorSnapshot {
        let inner = self.inner.read();
        SensorSnapshot {
            readings: inner.readings,
            sequence: inner.sequence,
            taken_at: Instant::now(),
        }
    }

    /// Total updates applied since construction.
    pub fn sequence(&self) -> u64 {
        self.inner.read().sequence
    }
}
