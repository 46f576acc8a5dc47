//! Inbound event text protocol.
//!
//! The apparatus prints free-text lines.  A line is a sensor event only if
//! it contains (case-insensitive substring match):
//!
//! 1. a keyword: `beambreak` or `sensor`,
//! 2. a state word: `triggered` or `cleared`,
//! 3. a location token: `port a`, `port b`, `port c`, `door`, `table`.
//!
//! Location tokens are tried in that order and the first one found wins.
//! Anything else is not an error; the line is simply not an event.

use super::{Channel, SensorState};

const KEYWORDS: [&str; 2] = ["beambreak", "sensor"];

const LOCATIONS: [(&str, Channel); 5] = [
    ("port a", Channel::A),
    ("port b", Channel::B),
    ("port c", Channel::C),
    ("door", Channel::Door),
    ("table", Channel::Table),
];

/// A recognised sensor transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedEvent {
    pub channel: Channel,
    pub state: SensorState,
}

/// Parse one line of event text.  Returns `None` for anything that is not
/// a recognised sensor event, including empty lines.
pub fn parse_event(line: &str) -> Option<ParsedEvent> {
    let lower = line.trim().to_ascii_lowercase();
    if lower.is_empty() || !KEYWORDS.iter().any(|k| lower.contains(k)) {
        return None;
    }

    let state = if lower.contains("triggered") {
        SensorState::Triggered
    } else if lower.contains("cleared") {
        SensorState::Cleared
    } else {
        return None;
    };

    LOCATIONS
        .iter()
        .find(|(token, _)| lower.contains(token))
        .map(|&(_, channel)| ParsedEvent { channel, state })
}
