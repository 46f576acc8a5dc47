//! Port selection policy.
//!
//! [`select_port`] is a pure function; [`PortSelector`] holds the
//! histories it reads and applies the anti-bias bookkeeping after every
//! outcome.
//!
//! Priority, evaluated per trial:
//!
//! 1. a forced port from the anti-bias rule,
//! 2. the opposite port once the last `max_consecutive` presentations were
//!    identical,
//! 3. a uniform random pick among the protocol's ports.
//!
//! Anti-bias: once both A and B hold three outcomes, one all-miss and the
//! other all-hit forces the missed port.  Rewarding the forced port clears
//! the force and both windows.

use heapless::Deque;
use log::{debug, info};
use rand::Rng;

use crate::config::{MAX_STREAK_LIMIT, ProtocolConfig, SelectionRule};
use crate::error::{Error, Result};
use crate::sensors::Port;

/// Outcomes kept per port by the anti-bias rule.
pub const OUTCOME_WINDOW: usize = 3;

const HISTORY_CAP: usize = MAX_STREAK_LIMIT as usize;

/// One selection decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub port: Port,
    /// True when a rule overrode the random pick.
    pub forced: bool,
}

/// Choose the next port.
///
/// `recent` is oldest-first.  Returns `None` only when `ports` is empty.
pub fn select_port<R: Rng + ?Sized>(
    ports: &[Port],
    recent: &[Port],
    max_consecutive: usize,
    forced: Option<Port>,
    rng: &mut R,
) -> Option<Selection> {
    if let Some(port) = forced {
        return Some(Selection { port, forced: true });
    }

    if max_consecutive > 0 && recent.len() >= max_consecutive {
        let tail = &recent[recent.len() - max_consecutive..];
        let last = tail[tail.len() - 1];
        if tail.iter().all(|&p| p == last) {
            if let Some(other) = last.opposite().filter(|o| ports.contains(o)) {
                return Some(Selection { port: other, forced: true });
            }
        }
    }

    match ports.len() {
        0 => None,
        1 => Some(Selection { port: ports[0], forced: false }),
        n => Some(Selection {
            port: ports[rng.random_range(0..n)],
            forced: false,
        }),
    }
}

// ---------------------------------------------------------------------------
// Outcome windows
// ---------------------------------------------------------------------------

type Window = Deque<bool, OUTCOME_WINDOW>;

fn push_bounded<T, const N: usize>(window: &mut Deque<T, N>, item: T) {
    if window.is_full() {
        window.pop_front();
    }
    // Just made room.
    let _ = window.push_back(item);
}

fn all_equal(window: &Window, value: bool) -> bool {
    window.is_full() && window.iter().all(|&v| v == value)
}

/// Rolling hit/miss windows for ports A and B.
#[derive(Debug, Clone, Default)]
pub struct OutcomeHistory {
    a: Window,
    b: Window,
}

impl OutcomeHistory {
    fn window_mut(&mut self, port: Port) -> Option<&mut Window> {
        match port {
            Port::A => Some(&mut self.a),
            Port::B => Some(&mut self.b),
            Port::C => None,
        }
    }

    pub fn record(&mut self, port: Port, rewarded: bool) {
        if let Some(w) = self.window_mut(port) {
            push_bounded(w, rewarded);
        }
    }

    /// The port to force, if one side is all-miss and the other all-hit.
    pub fn skewed_port(&self) -> Option<Port> {
        if all_equal(&self.a, false) && all_equal(&self.b, true) {
            Some(Port::A)
        } else if all_equal(&self.b, false) && all_equal(&self.a, true) {
            Some(Port::B)
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.a.clear();
        self.b.clear();
    }

    pub fn len(&self, port: Port) -> usize {
        match port {
            Port::A => self.a.len(),
            Port::B => self.b.len(),
            Port::C => 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Stateful selector
// ---------------------------------------------------------------------------

/// Presentation and outcome histories for one session (or one
/// conditioning burst).
#[derive(Debug, Clone)]
pub struct PortSelector {
    ports: heapless::Vec<Port, 3>,
    rule: SelectionRule,
    max_consecutive: usize,
    presented: Deque<Port, HISTORY_CAP>,
    outcomes: OutcomeHistory,
    forced: Option<Port>,
}

impl PortSelector {
    pub fn new(config: &ProtocolConfig) -> Self {
        Self {
            ports: config.ports.clone(),
            rule: config.selection,
            max_consecutive: usize::from(config.max_consecutive_same_port).clamp(1, HISTORY_CAP),
            presented: Deque::new(),
            outcomes: OutcomeHistory::default(),
            forced: None,
        }
    }

    /// Pick the next port and remember it as presented.
    pub fn next<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<Selection> {
        let recent: heapless::Vec<Port, HISTORY_CAP> = self.presented.iter().copied().collect();
        let selection = select_port(&self.ports, &recent, self.max_consecutive, self.forced, rng)
            .ok_or(Error::Config("ports must not be empty"))?;

        if self.presented.len() >= self.max_consecutive {
            self.presented.pop_front();
        }
        push_bounded(&mut self.presented, selection.port);

        debug!(
            "Selector: port {} (forced={}) after {:?}",
            selection.port, selection.forced, recent
        );
        Ok(selection)
    }

    /// Feed a trial outcome back.  No-op for consecutive-limit protocols.
    pub fn record_outcome(&mut self, port: Port, rewarded: bool) {
        if self.rule != SelectionRule::AntiBias {
            return;
        }

        self.outcomes.record(port, rewarded);
        if self.forced.is_none() {
            if let Some(skewed) = self.outcomes.skewed_port() {
                info!("Selector: forcing port {skewed} after one-sided outcomes");
                self.forced = Some(skewed);
            }
        }

        if rewarded && self.forced == Some(port) {
            info!("Selector: forced port {port} rewarded, clearing correction");
            self.forced = None;
            self.outcomes.clear();
        }
    }

    pub fn forced(&self) -> Option<Port> {
        self.forced
    }

    pub fn outcomes(&self) -> &OutcomeHistory {
        &self.outcomes
    }
}
