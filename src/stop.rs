//! Cooperative cancellation.
//!
//! [`StopSignal`] is the process-wide latch: settable from any thread
//! (Ctrl-C handler, ingestion thread on a transport fault, session thread
//! on a write fault) and observed by every polling loop.  Once set it never
//! unsets.
//!
//! [`CancelToken`] scopes a wait to the global latch plus an optional
//! wall-clock end, which is how a conditioning burst inside a composite
//! session ends without touching the global latch.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Process-wide stop latch.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latch the stop.  Idempotent.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// A token that is cancelled only by this latch.
    pub fn token(&self) -> CancelToken {
        CancelToken {
            stop: self.clone(),
            until: None,
        }
    }

    /// A token that is additionally cancelled once `len` has passed.  A
    /// `len` too large to represent as an instant never expires.
    pub fn token_for(&self, len: Duration) -> CancelToken {
        CancelToken {
            stop: self.clone(),
            until: Instant::now().checked_add(len),
        }
    }
}

/// Cancellation checked at every poll tick.
#[derive(Debug, Clone)]
pub struct CancelToken {
    stop: StopSignal,
    until: Option<Instant>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        self.stop.is_set() || self.until.is_some_and(|end| Instant::now() >= end)
    }

    /// The scoped end, if any.
    pub fn until(&self) -> Option<Instant> {
        self.until
    }

    /// Sleep for `total`, waking every `tick` to re-check cancellation.
    /// Returns `false` if cancelled before `total` elapsed.
    pub fn sleep(&self, total: Duration, tick: Duration) -> bool {
        let start = Instant::now();
        loop {
            if self.is_cancelled() {
                return false;
            }
            let elapsed = start.elapsed();
            if elapsed >= total {
                return true;
            }
            std::thread::sleep(tick.min(total - elapsed));
        }
    }
}
