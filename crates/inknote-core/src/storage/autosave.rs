//! Debounced autosave scheduling.
//!
//! Every mutation pushes the deadline back, so a burst of edits produces a
//! single save once the canvas has been quiet for the full delay.

use std::time::{Duration, Instant};

/// Tracks one pending, cancellable autosave.
///
/// Time is passed in by the caller so the host's clock (and tests) drive it.
#[derive(Debug, Clone)]
pub struct AutosaveDebouncer {
    /// Quiet period before a save fires.
    delay: Duration,
    /// When the pending save fires, if one is pending.
    deadline: Option<Instant>,
}

impl AutosaveDebouncer {
    /// Create a debouncer with nothing pending.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// Get the quiet period.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// (Re)start the timer from `now`, replacing any pending deadline.
    pub fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    /// Drop the pending save, if any.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Whether a save is pending.
    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// When the pending save fires.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns true exactly once when the pending deadline has passed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}
