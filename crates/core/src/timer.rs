//! Single-shot countdown used for silence detection, submission debounce,
//! capture restart and mood polling.
//!
//! The timer never sleeps on its own. Callers pass the current instant in and
//! the event loop sleeps until [`TurnTimer::deadline`], which keeps every user
//! of the timer deterministic under test.

use std::time::Duration;
use tokio::time::Instant;

/// Quiet period after the last recognizer fragment before the buffer is
/// finalized as one utterance.
pub const SILENCE_THRESHOLD: Duration = Duration::from_millis(1500);

/// Minimum spacing between two accepted submissions.
pub const DEBOUNCE_THRESHOLD: Duration = Duration::from_millis(1000);

/// Delay before capture restarts after an utterance or a transient error.
pub const CAPTURE_RESTART_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug)]
pub struct TurnTimer<T> {
    armed: Option<(Instant, T)>,
}

impl<T> Default for TurnTimer<T> {
    fn default() -> Self {
        Self { armed: None }
    }
}

impl<T> TurnTimer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restart the countdown. A previous arm that has not fired is replaced,
    /// along with its payload.
    pub fn arm(&mut self, delay: Duration, now: Instant, on_fire: T) {
        self.armed = Some((now + delay, on_fire));
    }

    pub fn cancel(&mut self) {
        self.armed = None;
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Armed and not yet due at `now`.
    pub fn is_pending(&self, now: Instant) -> bool {
        matches!(self.armed, Some((deadline, _)) if now < deadline)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.armed.as_ref().map(|(deadline, _)| *deadline)
    }

    /// Returns the payload once the deadline has passed, disarming the timer.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match self.armed {
            Some((deadline, _)) if now >= deadline => self.armed.take().map(|(_, fire)| fire),
            _ => None,
        }
    }
}

/// Earliest of a set of optional deadlines.
pub fn earliest<I>(deadlines: I) -> Option<Instant>
where
    I: IntoIterator<Item = Option<Instant>>,
{
    deadlines.into_iter().flatten().min()
}
