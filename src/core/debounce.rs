//! Debounce timer - fires once after a quiet period.
//!
//! Every `reset()` re-arms the deadline (cancel-on-new-event), so bursts of
//! scroll events keep pushing the trigger out until input goes quiet:
//! 1. Each qualifying event calls `reset(delay, payload, now)`
//! 2. The event loop calls `tick(now)` and gets the payload back once the
//!    deadline passes with no further reset
//!
//! Time is passed in by the caller; the timer never reads the clock itself.

use std::time::{Duration, Instant};

/// Single-shot debounce timer carrying a payload to hand back on expiry.
///
/// # Usage
/// ```ignore
/// // On scroll:
/// timer.reset(Duration::from_millis(150), IdleTimeout, now);
///
/// // In event loop:
/// if let Some(IdleTimeout) = timer.tick(now) {
///     enter_loop();
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DebounceTimer<T> {
    /// Pending payload and its trigger time
    pending: Option<(T, Instant)>,
}

impl<T> Default for DebounceTimer<T> {
    fn default() -> Self {
        Self { pending: None }
    }
}

impl<T> DebounceTimer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer to fire `delay` after `now`, replacing any pending trigger.
    pub fn reset(&mut self, delay: Duration, payload: T, now: Instant) {
        let trigger_at = now + delay;
        if self.pending.is_some() {
            log::trace!("DebounceTimer: re-armed for {}ms", delay.as_millis());
        } else {
            log::trace!("DebounceTimer: armed for {}ms", delay.as_millis());
        }
        self.pending = Some((payload, trigger_at));
    }

    /// Cancel any pending trigger
    pub fn cancel(&mut self) {
        if self.pending.take().is_some() {
            log::trace!("DebounceTimer: cancelled");
        }
    }

    /// Returns the payload if the deadline has passed, clearing the timer.
    pub fn tick(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((_, trigger_at)) if now >= *trigger_at => {
                log::trace!("DebounceTimer: fired");
                self.pending.take().map(|(payload, _)| payload)
            }
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// When the pending trigger is due (for scheduling repaints/sleeps)
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, at)| *at)
    }
}
