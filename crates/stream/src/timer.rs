//! Single-slot auto-revert timer.
//!
//! Scheduling always replaces the pending fire. Each schedule gets a fresh
//! generation; the callback receives it so the owner can tell a stale fire
//! (one that lost the race against a reschedule or cancel) from the live one.

use std::{future::Future, time::Duration};

use {
    tokio::time::{Instant, sleep_until},
    tokio_util::sync::CancellationToken,
    tracing::{debug, warn},
};

/// Deadline used when `now + after` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

struct Scheduled {
    generation: u64,
    deadline: Instant,
    cancel: CancellationToken,
}

#[derive(Default)]
pub struct RevertTimer {
    generation: u64,
    slot: Option<Scheduled>,
}

impl RevertTimer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel whatever is pending and run `on_fire` once after `after`.
    /// Returns the generation handed to `on_fire`.
    pub fn schedule<F, Fut>(&mut self, after: Duration, on_fire: F) -> u64
    where
        F: FnOnce(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        self.generation += 1;
        let generation = self.generation;
        let now = Instant::now();
        let deadline = now.checked_add(after).unwrap_or_else(|| {
            warn!(after_secs = after.as_secs(), "revert delay out of range, using far future");
            now + FAR_FUTURE
        });
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {
                    debug!(generation, "revert timer cancelled");
                },
                () = sleep_until(deadline) => {
                    debug!(generation, "revert timer fired");
                    on_fire(generation).await;
                },
            }
        });

        self.slot = Some(Scheduled {
            generation,
            deadline,
            cancel,
        });
        generation
    }

    /// Drop the pending fire, if any. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        match self.slot.take() {
            Some(scheduled) => {
                scheduled.cancel.cancel();
                true
            },
            None => false,
        }
    }

    /// Clear the slot on behalf of a fire with `generation`. Returns `false`
    /// when that fire has been superseded and must be ignored.
    pub fn take_fired(&mut self, generation: u64) -> bool {
        if self.is_current(generation) {
            self.slot = None;
            true
        } else {
            false
        }
    }

    #[must_use]
    pub fn is_current(&self, generation: u64) -> bool {
        self.slot
            .as_ref()
            .is_some_and(|s| s.generation == generation)
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.slot.is_some()
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.slot.as_ref().map(|s| s.deadline)
    }

    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline()
            .map(|d| d.saturating_duration_since(Instant::now()))
    }
}

impl Drop for RevertTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
