// LICENSE NOTICE: The stepping scheme follows the crossbeam backoff, MIT licensed.

use std::{cell::Cell, hint, thread};

const SPIN_LIMIT: u32 = 6;
const YIELD_LIMIT: u32 = 10;

/// A `Backoff` lets a thread wait an increasing amount of time while it retries
/// an acquisition, so spinning waiters put less pressure on contended cache lines.
///
/// Used by the store transaction lock and by the spinning quorum wait, which parks
/// once the backoff is completed.
#[derive(Debug)]
pub struct Backoff {
    step: Cell<u32>,
}

impl Backoff {
    pub fn new() -> Self {
        Self { step: Cell::new(0) }
    }

    /// Spin while the wait is short and yield to the scheduler once it gets long.
    pub fn snooze(&self) {
        if self.step.get() <= SPIN_LIMIT {
            for _ in 0..1 << self.step.get() {
                hint::spin_loop();
            }
        } else {
            thread::yield_now();
        }

        if self.step.get() <= YIELD_LIMIT {
            self.step.set(self.step.get() + 1);
        }
    }

    /// If this returns true we have been waiting long enough that a blocking
    /// primitive would serve the caller better.
    pub fn is_completed(&self) -> bool {
        self.step.get() > YIELD_LIMIT
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::Backoff;

    #[test]
    fn completes_after_yield_limit() {
        let backoff = Backoff::new();

        for _ in 0..=super::YIELD_LIMIT {
            assert!(!backoff.is_completed());
            backoff.snooze();
        }

        assert!(backoff.is_completed());
    }
}
