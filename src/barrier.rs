//! This module implements the start barrier that lines workers up before a run.
//!
//! Every worker calls [`StartBarrier::arrive`] once it is ready to do real work and is parked
//! there. The orchestrating thread waits for the quorum with [`StartBarrier::await_quorum`] and
//! then wakes every parked worker at once with [`StartBarrier::release_all`], so the measured
//! interval reflects contention between workers rather than staggered thread startup.
//!
//! The barrier is single use. Once released it stays released and later arrivals pass
//! straight through.
//!
//! The orchestrator can either park on a condition variable while it waits for the quorum
//! or first poll the arrival counter with a backoff. Both observe the same contract: nothing
//! is released before every expected worker has arrived.

use crate::backoff::Backoff;
use log::{debug, warn};
use parking_lot::{Condvar, Mutex};
use std::{
    fmt,
    str::FromStr,
    sync::atomic::{AtomicUsize, Ordering},
    time::{Duration, Instant},
};

/// How the orchestrating thread waits for the quorum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStrategy {
    /// Park on a condition variable that every arrival notifies.
    Blocking,
    /// Poll the arrival counter with a backoff, parking like `Blocking` once the
    /// backoff is exhausted.
    Spin,
}

impl Default for WaitStrategy {
    fn default() -> Self {
        WaitStrategy::Blocking
    }
}

impl FromStr for WaitStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "blocking" | "block" => Ok(WaitStrategy::Blocking),
            "spin" | "poll" => Ok(WaitStrategy::Spin),
            other => Err(format!("unknown wait strategy `{}`", other)),
        }
    }
}

impl fmt::Display for WaitStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitStrategy::Blocking => write!(f, "blocking"),
            WaitStrategy::Spin => write!(f, "spin"),
        }
    }
}

struct State {
    arrived: usize,
    released_at: Option<Instant>,
}

pub struct StartBarrier {
    state: Mutex<State>,
    arrival: Condvar,
    release: Condvar,
    // Mirror of `State::arrived` so the spinning waiter can poll without the lock.
    arrived: AtomicUsize,
    // Only written with `state` held.
    quorum: AtomicUsize,
    strategy: WaitStrategy,
}

impl StartBarrier {
    pub fn new(quorum: usize, strategy: WaitStrategy) -> Self {
        Self {
            state: Mutex::new(State {
                arrived: 0,
                released_at: None,
            }),
            arrival: Condvar::new(),
            release: Condvar::new(),
            arrived: AtomicUsize::new(0),
            quorum: AtomicUsize::new(quorum),
            strategy,
        }
    }

    /// Register the calling worker and park it until [`release_all`](Self::release_all).
    pub fn arrive(&self) {
        let mut state = self.state.lock();
        state.arrived += 1;
        self.arrived.store(state.arrived, Ordering::Release);

        if state.arrived >= self.quorum() {
            self.arrival.notify_all();
        }

        while state.released_at.is_none() {
            self.release.wait(&mut state);
        }
    }

    /// Block until the arrival counter reaches the quorum.
    ///
    /// If fewer workers than the quorum ever arrive this never returns.
    pub fn await_quorum(&self) {
        if self.strategy == WaitStrategy::Spin && self.spin_for_quorum(None) {
            return;
        }

        self.park_for_quorum(None);
    }

    /// Like [`await_quorum`](Self::await_quorum) but gives up after `timeout`.
    /// Returns whether the quorum was reached.
    pub fn await_quorum_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;

        if self.strategy == WaitStrategy::Spin && self.spin_for_quorum(Some(deadline)) {
            return true;
        }

        self.park_for_quorum(Some(deadline))
    }

    // Polls until the quorum is met, the deadline passes or the backoff runs out.
    // A `false` leaves the rest of the wait to the condition variable.
    fn spin_for_quorum(&self, deadline: Option<Instant>) -> bool {
        let backoff = Backoff::new();

        while !self.quorum_met() {
            if backoff.is_completed() || deadline.map_or(false, |d| Instant::now() >= d) {
                return false;
            }

            backoff.snooze();
        }

        true
    }

    fn park_for_quorum(&self, deadline: Option<Instant>) -> bool {
        let mut state = self.state.lock();

        while state.arrived < self.quorum() {
            match deadline {
                Some(deadline) => {
                    if self.arrival.wait_until(&mut state, deadline).timed_out() {
                        return state.arrived >= self.quorum();
                    }
                }
                None => self.arrival.wait(&mut state),
            }
        }

        true
    }

    fn quorum_met(&self) -> bool {
        self.arrivals() >= self.quorum()
    }

    /// Wake every parked worker. Returns the arrival count at the moment of release.
    ///
    /// Calling this a second time changes nothing.
    pub fn release_all(&self) -> usize {
        let mut state = self.state.lock();

        if state.released_at.is_some() {
            warn!("start barrier released twice");
            return state.arrived;
        }

        state.released_at = Some(Instant::now());
        self.release.notify_all();
        debug!(
            "start barrier released with {}/{} arrivals",
            state.arrived,
            self.quorum()
        );

        state.arrived
    }

    /// Shrink the quorum, used when fewer workers were spawned than planned.
    pub fn lower_quorum(&self, quorum: usize) {
        let _state = self.state.lock();

        if quorum < self.quorum() {
            self.quorum.store(quorum, Ordering::Release);
            self.arrival.notify_all();
        }
    }

    pub fn arrivals(&self) -> usize {
        self.arrived.load(Ordering::Acquire)
    }

    pub fn quorum(&self) -> usize {
        self.quorum.load(Ordering::Acquire)
    }

    pub fn is_released(&self) -> bool {
        self.state.lock().released_at.is_some()
    }

    pub fn released_at(&self) -> Option<Instant> {
        self.state.lock().released_at
    }
}

impl fmt::Debug for StartBarrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();

        f.debug_struct("StartBarrier")
            .field("arrived", &state.arrived)
            .field("quorum", &self.quorum())
            .field("released", &state.released_at.is_some())
            .field("strategy", &self.strategy)
            .finish()
    }
}
