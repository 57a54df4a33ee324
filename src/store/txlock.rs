use crate::{backoff::Backoff, error::StoreError};
use std::sync::atomic::{AtomicUsize, Ordering};

const WRITER: usize = usize::MAX;

/// The transaction lock of the in-memory store.
///
/// This is a writer preferring reader/writer spin lock. Unlike a guard based lock it is
/// acquired and released with separate calls, because a store transaction is opened and
/// closed through separate collaborator calls.
///
/// `state` holds the number of active readers, or `WRITER` while a writer holds the lock.
/// Readers stay out while any writer is queued, so a steady stream of readers cannot
/// starve the writers.
#[derive(Debug)]
pub struct TxLock {
    state: AtomicUsize,
    writers_waiting: AtomicUsize,
}

impl TxLock {
    pub fn new() -> Self {
        Self {
            state: AtomicUsize::new(0),
            writers_waiting: AtomicUsize::new(0),
        }
    }

    pub fn read_lock(&self) {
        let backoff = Backoff::new();

        loop {
            if self.writers_waiting.load(Ordering::Relaxed) == 0 {
                let readers = self.state.load(Ordering::Relaxed);

                if readers < WRITER - 1
                    && self
                        .state
                        .compare_exchange_weak(
                            readers,
                            readers + 1,
                            Ordering::Acquire,
                            Ordering::Relaxed,
                        )
                        .is_ok()
                {
                    return;
                }
            }

            backoff.snooze();
        }
    }

    pub fn read_unlock(&self) -> Result<(), StoreError> {
        let mut readers = self.state.load(Ordering::Relaxed);

        loop {
            if readers == 0 || readers == WRITER {
                return Err(StoreError::NotLocked);
            }

            match self.state.compare_exchange_weak(
                readers,
                readers - 1,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Ok(()),
                Err(actual) => readers = actual,
            }
        }
    }

    pub fn write_lock(&self) {
        let backoff = Backoff::new();
        self.writers_waiting.fetch_add(1, Ordering::Relaxed);

        while self
            .state
            .compare_exchange_weak(0, WRITER, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            backoff.snooze();
        }

        self.writers_waiting.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn write_unlock(&self) -> Result<(), StoreError> {
        self.state
            .compare_exchange(WRITER, 0, Ordering::Release, Ordering::Relaxed)
            .map(|_| ())
            .map_err(|_| StoreError::NotLocked)
    }

    pub fn is_write_locked(&self) -> bool {
        self.state.load(Ordering::Acquire) == WRITER
    }
}

impl Default for TxLock {
    fn default() -> Self {
        Self::new()
    }
}
