//! WaitGroup
//!
//! Go-style completion counter. `add` before spawning, `done` in the
//! worker, `wait` parks until the counter returns to zero. Driving the
//! counter negative is a usage bug and panics.

use crate::scheduler;
use crate::tls;
use goro_core::error::{CoroError, CoroResult};
use goro_core::id::CoroId;
use goro_core::SpinLock;
use std::sync::atomic::{AtomicI64, Ordering};

pub struct WaitGroup {
    counter: AtomicI64,
    waiters: SpinLock<Vec<CoroId>>,
}

impl WaitGroup {
    pub fn new() -> Self {
        WaitGroup {
            counter: AtomicI64::new(0),
            waiters: SpinLock::new(Vec::new()),
        }
    }

    /// Adjust the counter by `n` (may be negative). The zero transition
    /// releases every waiter at once.
    pub fn add(&self, n: i64) {
        let new = self.counter.fetch_add(n, Ordering::AcqRel) + n;
        if new < 0 {
            panic!("WaitGroup counter went negative");
        }
        if new == 0 {
            self.release_all();
        }
    }

    /// Equivalent to `add(-1)`.
    pub fn done(&self) {
        self.add(-1);
    }

    pub fn count(&self) -> i64 {
        self.counter.load(Ordering::Acquire)
    }

    /// Park until the counter reaches zero. Fast path never parks, so a
    /// zero counter is observable from any thread.
    pub fn wait(&self) -> CoroResult<()> {
        if self.counter.load(Ordering::Acquire) == 0 {
            return Ok(());
        }
        if !tls::is_in_coroutine() {
            return Err(CoroError::NotInCoroutine);
        }
        let current = tls::current_coro();

        loop {
            {
                let mut waiters = self.waiters.lock();
                // Re-check under the waiter lock: the release drains
                // under the same lock, so registering after a missed
                // zero is impossible
                if self.counter.load(Ordering::Acquire) == 0 {
                    return Ok(());
                }
                if !waiters.contains(&current) {
                    waiters.push(current);
                }
            }
            scheduler::park_current();

            // Either the zero transition drained us, or the wake was
            // spurious; deregister so the next registration is clean
            self.waiters.lock().retain(|&c| c != current);
            if self.counter.load(Ordering::Acquire) == 0 {
                return Ok(());
            }
        }
    }

    fn release_all(&self) {
        let drained: Vec<CoroId> = std::mem::take(&mut *self.waiters.lock());
        for coro in drained {
            scheduler::push_ready(coro);
        }
    }
}

impl Default for WaitGroup {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_accounting() {
        let wg = WaitGroup::new();
        wg.add(3);
        assert_eq!(wg.count(), 3);
        wg.done();
        wg.done();
        assert_eq!(wg.count(), 1);
        wg.done();
        assert_eq!(wg.count(), 0);
    }

    #[test]
    #[should_panic(expected = "negative")]
    fn test_negative_counter_panics() {
        let wg = WaitGroup::new();
        wg.done();
    }

    #[test]
    fn test_wait_at_zero_returns_immediately() {
        let wg = WaitGroup::new();
        assert!(wg.wait().is_ok());

        wg.add(1);
        wg.done();
        assert!(wg.wait().is_ok());
    }

    #[test]
    fn test_wait_off_coroutine_with_pending_count() {
        let wg = WaitGroup::new();
        wg.add(1);
        assert!(matches!(wg.wait(), Err(CoroError::NotInCoroutine)));
        wg.done();
    }
}
