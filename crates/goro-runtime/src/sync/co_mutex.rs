//! Coroutine mutex
//!
//! Unlike `SpinLock`, a CoMutex may be held across a park: contenders
//! suspend their coroutine instead of burning the worker thread. Unlock
//! hands the lock straight to the first queued waiter, leaving the
//! locked flag set for it, so ownership is guaranteed when `lock`
//! returns after a park.

use crate::scheduler;
use crate::tls;
use goro_core::error::{CoroError, CoroResult};
use goro_core::id::CoroId;
use goro_core::SpinLock;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

pub struct CoMutex {
    locked: AtomicBool,
    waiters: SpinLock<VecDeque<CoroId>>,
}

impl CoMutex {
    pub fn new() -> Self {
        CoMutex {
            locked: AtomicBool::new(false),
            waiters: SpinLock::new(VecDeque::new()),
        }
    }

    #[inline]
    fn try_acquire(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Non-blocking attempt.
    pub fn try_lock(&self) -> Option<CoMutexGuard<'_>> {
        if self.try_acquire() {
            Some(CoMutexGuard { mutex: self })
        } else {
            None
        }
    }

    /// Acquire, parking the coroutine while contended.
    pub fn lock(&self) -> CoroResult<CoMutexGuard<'_>> {
        if self.try_acquire() {
            return Ok(CoMutexGuard { mutex: self });
        }
        if !tls::is_in_coroutine() {
            return Err(CoroError::NotInCoroutine);
        }
        let current = tls::current_coro();

        // Short bounded spin before going through the park machinery
        let spin_limit = scheduler::global()
            .map(|s| s.config().spin_limit)
            .unwrap_or(64);
        for _ in 0..spin_limit {
            if self.try_acquire() {
                return Ok(CoMutexGuard { mutex: self });
            }
            std::hint::spin_loop();
        }

        loop {
            {
                let mut waiters = self.waiters.lock();
                // Re-check under the waiter lock; unlock clears the flag
                // under this same lock when the queue is empty, so the
                // release cannot slip between our check and the enqueue
                if self.try_acquire() {
                    return Ok(CoMutexGuard { mutex: self });
                }
                waiters.push_back(current);
            }
            scheduler::park_current();

            // Still queued means the wake was spurious; gone from the
            // queue means unlock popped us and handed the lock over
            // with the flag left set
            let was_queued = {
                let mut waiters = self.waiters.lock();
                let before = waiters.len();
                waiters.retain(|&c| c != current);
                waiters.len() != before
            };
            if !was_queued {
                return Ok(CoMutexGuard { mutex: self });
            }
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    fn unlock(&self) {
        let next = {
            let mut waiters = self.waiters.lock();
            match waiters.pop_front() {
                Some(coro) => Some(coro),
                None => {
                    // Nobody queued: release for real, inside the lock
                    // so a contender in lock() cannot park past us
                    self.locked.store(false, Ordering::Release);
                    None
                }
            }
        };
        if let Some(coro) = next {
            scheduler::push_ready(coro);
        }
    }
}

impl Default for CoMutex {
    fn default() -> Self {
        Self::new()
    }
}

/// Releases the mutex on drop.
pub struct CoMutexGuard<'a> {
    mutex: &'a CoMutex,
}

impl Drop for CoMutexGuard<'_> {
    fn drop(&mut self) {
        self.mutex.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_lock_excludes() {
        let m = CoMutex::new();
        let guard = m.try_lock();
        assert!(guard.is_some());
        assert!(m.is_locked());
        assert!(m.try_lock().is_none());

        drop(guard);
        assert!(!m.is_locked());
        assert!(m.try_lock().is_some());
    }

    #[test]
    fn test_lock_uncontended_off_coroutine() {
        // The fast path works from any thread
        let m = CoMutex::new();
        let guard = m.lock().unwrap();
        assert!(m.is_locked());
        drop(guard);
        assert!(!m.is_locked());
    }
}
