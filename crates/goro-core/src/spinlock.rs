//! Busy-wait lock for short critical sections
//!
//! Every queue mutation in the runtime (ready handshakes aside) happens
//! under one of these, held only across O(1) work and never across a
//! coroutine suspension. The bounded variant reports contention to the
//! caller instead of spinning forever; the spin budget is configuration,
//! not a constant baked in here.

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

/// A simple spinlock.
///
/// # Warning
///
/// Never hold a guard across a yield: the coroutine may resume on another
/// thread while this OS thread still spins elsewhere. Use `CoMutex` from
/// the runtime crate for coroutine-scope locking.
pub struct SpinLock<T> {
    locked: AtomicBool,
    data: UnsafeCell<T>,
}

// Safety: SpinLock provides exclusive access to T
unsafe impl<T: Send> Send for SpinLock<T> {}
unsafe impl<T: Send> Sync for SpinLock<T> {}

impl<T> SpinLock<T> {
    /// Create a new spinlock containing the given value
    #[inline]
    pub const fn new(value: T) -> Self {
        SpinLock {
            locked: AtomicBool::new(false),
            data: UnsafeCell::new(value),
        }
    }

    /// Acquire the lock, spinning until it's available
    #[inline]
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        loop {
            if self
                .locked
                .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return SpinLockGuard { lock: self };
            }

            // Wait for the holder to release before retrying the CAS,
            // with a growing pause window to back off under contention.
            let mut pause = 1u32;
            while self.locked.load(Ordering::Relaxed) {
                for _ in 0..pause {
                    core::hint::spin_loop();
                }
                pause = (pause << 1).min(64);
            }
        }
    }

    /// Try to acquire the lock without spinning
    #[inline]
    pub fn try_lock(&self) -> Option<SpinLockGuard<'_, T>> {
        if self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            Some(SpinLockGuard { lock: self })
        } else {
            None
        }
    }

    /// Bounded acquire: spin at most `max_spins` pause rounds, then give
    /// up and report contention with `None` so the caller can yield the
    /// coroutine instead of burning the carrier thread.
    #[inline]
    pub fn try_lock_for(&self, max_spins: u32) -> Option<SpinLockGuard<'_, T>> {
        for _ in 0..=max_spins {
            if let Some(guard) = self.try_lock() {
                return Some(guard);
            }
            core::hint::spin_loop();
        }
        None
    }

    /// Check if the lock is currently held
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

impl<T: Default> Default for SpinLock<T> {
    fn default() -> Self {
        SpinLock::new(T::default())
    }
}

/// Guard that releases the spinlock when dropped
pub struct SpinLockGuard<'a, T> {
    lock: &'a SpinLock<T>,
}

impl<'a, T> Deref for SpinLockGuard<'a, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // Safety: We hold the lock
        unsafe { &*self.lock.data.get() }
    }
}

impl<'a, T> DerefMut for SpinLockGuard<'a, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        // Safety: We hold the lock
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<'a, T> Drop for SpinLockGuard<'a, T> {
    #[inline]
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_spinlock_basic() {
        let lock = SpinLock::new(0u32);
        {
            let mut guard = lock.lock();
            *guard = 42;
        }
        {
            let guard = lock.lock();
            assert_eq!(*guard, 42);
        }
    }

    #[test]
    fn test_spinlock_try_lock() {
        let lock = SpinLock::new(0u32);

        let guard = lock.try_lock();
        assert!(guard.is_some());

        let guard2 = lock.try_lock();
        assert!(guard2.is_none());

        drop(guard);

        let guard3 = lock.try_lock();
        assert!(guard3.is_some());
    }

    #[test]
    fn test_bounded_spin_reports_contention() {
        let lock = SpinLock::new(());
        let held = lock.lock();

        assert!(lock.try_lock_for(16).is_none());

        drop(held);
        assert!(lock.try_lock_for(0).is_some());
    }

    #[test]
    fn test_spinlock_concurrent() {
        let lock = Arc::new(SpinLock::new(0u32));
        let mut handles = vec![];

        for _ in 0..4 {
            let lock = Arc::clone(&lock);
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    let mut guard = lock.lock();
                    *guard += 1;
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        let guard = lock.lock();
        assert_eq!(*guard, 4000);
    }
}
