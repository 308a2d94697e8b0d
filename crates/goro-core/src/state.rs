//! Coroutine lifecycle states
//!
//! Transitions are driven by the scheduler and the suspend/wake handshake:
//!
//! ```text
//! Free -> New -> Ready -> Running -> Blocked -> Ready -> ...
//!                                 \-> Finished -> Free
//! ```
//!
//! `Ready -> Running` and `Blocked -> Ready` are compare-and-swap gated so
//! a coroutine is never resumed by two threads or enqueued twice.

use core::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of a coroutine slot.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoroState {
    /// Slot is unused and on the free list
    Free = 0,
    /// Allocated by spawn, context not yet initialized
    New = 1,
    /// On the ready queue (or about to be), waiting for a worker
    Ready = 2,
    /// Executing on some worker thread
    Running = 3,
    /// Parked; a primitive, timer or the netpoller holds the wake
    Blocked = 4,
    /// Task returned; slot awaiting release
    Finished = 5,
}

impl CoroState {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => CoroState::Free,
            1 => CoroState::New,
            2 => CoroState::Ready,
            3 => CoroState::Running,
            4 => CoroState::Blocked,
            _ => CoroState::Finished,
        }
    }
}

/// Atomic cell holding a [`CoroState`].
#[derive(Debug)]
pub struct AtomicCoroState(AtomicU8);

impl AtomicCoroState {
    pub const fn new(state: CoroState) -> Self {
        AtomicCoroState(AtomicU8::new(state as u8))
    }

    #[inline]
    pub fn load(&self) -> CoroState {
        CoroState::from_u8(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub fn store(&self, state: CoroState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Gate a transition; returns true if `from -> to` was performed.
    #[inline]
    pub fn transition(&self, from: CoroState, to: CoroState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_gate() {
        let s = AtomicCoroState::new(CoroState::Ready);
        assert!(s.transition(CoroState::Ready, CoroState::Running));
        // Second claimant loses
        assert!(!s.transition(CoroState::Ready, CoroState::Running));
        assert_eq!(s.load(), CoroState::Running);
    }

    #[test]
    fn test_from_u8() {
        for state in [
            CoroState::Free,
            CoroState::New,
            CoroState::Ready,
            CoroState::Running,
            CoroState::Blocked,
            CoroState::Finished,
        ] {
            assert_eq!(CoroState::from_u8(state as u8), state);
        }
    }
}
