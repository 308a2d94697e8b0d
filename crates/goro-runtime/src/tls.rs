//! Thread-local scheduler context
//!
//! Each worker thread records which coroutine it is running and where its
//! own scheduler register save area lives. Cells are `const`-initialized
//! so access never allocates; this matters because they are read from
//! coroutine stacks.

use crate::arch::SavedRegs;
use goro_core::id::CoroId;
use std::cell::Cell;

thread_local! {
    /// Raw CoroId of the coroutine running on this thread
    static CURRENT_CORO: Cell<u64> = const { Cell::new(u64::MAX) };

    /// Register save area the current worker switches back into
    static SCHED_REGS: Cell<*mut SavedRegs> = const { Cell::new(std::ptr::null_mut()) };
}

/// Mark `id` as running on this thread
#[inline]
pub fn set_current_coro(id: CoroId) {
    CURRENT_CORO.with(|cell| cell.set(id.as_u64()));
}

/// Clear the running coroutine (worker back in its scheduler loop)
#[inline]
pub fn clear_current_coro() {
    CURRENT_CORO.with(|cell| cell.set(u64::MAX));
}

/// Coroutine currently running on this thread, NONE outside coroutines
#[inline]
pub fn current_coro() -> CoroId {
    CoroId::from_u64(CURRENT_CORO.with(|cell| cell.get()))
}

/// True when called from a coroutine stack
#[inline]
pub fn is_in_coroutine() -> bool {
    current_coro().is_some()
}

/// Install this worker's scheduler register save area
#[inline]
pub fn set_sched_regs(regs: *mut SavedRegs) {
    SCHED_REGS.with(|cell| cell.set(regs));
}

/// Scheduler save area for this thread; null off worker threads
#[inline]
pub fn sched_regs() -> *mut SavedRegs {
    SCHED_REGS.with(|cell| cell.get())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_defaults_to_none() {
        assert!(current_coro().is_none());
        assert!(!is_in_coroutine());
    }

    #[test]
    fn test_set_clear_roundtrip() {
        let id = CoroId::new(5, 2);
        set_current_coro(id);
        assert_eq!(current_coro(), id);
        assert!(is_in_coroutine());
        clear_current_coro();
        assert!(current_coro().is_none());
    }
}
