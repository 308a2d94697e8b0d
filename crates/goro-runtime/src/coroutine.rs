//! Coroutine slot table
//!
//! Fixed-size arena of coroutine slots. A slot's generation counter is
//! bumped on release, so a `CoroId` held by a timer, channel or the
//! netpoller goes stale the moment its coroutine finishes; every lookup
//! is generation-checked and stale handles resolve to `None`.

use crate::arch::SavedRegs;
use crate::stack::Stack;
use goro_core::error::{CoroError, CoroResult};
use goro_core::id::CoroId;
use goro_core::state::{AtomicCoroState, CoroState};
use goro_core::SpinLock;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// One arena entry.
pub struct CoroSlot {
    /// Lifecycle state, CAS-gated on the resume and wake edges
    pub state: AtomicCoroState,
    /// Bumped on release; part of the slot's CoroId
    pub generation: AtomicU32,
    /// Set by wakers, consumed by the worker after switch-out
    pub wake_pending: AtomicBool,
    /// Saved register area for the context switch
    regs: UnsafeCell<SavedRegs>,
    /// Stack, mapped lazily on first allocation and reused afterwards
    stack: SpinLock<Option<Stack>>,
}

// Safety: regs is only written while the slot is exclusively owned,
// either by spawn before the slot is enqueued or by the worker that won
// the Ready -> Running transition.
unsafe impl Sync for CoroSlot {}
unsafe impl Send for CoroSlot {}

impl CoroSlot {
    fn new() -> Self {
        CoroSlot {
            state: AtomicCoroState::new(CoroState::Free),
            generation: AtomicU32::new(0),
            wake_pending: AtomicBool::new(false),
            regs: UnsafeCell::new(SavedRegs::zeroed()),
            stack: SpinLock::new(None),
        }
    }

    /// Raw pointer to the register save area
    #[inline]
    pub fn regs_ptr(&self) -> *mut SavedRegs {
        self.regs.get()
    }

    /// High end of this slot's stack, if mapped
    pub fn stack_top(&self) -> Option<*mut u8> {
        self.stack.lock().as_ref().map(|s| s.top())
    }
}

/// The arena. Sized once at runtime init.
pub struct CoroTable {
    slots: Box<[CoroSlot]>,
    free: SpinLock<Vec<u32>>,
    stack_size: usize,
}

impl CoroTable {
    pub fn new(max_coroutines: usize, stack_size: usize) -> Self {
        let slots: Vec<CoroSlot> = (0..max_coroutines).map(|_| CoroSlot::new()).collect();
        // Low indices handed out first
        let free: Vec<u32> = (0..max_coroutines as u32).rev().collect();
        CoroTable {
            slots: slots.into_boxed_slice(),
            free: SpinLock::new(free),
            stack_size,
        }
    }

    /// Claim a slot and make sure its stack is mapped.
    pub fn allocate(&self) -> CoroResult<CoroId> {
        let index = match self.free.lock().pop() {
            Some(i) => i,
            None => return Err(CoroError::NoSlotsAvailable),
        };
        let slot = &self.slots[index as usize];

        {
            let mut stack = slot.stack.lock();
            if stack.is_none() {
                match Stack::allocate(self.stack_size) {
                    Ok(s) => *stack = Some(s),
                    Err(e) => {
                        drop(stack);
                        self.free.lock().push(index);
                        return Err(e);
                    }
                }
            }
        }

        slot.wake_pending.store(false, Ordering::Release);
        slot.state.store(CoroState::New);
        let generation = slot.generation.load(Ordering::Acquire);
        Ok(CoroId::new(index, generation))
    }

    /// Generation-checked lookup. Stale handles return None.
    #[inline]
    pub fn slot(&self, id: CoroId) -> Option<&CoroSlot> {
        if id.is_none() {
            return None;
        }
        let slot = self.slots.get(id.slot() as usize)?;
        if slot.generation.load(Ordering::Acquire) != id.generation() {
            return None;
        }
        Some(slot)
    }

    /// Return a finished slot to the free list. Invalidates outstanding
    /// handles before the index can be handed out again.
    pub fn release(&self, id: CoroId) {
        let Some(slot) = self.slot(id) else { return };

        slot.generation.fetch_add(1, Ordering::AcqRel);
        if let Some(stack) = slot.stack.lock().as_ref() {
            stack.recycle();
        }
        slot.state.store(CoroState::Free);
        self.free.lock().push(id.slot());
    }

    /// Slots currently handed out
    pub fn live_count(&self) -> usize {
        self.slots.len() - self.free.lock().len()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}
