//! Timer heap
//!
//! Global min-heap of deadlines under a SpinLock; safe to touch from a
//! coroutine stack (no syscalls, no allocation beyond heap growth).
//! Workers drain expired entries at the top of every loop iteration: run
//! the callback if present, then wake the coroutine.

use goro_core::id::CoroId;
use goro_core::SpinLock;
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

static START_INSTANT: OnceLock<Instant> = OnceLock::new();

/// Monotonic nanoseconds since runtime init.
#[inline]
pub fn now_ns() -> u64 {
    START_INSTANT
        .get_or_init(Instant::now)
        .elapsed()
        .as_nanos() as u64
}

/// One pending deadline. `coro` may be NONE for callback-only entries;
/// `callback` runs on whichever worker drains the entry.
pub struct TimerEntry {
    pub deadline_ns: u64,
    pub coro: CoroId,
    pub callback: Option<Box<dyn FnOnce() + Send>>,
}

// Min-heap by deadline (reversed for BinaryHeap); ties in either order
impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other.deadline_ns.cmp(&self.deadline_ns)
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline_ns == other.deadline_ns
    }
}

impl Eq for TimerEntry {}

pub struct TimerHeap {
    heap: SpinLock<BinaryHeap<TimerEntry>>,
}

impl TimerHeap {
    pub fn new() -> Self {
        TimerHeap {
            heap: SpinLock::new(BinaryHeap::with_capacity(256)),
        }
    }

    pub fn add(&self, entry: TimerEntry) {
        self.heap.lock().push(entry);
    }

    /// Pop one expired entry, None when the earliest deadline is still
    /// in the future.
    pub fn pop_expired(&self, now: u64) -> Option<TimerEntry> {
        let mut heap = self.heap.lock();
        match heap.peek() {
            Some(top) if top.deadline_ns <= now => heap.pop(),
            _ => None,
        }
    }

    /// Time until the earliest deadline; None when the heap is empty.
    pub fn next_deadline_in(&self) -> Option<Duration> {
        let heap = self.heap.lock();
        let top = heap.peek()?;
        let now = now_ns();
        if top.deadline_ns <= now {
            Some(Duration::ZERO)
        } else {
            Some(Duration::from_nanos(top.deadline_ns - now))
        }
    }

    pub fn len(&self) -> usize {
        self.heap.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TimerHeap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(deadline_ns: u64, slot: u32) -> TimerEntry {
        TimerEntry {
            deadline_ns,
            coro: CoroId::new(slot, 0),
            callback: None,
        }
    }

    #[test]
    fn test_expiry_order() {
        let timers = TimerHeap::new();
        timers.add(entry(300, 3));
        timers.add(entry(100, 1));
        timers.add(entry(200, 2));

        let a = timers.pop_expired(1000).unwrap();
        let b = timers.pop_expired(1000).unwrap();
        let c = timers.pop_expired(1000).unwrap();
        assert_eq!(a.deadline_ns, 100);
        assert_eq!(b.deadline_ns, 200);
        assert_eq!(c.deadline_ns, 300);
        assert!(timers.pop_expired(1000).is_none());
    }

    #[test]
    fn test_future_deadline_not_popped() {
        let timers = TimerHeap::new();
        timers.add(entry(500, 1));
        assert!(timers.pop_expired(499).is_none());
        assert!(timers.pop_expired(500).is_some());
    }

    #[test]
    fn test_next_deadline_in() {
        let timers = TimerHeap::new();
        assert!(timers.next_deadline_in().is_none());

        timers.add(entry(now_ns() + 1_000_000_000, 1));
        let d = timers.next_deadline_in().unwrap();
        assert!(d > Duration::from_millis(500));
        assert!(d <= Duration::from_secs(1));
    }

    #[test]
    fn test_callback_carried() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;

        let fired = Arc::new(AtomicBool::new(false));
        let f2 = Arc::clone(&fired);
        let timers = TimerHeap::new();
        timers.add(TimerEntry {
            deadline_ns: 0,
            coro: CoroId::NONE,
            callback: Some(Box::new(move || f2.store(true, Ordering::Release))),
        });

        let mut e = timers.pop_expired(1).unwrap();
        if let Some(cb) = e.callback.take() {
            cb();
        }
        assert!(fired.load(Ordering::Acquire));
    }
}
