//! Global ready queue
//!
//! Single FIFO shared by all workers: Mutex + Condvar with a parked-worker
//! count so pushes only notify when somebody is actually waiting. Parks
//! are always timed; the worker loop bounds the timeout by the next timer
//! deadline so sleepers are not starved by an idle queue.

use goro_core::id::CoroId;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

pub struct ReadyQueue {
    queue: Mutex<VecDeque<CoroId>>,
    cond: Condvar,
    parked: AtomicUsize,
}

impl ReadyQueue {
    pub fn new() -> Self {
        ReadyQueue {
            queue: Mutex::new(VecDeque::with_capacity(1024)),
            cond: Condvar::new(),
            parked: AtomicUsize::new(0),
        }
    }

    /// Enqueue and wake one parked worker if any.
    pub fn push(&self, id: CoroId) {
        {
            let mut q = self.queue.lock().unwrap();
            q.push_back(id);
        }
        if self.parked.load(Ordering::Acquire) > 0 {
            self.cond.notify_one();
        }
    }

    /// Non-blocking pop.
    pub fn pop(&self) -> Option<CoroId> {
        self.queue.lock().unwrap().pop_front()
    }

    /// Pop, parking up to `timeout` when empty. May return None after a
    /// timeout or a racing wake; callers loop.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<CoroId> {
        let mut q = self.queue.lock().unwrap();
        if let Some(id) = q.pop_front() {
            return Some(id);
        }
        self.parked.fetch_add(1, Ordering::AcqRel);
        let (mut q, _) = self.cond.wait_timeout(q, timeout).unwrap();
        self.parked.fetch_sub(1, Ordering::AcqRel);
        q.pop_front()
    }

    /// Wake every parked worker (shutdown, timer rescheduling).
    pub fn wake_all(&self) {
        self.cond.notify_all();
    }

    /// Wake one parked worker without enqueueing anything.
    pub fn wake_one(&self) {
        if self.parked.load(Ordering::Acquire) > 0 {
            self.cond.notify_one();
        }
    }

    pub fn len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ReadyQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_fifo_order() {
        let q = ReadyQueue::new();
        q.push(CoroId::new(1, 0));
        q.push(CoroId::new(2, 0));
        q.push(CoroId::new(3, 0));

        assert_eq!(q.pop(), Some(CoroId::new(1, 0)));
        assert_eq!(q.pop(), Some(CoroId::new(2, 0)));
        assert_eq!(q.pop(), Some(CoroId::new(3, 0)));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn test_pop_timeout_expires() {
        let q = ReadyQueue::new();
        let start = std::time::Instant::now();
        assert_eq!(q.pop_timeout(Duration::from_millis(20)), None);
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn test_push_wakes_parked_popper() {
        let q = Arc::new(ReadyQueue::new());
        let q2 = Arc::clone(&q);

        let popper = thread::spawn(move || q2.pop_timeout(Duration::from_secs(5)));

        // Give the popper time to park
        thread::sleep(Duration::from_millis(20));
        q.push(CoroId::new(9, 1));

        assert_eq!(popper.join().unwrap(), Some(CoroId::new(9, 1)));
    }
}
