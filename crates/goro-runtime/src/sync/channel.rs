//! Bounded MPMC channel
//!
//! One SpinLock over the buffer and both waiter queues. A value handed
//! to a parked receiver goes straight into that receiver's handoff slot
//! and never touches the buffer, so FIFO hand-over survives racing
//! receivers. Blocked senders keep their value on their own stack and
//! retry on wake.
//!
//! Capacity 0 approximates a rendezvous: an empty buffer accepts exactly
//! one value, and the next sender parks until a receiver drains it.

use crate::scheduler;
use crate::tls;
use goro_core::error::{CoroError, CoroResult, TryPopError, TryPushError};
use goro_core::id::CoroId;
use goro_core::SpinLock;
use std::collections::VecDeque;
use std::sync::Arc;

struct RecvWaiter<T> {
    coro: CoroId,
    slot: Arc<SpinLock<Option<T>>>,
}

struct ChanState<T> {
    buffer: VecDeque<T>,
    send_waiters: VecDeque<CoroId>,
    recv_waiters: VecDeque<RecvWaiter<T>>,
}

struct ChanShared<T> {
    capacity: usize,
    state: SpinLock<ChanState<T>>,
}

/// Cloneable channel handle.
pub struct Channel<T> {
    shared: Arc<ChanShared<T>>,
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Channel {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Send> Channel<T> {
    pub fn new(capacity: usize) -> Self {
        Channel {
            shared: Arc::new(ChanShared {
                capacity,
                state: SpinLock::new(ChanState {
                    buffer: VecDeque::with_capacity(capacity.max(1)),
                    send_waiters: VecDeque::new(),
                    recv_waiters: VecDeque::new(),
                }),
            }),
        }
    }

    fn has_space(&self, state: &ChanState<T>) -> bool {
        if self.shared.capacity == 0 {
            state.buffer.is_empty()
        } else {
            state.buffer.len() < self.shared.capacity
        }
    }

    /// Send, parking while the channel is full. Outside a coroutine this
    /// only succeeds when it would not need to park.
    pub fn push(&self, value: T) -> CoroResult<()> {
        let current = tls::current_coro();
        let mut pending = Some(value);
        let mut registered = false;

        loop {
            let wake = {
                let mut st = self.shared.state.lock();
                if registered {
                    st.send_waiters.retain(|&c| c != current);
                    registered = false;
                }
                if let Some(waiter) = st.recv_waiters.pop_front() {
                    *waiter.slot.lock() = pending.take();
                    Some(waiter.coro)
                } else if self.has_space(&st) {
                    if let Some(v) = pending.take() {
                        st.buffer.push_back(v);
                    }
                    None
                } else {
                    if current.is_none() {
                        return Err(CoroError::NotInCoroutine);
                    }
                    st.send_waiters.push_back(current);
                    registered = true;
                    None
                }
            };

            if let Some(coro) = wake {
                scheduler::push_ready(coro);
            }
            if pending.is_none() {
                return Ok(());
            }
            scheduler::park_current();
        }
    }

    /// Receive, parking while the channel is empty. Outside a coroutine
    /// this only succeeds when a value is already buffered.
    pub fn pop(&self) -> CoroResult<T> {
        let current = tls::current_coro();
        let slot: Arc<SpinLock<Option<T>>> = Arc::new(SpinLock::new(None));
        let mut registered = false;

        loop {
            let mut st = self.shared.state.lock();
            if registered {
                // Deregister before anything else; a sender that finds
                // us in the queue would hand off into our slot
                st.recv_waiters.retain(|w| w.coro != current);
                registered = false;
                if let Some(v) = slot.lock().take() {
                    return Ok(v);
                }
            }
            if let Some(v) = st.buffer.pop_front() {
                let sender = st.send_waiters.pop_front();
                drop(st);
                if let Some(coro) = sender {
                    scheduler::push_ready(coro);
                }
                return Ok(v);
            }
            if current.is_none() {
                return Err(CoroError::NotInCoroutine);
            }
            st.recv_waiters.push_back(RecvWaiter {
                coro: current,
                slot: Arc::clone(&slot),
            });
            registered = true;
            drop(st);
            scheduler::park_current();
        }
    }

    /// Non-blocking send. Returns the value on a full channel.
    pub fn try_push(&self, value: T) -> Result<(), TryPushError<T>> {
        let wake = {
            let mut st = self.shared.state.lock();
            if let Some(waiter) = st.recv_waiters.pop_front() {
                *waiter.slot.lock() = Some(value);
                Some(waiter.coro)
            } else if self.has_space(&st) {
                st.buffer.push_back(value);
                None
            } else {
                return Err(TryPushError(value));
            }
        };
        if let Some(coro) = wake {
            scheduler::push_ready(coro);
        }
        Ok(())
    }

    /// Non-blocking receive.
    pub fn try_pop(&self) -> Result<T, TryPopError> {
        let (value, wake) = {
            let mut st = self.shared.state.lock();
            match st.buffer.pop_front() {
                Some(v) => (v, st.send_waiters.pop_front()),
                None => return Err(TryPopError),
            }
        };
        if let Some(coro) = wake {
            scheduler::push_ready(coro);
        }
        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.shared.state.lock().buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_ops_respect_capacity() {
        let ch: Channel<u32> = Channel::new(2);
        assert!(ch.try_push(1).is_ok());
        assert!(ch.try_push(2).is_ok());

        let err = ch.try_push(3).unwrap_err();
        assert_eq!(err.0, 3, "rejected value comes back to the caller");

        assert_eq!(ch.try_pop(), Ok(1));
        assert_eq!(ch.try_pop(), Ok(2));
        assert!(ch.try_pop().is_err());
    }

    #[test]
    fn test_zero_capacity_accepts_one() {
        let ch: Channel<&'static str> = Channel::new(0);
        assert!(ch.try_push("a").is_ok());
        assert!(ch.try_push("b").is_err());
        assert_eq!(ch.try_pop(), Ok("a"));
        assert!(ch.try_push("b").is_ok());
    }

    #[test]
    fn test_fifo_through_buffer() {
        let ch: Channel<u32> = Channel::new(8);
        for i in 0..5 {
            ch.try_push(i).unwrap();
        }
        for i in 0..5 {
            assert_eq!(ch.try_pop(), Ok(i));
        }
    }

    #[test]
    fn test_clone_shares_state() {
        let a: Channel<u8> = Channel::new(4);
        let b = a.clone();
        a.try_push(7).unwrap();
        assert_eq!(b.try_pop(), Ok(7));
    }

    #[test]
    fn test_blocking_ops_off_thread_fall_back() {
        // Without a coroutine, push succeeds while space remains and pop
        // while values remain; both refuse to park
        let ch: Channel<u32> = Channel::new(1);
        assert!(ch.push(1).is_ok());
        assert!(matches!(ch.push(2), Err(CoroError::NotInCoroutine)));
        assert_eq!(ch.pop().unwrap(), 1);
        assert!(matches!(ch.pop(), Err(CoroError::NotInCoroutine)));
    }
}
