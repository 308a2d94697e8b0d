//! Cancellation context
//!
//! A cancel signal fans out through a capacity-1 done channel: exactly
//! one `()` is ever delivered no matter how many sides race to cancel.
//! Consumers either poll `is_cancelled` or block on `done()`.

use crate::scheduler;
use crate::sync::Channel;
use goro_core::error::CoroResult;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct ContextInner {
    cancelled: AtomicBool,
    done: Channel<()>,
}

#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Context {
    pub fn new() -> Self {
        Context {
            inner: Arc::new(ContextInner {
                cancelled: AtomicBool::new(false),
                done: Channel::new(1),
            }),
        }
    }

    /// A context that cancels itself after `timeout`. The sleeper
    /// coroutine runs to its deadline even if the context is cancelled
    /// earlier; the second cancel is a no-op.
    pub fn with_timeout(timeout: Duration) -> CoroResult<Context> {
        let ctx = Context::new();
        let handle = ctx.clone();
        scheduler::spawn(move || {
            scheduler::sleep(timeout);
            handle.cancel();
        })?;
        Ok(ctx)
    }

    /// Cancel. Idempotent; only the first call delivers the done signal.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        // Capacity 1 and the swap gate make this push infallible, but a
        // failure would only mean the signal is already there
        let _ = self.inner.done.try_push(());
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// The done channel; `pop()` on it blocks until cancellation.
    pub fn done(&self) -> Channel<()> {
        self.inner.done.clone()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_sets_flag_and_signals_once() {
        let ctx = Context::new();
        assert!(!ctx.is_cancelled());

        ctx.cancel();
        ctx.cancel();
        ctx.cancel();

        assert!(ctx.is_cancelled());
        let done = ctx.done();
        assert!(done.try_pop().is_ok());
        assert!(done.try_pop().is_err(), "exactly one signal delivered");
    }

    #[test]
    fn test_clones_share_cancellation() {
        let ctx = Context::new();
        let other = ctx.clone();
        other.cancel();
        assert!(ctx.is_cancelled());
    }
}
