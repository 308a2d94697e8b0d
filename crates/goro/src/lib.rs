//! # goro - Go-style green threads for Rust
//!
//! Cooperatively-scheduled coroutines with their own guard-paged stacks,
//! an M:N scheduler over a worker pool, an epoll netpoller, and CSP-style
//! primitives: `Channel`, `WaitGroup`, `CoMutex`, `Context`.
//!
//! ## Quick Start
//!
//! ```ignore
//! use goro::{go, Runtime, RuntimeConfig, Channel, WaitGroup};
//! use std::sync::Arc;
//!
//! fn main() {
//!     let rt = Runtime::new(RuntimeConfig::from_env()).unwrap();
//!     rt.start().unwrap();
//!
//!     rt.block_on(|| {
//!         let ch: Channel<u32> = Channel::new(4);
//!         let wg = Arc::new(WaitGroup::new());
//!         wg.add(1);
//!
//!         let (ch2, wg2) = (ch.clone(), Arc::clone(&wg));
//!         go(move || {
//!             for i in 0..10 {
//!                 ch2.push(i).unwrap();
//!             }
//!             wg2.done();
//!         }).unwrap();
//!
//!         for _ in 0..10 {
//!             let v = ch.pop().unwrap();
//!             goro::kinfo!("got {}", v);
//!         }
//!         wg.wait().unwrap();
//!     }).unwrap();
//!
//!     rt.shutdown();
//! }
//! ```

// Re-export core types
pub use goro_core::error::{TryPopError, TryPushError};
pub use goro_core::{CoroError, CoroId, CoroResult, CoroState};

// Re-export kprint macros and log controls
pub use goro_core::kprint::{init as init_logging, set_log_level, LogLevel};
pub use goro_core::{kdebug, kerror, kinfo, kprintln, ktrace, kwarn};

// Re-export env utilities
pub use goro_core::{env_get, env_get_bool, env_get_opt};

// Re-export runtime surface
pub use goro_runtime::io;
pub use goro_runtime::netpoller::{Interest, IoKind};
pub use goro_runtime::sync::{Channel, CoMutex, CoMutexGuard, Context, WaitGroup};
pub use goro_runtime::{current, is_finished, push_ready, sleep, yield_now, RuntimeConfig};

use goro_runtime::scheduler;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};

/// Handle for the global runtime.
///
/// There is one runtime per process; `new` installs it and `start`
/// brings up the worker pool and the netpoller thread.
pub struct Runtime {
    started: AtomicBool,
}

impl Runtime {
    /// Install the global scheduler with this configuration. Does not
    /// start any threads yet.
    pub fn new(config: RuntimeConfig) -> CoroResult<Self> {
        scheduler::init(config)?;
        Ok(Runtime {
            started: AtomicBool::new(false),
        })
    }

    /// Spawn worker threads and the netpoller.
    pub fn start(&self) -> CoroResult<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(CoroError::AlreadyInitialized);
        }
        scheduler::start()
    }

    /// Run `f` inside a coroutine and block the calling thread until it
    /// returns. The runtime keeps running afterwards.
    pub fn block_on<F>(&self, f: F) -> CoroResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let pair = Arc::new((Mutex::new(false), Condvar::new()));
        let signal = Arc::clone(&pair);

        scheduler::spawn(move || {
            f();
            let (lock, cvar) = &*signal;
            let mut finished = lock.lock().unwrap();
            *finished = true;
            cvar.notify_all();
        })?;

        let (lock, cvar) = &*pair;
        let mut finished = lock.lock().unwrap();
        while !*finished {
            finished = cvar.wait(finished).unwrap();
        }
        Ok(())
    }

    /// Stop workers and the netpoller. Idempotent.
    pub fn shutdown(&self) {
        if self.started.swap(false, Ordering::SeqCst) {
            scheduler::shutdown();
        }
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Spawn a coroutine on the global runtime. Go's `go` statement.
pub fn go<F>(f: F) -> CoroResult<CoroId>
where
    F: FnOnce() + Send + 'static,
{
    scheduler::spawn(f)
}

/// Alias for [`go`].
pub fn spawn<F>(f: F) -> CoroResult<CoroId>
where
    F: FnOnce() + Send + 'static,
{
    scheduler::spawn(f)
}

/// True when called from a coroutine stack.
#[inline]
pub fn is_in_coroutine() -> bool {
    goro_runtime::tls::is_in_coroutine()
}
