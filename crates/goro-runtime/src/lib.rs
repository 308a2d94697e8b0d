//! # goro-runtime
//!
//! OS-facing runtime for the goro coroutine scheduler.
//!
//! This crate provides:
//! - Guard-paged coroutine stacks (mmap)
//! - Context switching (architecture-specific assembly)
//! - The coroutine slot table and global scheduler
//! - The epoll netpoller and blocking-adapter I/O
//! - CSP-style sync primitives (Channel, WaitGroup, CoMutex, Context)

pub mod config;
pub mod tls;
pub mod arch;
pub mod stack;
pub mod coroutine;
pub mod ready_queue;
pub mod timer;
pub mod scheduler;
pub mod netpoller;
pub mod io;
pub mod sync;

// Re-exports
pub use config::RuntimeConfig;
pub use scheduler::{current, is_finished, park_current, push_ready, sleep, spawn, yield_now};
pub use sync::{Channel, CoMutex, Context, WaitGroup};

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        // epoll-based netpoller; nothing extra to pull in
    } else {
        compile_error!("goro-runtime requires Linux (the netpoller is built on epoll)");
    }
}
