//! # goro-core
//!
//! Core types for the goro coroutine runtime.
//!
//! This crate is platform-agnostic and contains no OS-specific code.
//! Stack switching, scheduling and the netpoller live in `goro-runtime`.
//!
//! ## Modules
//!
//! - `id` - generation-checked coroutine handle
//! - `state` - coroutine lifecycle states
//! - `error` - error types
//! - `spinlock` - busy-wait lock for short critical sections
//! - `kprint` - kernel-style debug printing macros
//! - `env` - environment variable utilities

pub mod id;
pub mod state;
pub mod error;
pub mod spinlock;
pub mod kprint;
pub mod env;

// Re-exports for convenience
pub use id::CoroId;
pub use state::CoroState;
pub use error::{CoroError, CoroResult};
pub use spinlock::SpinLock;
pub use env::{env_get, env_get_bool, env_get_opt};
