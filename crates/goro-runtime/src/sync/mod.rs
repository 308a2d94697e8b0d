//! Coroutine-aware synchronization primitives
//!
//! All of these park the calling coroutine instead of the OS thread, and
//! wake through the scheduler's generation-checked handshake. Waiters
//! tolerate spurious wakes by re-validating under the primitive's lock
//! after every park.

pub mod channel;
pub mod co_mutex;
pub mod context;
pub mod wait_group;

pub use channel::Channel;
pub use co_mutex::{CoMutex, CoMutexGuard};
pub use context::Context;
pub use wait_group::WaitGroup;
