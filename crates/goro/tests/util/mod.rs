//! Shared runtime for integration tests.
//!
//! One runtime per test binary; tests run their bodies as coroutines so
//! the blocking primitives are usable.

use goro::{Runtime, RuntimeConfig};
use std::sync::OnceLock;
use std::time::Duration;

static RUNTIME: OnceLock<Runtime> = OnceLock::new();

pub fn runtime() -> &'static Runtime {
    RUNTIME.get_or_init(|| {
        let rt = Runtime::new(
            RuntimeConfig::new()
                .num_workers(4)
                .max_coroutines(512)
                .park_timeout(Duration::from_millis(5)),
        )
        .expect("runtime init");
        rt.start().expect("runtime start");
        rt
    })
}

/// Run `f` as a coroutine and block the test thread until it returns.
pub fn run<F: FnOnce() + Send + 'static>(f: F) {
    runtime().block_on(f).expect("block_on");
}
