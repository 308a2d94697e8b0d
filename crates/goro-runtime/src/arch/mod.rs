//! Architecture-specific context switching
//!
//! Each backend provides a `#[repr(C)]` `SavedRegs` area holding the
//! callee-saved state, `init_context` to lay out a fresh coroutine so the
//! first switch lands in the entry trampoline, and `switch_context` to
//! save into one area and restore from another. Offsets in the assembly
//! must match the struct layout exactly.

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        pub mod x86_64;
        pub use x86_64::{init_context, switch_context, SavedRegs};
    } else if #[cfg(target_arch = "aarch64")] {
        pub mod aarch64;
        pub use aarch64::{init_context, switch_context, SavedRegs};
    } else {
        compile_error!("unsupported architecture: goro-runtime needs x86_64 or aarch64");
    }
}
