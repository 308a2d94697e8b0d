//! x86_64 context switching
//!
//! Voluntary switches only, so saving the System V callee-saved set is
//! enough: rsp, resume rip, rbx, rbp, r12-r15.

use std::arch::naked_asm;

/// Callee-saved register area. Field order is baked into the assembly
/// offsets below.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SavedRegs {
    pub rsp: u64, // 0x00
    pub rip: u64, // 0x08
    pub rbx: u64, // 0x10
    pub rbp: u64, // 0x18
    pub r12: u64, // 0x20
    pub r13: u64, // 0x28
    pub r14: u64, // 0x30
    pub r15: u64, // 0x38
}

impl SavedRegs {
    pub const fn zeroed() -> Self {
        SavedRegs {
            rsp: 0,
            rip: 0,
            rbx: 0,
            rbp: 0,
            r12: 0,
            r13: 0,
            r14: 0,
            r15: 0,
        }
    }
}

/// Lay out a fresh coroutine context.
///
/// The first switch into `regs` jumps to the trampoline, which calls
/// `entry_fn(entry_arg)` and then the finish hook.
///
/// # Safety
///
/// `regs` must point to writable `SavedRegs` memory and `stack_top` must
/// be the high end of a mapped stack.
pub unsafe fn init_context(
    regs: *mut SavedRegs,
    stack_top: *mut u8,
    entry_fn: usize,
    entry_arg: usize,
) {
    // The trampoline reaches the entry function through its own `call`,
    // which pushes the return-address slot; rsp must therefore be
    // 16-byte aligned when the trampoline starts, so the entry function
    // observes the ABI-mandated 8 mod 16.
    let sp = stack_top as usize;
    let aligned_sp = sp & !0xF;

    let regs = &mut *regs;
    regs.rsp = aligned_sp as u64;
    regs.rip = entry_trampoline as usize as u64;
    regs.rbx = 0;
    regs.rbp = 0;
    regs.r12 = entry_fn as u64;
    regs.r13 = entry_arg as u64;
    regs.r14 = 0;
    regs.r15 = 0;
}

/// First-switch landing pad: calls the entry function with its argument,
/// then hands control to the scheduler-side finish hook. Must never
/// return, hence the trap.
#[unsafe(naked)]
pub unsafe extern "C" fn entry_trampoline() {
    naked_asm!(
        "mov rdi, r13",
        "call r12",
        "call {finish}",
        "ud2",
        finish = sym crate::scheduler::coro_finished,
    );
}

/// Save callee-saved registers into `old_regs`, restore from `new_regs`
/// and continue there. Returns when something later switches back into
/// `old_regs`.
#[unsafe(naked)]
pub unsafe extern "C" fn switch_context(_old_regs: *mut SavedRegs, _new_regs: *const SavedRegs) {
    naked_asm!(
        // Save into old_regs (RDI); resume point is label 1
        "mov [rdi + 0x00], rsp",
        "lea rax, [rip + 1f]",
        "mov [rdi + 0x08], rax",
        "mov [rdi + 0x10], rbx",
        "mov [rdi + 0x18], rbp",
        "mov [rdi + 0x20], r12",
        "mov [rdi + 0x28], r13",
        "mov [rdi + 0x30], r14",
        "mov [rdi + 0x38], r15",
        // Restore from new_regs (RSI)
        "mov rsp, [rsi + 0x00]",
        "mov rax, [rsi + 0x08]",
        "mov rbx, [rsi + 0x10]",
        "mov rbp, [rsi + 0x18]",
        "mov r12, [rsi + 0x20]",
        "mov r13, [rsi + 0x28]",
        "mov r14, [rsi + 0x30]",
        "mov r15, [rsi + 0x38]",
        "jmp rax",
        // Resume point for the saved context
        "1:",
        "ret",
    );
}
