//! aarch64 context switching
//!
//! Saves the AAPCS64 callee-saved set: sp, resume pc, x19-x28, fp, lr and
//! the low halves of v8-v15 (d8-d15).

use std::arch::naked_asm;

/// Callee-saved register area. Field order is baked into the assembly
/// offsets below.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SavedRegs {
    pub sp: u64,  // 0x00
    pub pc: u64,  // 0x08
    pub x19: u64, // 0x10
    pub x20: u64, // 0x18
    pub x21: u64, // 0x20
    pub x22: u64, // 0x28
    pub x23: u64, // 0x30
    pub x24: u64, // 0x38
    pub x25: u64, // 0x40
    pub x26: u64, // 0x48
    pub x27: u64, // 0x50
    pub x28: u64, // 0x58
    pub fp: u64,  // 0x60 (x29)
    pub lr: u64,  // 0x68 (x30)
    pub d8: u64,  // 0x70
    pub d9: u64,  // 0x78
    pub d10: u64, // 0x80
    pub d11: u64, // 0x88
    pub d12: u64, // 0x90
    pub d13: u64, // 0x98
    pub d14: u64, // 0xA0
    pub d15: u64, // 0xA8
}

impl SavedRegs {
    pub const fn zeroed() -> Self {
        SavedRegs {
            sp: 0,
            pc: 0,
            x19: 0,
            x20: 0,
            x21: 0,
            x22: 0,
            x23: 0,
            x24: 0,
            x25: 0,
            x26: 0,
            x27: 0,
            x28: 0,
            fp: 0,
            lr: 0,
            d8: 0,
            d9: 0,
            d10: 0,
            d11: 0,
            d12: 0,
            d13: 0,
            d14: 0,
            d15: 0,
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
    // sp must stay 16-byte aligned at all times on aarch64
    let sp = (stack_top as usize) & !0xF;

    let regs = &mut *regs;
    *regs = SavedRegs::zeroed();
    regs.sp = sp as u64;
    regs.pc = entry_trampoline as usize as u64;
    regs.x19 = entry_fn as u64;
    regs.x20 = entry_arg as u64;
}

/// First-switch landing pad: calls the entry function with its argument,
/// then hands control to the scheduler-side finish hook. Must never
/// return, hence the trap.
#[unsafe(naked)]
pub unsafe extern "C" fn entry_trampoline() {
    naked_asm!(
        "mov x0, x20",
        "blr x19",
        "bl {finish}",
        "brk #0",
        finish = sym crate::scheduler::coro_finished,
    );
}

/// Save callee-saved registers into `old_regs`, restore from `new_regs`
/// and continue there. Returns when something later switches back into
/// `old_regs`.
#[unsafe(naked)]
pub unsafe extern "C" fn switch_context(_old_regs: *mut SavedRegs, _new_regs: *const SavedRegs) {
    naked_asm!(
        // Save into old_regs (x0); resume point is label 1
        "mov x9, sp",
        "str x9, [x0, #0x00]",
        "adr x9, 1f",
        "str x9, [x0, #0x08]",
        "stp x19, x20, [x0, #0x10]",
        "stp x21, x22, [x0, #0x20]",
        "stp x23, x24, [x0, #0x30]",
        "stp x25, x26, [x0, #0x40]",
        "stp x27, x28, [x0, #0x50]",
        "stp x29, x30, [x0, #0x60]",
        "stp d8, d9, [x0, #0x70]",
        "stp d10, d11, [x0, #0x80]",
        "stp d12, d13, [x0, #0x90]",
        "stp d14, d15, [x0, #0xA0]",
        // Restore from new_regs (x1)
        "ldr x9, [x1, #0x00]",
        "mov sp, x9",
        "ldp x19, x20, [x1, #0x10]",
        "ldp x21, x22, [x1, #0x20]",
        "ldp x23, x24, [x1, #0x30]",
        "ldp x25, x26, [x1, #0x40]",
        "ldp x27, x28, [x1, #0x50]",
        "ldp x29, x30, [x1, #0x60]",
        "ldp d8, d9, [x1, #0x70]",
        "ldp d10, d11, [x1, #0x80]",
        "ldp d12, d13, [x1, #0x90]",
        "ldp d14, d15, [x1, #0xA0]",
        "ldr x9, [x1, #0x08]",
        "br x9",
        // Resume point for the saved context
        "1:",
        "ret",
    );
}
