//! aarch64 (AAPCS64) context switching.

use super::Arch;
use core::arch::naked_asm;

pub struct Aarch64Arch;

/// Callee-saved state under AAPCS64: x19-x28, fp, lr, sp and the low halves
/// of v8-v15.
#[repr(C)]
#[derive(Debug, Default)]
pub struct Aarch64Context {
    pub sp: u64,
    pub lr: u64,
    pub fp: u64,
    pub x19: u64,
    pub x20: u64,
    pub x21: u64,
    pub x22: u64,
    pub x23: u64,
    pub x24: u64,
    pub x25: u64,
    pub x26: u64,
    pub x27: u64,
    pub x28: u64,
    pub d8: u64,
    pub d9: u64,
    pub d10: u64,
    pub d11: u64,
    pub d12: u64,
    pub d13: u64,
    pub d14: u64,
    pub d15: u64,
}

impl Arch for Aarch64Arch {
    type SavedContext = Aarch64Context;

    #[inline(always)]
    unsafe fn context_switch(prev: *mut Self::SavedContext, next: *const Self::SavedContext) {
        unsafe { switch_context(prev, next) }
    }

    unsafe fn prepare(ctx: &mut Self::SavedContext, stack_top: *mut u8, arg: *mut ()) {
        debug_assert_eq!(stack_top as usize % 16, 0);
        // `ret` jumps through lr, nothing needs to be pushed
        *ctx = Aarch64Context {
            sp: stack_top as u64,
            lr: trampoline as usize as u64,
            x19: arg as u64,
            ..Default::default()
        };
    }
}

#[unsafe(naked)]
unsafe extern "C" fn switch_context(_prev: *mut Aarch64Context, _next: *const Aarch64Context) {
    naked_asm!(
        "mov x9, sp",
        "str x9,  [x0, #0x00]",
        "str lr,  [x0, #0x08]",
        "str fp,  [x0, #0x10]",
        "stp x19, x20, [x0, #0x18]",
        "stp x21, x22, [x0, #0x28]",
        "stp x23, x24, [x0, #0x38]",
        "stp x25, x26, [x0, #0x48]",
        "stp x27, x28, [x0, #0x58]",
        "stp d8,  d9,  [x0, #0x68]",
        "stp d10, d11, [x0, #0x78]",
        "stp d12, d13, [x0, #0x88]",
        "stp d14, d15, [x0, #0x98]",
        "ldr x9,  [x1, #0x00]",
        "mov sp, x9",
        "ldr lr,  [x1, #0x08]",
        "ldr fp,  [x1, #0x10]",
        "ldp x19, x20, [x1, #0x18]",
        "ldp x21, x22, [x1, #0x28]",
        "ldp x23, x24, [x1, #0x38]",
        "ldp x25, x26, [x1, #0x48]",
        "ldp x27, x28, [x1, #0x58]",
        "ldp d8,  d9,  [x1, #0x68]",
        "ldp d10, d11, [x1, #0x78]",
        "ldp d12, d13, [x1, #0x88]",
        "ldp d14, d15, [x1, #0x98]",
        "ret",
    );
}

/// First instruction a fresh thread executes. The argument travels in x19.
#[unsafe(naked)]
unsafe extern "C" fn trampoline() {
    naked_asm!(
        "mov x0, x19",
        "mov fp, xzr",
        "bl {start}",
        "brk #0x1",
        start = sym crate::scheduler::thread_start,
    );
}
