//! x86_64 (System V) context switching.

use super::Arch;
use core::arch::naked_asm;

pub struct X86_64Arch;

/// Callee-saved state under the System V ABI.
#[repr(C)]
#[derive(Debug)]
pub struct X86_64Context {
    pub rsp: u64,
    pub rbp: u64,
    pub rbx: u64,
    pub r12: u64,
    pub r13: u64,
    pub r14: u64,
    pub r15: u64,
    /// SSE control/status
    pub mxcsr: u32,
    /// x87 control word, low 16 bits
    pub fpu_cw: u32,
}

impl Default for X86_64Context {
    fn default() -> Self {
        Self {
            rsp: 0,
            rbp: 0,
            rbx: 0,
            r12: 0,
            r13: 0,
            r14: 0,
            r15: 0,
            mxcsr: 0x1F80,
            fpu_cw: 0x037F,
        }
    }
}

impl Arch for X86_64Arch {
    type SavedContext = X86_64Context;

    #[inline(always)]
    unsafe fn context_switch(prev: *mut Self::SavedContext, next: *const Self::SavedContext) {
        unsafe { switch_context(prev, next) }
    }

    unsafe fn prepare(ctx: &mut Self::SavedContext, stack_top: *mut u8, arg: *mut ()) {
        debug_assert_eq!(stack_top as usize % 16, 0);
        // `ret` in switch_context pops the trampoline address, leaving
        // rsp = top - 8, the same alignment as a normal function entry.
        let sp = unsafe { stack_top.sub(16) } as *mut u64;
        unsafe { sp.write(trampoline as usize as u64) };

        *ctx = X86_64Context {
            rsp: sp as u64,
            r12: arg as u64,
            ..Default::default()
        };
    }
}

/// Saves callee-saved registers of the caller into `rdi`, loads them from
/// `rsi`, and returns into the loaded context.
#[unsafe(naked)]
unsafe extern "C" fn switch_context(_prev: *mut X86_64Context, _next: *const X86_64Context) {
    naked_asm!(
        "mov [rdi + 0x00], rsp",
        "mov [rdi + 0x08], rbp",
        "mov [rdi + 0x10], rbx",
        "mov [rdi + 0x18], r12",
        "mov [rdi + 0x20], r13",
        "mov [rdi + 0x28], r14",
        "mov [rdi + 0x30], r15",
        "stmxcsr dword ptr [rdi + 0x38]",
        "fnstcw word ptr [rdi + 0x3c]",
        "mov rsp, [rsi + 0x00]",
        "mov rbp, [rsi + 0x08]",
        "mov rbx, [rsi + 0x10]",
        "mov r12, [rsi + 0x18]",
        "mov r13, [rsi + 0x20]",
        "mov r14, [rsi + 0x28]",
        "mov r15, [rsi + 0x30]",
        "ldmxcsr dword ptr [rsi + 0x38]",
        "fldcw word ptr [rsi + 0x3c]",
        // fresh context: pops the trampoline; suspended one: back into its caller
        "ret",
    );
}

/// First instruction a fresh thread executes. The argument travels in r12.
#[unsafe(naked)]
unsafe extern "C" fn trampoline() {
    naked_asm!(
        "xor ebp, ebp",
        // null return address; also realigns rsp to 16 for the call
        "push rbp",
        "mov rdi, r12",
        "call {start}",
        "ud2",
        start = sym crate::scheduler::thread_start,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::mem::offset_of;

    #[test]
    fn layout_matches_assembly_offsets() {
        assert_eq!(offset_of!(X86_64Context, rsp), 0x00);
        assert_eq!(offset_of!(X86_64Context, r15), 0x30);
        assert_eq!(offset_of!(X86_64Context, mxcsr), 0x38);
        assert_eq!(offset_of!(X86_64Context, fpu_cw), 0x3c);
    }

    #[test]
    fn prepare_positions_stack_below_top() {
        let mut stack = [0u64; 64];
        let top = unsafe { (stack.as_mut_ptr() as *mut u8).add(64 * 8) };
        let top = (top as usize & !15) as *mut u8;
        let mut ctx = X86_64Context::default();

        unsafe { X86_64Arch::prepare(&mut ctx, top, 0x1234 as *mut ()) };

        assert_eq!(ctx.rsp, top as u64 - 16);
        assert_eq!(ctx.r12, 0x1234);
        let ret = unsafe { *(ctx.rsp as *const u64) };
        assert_eq!(ret, trampoline as usize as u64);
    }
}
