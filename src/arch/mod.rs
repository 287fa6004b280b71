//! Architecture layer: saved contexts, the switch primitive, and the
//! trampoline a fresh thread starts in.

/// Architecture abstraction trait.
///
/// # Safety
///
/// Implementations manipulate the stack pointer and callee-saved registers
/// directly. Every method marked unsafe has preconditions the caller upholds.
pub trait Arch {
    /// Callee-saved register state of a suspended computation.
    type SavedContext: Default;

    /// Save the current callee-saved state into `prev` and resume `next`.
    ///
    /// Returns when some other context switches back into `prev`.
    ///
    /// # Safety
    ///
    /// - `prev` must be valid for writes and `next` valid for reads
    /// - `next` must hold state saved by a previous switch or built by
    ///   [`Arch::prepare`], and its stack must still be allocated
    unsafe fn context_switch(prev: *mut Self::SavedContext, next: *const Self::SavedContext);

    /// Build a context that, when switched to, starts executing
    /// `crate::scheduler::thread_start(arg)` with the stack pointer at
    /// `stack_top`. This is the only place a stack pointer is chosen rather
    /// than restored.
    ///
    /// # Safety
    ///
    /// `stack_top` must be 16-byte aligned, one past the end of a writable
    /// region that outlives the thread.
    unsafe fn prepare(ctx: &mut Self::SavedContext, stack_top: *mut u8, arg: *mut ());
}

#[cfg(target_arch = "x86_64")]
pub mod x86_64;

#[cfg(target_arch = "aarch64")]
pub mod aarch64;

#[cfg(target_arch = "x86_64")]
pub use x86_64::X86_64Arch as DefaultArch;

#[cfg(target_arch = "aarch64")]
pub use aarch64::Aarch64Arch as DefaultArch;

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
compile_error!("green-sched only supports x86_64 and aarch64");
