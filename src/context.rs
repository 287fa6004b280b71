//! Execution contexts and the two ways of moving between them.
//!
//! The raw switch is only ever used for a thread leaving the CPU
//! ([`leave`]) and the dispatcher entering a thread ([`enter`]). Everything
//! above this module reasons in terms of thread status.

use crate::arch::{Arch, DefaultArch};

/// Saved CPU state of a suspended computation.
pub type Context = <DefaultArch as Arch>::SavedContext;

/// Dispatcher side: save the dispatcher into `dispatcher` and run `thread`.
/// Returns once the thread suspends or terminates.
///
/// # Safety
///
/// `thread` must have been prepared or saved by a previous [`leave`], and its
/// stack must still be allocated.
#[inline(always)]
pub(crate) unsafe fn enter(dispatcher: *mut Context, thread: *const Context) {
    unsafe { DefaultArch::context_switch(dispatcher, thread) }
}

/// Thread side: save the running thread into `thread` and go back to the
/// dispatcher. Returns only if the thread is resumed later.
///
/// # Safety
///
/// `dispatcher` must hold state saved by [`enter`] in the current run.
#[inline(always)]
pub(crate) unsafe fn leave(thread: *mut Context, dispatcher: *const Context) {
    unsafe { DefaultArch::context_switch(thread, dispatcher) }
}

/// Position a never-run thread at the top of its stack.
///
/// # Safety
///
/// See [`Arch::prepare`].
#[inline(always)]
pub(crate) unsafe fn prepare(ctx: &mut Context, stack_top: *mut u8, arg: *mut ()) {
    unsafe { DefaultArch::prepare(ctx, stack_top, arg) }
}
