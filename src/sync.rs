//! The executing scheduler as seen from inside a green thread.
//!
//! Only one scheduler may execute per process at a time: the preemption
//! signal is process-wide and has to find its run queue without help. The
//! slot below records that queue and the OS thread driving it.

use crate::error::{SchedError, SchedResult};
use crate::preemption;
use crate::queue::RunQueue;
use crate::scheduler;
use crate::thread::{ThreadId, ThreadStatus};
use core::ptr;
use portable_atomic::{AtomicBool, AtomicPtr, AtomicUsize, Ordering};

static ACTIVE_QUEUE: AtomicPtr<RunQueue> = AtomicPtr::new(ptr::null_mut());
static ACTIVE_OWNER: AtomicUsize = AtomicUsize::new(0);
static PREEMPTIVE: AtomicBool = AtomicBool::new(false);

/// Holds the process-wide execution slot for the lifetime of one
/// `Scheduler::execute`.
pub(crate) struct ActiveRun {
    _claimed: (),
}

impl ActiveRun {
    pub fn claim(queue: *mut RunQueue, preemptive: bool) -> SchedResult<Self> {
        ACTIVE_QUEUE
            .compare_exchange(ptr::null_mut(), queue, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SchedError::SchedulerBusy)?;
        ACTIVE_OWNER.store(os_thread_token(), Ordering::Release);
        PREEMPTIVE.store(preemptive, Ordering::Release);
        Ok(ActiveRun { _claimed: () })
    }
}

impl Drop for ActiveRun {
    fn drop(&mut self) {
        PREEMPTIVE.store(false, Ordering::Release);
        ACTIVE_OWNER.store(0, Ordering::Release);
        ACTIVE_QUEUE.store(ptr::null_mut(), Ordering::Release);
    }
}

/// The executing queue and the OS thread that owns it.
pub(crate) fn active() -> Option<(*mut RunQueue, usize)> {
    let queue = ACTIVE_QUEUE.load(Ordering::Acquire);
    let owner = ACTIVE_OWNER.load(Ordering::Acquire);
    if queue.is_null() || owner == 0 {
        None
    } else {
        Some((queue, owner))
    }
}

/// The executing queue, if the caller is on the OS thread that drives it.
fn active_for_caller() -> Option<*mut RunQueue> {
    let (queue, owner) = active()?;
    (owner == os_thread_token()).then_some(queue)
}

#[cfg(target_os = "linux")]
pub(crate) fn os_thread_token() -> usize {
    unsafe { libc::pthread_self() as usize }
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn os_thread_token() -> usize {
    1
}

/// Give up the CPU to the next runnable green thread.
///
/// The caller is marked sleeping, the scheduler moves on in round-robin
/// order, and this returns once the caller is picked again. Outside a green
/// thread this does nothing.
pub fn yield_now() {
    let Some(queue) = active_for_caller() else {
        return;
    };
    let preemptive = PREEMPTIVE.load(Ordering::Acquire);
    if preemptive {
        preemption::block_tick();
    }
    unsafe { scheduler::suspend_current(queue, false) };
    if preemptive {
        preemption::unblock_tick();
    }
}

/// Id of the green thread calling this, or `None` outside one.
pub fn current_thread_id() -> Option<ThreadId> {
    with_running(|id, _| id)
}

/// Name given to the calling green thread at creation, if any.
pub fn current_thread_name() -> Option<&'static str> {
    with_running(|_, name| name).flatten()
}

fn with_running<T>(f: impl FnOnce(ThreadId, Option<&'static str>) -> T) -> Option<T> {
    let queue = active_for_caller()?;
    let thread = unsafe { (*queue).current() };
    if thread.is_null() {
        return None;
    }
    let thread = unsafe { &*thread };
    (thread.status() == ThreadStatus::Running).then(|| f(thread.id, thread.name))
}

pub(crate) fn preemption_enabled() -> bool {
    PREEMPTIVE.load(Ordering::Acquire)
}
