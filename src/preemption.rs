//! Timer-driven preemption.
//!
//! `ITIMER_REAL` raises `SIGALRM` one timeslice after each dispatch. The
//! handler runs on the interrupted green thread's own stack and suspends that
//! thread exactly like [`yield_now`](crate::yield_now); when the thread is
//! resumed the handler returns and the kernel restores the interrupted state.
//!
//! Masking discipline on the driving OS thread:
//! - the dispatcher always runs with `SIGALRM` blocked
//! - green threads run with it unblocked
//! - the handler runs with it blocked (the kernel adds it), so it never
//!   re-enters itself
//!
//! A voluntary yield blocks the signal before touching the queue and unblocks
//! it once resumed. A thread resumed out of the handler gets its mask back
//! from the signal frame.

use crate::error::{SchedError, SchedResult};
use core::time::Duration;

#[cfg(target_os = "linux")]
pub struct PreemptionTimer {
    timeslice: Duration,
    previous_action: libc::sigaction,
    previous_mask: libc::sigset_t,
}

#[cfg(target_os = "linux")]
impl PreemptionTimer {
    /// Block `SIGALRM` on the calling OS thread and install the tick handler.
    /// The timer itself stays disarmed until [`arm`](Self::arm).
    pub fn install(timeslice: Duration) -> SchedResult<Self> {
        use core::mem::MaybeUninit;

        unsafe {
            let mut set = MaybeUninit::<libc::sigset_t>::uninit();
            libc::sigemptyset(set.as_mut_ptr());
            libc::sigaddset(set.as_mut_ptr(), libc::SIGALRM);

            let mut previous_mask = MaybeUninit::<libc::sigset_t>::uninit();
            if libc::pthread_sigmask(libc::SIG_BLOCK, set.as_ptr(), previous_mask.as_mut_ptr()) != 0 {
                crate::sched_error!("failed to block SIGALRM");
                return Err(SchedError::TimerUnavailable);
            }
            let previous_mask = previous_mask.assume_init();

            let mut sa = MaybeUninit::<libc::sigaction>::zeroed();
            libc::sigemptyset(&mut (*sa.as_mut_ptr()).sa_mask);
            (*sa.as_mut_ptr()).sa_flags = libc::SA_RESTART;
            (*sa.as_mut_ptr()).sa_sigaction = on_tick as usize;

            let mut previous_action = MaybeUninit::<libc::sigaction>::zeroed();
            if libc::sigaction(libc::SIGALRM, sa.as_ptr(), previous_action.as_mut_ptr()) == -1 {
                crate::sched_error!("failed to install SIGALRM handler, errno=", errno());
                libc::pthread_sigmask(libc::SIG_SETMASK, &previous_mask, core::ptr::null_mut());
                return Err(SchedError::TimerUnavailable);
            }

            crate::sched_debug!("preemption timer installed, timeslice_us=", timeslice.as_micros() as u64);
            Ok(PreemptionTimer {
                timeslice,
                previous_action: previous_action.assume_init(),
                previous_mask,
            })
        }
    }

    /// Start a fresh one-shot timeslice for the thread about to be dispatched.
    pub fn arm(&self) {
        if set_timer(Some(self.timeslice)).is_err() {
            crate::sched_warn!("setitimer failed, thread runs without a timeslice, errno=", errno());
        }
    }

    /// Stop the timer and discard a tick that already fired but is still
    /// pending. Call with `SIGALRM` blocked.
    pub fn disarm(&self) {
        if set_timer(None).is_err() {
            crate::sched_warn!("failed to disarm preemption timer, errno=", errno());
        }
        discard_pending_tick();
    }
}

#[cfg(target_os = "linux")]
impl Drop for PreemptionTimer {
    fn drop(&mut self) {
        self.disarm();
        unsafe {
            // SIG_IGN discards a tick that fired but was never delivered
            libc::signal(libc::SIGALRM, libc::SIG_IGN);
            if libc::sigaction(libc::SIGALRM, &self.previous_action, core::ptr::null_mut()) == -1 {
                crate::sched_warn!("failed to restore SIGALRM disposition, errno=", errno());
            }
            libc::pthread_sigmask(libc::SIG_SETMASK, &self.previous_mask, core::ptr::null_mut());
        }
        crate::sched_debug!("preemption timer removed");
    }
}

#[cfg(target_os = "linux")]
fn set_timer(value: Option<Duration>) -> Result<(), ()> {
    let value = value.unwrap_or(Duration::ZERO);
    let timer = libc::itimerval {
        it_interval: libc::timeval {
            tv_sec: 0,
            tv_usec: 0,
        },
        it_value: libc::timeval {
            tv_sec: value.as_secs() as libc::time_t,
            tv_usec: value.subsec_micros() as libc::suseconds_t,
        },
    };
    let rc = unsafe { libc::setitimer(libc::ITIMER_REAL, &timer, core::ptr::null_mut()) };
    if rc == -1 {
        Err(())
    } else {
        Ok(())
    }
}

#[cfg(target_os = "linux")]
fn change_tick_mask(how: libc::c_int) {
    use core::mem::MaybeUninit;

    unsafe {
        let mut set = MaybeUninit::<libc::sigset_t>::uninit();
        libc::sigemptyset(set.as_mut_ptr());
        libc::sigaddset(set.as_mut_ptr(), libc::SIGALRM);
        libc::pthread_sigmask(how, set.as_ptr(), core::ptr::null_mut());
    }
}

#[cfg(target_os = "linux")]
fn discard_pending_tick() {
    use core::mem::MaybeUninit;

    let poll = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    unsafe {
        let mut set = MaybeUninit::<libc::sigset_t>::uninit();
        libc::sigemptyset(set.as_mut_ptr());
        libc::sigaddset(set.as_mut_ptr(), libc::SIGALRM);
        while libc::sigtimedwait(set.as_ptr(), core::ptr::null_mut(), &poll) == libc::SIGALRM {
            crate::sched_trace!("discarded stale tick");
        }
    }
}

/// Keep timer ticks away from the calling OS thread.
#[cfg(target_os = "linux")]
pub(crate) fn block_tick() {
    change_tick_mask(libc::SIG_BLOCK);
}

#[cfg(target_os = "linux")]
pub(crate) fn unblock_tick() {
    change_tick_mask(libc::SIG_UNBLOCK);
}

#[cfg(target_os = "linux")]
fn errno() -> i32 {
    unsafe { *libc::__errno_location() }
}

/// `SIGALRM` handler. Allocation-free: it reads the active slot, bumps
/// atomics and switches contexts.
#[cfg(target_os = "linux")]
extern "C" fn on_tick(sig: libc::c_int) {
    if sig != libc::SIGALRM {
        return;
    }
    let saved_errno = errno();

    if let Some((queue, owner)) = crate::sync::active() {
        if owner != crate::sync::os_thread_token() {
            // process-directed signal landed on a bystander thread
            unsafe { libc::pthread_kill(owner as libc::pthread_t, libc::SIGALRM) };
        } else {
            crate::sched_trace!("timer tick");
            unsafe { crate::scheduler::suspend_current(queue, true) };
        }
    }

    unsafe { *libc::__errno_location() = saved_errno };
}

#[cfg(not(target_os = "linux"))]
pub struct PreemptionTimer;

#[cfg(not(target_os = "linux"))]
impl PreemptionTimer {
    pub fn install(_timeslice: Duration) -> SchedResult<Self> {
        Err(SchedError::TimerUnavailable)
    }

    pub fn arm(&self) {}

    pub fn disarm(&self) {}
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn block_tick() {}

#[cfg(not(target_os = "linux"))]
pub(crate) fn unblock_tick() {}
