//! Scheduler configuration.

use crate::error::{SchedError, SchedResult};
use core::time::Duration;

/// Usable stack bytes per green thread when nothing else is configured.
pub const DEFAULT_STACK_SIZE: usize = 1024 * 1024;

/// Smallest stack a green thread may be given.
///
/// The timer handler runs on the interrupted thread's stack, so the kernel's
/// signal frame has to fit next to whatever the entry closure is using.
pub const MIN_STACK_SIZE: usize = 16 * 1024;

/// Default preemption period.
pub const DEFAULT_TIMESLICE: Duration = Duration::from_secs(1);

/// Finest preemption period `setitimer` can express.
pub const MIN_TIMESLICE: Duration = Duration::from_micros(1);

/// Configuration for a [`Scheduler`](crate::Scheduler).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Usable stack size for every thread, in bytes
    pub stack_size: usize,
    /// Preemption period, or `None` for purely cooperative scheduling
    pub timeslice: Option<Duration>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
            timeslice: Some(DEFAULT_TIMESLICE),
        }
    }
}

impl SchedulerConfig {
    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = stack_size;
        self
    }

    pub fn with_timeslice(mut self, timeslice: Duration) -> Self {
        self.timeslice = Some(timeslice);
        self
    }

    /// Disable the preemption timer. Threads then only switch when they call
    /// [`yield_now`](crate::yield_now) or return.
    pub fn without_preemption(mut self) -> Self {
        self.timeslice = None;
        self
    }

    pub fn validate(&self) -> SchedResult<()> {
        if self.stack_size < MIN_STACK_SIZE {
            return Err(SchedError::InvalidStackSize);
        }
        if let Some(timeslice) = self.timeslice {
            // a sub-microsecond value would arm the timer with zero, i.e. never
            if timeslice < MIN_TIMESLICE {
                return Err(SchedError::InvalidTimeslice);
            }
        }
        Ok(())
    }

    /// Stack size rounded up to the 16-byte alignment both supported ABIs
    /// require at a call boundary.
    pub(crate) fn aligned_stack_size(&self) -> usize {
        (self.stack_size + 15) & !15
    }
}
