use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedError {
    ThreadAllocationFailed,
    StackAllocationFailed,
    InvalidStackSize,
    InvalidTimeslice,
    SchedulerBusy,
    TimerUnavailable,
}

impl SchedError {
    pub fn as_str(self) -> &'static str {
        match self {
            SchedError::ThreadAllocationFailed => "Failed to allocate thread record",
            SchedError::StackAllocationFailed => "Failed to allocate thread stack",
            SchedError::InvalidStackSize => "Stack size is below the supported minimum",
            SchedError::InvalidTimeslice => "Preemption timeslice is below one microsecond",
            SchedError::SchedulerBusy => "Another scheduler is already executing",
            SchedError::TimerUnavailable => "Failed to install the preemption timer",
        }
    }
}

impl fmt::Display for SchedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(feature = "std")]
impl std::error::Error for SchedError {}

pub type SchedResult<T> = Result<T, SchedError>;
