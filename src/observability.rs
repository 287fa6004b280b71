//! Scheduler counters.
//!
//! Plain atomics so they can be bumped from the preemption handler.

use portable_atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct SchedulerMetrics {
    threads_created: AtomicU64,
    first_activations: AtomicU64,
    resumptions: AtomicU64,
    voluntary_yields: AtomicU64,
    preemptions: AtomicU64,
    terminations: AtomicU64,
    stacks_released: AtomicU64,
    records_released: AtomicU64,
    runs: AtomicU64,
}

/// Point-in-time copy of [`SchedulerMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub threads_created: u64,
    pub first_activations: u64,
    pub resumptions: u64,
    pub voluntary_yields: u64,
    pub preemptions: u64,
    pub terminations: u64,
    pub stacks_released: u64,
    pub records_released: u64,
    /// Completed `execute` calls that ran at least one thread
    pub runs: u64,
}

impl MetricsSnapshot {
    /// Every switch from the dispatcher into a thread.
    pub fn dispatches(&self) -> u64 {
        self.first_activations + self.resumptions
    }
}

impl SchedulerMetrics {
    pub const fn new() -> Self {
        Self {
            threads_created: AtomicU64::new(0),
            first_activations: AtomicU64::new(0),
            resumptions: AtomicU64::new(0),
            voluntary_yields: AtomicU64::new(0),
            preemptions: AtomicU64::new(0),
            terminations: AtomicU64::new(0),
            stacks_released: AtomicU64::new(0),
            records_released: AtomicU64::new(0),
            runs: AtomicU64::new(0),
        }
    }

    pub(crate) fn record_created(&self) {
        self.threads_created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_first_activation(&self) {
        self.first_activations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_resumption(&self) {
        self.resumptions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_suspension(&self, preempted: bool) {
        if preempted {
            self.preemptions.fetch_add(1, Ordering::Relaxed);
        } else {
            self.voluntary_yields.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_termination(&self) {
        self.terminations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_stack_release(&self) {
        self.stacks_released.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_record_release(&self) {
        self.records_released.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_run(&self) {
        self.runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            threads_created: self.threads_created.load(Ordering::Relaxed),
            first_activations: self.first_activations.load(Ordering::Relaxed),
            resumptions: self.resumptions.load(Ordering::Relaxed),
            voluntary_yields: self.voluntary_yields.load(Ordering::Relaxed),
            preemptions: self.preemptions.load(Ordering::Relaxed),
            terminations: self.terminations.load(Ordering::Relaxed),
            stacks_released: self.stacks_released.load(Ordering::Relaxed),
            records_released: self.records_released.load(Ordering::Relaxed),
            runs: self.runs.load(Ordering::Relaxed),
        }
    }
}
