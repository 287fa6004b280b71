use crate::config::SchedulerConfig;
use crate::context;
use crate::error::{SchedError, SchedResult};
use crate::mem::{MemorySource, SystemMemory};
use crate::observability::MetricsSnapshot;
use crate::preemption::{self, PreemptionTimer};
use crate::queue::RunQueue;
use crate::stack::ThreadStack;
use crate::sync::{self, ActiveRun};
use crate::thread::{Entry, GreenThread, ThreadId, ThreadStatus};
use alloc::boxed::Box;
use core::alloc::Layout;
use core::ptr::{self, NonNull};

/// A round-robin scheduler for green threads sharing one OS thread.
///
/// Threads are registered with [`create`](Self::create) and run to completion
/// by [`execute`](Self::execute). Afterwards the scheduler is empty and can be
/// reused.
pub struct Scheduler<M: MemorySource = SystemMemory> {
    // Boxed so its address stays put while threads hold on to it.
    queue: NonNull<RunQueue>,
    config: SchedulerConfig,
    memory: M,
    next_id: ThreadId,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// Scheduler with a 1 MiB stack per thread and a one second timeslice.
    pub fn new() -> Self {
        Self::build(SchedulerConfig::default(), SystemMemory)
    }

    pub fn with_config(config: SchedulerConfig) -> SchedResult<Self> {
        Self::with_memory(config, SystemMemory)
    }
}

impl<M: MemorySource> Scheduler<M> {
    /// Scheduler that takes thread records and stacks from `memory`.
    pub fn with_memory(config: SchedulerConfig, memory: M) -> SchedResult<Self> {
        config.validate()?;
        Ok(Self::build(config, memory))
    }

    fn build(config: SchedulerConfig, memory: M) -> Self {
        Scheduler {
            queue: NonNull::from(Box::leak(Box::new(RunQueue::new()))),
            config,
            memory,
            next_id: ThreadId::FIRST,
        }
    }

    /// Register a green thread running `entry`. It first runs during the next
    /// [`execute`](Self::execute).
    pub fn create<F>(&mut self, entry: F) -> SchedResult<()>
    where
        F: FnOnce() + 'static,
    {
        self.register(None, Box::new(entry))
    }

    /// Like [`create`](Self::create), with a name shown in diagnostics and by
    /// [`current_thread_name`](crate::current_thread_name).
    pub fn create_named<F>(&mut self, name: &'static str, entry: F) -> SchedResult<()>
    where
        F: FnOnce() + 'static,
    {
        self.register(Some(name), Box::new(entry))
    }

    /// Register a thread that calls `entry(arg)`.
    pub fn create_with<T: 'static>(&mut self, entry: fn(T), arg: T) -> SchedResult<()> {
        self.create(move || entry(arg))
    }

    fn register(&mut self, name: Option<&'static str>, entry: Entry) -> SchedResult<()> {
        let record_layout = Layout::new::<GreenThread>();
        let Some(record) = self.memory.allocate(record_layout) else {
            crate::sched_error!("failed to allocate thread record");
            return Err(SchedError::ThreadAllocationFailed);
        };

        let Some(stack) = ThreadStack::allocate(&self.memory, self.config.aligned_stack_size()) else {
            unsafe {
                self.memory.release(record, record_layout);
                self.queue.as_ref().metrics.record_record_release();
            }
            crate::sched_error!("failed to allocate thread stack, bytes=", self.config.stack_size);
            return Err(SchedError::StackAllocationFailed);
        };

        let id = self.next_id;
        self.next_id = id.successor();

        let record = record.cast::<GreenThread>();
        unsafe {
            record.as_ptr().write(GreenThread::new(id, name, stack, entry));
            let queue = self.queue.as_ptr();
            (*queue).append(record);
            (*queue).metrics.record_created();
        }
        crate::sched_debug!("created thread ", id, " ", name.unwrap_or(""));
        Ok(())
    }

    /// Run every registered thread to completion, then release them all.
    ///
    /// Blocks the caller until the last thread returns. With nothing
    /// registered this returns at once. Only one scheduler may execute per
    /// process at a time; a concurrent or nested call gets
    /// [`SchedError::SchedulerBusy`].
    pub fn execute(&mut self) -> SchedResult<()> {
        let queue = self.queue.as_ptr();
        if unsafe { (*queue).is_empty() } {
            return Ok(());
        }

        let active = ActiveRun::claim(queue, self.config.timeslice.is_some())?;
        let timer = match self.config.timeslice {
            Some(timeslice) => Some(PreemptionTimer::install(timeslice)?),
            None => None,
        };

        crate::sched_info!("executing ", unsafe { (*queue).len() }, " threads");
        unsafe { run_loop(queue, timer.as_ref()) };

        // ticks still in flight find no active run and are ignored
        drop(active);
        drop(timer);
        unsafe { self.destroy() };
        unsafe { (*queue).metrics.record_run() };
        crate::sched_info!("all threads finished");
        Ok(())
    }

    /// Release every thread's stack and record, leaving the queue empty.
    ///
    /// # Safety
    ///
    /// No thread may be executing.
    unsafe fn destroy(&mut self) {
        let queue = self.queue.as_ptr();
        let memory = &self.memory;
        unsafe {
            let metrics = ptr::addr_of!((*queue).metrics);
            (*queue).drain(|thread| {
                let record = thread.as_ptr().read();
                debug_assert_ne!(record.status(), ThreadStatus::Running);
                crate::sched_trace!("releasing thread ", record.id);

                let (stack, entry) = record.into_parts();
                stack.release(memory);
                (*metrics).record_stack_release();
                memory.release(thread.cast(), Layout::new::<GreenThread>());
                (*metrics).record_record_release();
                drop(entry);
            });
        }
    }

    /// Number of registered threads not yet torn down.
    pub fn len(&self) -> usize {
        unsafe { self.queue.as_ref().len() }
    }

    pub fn is_empty(&self) -> bool {
        unsafe { self.queue.as_ref().is_empty() }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        unsafe { self.queue.as_ref().metrics.snapshot() }
    }
}

impl<M: MemorySource> Drop for Scheduler<M> {
    fn drop(&mut self) {
        // threads that were registered but never executed
        unsafe {
            self.destroy();
            drop(Box::from_raw(self.queue.as_ptr()));
        }
    }
}

/// The dispatcher. Each iteration picks a candidate and switches into it;
/// every suspension or termination comes back right after the switch.
unsafe fn run_loop(queue: *mut RunQueue, timer: Option<&PreemptionTimer>) {
    loop {
        let Some(candidate) = (unsafe { (*queue).candidate() }) else {
            break;
        };
        unsafe {
            (*queue).set_current(candidate);
            let thread = candidate.as_ptr();

            match (*thread).status() {
                ThreadStatus::Unstarted => {
                    crate::sched_debug!("initializing thread ", (*thread).id);
                    let top = (*thread).stack.top();
                    context::prepare(&mut (*thread).context, top, queue.cast());
                    (*thread).set_status(ThreadStatus::Running);
                    (*queue).metrics.record_first_activation();
                }
                ThreadStatus::Sleeping => {
                    crate::sched_debug!("resuming thread ", (*thread).id);
                    (*thread).set_status(ThreadStatus::Running);
                    (*queue).metrics.record_resumption();
                }
                status => unreachable!("dispatcher picked a {} thread", status.as_str()),
            }

            if let Some(timer) = timer {
                timer.arm();
            }
            context::enter(
                ptr::addr_of_mut!((*queue).dispatcher),
                ptr::addr_of!((*thread).context),
            );
            // drop any tick that expired while the thread was on its way out
            if let Some(timer) = timer {
                timer.disarm();
            }
        }
    }
}

/// Suspend the running thread: mark it sleeping, move the cursor past it and
/// return to the dispatcher. Comes back when the dispatcher resumes it, by
/// which time it is already marked running again.
///
/// Shared by [`yield_now`](crate::yield_now) and the timer handler, so it
/// must not allocate. A yield with no running thread does nothing; a tick
/// with no running thread is a masking bug.
///
/// # Safety
///
/// `queue` must be the executing run queue and the caller must be on the
/// current thread's stack with timer ticks blocked.
pub(crate) unsafe fn suspend_current(queue: *mut RunQueue, preempted: bool) {
    unsafe {
        let thread = (*queue).current();
        let running = !thread.is_null() && (*thread).status() == ThreadStatus::Running;
        debug_assert!(running || !preempted, "timer tick with no running thread");
        if !running {
            return;
        }
        (*thread).set_status(ThreadStatus::Sleeping);
        (*queue).advance();
        (*queue).metrics.record_suspension(preempted);

        context::leave(
            ptr::addr_of_mut!((*thread).context),
            ptr::addr_of!((*queue).dispatcher),
        );
    }
}

/// Where every fresh thread begins, on its own stack, entered from the
/// architecture trampoline.
pub(crate) unsafe extern "C" fn thread_start(queue: *mut RunQueue) -> ! {
    unsafe {
        let thread = (*queue).current();
        let entry = (*thread).entry.take();

        let preemptive = sync::preemption_enabled();
        if preemptive {
            preemption::unblock_tick();
        }
        if let Some(entry) = entry {
            entry();
        }
        if preemptive {
            preemption::block_tick();
        }

        // a thread is always current while it runs, whatever happened in between
        let thread = (*queue).current();
        (*thread).set_status(ThreadStatus::Terminated);
        (*queue).metrics.record_termination();
        crate::sched_debug!("thread finished ", (*thread).id);

        context::leave(
            ptr::addr_of_mut!((*thread).context),
            ptr::addr_of!((*queue).dispatcher),
        );
    }
    unreachable!("terminated thread was resumed")
}
