//! Round-robin green threads with timer-driven preemption.
//!
//! A [`Scheduler`] multiplexes any number of green threads, each with its own
//! stack, onto the OS thread that calls [`Scheduler::execute`]. Threads are
//! switched in creation order whenever they call [`yield_now`], return, or
//! run for a full timeslice without doing either.
//!
//! ```no_run
//! use green_sched::{yield_now, Scheduler};
//!
//! let mut scheduler = Scheduler::new();
//! for name in ["a", "b", "c"] {
//!     scheduler
//!         .create_named(name, move || {
//!             for _ in 0..3 {
//!                 yield_now();
//!             }
//!         })
//!         .unwrap();
//! }
//! scheduler.execute().unwrap();
//! ```

#![no_std]

extern crate alloc;

#[cfg(any(test, feature = "std"))]
extern crate std;

#[macro_use]
pub mod logging;

mod arch;
pub mod config;
mod context;
pub mod error;
pub mod mem;
pub mod observability;
pub mod preemption;
mod queue;
pub mod scheduler;
mod stack;
pub mod sync;
pub mod thread;


pub use config::{
    SchedulerConfig, DEFAULT_STACK_SIZE, DEFAULT_TIMESLICE, MIN_STACK_SIZE, MIN_TIMESLICE,
};
pub use error::{SchedError, SchedResult};
pub use mem::{page_size, MemorySource, SystemMemory};
pub use observability::MetricsSnapshot;
pub use scheduler::Scheduler;
pub use sync::{current_thread_id, current_thread_name, yield_now};
pub use thread::{ThreadId, ThreadStatus};
