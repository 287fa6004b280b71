//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::alloc::Layout;
use std::cell::{Cell, RefCell};
use std::ptr::NonNull;
use std::rc::Rc;

use green_sched::{MemorySource, SchedulerConfig, SystemMemory};

/// Only one scheduler may execute per process; tests in a binary run on
/// parallel threads.
pub static EXECUTION: spin::Mutex<()> = spin::Mutex::new(());

pub fn cooperative() -> SchedulerConfig {
    SchedulerConfig::default()
        .with_stack_size(64 * 1024)
        .without_preemption()
}

/// Memory source that counts every allocation and release, split by whether
/// the request looks like a stack (page-sized or bigger) or a thread record.
#[derive(Default)]
pub struct CountingMemory {
    pub record_allocations: Cell<usize>,
    pub record_releases: Cell<usize>,
    pub stack_allocations: Cell<usize>,
    pub stack_releases: Cell<usize>,
    pub refuse_stacks: Cell<bool>,
}

impl CountingMemory {
    fn is_stack(layout: Layout) -> bool {
        layout.size() >= green_sched::page_size()
    }

    pub fn balanced(&self) -> bool {
        self.record_allocations.get() == self.record_releases.get()
            && self.stack_allocations.get() == self.stack_releases.get()
    }
}

unsafe impl MemorySource for CountingMemory {
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        let counter = if Self::is_stack(layout) {
            if self.refuse_stacks.get() {
                return None;
            }
            &self.stack_allocations
        } else {
            &self.record_allocations
        };
        counter.set(counter.get() + 1);
        SystemMemory.allocate(layout)
    }

    unsafe fn release(&self, ptr: NonNull<u8>, layout: Layout) {
        let counter = if Self::is_stack(layout) {
            &self.stack_releases
        } else {
            &self.record_releases
        };
        counter.set(counter.get() + 1);
        unsafe { SystemMemory.release(ptr, layout) }
    }
}

/// Ordered record of what the green threads did.
#[derive(Clone, Default)]
pub struct Trace(Rc<RefCell<Vec<String>>>);

impl Trace {
    pub fn push(&self, event: impl Into<String>) {
        self.0.borrow_mut().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.borrow().clone()
    }
}
