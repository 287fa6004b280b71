//! The circular run queue.
//!
//! Threads form one singly-linked ring in creation order. The queue owns
//! every record through raw `next` links; records are only freed by
//! [`RunQueue::drain`].

use crate::context::Context;
use crate::observability::SchedulerMetrics;
use crate::thread::GreenThread;
use core::ptr::{self, NonNull};

pub(crate) struct RunQueue {
    head: *mut GreenThread,
    last: *mut GreenThread,
    /// Scheduling cursor: the thread last dispatched, or the next one to
    /// consider after a suspension advanced it.
    current: *mut GreenThread,
    len: usize,
    /// Where threads go back to when they suspend or finish.
    pub dispatcher: Context,
    pub metrics: SchedulerMetrics,
}

impl RunQueue {
    pub fn new() -> Self {
        RunQueue {
            head: ptr::null_mut(),
            last: ptr::null_mut(),
            current: ptr::null_mut(),
            len: 0,
            dispatcher: Context::default(),
            metrics: SchedulerMetrics::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_null()
    }

    pub fn current(&self) -> *mut GreenThread {
        self.current
    }

    pub fn set_current(&mut self, thread: NonNull<GreenThread>) {
        self.current = thread.as_ptr();
    }

    /// Link `thread` in after `last`, closing the ring back to `head`.
    ///
    /// # Safety
    ///
    /// `thread` must be a fully initialized record not already in any queue.
    /// Ownership passes to the queue.
    pub unsafe fn append(&mut self, thread: NonNull<GreenThread>) {
        let thread = thread.as_ptr();
        unsafe {
            if self.head.is_null() {
                (*thread).next = thread;
                self.head = thread;
                self.last = thread;
                self.current = thread;
            } else {
                (*self.last).next = thread;
                (*thread).next = self.head;
                self.last = thread;
            }
        }
        self.len += 1;
        self.log_chain();
    }

    /// First thread at or after `current` that has not terminated, looking
    /// at most once around the ring.
    pub fn candidate(&self) -> Option<NonNull<GreenThread>> {
        let start = NonNull::new(self.current)?;
        let mut cursor = start;
        loop {
            let thread = unsafe { cursor.as_ref() };
            if thread.status().is_runnable() {
                return Some(cursor);
            }
            cursor = NonNull::new(thread.next)?;
            if cursor == start {
                return None;
            }
        }
    }

    /// Move the cursor one link forward.
    pub fn advance(&mut self) {
        if !self.current.is_null() {
            self.current = unsafe { (*self.current).next };
        }
    }

    /// Unlink every record, handing each to `release`: first the ones after
    /// `current` in ring order, then `current` itself. Leaves the queue empty.
    ///
    /// # Safety
    ///
    /// No thread in the queue may be executing, and `release` takes over
    /// ownership of each record.
    pub unsafe fn drain(&mut self, mut release: impl FnMut(NonNull<GreenThread>)) {
        let Some(current) = NonNull::new(self.current) else {
            return;
        };
        let mut cursor = unsafe { (*current.as_ptr()).next };
        while cursor != current.as_ptr() {
            let next = unsafe { (*cursor).next };
            release(unsafe { NonNull::new_unchecked(cursor) });
            cursor = next;
        }
        release(current);

        self.head = ptr::null_mut();
        self.last = ptr::null_mut();
        self.current = ptr::null_mut();
        self.len = 0;
    }

    #[cfg(all(feature = "log_trace", not(feature = "no_logs")))]
    fn log_chain(&self) {
        use crate::logging::{Line, P_TRACE};

        let mut line = Line::new(P_TRACE);
        line.push(&"run queue: ");
        let mut cursor = self.head;
        loop {
            let thread = unsafe { &*cursor };
            line.push(&thread.id);
            line.push(&" -> ");
            cursor = thread.next;
            if cursor == self.head {
                break;
            }
        }
        line.push(&"(back to head)");
        line.finish();
    }

    #[cfg(not(all(feature = "log_trace", not(feature = "no_logs"))))]
    fn log_chain(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MIN_STACK_SIZE;
    use crate::mem::SystemMemory;
    use crate::stack::ThreadStack;
    use crate::thread::{ThreadId, ThreadStatus};
    use alloc::boxed::Box;
    use alloc::vec::Vec;

    fn record(id: usize) -> NonNull<GreenThread> {
        let stack = ThreadStack::allocate(&SystemMemory, MIN_STACK_SIZE).unwrap();
        let thread = GreenThread::new(ThreadId::new(id).unwrap(), None, stack, Box::new(|| {}));
        NonNull::from(Box::leak(Box::new(thread)))
    }

    fn free(thread: NonNull<GreenThread>) {
        let thread = unsafe { *Box::from_raw(thread.as_ptr()) };
        let (stack, _entry) = thread.into_parts();
        unsafe { stack.release(&SystemMemory) };
    }

    fn ring_ids(queue: &RunQueue) -> Vec<usize> {
        let mut ids = Vec::new();
        let mut cursor = queue.head;
        loop {
            let thread = unsafe { &*cursor };
            ids.push(thread.id.get());
            cursor = thread.next;
            if cursor == queue.head {
                return ids;
            }
        }
    }

    fn filled(n: usize) -> (RunQueue, Vec<NonNull<GreenThread>>) {
        let mut queue = RunQueue::new();
        let threads: Vec<_> = (1..=n).map(record).collect();
        for &thread in &threads {
            unsafe { queue.append(thread) };
        }
        (queue, threads)
    }

    fn drain_all(queue: &mut RunQueue) -> Vec<usize> {
        let mut order = Vec::new();
        unsafe {
            queue.drain(|thread| {
                order.push(thread.as_ref().id.get());
                free(thread);
            })
        };
        order
    }

    #[test]
    fn single_thread_forms_self_loop() {
        let (mut queue, threads) = filled(1);
        let only = threads[0].as_ptr();
        assert_eq!(queue.len(), 1);
        assert_eq!(unsafe { (*only).next }, only);
        assert_eq!(queue.current(), only);
        drain_all(&mut queue);
    }

    #[test]
    fn append_keeps_creation_order_and_closes_ring() {
        let (mut queue, threads) = filled(4);
        assert_eq!(ring_ids(&queue), [1, 2, 3, 4]);
        assert_eq!(unsafe { (*threads[3].as_ptr()).next }, threads[0].as_ptr());
        assert_eq!(queue.current(), threads[0].as_ptr());
        drain_all(&mut queue);
    }

    #[test]
    fn candidate_skips_terminated_and_wraps() {
        let (mut queue, threads) = filled(3);
        unsafe {
            for &i in &[0usize, 1] {
                let t = &mut *threads[i].as_ptr();
                t.set_status(ThreadStatus::Running);
                t.set_status(ThreadStatus::Terminated);
            }
        }
        assert_eq!(queue.candidate(), Some(threads[2]));

        queue.set_current(threads[2]);
        unsafe { (*threads[2].as_ptr()).set_status(ThreadStatus::Running) };
        unsafe { (*threads[2].as_ptr()).set_status(ThreadStatus::Sleeping) };
        queue.advance();
        // cursor is on a terminated thread, search wraps back to the sleeper
        assert_eq!(queue.current(), threads[0].as_ptr());
        assert_eq!(queue.candidate(), Some(threads[2]));
        drain_all(&mut queue);
    }

    #[test]
    fn no_candidate_when_all_terminated() {
        let (mut queue, threads) = filled(2);
        for thread in &threads {
            let t = unsafe { &mut *thread.as_ptr() };
            t.set_status(ThreadStatus::Running);
            t.set_status(ThreadStatus::Terminated);
        }
        assert_eq!(queue.candidate(), None);
        drain_all(&mut queue);
    }

    #[test]
    fn empty_queue_has_no_candidate_and_drains_to_nothing() {
        let mut queue = RunQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.candidate(), None);
        assert!(drain_all(&mut queue).is_empty());
    }

    #[test]
    fn drain_starts_after_current_and_ends_on_it() {
        let (mut queue, threads) = filled(4);
        queue.set_current(threads[1]);
        assert_eq!(drain_all(&mut queue), [3, 4, 1, 2]);
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
        assert!(queue.current().is_null());
    }
}
