use crate::context::Context;
use crate::stack::ThreadStack;
use alloc::boxed::Box;
use core::num::NonZeroUsize;
use core::ptr;

/// Identifier of a green thread, unique within its scheduler.
///
/// Ids are assigned in creation order starting at 1 and are never reused by
/// the same scheduler, even across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(NonZeroUsize);

impl ThreadId {
    pub fn new(id: usize) -> Option<Self> {
        NonZeroUsize::new(id).map(ThreadId)
    }

    pub fn get(self) -> usize {
        self.0.get()
    }

    pub(crate) const FIRST: ThreadId = ThreadId(NonZeroUsize::MIN);

    pub(crate) fn successor(self) -> ThreadId {
        ThreadId(self.0.saturating_add(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadStatus {
    /// Registered, never run; no saved context exists yet
    Unstarted,
    Running,
    /// Ready to run, not currently executing
    Sleeping,
    Terminated,
}

impl ThreadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ThreadStatus::Unstarted => "UNSTARTED",
            ThreadStatus::Running => "RUNNING",
            ThreadStatus::Sleeping => "SLEEPING",
            ThreadStatus::Terminated => "TERMINATED",
        }
    }

    pub fn is_runnable(self) -> bool {
        self != ThreadStatus::Terminated
    }

    /// Whether `self -> next` is a legal lifecycle step.
    pub fn can_become(self, next: ThreadStatus) -> bool {
        use ThreadStatus::*;
        matches!(
            (self, next),
            (Unstarted, Running) | (Running, Sleeping) | (Sleeping, Running) | (Running, Terminated)
        )
    }
}

pub(crate) type Entry = Box<dyn FnOnce() + 'static>;

/// One schedulable unit. Owned by the run queue through raw `next` links.
pub(crate) struct GreenThread {
    pub context: Context,
    status: ThreadStatus,
    pub stack: ThreadStack,
    pub entry: Option<Entry>,
    pub id: ThreadId,
    pub name: Option<&'static str>,
    pub next: *mut GreenThread,
}

impl GreenThread {
    pub fn new(id: ThreadId, name: Option<&'static str>, stack: ThreadStack, entry: Entry) -> Self {
        GreenThread {
            context: Context::default(),
            status: ThreadStatus::Unstarted,
            stack,
            entry: Some(entry),
            id,
            name,
            next: ptr::null_mut(),
        }
    }

    pub fn status(&self) -> ThreadStatus {
        self.status
    }

    pub fn set_status(&mut self, next: ThreadStatus) {
        debug_assert!(
            self.status.can_become(next),
            "illegal thread status transition"
        );
        self.status = next;
    }

    /// Give up the parts that own memory: the stack and a never-run entry.
    pub fn into_parts(self) -> (ThreadStack, Option<Entry>) {
        (self.stack, self.entry)
    }
}
