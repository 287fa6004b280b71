//! Per-thread stack regions.

use crate::mem::{align_up, page_size, MemorySource};
use core::alloc::Layout;
use core::ptr::NonNull;

/// A dedicated stack for one green thread.
///
/// The raw allocation is `size + page_size` bytes; `usable` is the first page
/// boundary inside it, so `[usable, usable + size)` always fits. Only `raw`
/// is ever handed back to the memory source.
pub struct ThreadStack {
    raw: NonNull<u8>,
    layout: Layout,
    usable: NonNull<u8>,
    size: usize,
}

impl ThreadStack {
    /// Allocate a stack with `size` usable bytes. `size` must be a multiple
    /// of 16.
    pub fn allocate<M: MemorySource + ?Sized>(memory: &M, size: usize) -> Option<Self> {
        debug_assert_eq!(size % 16, 0);
        let page = page_size();
        let layout = Layout::from_size_align(size.checked_add(page)?, 16).ok()?;
        let raw = memory.allocate(layout)?;

        let usable = align_up(raw.as_ptr() as usize, page);
        let offset = usable - raw.as_ptr() as usize;
        // offset < page, so the usable region ends inside the allocation
        let usable = unsafe { NonNull::new_unchecked(raw.as_ptr().add(offset)) };

        Some(ThreadStack {
            raw,
            layout,
            usable,
            size,
        })
    }

    /// Lowest usable address, page-aligned.
    pub fn bottom(&self) -> *mut u8 {
        self.usable.as_ptr()
    }

    /// One past the highest usable address. Stacks grow down from here.
    pub fn top(&self) -> *mut u8 {
        unsafe { self.usable.as_ptr().add(self.size) }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Hand the raw allocation back.
    ///
    /// # Safety
    ///
    /// `memory` must be the source that allocated this stack, and nothing may
    /// be executing on it.
    pub unsafe fn release<M: MemorySource + ?Sized>(self, memory: &M) {
        unsafe { memory.release(self.raw, self.layout) }
    }

    #[cfg(test)]
    pub(crate) fn raw(&self) -> *mut u8 {
        self.raw.as_ptr()
    }
}
