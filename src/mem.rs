//! Memory used for thread records and stacks.
//!
//! The scheduler never reaches for the global allocator directly; it goes
//! through a [`MemorySource`] so that allocation failure is reported instead
//! of aborting, and so tests can count or refuse allocations.

use core::alloc::Layout;
use core::ptr::NonNull;
use portable_atomic::{AtomicUsize, Ordering};

/// Provider of raw memory for the scheduler.
///
/// # Safety
///
/// `allocate` must return memory valid for `layout` (or `None`), and
/// `release` must accept any pointer previously returned by `allocate` with
/// the same layout.
pub unsafe trait MemorySource {
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>>;

    /// # Safety
    ///
    /// `ptr` must come from `allocate(layout)` on this source and must not
    /// have been released already.
    unsafe fn release(&self, ptr: NonNull<u8>, layout: Layout);
}

/// Forwards to the global allocator.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemMemory;

unsafe impl MemorySource for SystemMemory {
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        if layout.size() == 0 {
            return None;
        }
        NonNull::new(unsafe { alloc::alloc::alloc(layout) })
    }

    unsafe fn release(&self, ptr: NonNull<u8>, layout: Layout) {
        unsafe { alloc::alloc::dealloc(ptr.as_ptr(), layout) }
    }
}

unsafe impl<M: MemorySource + ?Sized> MemorySource for &M {
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        (**self).allocate(layout)
    }

    unsafe fn release(&self, ptr: NonNull<u8>, layout: Layout) {
        unsafe { (**self).release(ptr, layout) }
    }
}

const FALLBACK_PAGE_SIZE: usize = 4096;

static PAGE_SIZE: AtomicUsize = AtomicUsize::new(0);

/// The platform page size, queried once and cached.
pub fn page_size() -> usize {
    let cached = PAGE_SIZE.load(Ordering::Relaxed);
    if cached != 0 {
        return cached;
    }
    let size = query_page_size();
    PAGE_SIZE.store(size, Ordering::Relaxed);
    size
}

#[cfg(target_os = "linux")]
fn query_page_size() -> usize {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 && (size as usize).is_power_of_two() {
        size as usize
    } else {
        crate::sched_warn!("sysconf(_SC_PAGESIZE) failed, assuming 4096");
        FALLBACK_PAGE_SIZE
    }
}

#[cfg(not(target_os = "linux"))]
fn query_page_size() -> usize {
    FALLBACK_PAGE_SIZE
}

/// Round `addr` up to the next multiple of `align` (a power of two).
pub(crate) fn align_up(addr: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (addr + align - 1) & !(align - 1)
}
