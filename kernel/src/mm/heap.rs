//! Kernel bump heap.
//!
//! A monotonic cursor starts at the linker-provided image end (`_end`) and
//! only ever moves forward; release is not modelled. Every allocation is
//! rounded up to 8 bytes. On bare metal the same arena backs the Rust
//! global allocator, so `alloc::vec::Vec` and friends draw from it too;
//! `dealloc` is a no-op there by design of the heap.

use core::{
    alloc::{GlobalAlloc, Layout},
    ptr,
    sync::atomic::{AtomicUsize, Ordering},
};

/// Allocation granularity: everything is rounded up to this.
pub const ALIGN: usize = 8;

const fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

/// Lock-free bump allocator over a fixed arena.
pub struct BumpAllocator {
    start: AtomicUsize,
    size: AtomicUsize,
    next: AtomicUsize,
    allocations: AtomicUsize,
}

impl BumpAllocator {
    pub const fn new() -> Self {
        Self {
            start: AtomicUsize::new(0),
            size: AtomicUsize::new(0),
            next: AtomicUsize::new(0),
            allocations: AtomicUsize::new(0),
        }
    }

    /// Hand the allocator its arena.
    ///
    /// The cursor starts at `start` rounded up to the 8-byte granularity,
    /// so every address handed out afterwards stays aligned.
    ///
    /// # Safety
    ///
    /// The memory from `start` to `start + size` must be valid, writable,
    /// and owned by this allocator for the kernel's lifetime.
    pub unsafe fn init(&self, start: *mut u8, size: usize) {
        let base = align_up(start as usize, ALIGN);
        self.start.store(base, Ordering::Relaxed);
        self.size
            .store(size.saturating_sub(base - start as usize), Ordering::Relaxed);
        self.next.store(base, Ordering::Relaxed);
        self.allocations.store(0, Ordering::Relaxed);
    }

    /// Bump out `size` bytes, rounded up to 8.
    ///
    /// This is the `kmalloc` contract: no exhaustion check, callers trust
    /// the bump. Returns null only if `init` has not run.
    pub fn alloc_bytes(&self, size: usize) -> *mut u8 {
        if self.start.load(Ordering::Acquire) == 0 {
            return ptr::null_mut();
        }
        let step = align_up(size, ALIGN);
        let addr = self.next.fetch_add(step, Ordering::SeqCst);
        self.allocations.fetch_add(1, Ordering::Relaxed);
        addr as *mut u8
    }

    /// Bytes consumed so far.
    pub fn used_bytes(&self) -> usize {
        let start = self.start.load(Ordering::Relaxed);
        let next = self.next.load(Ordering::Relaxed);
        next.saturating_sub(start)
    }

    /// Number of allocations served.
    pub fn allocation_count(&self) -> usize {
        self.allocations.load(Ordering::Relaxed)
    }
}

impl Default for BumpAllocator {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl GlobalAlloc for BumpAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let start = self.start.load(Ordering::Acquire);
        let size = self.size.load(Ordering::Acquire);
        if start == 0 {
            return ptr::null_mut();
        }

        let align = layout.align().max(ALIGN);
        let mut current = self.next.load(Ordering::Relaxed);
        loop {
            let addr = align_up(current, align);
            let end = match addr.checked_add(align_up(layout.size(), ALIGN)) {
                Some(end) => end,
                None => return ptr::null_mut(),
            };
            if end > start + size {
                return ptr::null_mut();
            }
            match self
                .next
                .compare_exchange_weak(current, end, Ordering::SeqCst, Ordering::Relaxed)
            {
                Ok(_) => {
                    self.allocations.fetch_add(1, Ordering::Relaxed);
                    return addr as *mut u8;
                }
                Err(observed) => current = observed,
            }
        }
    }

    unsafe fn dealloc(&self, _ptr: *mut u8, _layout: Layout) {
        // Bump heap: release is not modelled.
    }
}

/// The kernel heap instance. On bare metal it doubles as the Rust global
/// allocator; hosted test builds use the system allocator (see `lib.rs`)
/// and exercise this type against scratch arenas instead.
#[cfg_attr(target_os = "none", global_allocator)]
pub static KERNEL_HEAP: BumpAllocator = BumpAllocator::new();

/// Anchor the heap at the end of the kernel image.
///
/// `_end` is placed by the linker script just past `.bss`; the arena runs
/// from there to the top of managed physical memory.
#[cfg(target_os = "none")]
pub fn init() {
    extern "C" {
        static _end: u8;
    }
    // SAFETY: The linker guarantees `_end` marks the first address past the
    // kernel image; memory from there to the 16 MiB boundary is identity
    // mapped and unused by anything else at this point in boot.
    unsafe {
        let start = &_end as *const u8 as usize;
        let size = super::pmm::MANAGED_BYTES.saturating_sub(start);
        KERNEL_HEAP.init(start as *mut u8, size);
    }
}

#[cfg(not(target_os = "none"))]
pub fn init() {}

/// Allocate `size` bytes from the kernel heap, 8-byte aligned.
pub fn kmalloc(size: usize) -> *mut u8 {
    KERNEL_HEAP.alloc_bytes(size)
}

/// Bytes the kernel heap has consumed since boot.
pub fn used_bytes() -> usize {
    KERNEL_HEAP.used_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena(allocator: &BumpAllocator, bytes: usize) {
        extern crate alloc;
        use alloc::vec;
        let buf = vec![0u8; bytes].leak();
        // SAFETY: The leaked buffer lives for the test process lifetime and
        // is handed exclusively to this allocator.
        unsafe {
            allocator.init(buf.as_mut_ptr(), bytes);
        }
    }

    #[test]
    fn test_allocations_are_aligned_and_disjoint() {
        let allocator = BumpAllocator::new();
        arena(&allocator, 4096);

        let a = allocator.alloc_bytes(13) as usize;
        let b = allocator.alloc_bytes(1) as usize;
        let c = allocator.alloc_bytes(32) as usize;

        assert_eq!(a % ALIGN, 0);
        assert_eq!(b % ALIGN, 0);
        assert_eq!(c % ALIGN, 0);
        // 13 rounds to 16, 1 rounds to 8.
        assert_eq!(b - a, 16);
        assert_eq!(c - b, 8);
    }

    #[test]
    fn test_used_bytes_tracks_rounded_sizes() {
        let allocator = BumpAllocator::new();
        arena(&allocator, 4096);

        allocator.alloc_bytes(3);
        allocator.alloc_bytes(8);
        assert_eq!(allocator.used_bytes(), 8 + 8);
        assert_eq!(allocator.allocation_count(), 2);
    }

    #[test]
    fn test_uninitialized_returns_null() {
        let allocator = BumpAllocator::new();
        assert!(allocator.alloc_bytes(16).is_null());
    }

    #[test]
    fn test_global_alloc_respects_layout_align() {
        let allocator = BumpAllocator::new();
        arena(&allocator, 4096);

        allocator.alloc_bytes(4);
        let layout = Layout::from_size_align(24, 64).unwrap();
        // SAFETY: The allocator was initialized with a live arena above.
        let ptr = unsafe { allocator.alloc(layout) };
        assert!(!ptr.is_null());
        assert_eq!(ptr as usize % 64, 0);
    }

    #[test]
    fn test_global_alloc_reports_exhaustion() {
        let allocator = BumpAllocator::new();
        arena(&allocator, 64);

        let layout = Layout::from_size_align(128, 8).unwrap();
        // SAFETY: Initialized arena; oversized request must yield null.
        let ptr = unsafe { allocator.alloc(layout) };
        assert!(ptr.is_null());
    }
}
