//! Kernel Heap Allocator
//!
//! Global allocator for the kernel heap.

use core::alloc::{GlobalAlloc, Layout};
use core::ptr::null_mut;
use spin::Mutex;

/// Heap start address: higher-half convention for a 32-bit kernel (3G/1G split).
const HEAP_START: usize = 0xC000_0000;

/// Heap size (1 MB initially)
const HEAP_SIZE: usize = 1024 * 1024;

/// Simple bump allocator for early boot
pub struct BumpAllocator {
    heap_start: usize,
    heap_end: usize,
    next: usize,
}

impl BumpAllocator {
    pub const fn new() -> Self {
        BumpAllocator {
            heap_start: HEAP_START,
            heap_end: HEAP_START + HEAP_SIZE,
            next: HEAP_START,
        }
    }

    pub unsafe fn init(&mut self, heap_start: usize, heap_size: usize) {
        self.heap_start = heap_start;
        self.heap_end = heap_start + heap_size;
        self.next = heap_start;
    }
}

/// Wrapper around Mutex<BumpAllocator> for the global allocator
struct LockedAllocator(Mutex<BumpAllocator>);

unsafe impl GlobalAlloc for LockedAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let mut allocator = self.0.lock();

        let alloc_start = aos_lib::math::align_up(allocator.next, layout.align());
        let alloc_end = alloc_start.saturating_add(layout.size());

        if alloc_end > allocator.heap_end {
            null_mut()
        } else {
            allocator.next = alloc_end;
            alloc_start as *mut u8
        }
    }

    unsafe fn dealloc(&self, _ptr: *mut u8, _layout: Layout) {
        // Bump allocator doesn't support deallocation
    }
}

#[cfg(not(test))]
#[global_allocator]
static ALLOCATOR: LockedAllocator = LockedAllocator(Mutex::new(BumpAllocator::new()));

/// Initialize the heap
pub fn init() {
    // The actual heap memory would be allocated during early boot
    // For now, we assume it's available at HEAP_START
}

#[cfg(not(test))]
#[alloc_error_handler]
fn alloc_error_handler(layout: Layout) -> ! {
    panic!("allocation error: {:?}", layout);
}
