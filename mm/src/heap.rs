//! Kernel Heap
//!
//! Heap memory management for kernel allocations. The heap region backing
//! `allocator::BumpAllocator` is reserved statically; mapping it into the
//! page tables is the out-of-scope boot collaborator's job.

/// Initialize kernel heap
pub fn init() {
    // Heap memory is reserved statically by `allocator::BumpAllocator`.
}
