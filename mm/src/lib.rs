//! Memory Management
//!
//! The `kalloc`/`kfree` pair the rest of the core treats as a given: a
//! physical frame bitmap and a bump heap feeding `#[global_allocator]`, so
//! `alloc::{vec, string, collections, sync}` are usable everywhere else.
//! Paging, swap, and reclamation policy are out of scope for this core.

#![cfg_attr(not(test), no_std)]
#![cfg_attr(not(test), feature(alloc_error_handler))]

extern crate alloc;

pub mod allocator;
pub mod frame;
pub mod heap;

use core::sync::atomic::{AtomicBool, Ordering};

static MM_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initialize memory management
pub fn init() {
    if MM_INITIALIZED.load(Ordering::Acquire) {
        return;
    }

    frame::init();
    heap::init();

    MM_INITIALIZED.store(true, Ordering::Release);
}

/// Check if memory management is initialized
pub fn is_initialized() -> bool {
    MM_INITIALIZED.load(Ordering::Acquire)
}
