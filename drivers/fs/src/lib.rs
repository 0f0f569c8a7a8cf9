//! Filesystem stack
//!
//! The VFS dispatcher (registry, mount table, path resolution, per-process
//! file descriptors) sits over two pluggable backends: the on-disk FAT32
//! driver and the bounded in-memory ramfs. Neither backend knows about the
//! other, or about the dispatcher above them, beyond the `VNode`/
//! `Filesystem` trait objects defined in [`vfs`].

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod dispatcher;
pub mod fat32;
pub mod fd;
pub mod mount;
pub mod ramfs;
pub mod vfs;

/// Register the built-in backends so they can be mounted by name.
pub fn init() {
    mount::register("ramfs", ramfs::RamFs::new()).ok();
}
