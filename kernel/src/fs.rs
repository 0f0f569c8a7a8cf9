//! Filesystem bring-up
//!
//! Registers the backends `aos-fs` ships and mounts a ramfs at `/` so the
//! scheduler always has a root to build the idle task's [`ProcessFiles`]
//! against. A disk-backed FAT32 mount happens later, once a block device
//! is available, via [`mount_fat32`].
//!
//! [`ProcessFiles`]: aos_fs::dispatcher::ProcessFiles

use alloc::sync::Arc;

use aos_block::BlockDevice;
use aos_fs::fat32::Fat32Filesystem;
use aos_lib::error::FsResult;

use core::sync::atomic::{AtomicBool, Ordering};

static FS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Register the built-in backends and mount ramfs at `/`.
pub fn init() {
    if FS_INITIALIZED.load(Ordering::Acquire) {
        return;
    }

    aos_fs::init();
    aos_fs::mount::mount("ramfs", "", "/").ok();

    FS_INITIALIZED.store(true, Ordering::Release);
    crate::printk::printk("  File system subsystem initialized\n");
}

/// Check if the filesystem subsystem is initialized
pub fn is_initialized() -> bool {
    FS_INITIALIZED.load(Ordering::Acquire)
}

/// Register and mount a FAT32 filesystem over `device` at `target`,
/// locating the partition at `lba` within the mount source string.
pub fn mount_fat32(device: Arc<dyn BlockDevice>, lba: u64, target: &str) -> FsResult<()> {
    let fs = Fat32Filesystem::new(device);
    aos_fs::mount::register("fat32", fs).ok();

    let source = alloc::format!("lba={}", lba);
    aos_fs::mount::mount("fat32", &source, target)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init();
        init();
        assert!(is_initialized());
    }
}
