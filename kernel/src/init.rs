//! Kernel Initialization
//!
//! Brings subsystems up in dependency order: console drivers first (so
//! every later stage can log), then time, then the filesystem, then the
//! scheduler, then the syscall gate. [`crate::init`] drives these three
//! phases in sequence.

use crate::printk::printk;

/// Console and architecture-level bring-up. Must run before any other
/// subsystem logs anything.
pub fn early_init() {
    aos_drivers::init();
    printk("Early kernel initialization...\n");
    crate::time::init();
    printk("Early initialization complete\n");
}

/// Bring up the subsystems everything else depends on: the filesystem,
/// the scheduler, and the syscall gate.
pub fn main_init() {
    printk("Main kernel initialization...\n");
    crate::fs::init();
    crate::process::sched::init();
    crate::syscall::init();
    printk("Main initialization complete\n");
}

/// Anything that can wait until the core subsystems are already live.
/// Currently a no-op: there is no userspace init program to start and no
/// second filesystem to mount until a block device shows up.
pub fn late_init() {
    printk("Late kernel initialization...\n");
    printk("Late initialization complete\n");
}
