//! Normal-boot device drivers
//!
//! Serial, VGA text mode and PS/2 keyboard — the same three devices that
//! feed `printk` during normal operation and that Kernel Recovery Mode
//! re-initializes from scratch with its own copies once these can no
//! longer be trusted. Nothing below the VFS layer (storage, networking,
//! graphics, input devices beyond the keyboard) is owned here.

#![cfg_attr(not(test), no_std)]

pub mod keyboard;
pub mod serial;
pub mod vga;

/// Bring up the drivers `printk` depends on.
pub fn init() {
    serial::init();
    vga::init();
    keyboard::init();
}
