//! Block device port
//!
//! The opaque 512-byte LBA read/write contract the FAT32 driver and, in
//! principle, any other on-disk backend sit on top of. No device
//! enumeration, no partition tables, no request queue — a device is just
//! something that can read and write fixed-size sectors.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod device;

pub use device::{BlockDevice, RamDisk, SECTOR_SIZE};
