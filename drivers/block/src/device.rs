//! Block device contract
//!
//! `read_sectors`/`write_sectors` over a fixed 512-byte sector; `count > 1`
//! behaves as `count` sequential single-sector operations. The trait
//! carries no state of its own — whatever backs an implementation (a real
//! disk driver, a RAM-backed image) is the implementor's business.

use alloc::vec::Vec;
use spin::Mutex;

use aos_lib::error::{FsError, FsResult};

/// Fixed sector size every implementation must honor.
pub const SECTOR_SIZE: usize = 512;

/// Opaque 512-byte LBA read/write port.
pub trait BlockDevice: Send + Sync {
    /// Read `count` sectors starting at `lba` into `dst`.
    /// `dst.len()` must be exactly `count as usize * SECTOR_SIZE`.
    fn read_sectors(&self, lba: u64, count: u32, dst: &mut [u8]) -> FsResult<()>;

    /// Write `count` sectors starting at `lba` from `src`.
    /// `src.len()` must be exactly `count as usize * SECTOR_SIZE`.
    fn write_sectors(&self, lba: u64, count: u32, src: &[u8]) -> FsResult<()>;

    /// Total sector count, when known.
    fn sector_count(&self) -> u64;
}

/// A RAM-backed device: the FAT32 driver's own tests format and mount one
/// of these instead of touching real hardware, and it doubles as the
/// backing store for ramfs-free boot images.
pub struct RamDisk {
    sectors: Mutex<Vec<u8>>,
}

impl RamDisk {
    /// Allocate a zeroed disk image of `sector_count` sectors.
    pub fn new(sector_count: u64) -> Self {
        let bytes = sector_count as usize * SECTOR_SIZE;
        Self {
            sectors: Mutex::new(alloc::vec![0u8; bytes]),
        }
    }

    fn bounds_check(&self, lba: u64, count: u32, len: usize) -> FsResult<(usize, usize)> {
        if count == 0 || len != count as usize * SECTOR_SIZE {
            return Err(FsError::Invalid);
        }
        let start = lba as usize * SECTOR_SIZE;
        let end = start + len;
        let total = self.sectors.lock().len();
        if end > total {
            return Err(FsError::Invalid);
        }
        Ok((start, end))
    }
}

impl BlockDevice for RamDisk {
    fn read_sectors(&self, lba: u64, count: u32, dst: &mut [u8]) -> FsResult<()> {
        let (start, end) = self.bounds_check(lba, count, dst.len())?;
        dst.copy_from_slice(&self.sectors.lock()[start..end]);
        Ok(())
    }

    fn write_sectors(&self, lba: u64, count: u32, src: &[u8]) -> FsResult<()> {
        let (start, end) = self.bounds_check(lba, count, src.len())?;
        self.sectors.lock()[start..end].copy_from_slice(src);
        Ok(())
    }

    fn sector_count(&self) -> u64 {
        (self.sectors.lock().len() / SECTOR_SIZE) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let disk = RamDisk::new(16);
        let mut data = alloc::vec![0xABu8; SECTOR_SIZE * 2];
        disk.write_sectors(3, 2, &data).unwrap();
        data.iter_mut().for_each(|b| *b = 0);
        disk.read_sectors(3, 2, &mut data).unwrap();
        assert!(data.iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn out_of_range_access_is_rejected() {
        let disk = RamDisk::new(4);
        let mut buf = alloc::vec![0u8; SECTOR_SIZE];
        assert_eq!(disk.read_sectors(10, 1, &mut buf), Err(FsError::Invalid));
    }

    #[test]
    fn mismatched_buffer_length_is_rejected() {
        let disk = RamDisk::new(4);
        let mut buf = alloc::vec![0u8; SECTOR_SIZE - 1];
        assert_eq!(disk.read_sectors(0, 1, &mut buf), Err(FsError::Invalid));
    }

    #[test]
    fn sector_count_matches_construction() {
        let disk = RamDisk::new(128);
        assert_eq!(disk.sector_count(), 128);
    }
}
