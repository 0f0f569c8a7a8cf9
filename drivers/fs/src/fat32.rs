//! FAT32 on-disk filesystem driver
//!
//! Everything here operates through a single [`aos_block::BlockDevice`];
//! the driver owns boot-sector/FSInfo validation, cluster allocation, the
//! dirty in-memory FAT mirror, and LFN-aware directory entries. No long
//! filenames wider than the 13-characters-per-LFN-entry chain, no
//! timestamps beyond what the spec of this driver needs them for — this
//! is the cluster/directory machinery, not a Windows-compatible toolchain.

use alloc::string::{String, ToString};
use alloc::sync::{Arc, Weak};
use alloc::vec;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use spin::RwLock;

use aos_block::BlockDevice;
use aos_lib::error::{FsError, FsResult};

use crate::vfs::{AccessRecord, DirEntry, FileType, Filesystem, StatFs, VNode};

const DIRENT_SIZE: usize = 32;
const ATTR_READ_ONLY: u8 = 0x01;
const ATTR_HIDDEN: u8 = 0x02;
const ATTR_SYSTEM: u8 = 0x04;
const ATTR_VOLUME_ID: u8 = 0x08;
const ATTR_DIRECTORY: u8 = 0x10;
const ATTR_LONG_NAME: u8 = 0x0F;

const FAT32_MASK: u32 = 0x0FFF_FFFF;
const FAT32_EOC: u32 = 0x0FFF_FFFF;
const FAT32_EOC_MIN: u32 = 0x0FFF_FFF8;
const FAT32_FREE: u32 = 0x0000_0000;

const LFN_LAST_FLAG: u8 = 0x40;
const LFN_CHARS_PER_ENTRY: usize = 13;

struct BootSector {
    bytes_per_sector: u16,
    sectors_per_cluster: u8,
    reserved_sectors: u16,
    num_fats: u8,
    fat_size_32: u32,
    ext_flags: u16,
    root_cluster: u32,
    fs_info_sector: u16,
}

impl BootSector {
    fn parse(raw: &[u8]) -> FsResult<Self> {
        if raw.len() < 512 {
            return Err(FsError::Invalid);
        }
        let bytes_per_sector = u16::from_le_bytes([raw[11], raw[12]]);
        let sectors_per_cluster = raw[13];
        let reserved_sectors = u16::from_le_bytes([raw[14], raw[15]]);
        let num_fats = raw[16];
        let root_entry_count = u16::from_le_bytes([raw[17], raw[18]]);
        let fat_size_16 = u16::from_le_bytes([raw[22], raw[23]]);
        let fat_size_32 = u32::from_le_bytes([raw[36], raw[37], raw[38], raw[39]]);
        let ext_flags = u16::from_le_bytes([raw[40], raw[41]]);
        let root_cluster = u32::from_le_bytes([raw[44], raw[45], raw[46], raw[47]]);
        let fs_info_sector = u16::from_le_bytes([raw[48], raw[49]]);
        let fs_type = &raw[82..90];

        if bytes_per_sector != 512 {
            return Err(FsError::Invalid);
        }
        if sectors_per_cluster == 0 || !sectors_per_cluster.is_power_of_two() {
            return Err(FsError::Invalid);
        }
        // FAT12/16 carry a nonzero 16-bit FAT size and root entry count;
        // FAT32 always zeroes both in favor of the 32-bit fields.
        if fat_size_16 != 0 || root_entry_count != 0 {
            return Err(FsError::Invalid);
        }
        if fs_type != b"FAT32   " {
            return Err(FsError::Invalid);
        }
        if fat_size_32 == 0 || num_fats == 0 {
            return Err(FsError::Invalid);
        }

        Ok(Self {
            bytes_per_sector,
            sectors_per_cluster,
            reserved_sectors,
            num_fats,
            fat_size_32,
            ext_flags,
            root_cluster,
            fs_info_sector,
        })
    }
}

struct FsInfoCache {
    next_free: u32,
    free_count: u32,
}

impl FsInfoCache {
    fn parse(raw: &[u8]) -> Self {
        let lead_sig = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
        let struct_sig = u32::from_le_bytes([raw[484], raw[485], raw[486], raw[487]]);
        if lead_sig != 0x4161_5252 || struct_sig != 0x6141_7272 {
            return Self {
                next_free: 2,
                free_count: u32::MAX,
            };
        }
        let free_count = u32::from_le_bytes([raw[488], raw[489], raw[490], raw[491]]);
        let next_free = u32::from_le_bytes([raw[492], raw[493], raw[494], raw[495]]);
        Self {
            next_free: if next_free < 2 { 2 } else { next_free },
            free_count,
        }
    }

    fn serialize_into(&self, raw: &mut [u8]) {
        raw[0..4].copy_from_slice(&0x4161_5252u32.to_le_bytes());
        raw[484..488].copy_from_slice(&0x6141_7272u32.to_le_bytes());
        raw[488..492].copy_from_slice(&self.free_count.to_le_bytes());
        raw[492..496].copy_from_slice(&self.next_free.to_le_bytes());
        raw[508..512].copy_from_slice(&0xAA55_0000u32.to_le_bytes());
    }
}

struct FatState {
    bytes_per_sector: u16,
    sectors_per_cluster: u8,
    reserved_sectors: u16,
    num_fats: u8,
    fat_size_32: u32,
    ext_flags: u16,
    root_cluster: u32,
    fs_info_sector: u16,
    data_start_sector: u32,
    fat: Vec<u32>,
    fat_dirty: bool,
    fsinfo: FsInfoCache,
    fsinfo_dirty: bool,
}

impl FatState {
    fn cluster_size(&self) -> usize {
        self.sectors_per_cluster as usize * self.bytes_per_sector as usize
    }

    fn cluster_to_sector(&self, cluster: u32) -> u64 {
        (self.data_start_sector + (cluster - 2) * self.sectors_per_cluster as u32) as u64
    }

    fn next_of(&self, cluster: u32) -> FsResult<u32> {
        self.fat
            .get(cluster as usize)
            .map(|v| v & FAT32_MASK)
            .ok_or(FsError::Invalid)
    }

    fn set_next(&mut self, cluster: u32, value: u32) -> FsResult<()> {
        let slot = self.fat.get_mut(cluster as usize).ok_or(FsError::Invalid)?;
        *slot = value & FAT32_MASK;
        self.fat_dirty = true;
        Ok(())
    }

    fn is_eoc(value: u32) -> bool {
        value >= FAT32_EOC_MIN
    }

    /// Scan forward from the FSInfo hint, wrapping once, for a free
    /// cluster; mark it end-of-chain and return its number.
    fn allocate_cluster(&mut self) -> FsResult<u32> {
        let total = self.fat.len() as u32;
        if total <= 2 {
            return Err(FsError::NoSpace);
        }
        let start = self.fsinfo.next_free.clamp(2, total - 1);
        let mut cursor = start;
        let mut scanned = 0u32;
        loop {
            if self.fat[cursor as usize] & FAT32_MASK == FAT32_FREE {
                self.set_next(cursor, FAT32_EOC)?;
                self.fsinfo.next_free = if cursor + 1 >= total { 2 } else { cursor + 1 };
                if self.fsinfo.free_count != u32::MAX {
                    self.fsinfo.free_count = self.fsinfo.free_count.saturating_sub(1);
                }
                self.fsinfo_dirty = true;
                return Ok(cursor);
            }
            cursor += 1;
            if cursor >= total {
                cursor = 2;
            }
            scanned += 1;
            if scanned >= total - 2 {
                return Err(FsError::NoSpace);
            }
        }
    }

    fn append_cluster(&mut self, tail: u32) -> FsResult<u32> {
        let new = self.allocate_cluster()?;
        self.set_next(tail, new)?;
        Ok(new)
    }

    fn free_chain(&mut self, start: u32) -> FsResult<()> {
        let mut cluster = start;
        loop {
            let next = self.next_of(cluster)?;
            self.set_next(cluster, FAT32_FREE)?;
            if self.fsinfo.free_count != u32::MAX {
                self.fsinfo.free_count = self.fsinfo.free_count.saturating_add(1);
            }
            self.fsinfo_dirty = true;
            if Self::is_eoc(next) || next == FAT32_FREE {
                break;
            }
            cluster = next;
        }
        Ok(())
    }
}

struct ParsedEntry {
    name: String,
    attr: u8,
    first_cluster: u32,
    size: u32,
    /// Byte offset of the short-name entry within the directory's
    /// flattened raw bytes; LFN continuation entries, if any, sit
    /// immediately before it.
    short_offset: usize,
    lfn_count: usize,
}

fn decode_short_name(raw: &[u8]) -> String {
    let base = core::str::from_utf8(&raw[0..8]).unwrap_or("").trim_end();
    let ext = core::str::from_utf8(&raw[8..11]).unwrap_or("").trim_end();
    let mut name = base.to_ascii_lowercase();
    if !ext.is_empty() {
        name.push('.');
        name.push_str(&ext.to_ascii_lowercase());
    }
    name
}

fn lfn_checksum(short_name: &[u8; 11]) -> u8 {
    let mut sum: u8 = 0;
    for &b in short_name.iter() {
        sum = sum.rotate_right(1).wrapping_add(b);
    }
    sum
}

/// Build an 8.3 short name for `name`, truncating and upper-casing. Not
/// collision-resistant beyond the directory scan done at creation time —
/// good enough for a kernel that never has to interoperate with a real
/// Windows volume.
fn make_short_name(name: &str) -> [u8; 11] {
    let mut short = [b' '; 11];
    let (base, ext) = match name.rsplit_once('.') {
        Some((b, e)) if !b.is_empty() => (b, e),
        _ => (name, ""),
    };
    for (i, c) in base.chars().filter(|c| *c != '.').take(8).enumerate() {
        short[i] = c.to_ascii_uppercase() as u8;
    }
    for (i, c) in ext.chars().take(3).enumerate() {
        short[8 + i] = c.to_ascii_uppercase() as u8;
    }
    short
}

/// True when `name` already fits the 8.3 short-name charset without
/// truncation, so no LFN entries are needed.
fn fits_short_name(name: &str) -> bool {
    let (base, ext) = match name.rsplit_once('.') {
        Some((b, e)) => (b, e),
        None => (name, ""),
    };
    !base.is_empty()
        && base.len() <= 8
        && ext.len() <= 3
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-')
}

fn parse_dir_entries(raw: &[u8]) -> Vec<ParsedEntry> {
    let mut entries = Vec::new();
    let mut lfn_parts: Vec<(u8, [u16; LFN_CHARS_PER_ENTRY])> = Vec::new();
    let mut i = 0;
    while i + DIRENT_SIZE <= raw.len() {
        let e = &raw[i..i + DIRENT_SIZE];
        if e[0] == 0x00 {
            break;
        }
        if e[0] == 0xE5 {
            lfn_parts.clear();
            i += DIRENT_SIZE;
            continue;
        }
        let attr = e[11];
        if attr == ATTR_LONG_NAME {
            let order = e[0] & 0x1F;
            let mut chars = [0u16; LFN_CHARS_PER_ENTRY];
            for j in 0..5 {
                chars[j] = u16::from_le_bytes([e[1 + 2 * j], e[2 + 2 * j]]);
            }
            for j in 0..6 {
                chars[5 + j] = u16::from_le_bytes([e[14 + 2 * j], e[15 + 2 * j]]);
            }
            for j in 0..2 {
                chars[11 + j] = u16::from_le_bytes([e[28 + 2 * j], e[29 + 2 * j]]);
            }
            lfn_parts.push((order, chars));
            i += DIRENT_SIZE;
            continue;
        }
        if attr & ATTR_VOLUME_ID != 0 {
            lfn_parts.clear();
            i += DIRENT_SIZE;
            continue;
        }

        let lfn_count = lfn_parts.len();
        let long_name = if !lfn_parts.is_empty() {
            lfn_parts.sort_by_key(|(order, _)| *order);
            let mut s = String::new();
            for (_, chars) in &lfn_parts {
                for &c in chars {
                    if c == 0 || c == 0xFFFF {
                        break;
                    }
                    if let Some(ch) = char::from_u32(c as u32) {
                        s.push(ch);
                    }
                }
            }
            lfn_parts.clear();
            Some(s)
        } else {
            None
        };

        let name = long_name.unwrap_or_else(|| decode_short_name(&e[0..11]));
        let first_cluster_hi = u16::from_le_bytes([e[20], e[21]]) as u32;
        let first_cluster_lo = u16::from_le_bytes([e[26], e[27]]) as u32;
        let first_cluster = (first_cluster_hi << 16) | first_cluster_lo;
        let size = u32::from_le_bytes([e[28], e[29], e[30], e[31]]);

        entries.push(ParsedEntry {
            name,
            attr,
            first_cluster,
            size,
            short_offset: i,
            lfn_count,
        });
        i += DIRENT_SIZE;
    }
    entries
}

/// Pull the partition base out of a mount source string: `lba=<decimal>`
/// or `lba:<decimal>` anywhere in `source`, defaulting to 0 (whole-disk,
/// single-partition images) when neither is present or the digits after
/// it don't parse.
fn parse_lba(source: &str) -> u64 {
    for prefix in ["lba=", "lba:"] {
        if let Some(pos) = source.find(prefix) {
            let rest = &source[pos + prefix.len()..];
            let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
            if let Ok(lba) = digits.parse::<u64>() {
                return lba;
            }
        }
    }
    0
}

/// The FAT32 backend. One instance serves one block device; `mount` must
/// run before any vnode operation.
pub struct Fat32Filesystem {
    device: Arc<dyn BlockDevice>,
    state: RwLock<Option<FatState>>,
    self_weak: Weak<Fat32Filesystem>,
    /// Partition base LBA, parsed out of the mount source; added to every
    /// sector number before it reaches the block device.
    base_lba: AtomicU64,
}

impl Fat32Filesystem {
    pub fn new(device: Arc<dyn BlockDevice>) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            device,
            state: RwLock::new(None),
            self_weak: weak.clone(),
            base_lba: AtomicU64::new(0),
        })
    }

    fn base_lba(&self) -> u64 {
        self.base_lba.load(Ordering::Relaxed)
    }

    fn self_arc(&self) -> Arc<Fat32Filesystem> {
        self.self_weak
            .upgrade()
            .expect("Fat32Filesystem outlives its own Arc")
    }

    fn read_sector(&self, sector: u64, buf: &mut [u8]) -> FsResult<()> {
        self.device
            .read_sectors(self.base_lba() + sector, 1, buf)
            .map_err(|_| FsError::Io)
    }

    fn write_sector(&self, sector: u64, buf: &[u8]) -> FsResult<()> {
        self.device
            .write_sectors(self.base_lba() + sector, 1, buf)
            .map_err(|_| FsError::Io)
    }

    fn parse_boot_sector(&self) -> FsResult<BootSector> {
        let mut raw = vec![0u8; 512];
        if self.read_sector(0, &mut raw).is_ok() {
            if let Ok(bs) = BootSector::parse(&raw) {
                return Ok(bs);
            }
        }
        // Primary boot sector was unreadable or invalid; the spec's
        // backup copy always lives at sector 6.
        self.read_sector(6, &mut raw)?;
        BootSector::parse(&raw)
    }

    fn read_cluster(&self, state: &FatState, cluster: u32, buf: &mut [u8]) -> FsResult<()> {
        self.device
            .read_sectors(
                self.base_lba() + state.cluster_to_sector(cluster),
                state.sectors_per_cluster as u32,
                buf,
            )
            .map_err(|_| FsError::Io)
    }

    fn write_cluster(&self, state: &FatState, cluster: u32, buf: &[u8]) -> FsResult<()> {
        self.device
            .write_sectors(
                self.base_lba() + state.cluster_to_sector(cluster),
                state.sectors_per_cluster as u32,
                buf,
            )
            .map_err(|_| FsError::Io)
    }

    fn read_chain(&self, state: &FatState, first_cluster: u32) -> FsResult<Vec<u8>> {
        let mut data = Vec::new();
        if first_cluster == 0 {
            return Ok(data);
        }
        let mut cluster = first_cluster;
        let cluster_size = state.cluster_size();
        loop {
            let mut buf = vec![0u8; cluster_size];
            self.read_cluster(state, cluster, &mut buf)?;
            data.extend_from_slice(&buf);
            let next = state.next_of(cluster)?;
            if FatState::is_eoc(next) || next == FAT32_FREE {
                break;
            }
            cluster = next;
        }
        Ok(data)
    }

    /// Write the (short-entry, lfn-entries) pair for `entry_index` fields
    /// directly into the directory's backing clusters, without
    /// re-reading or re-parsing the rest of the directory.
    fn patch_entry_cluster(
        &self,
        state: &FatState,
        dir_first_cluster: u32,
        byte_offset: usize,
        first_cluster: u32,
        size: u32,
    ) -> FsResult<()> {
        let cluster_size = state.cluster_size();
        let skip_clusters = byte_offset / cluster_size;
        let offset_in_cluster = byte_offset % cluster_size;

        let mut cluster = dir_first_cluster;
        for _ in 0..skip_clusters {
            cluster = state.next_of(cluster)?;
        }
        let mut buf = vec![0u8; cluster_size];
        self.read_cluster(state, cluster, &mut buf)?;
        buf[offset_in_cluster + 20..offset_in_cluster + 22]
            .copy_from_slice(&((first_cluster >> 16) as u16).to_le_bytes());
        buf[offset_in_cluster + 26..offset_in_cluster + 28]
            .copy_from_slice(&((first_cluster & 0xFFFF) as u16).to_le_bytes());
        buf[offset_in_cluster + 28..offset_in_cluster + 32].copy_from_slice(&size.to_le_bytes());
        self.write_cluster(state, cluster, &buf)
    }

    fn mark_deleted(
        &self,
        state: &FatState,
        dir_first_cluster: u32,
        entry: &ParsedEntry,
    ) -> FsResult<()> {
        let cluster_size = state.cluster_size();
        let first_offset = entry.short_offset - entry.lfn_count * DIRENT_SIZE;
        let mut offset = first_offset;
        let end = entry.short_offset + DIRENT_SIZE;
        while offset < end {
            let skip_clusters = offset / cluster_size;
            let offset_in_cluster = offset % cluster_size;
            let mut cluster = dir_first_cluster;
            for _ in 0..skip_clusters {
                cluster = state.next_of(cluster)?;
            }
            let mut buf = vec![0u8; cluster_size];
            self.read_cluster(state, cluster, &mut buf)?;
            buf[offset_in_cluster] = 0xE5;
            self.write_cluster(state, cluster, &buf)?;
            offset += DIRENT_SIZE;
        }
        Ok(())
    }

    /// Find `DIRENT_SIZE * slots_needed` contiguous free bytes in the
    /// directory's cluster chain, extending the chain if none is free,
    /// and return the byte offset of the first slot.
    fn reserve_slots(
        &self,
        state: &mut FatState,
        dir_first_cluster: u32,
        slots_needed: usize,
    ) -> FsResult<usize> {
        let cluster_size = state.cluster_size();
        let raw = self.read_chain(state, dir_first_cluster)?;
        let needed_bytes = slots_needed * DIRENT_SIZE;
        let mut run_start = None;
        let mut run_len = 0usize;
        let mut i = 0;
        while i + DIRENT_SIZE <= raw.len() {
            let free = raw[i] == 0x00 || raw[i] == 0xE5;
            if free {
                if run_start.is_none() {
                    run_start = Some(i);
                }
                run_len += DIRENT_SIZE;
                if run_len >= needed_bytes {
                    return Ok(run_start.unwrap());
                }
            } else {
                run_start = None;
                run_len = 0;
            }
            if raw[i] == 0x00 {
                // Free tail: every following slot is free too.
                break;
            }
            i += DIRENT_SIZE;
        }

        // No run large enough: grow the chain by one cluster and use its
        // start (the grown cluster is zeroed by the block device contract
        // FAT32 assumes for fresh clusters, mirrored here explicitly).
        let mut tail = dir_first_cluster;
        while !FatState::is_eoc(state.next_of(tail)?) {
            tail = state.next_of(tail)?;
        }
        let new_cluster = state.append_cluster(tail)?;
        let zeroed = vec![0u8; cluster_size];
        self.write_cluster(state, new_cluster, &zeroed)?;
        Ok(raw.len())
    }

    fn write_entry_at(
        &self,
        state: &FatState,
        dir_first_cluster: u32,
        offset: usize,
        short_name: &[u8; 11],
        long_name: &str,
        attr: u8,
    ) -> FsResult<()> {
        let needs_lfn = !fits_short_name(long_name);
        let lfn_entries: Vec<[u16; LFN_CHARS_PER_ENTRY]> = if needs_lfn {
            let chars: Vec<u16> = long_name.encode_utf16().collect();
            chars
                .chunks(LFN_CHARS_PER_ENTRY)
                .map(|chunk| {
                    let mut arr = [0xFFFFu16; LFN_CHARS_PER_ENTRY];
                    for (i, &c) in chunk.iter().enumerate() {
                        arr[i] = c;
                    }
                    if chunk.len() < LFN_CHARS_PER_ENTRY {
                        arr[chunk.len()] = 0;
                    }
                    arr
                })
                .collect()
        } else {
            Vec::new()
        };

        let checksum = lfn_checksum(short_name);
        let cluster_size = state.cluster_size();
        let total_entries = lfn_entries.len() + 1;
        let mut bytes = vec![0u8; total_entries * DIRENT_SIZE];

        for (idx, chunk) in lfn_entries.iter().enumerate() {
            let order = (lfn_entries.len() - idx) as u8;
            let flag = if idx == 0 { LFN_LAST_FLAG } else { 0 };
            let entry_off = idx * DIRENT_SIZE;
            bytes[entry_off] = order | flag;
            for j in 0..5 {
                bytes[entry_off + 1 + 2 * j..entry_off + 3 + 2 * j]
                    .copy_from_slice(&chunk[j].to_le_bytes());
            }
            bytes[entry_off + 11] = ATTR_LONG_NAME;
            bytes[entry_off + 13] = checksum;
            for j in 0..6 {
                bytes[entry_off + 14 + 2 * j..entry_off + 16 + 2 * j]
                    .copy_from_slice(&chunk[5 + j].to_le_bytes());
            }
            for j in 0..2 {
                bytes[entry_off + 28 + 2 * j..entry_off + 30 + 2 * j]
                    .copy_from_slice(&chunk[11 + j].to_le_bytes());
            }
        }

        let short_off = lfn_entries.len() * DIRENT_SIZE;
        bytes[short_off..short_off + 11].copy_from_slice(short_name);
        bytes[short_off + 11] = attr;

        // Entries may straddle a cluster boundary; write byte-by-range
        // against whichever cluster(s) the offset spans.
        let mut written = 0;
        while written < bytes.len() {
            let abs_offset = offset + written;
            let cluster_index = abs_offset / cluster_size;
            let offset_in_cluster = abs_offset % cluster_size;
            let mut cluster = dir_first_cluster;
            for _ in 0..cluster_index {
                cluster = state.next_of(cluster)?;
            }
            let chunk_len = (cluster_size - offset_in_cluster).min(bytes.len() - written);
            let mut buf = vec![0u8; cluster_size];
            self.read_cluster(state, cluster, &mut buf)?;
            buf[offset_in_cluster..offset_in_cluster + chunk_len]
                .copy_from_slice(&bytes[written..written + chunk_len]);
            self.write_cluster(state, cluster, &buf)?;
            written += chunk_len;
        }
        Ok(())
    }

    fn find_entry(
        &self,
        state: &FatState,
        dir_first_cluster: u32,
        name: &str,
    ) -> FsResult<ParsedEntry> {
        let raw = self.read_chain(state, dir_first_cluster)?;
        parse_dir_entries(&raw)
            .into_iter()
            .find(|e| aos_lib::string::eq_ignore_ascii(&e.name, name))
            .ok_or(FsError::NotFound)
    }

}

/// A live FAT32 file or directory.
pub struct Fat32VNode {
    fs: Arc<Fat32Filesystem>,
    name: String,
    first_cluster: RwLock<u32>,
    size: RwLock<u32>,
    is_dir: bool,
    parent_cluster: u32,
    entry_short_offset: usize,
    /// Set when `write` has changed `first_cluster`/`size` in memory but
    /// the directory entry on disk hasn't been patched to match yet.
    dirty: AtomicBool,
}

impl core::fmt::Debug for Fat32VNode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Fat32VNode").field("name", &self.name).finish()
    }
}

impl VNode for Fat32VNode {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn inode(&self) -> u64 {
        let cluster = *self.first_cluster.read();
        if cluster != 0 {
            cluster as u64
        } else {
            // Zero-length files have no cluster yet; the directory slot
            // they live in is unique regardless.
            0xFFFF_FFFF_0000_0000 | self.entry_short_offset as u64
        }
    }

    fn file_type(&self) -> FileType {
        if self.is_dir {
            FileType::Directory
        } else {
            FileType::File
        }
    }

    fn size(&self) -> u64 {
        *self.size.read() as u64
    }

    fn access(&self) -> AccessRecord {
        AccessRecord::owned_by(0)
    }

    fn read(&self, offset: u64, buf: &mut [u8]) -> FsResult<usize> {
        if self.is_dir {
            return Err(FsError::IsDir);
        }
        let guard = self.fs.state.read();
        let state = guard.as_ref().ok_or(FsError::Invalid)?;
        let size = *self.size.read() as u64;
        if offset >= size {
            return Ok(0);
        }
        let cluster = *self.first_cluster.read();
        let data = self.fs.read_chain(state, cluster)?;
        let end = (offset + buf.len() as u64).min(size) as usize;
        let start = offset as usize;
        if start >= data.len() {
            return Ok(0);
        }
        let end = end.min(data.len());
        let n = end - start;
        buf[..n].copy_from_slice(&data[start..end]);
        Ok(n)
    }

    fn write(&self, offset: u64, buf: &[u8]) -> FsResult<usize> {
        if self.is_dir {
            return Err(FsError::IsDir);
        }
        if buf.is_empty() {
            return Ok(0);
        }
        let mut guard = self.fs.state.write();
        let state = guard.as_mut().ok_or(FsError::Invalid)?;

        let mut first_cluster = *self.first_cluster.read();
        if first_cluster == 0 {
            first_cluster = state.allocate_cluster()?;
            *self.first_cluster.write() = first_cluster;
        }

        let mut data = self.fs.read_chain(state, first_cluster)?;
        let end = offset as usize + buf.len();
        if end > data.len() {
            data.resize(end, 0);
        }
        data[offset as usize..end].copy_from_slice(buf);

        // Grow the cluster chain to cover the new length, then flush.
        let cluster_size = state.cluster_size();
        let clusters_needed = data.len().div_ceil(cluster_size).max(1);
        let mut chain = vec![first_cluster];
        let mut tail = first_cluster;
        loop {
            let next = state.next_of(tail)?;
            if FatState::is_eoc(next) || next == FAT32_FREE {
                break;
            }
            chain.push(next);
            tail = next;
        }
        while chain.len() < clusters_needed {
            let new = state.append_cluster(tail)?;
            chain.push(new);
            tail = new;
        }

        data.resize(clusters_needed * cluster_size, 0);
        for (i, cluster) in chain.iter().enumerate() {
            let start = i * cluster_size;
            self.fs
                .write_cluster(state, *cluster, &data[start..start + cluster_size])?;
        }

        let new_size = end.max(*self.size.read() as usize) as u32;
        *self.size.write() = new_size;
        // The directory entry itself (first_cluster/size) is patched at
        // `close`, not here — `dirty` records that it's now stale.
        self.dirty.store(true, Ordering::Relaxed);

        Ok(buf.len())
    }

    fn close(&self) -> FsResult<()> {
        if self.is_dir || !self.dirty.swap(false, Ordering::Relaxed) {
            return Ok(());
        }
        {
            let guard = self.fs.state.read();
            let state = guard.as_ref().ok_or(FsError::Invalid)?;
            self.fs.patch_entry_cluster(
                state,
                self.parent_cluster,
                self.entry_short_offset,
                *self.first_cluster.read(),
                *self.size.read(),
            )?;
        }
        self.fs.sync()
    }

    fn finddir(&self, name: &str) -> FsResult<Arc<dyn VNode>> {
        if !self.is_dir {
            return Err(FsError::NotDir);
        }
        let guard = self.fs.state.read();
        let state = guard.as_ref().ok_or(FsError::Invalid)?;
        let cluster = *self.first_cluster.read();
        let entry = self.fs.find_entry(state, cluster, name)?;
        Ok(Arc::new(Fat32VNode {
            fs: self.fs.clone(),
            name: entry.name,
            first_cluster: RwLock::new(entry.first_cluster),
            size: RwLock::new(entry.size),
            is_dir: entry.attr & ATTR_DIRECTORY != 0,
            parent_cluster: cluster,
            entry_short_offset: entry.short_offset,
            dirty: AtomicBool::new(false),
        }))
    }

    fn readdir(&self, index: usize) -> FsResult<DirEntry> {
        if !self.is_dir {
            return Err(FsError::NotDir);
        }
        let guard = self.fs.state.read();
        let state = guard.as_ref().ok_or(FsError::Invalid)?;
        let cluster = *self.first_cluster.read();
        let raw = self.fs.read_chain(state, cluster)?;
        let entries = parse_dir_entries(&raw);
        let entry = entries.get(index).ok_or(FsError::NotFound)?;
        Ok(DirEntry {
            name: entry.name.clone(),
            inode: entry.first_cluster as u64,
            file_type: if entry.attr & ATTR_DIRECTORY != 0 {
                FileType::Directory
            } else {
                FileType::File
            },
        })
    }

    fn create(&self, name: &str) -> FsResult<Arc<dyn VNode>> {
        if !self.is_dir {
            return Err(FsError::NotDir);
        }
        let cluster = *self.first_cluster.read();
        self.fs.create_entry_pub(cluster, name, false)
    }

    fn mkdir(&self, name: &str) -> FsResult<Arc<dyn VNode>> {
        if !self.is_dir {
            return Err(FsError::NotDir);
        }
        let cluster = *self.first_cluster.read();
        self.fs.create_entry_pub(cluster, name, true)
    }

    fn unlink(&self, name: &str) -> FsResult<()> {
        if !self.is_dir {
            return Err(FsError::NotDir);
        }
        let mut guard = self.fs.state.write();
        let state = guard.as_mut().ok_or(FsError::Invalid)?;
        let cluster = *self.first_cluster.read();
        let entry = self.fs.find_entry(state, cluster, name)?;
        if entry.attr & ATTR_DIRECTORY != 0 {
            return Err(FsError::IsDir);
        }
        self.fs.mark_deleted(state, cluster, &entry)?;
        if entry.first_cluster != 0 {
            state.free_chain(entry.first_cluster)?;
        }
        Ok(())
    }

    fn rmdir(&self, name: &str) -> FsResult<()> {
        if !self.is_dir {
            return Err(FsError::NotDir);
        }
        let mut guard = self.fs.state.write();
        let state = guard.as_mut().ok_or(FsError::Invalid)?;
        let cluster = *self.first_cluster.read();
        let entry = self.fs.find_entry(state, cluster, name)?;
        if entry.attr & ATTR_DIRECTORY == 0 {
            return Err(FsError::NotDir);
        }
        let child_raw = self.fs.read_chain(state, entry.first_cluster)?;
        if !parse_dir_entries(&child_raw).is_empty() {
            return Err(FsError::NotEmpty);
        }
        self.fs.mark_deleted(state, cluster, &entry)?;
        if entry.first_cluster != 0 {
            state.free_chain(entry.first_cluster)?;
        }
        Ok(())
    }
}

/// Stamp `.` and `..` short entries at the start of a freshly zeroed
/// directory cluster. `..` records 0 rather than `parent_cluster` when
/// the parent is the root directory, matching the on-disk convention
/// that root has no cluster number of its own to point back to.
fn write_dot_entries(buf: &mut [u8], first_cluster: u32, parent_cluster: u32, root_cluster: u32) {
    let dotdot_target = if parent_cluster == root_cluster {
        0
    } else {
        parent_cluster
    };
    for (i, (name, target)) in [(*b".          ", first_cluster), (*b"..         ", dotdot_target)]
        .iter()
        .enumerate()
    {
        let off = i * DIRENT_SIZE;
        buf[off..off + 11].copy_from_slice(name);
        buf[off + 11] = ATTR_DIRECTORY;
        buf[off + 20..off + 22].copy_from_slice(&((*target >> 16) as u16).to_le_bytes());
        buf[off + 26..off + 28].copy_from_slice(&((*target & 0xFFFF) as u16).to_le_bytes());
    }
}

impl Fat32Filesystem {
    fn create_entry_pub(
        self: &Arc<Self>,
        dir_first_cluster: u32,
        name: &str,
        is_dir: bool,
    ) -> FsResult<Arc<dyn VNode>> {
        let vnode = {
            let mut guard = self.state.write();
            let state = guard.as_mut().ok_or(FsError::Invalid)?;

            if self.find_entry(state, dir_first_cluster, name).is_ok() {
                return Err(FsError::Exists);
            }

            let needs_lfn = !fits_short_name(name);
            let slots_needed = if needs_lfn {
                name.encode_utf16().count().div_ceil(LFN_CHARS_PER_ENTRY) + 1
            } else {
                1
            };
            let offset = self.reserve_slots(state, dir_first_cluster, slots_needed)?;

            let first_cluster = if is_dir {
                state.allocate_cluster()?
            } else {
                0
            };

            let short_name = make_short_name(name);
            let attr = if is_dir { ATTR_DIRECTORY } else { 0 };
            self.write_entry_at(state, dir_first_cluster, offset, &short_name, name, attr)?;

            if is_dir {
                let cluster_size = state.cluster_size();
                let mut zeroed = vec![0u8; cluster_size];
                write_dot_entries(
                    &mut zeroed,
                    first_cluster,
                    dir_first_cluster,
                    state.root_cluster,
                );
                self.write_cluster(state, first_cluster, &zeroed)?;
            }

            Arc::new(Fat32VNode {
                fs: self.clone(),
                name: name.to_string(),
                first_cluster: RwLock::new(first_cluster),
                size: RwLock::new(0),
                is_dir,
                parent_cluster: dir_first_cluster,
                entry_short_offset: offset + (slots_needed - 1) * DIRENT_SIZE,
                dirty: AtomicBool::new(false),
            })
        };

        self.sync()?;
        Ok(vnode)
    }
}

impl Filesystem for Fat32Filesystem {
    fn name(&self) -> &'static str {
        "fat32"
    }

    fn mount(&self, source: &str) -> FsResult<()> {
        self.base_lba.store(parse_lba(source), Ordering::Relaxed);

        let boot = self.parse_boot_sector()?;
        let data_start_sector =
            boot.reserved_sectors as u32 + boot.num_fats as u32 * boot.fat_size_32;

        let fat_sector_count = boot.fat_size_32;
        let fat_bytes = fat_sector_count as usize * boot.bytes_per_sector as usize;
        let mut fat_raw = vec![0u8; fat_bytes];
        self.device
            .read_sectors(
                self.base_lba() + boot.reserved_sectors as u64,
                fat_sector_count,
                &mut fat_raw,
            )
            .map_err(|_| FsError::Io)?;
        let fat: Vec<u32> = fat_raw
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]) & FAT32_MASK)
            .collect();

        let mut fsinfo_raw = vec![0u8; 512];
        self.read_sector(boot.fs_info_sector as u64, &mut fsinfo_raw)?;
        let fsinfo = FsInfoCache::parse(&fsinfo_raw);

        *self.state.write() = Some(FatState {
            bytes_per_sector: boot.bytes_per_sector,
            sectors_per_cluster: boot.sectors_per_cluster,
            reserved_sectors: boot.reserved_sectors,
            num_fats: boot.num_fats,
            fat_size_32: boot.fat_size_32,
            ext_flags: boot.ext_flags,
            root_cluster: boot.root_cluster,
            fs_info_sector: boot.fs_info_sector,
            data_start_sector,
            fat,
            fat_dirty: false,
            fsinfo,
            fsinfo_dirty: false,
        });
        Ok(())
    }

    fn unmount(&self) -> FsResult<()> {
        self.sync()?;
        *self.state.write() = None;
        Ok(())
    }

    fn get_root(&self) -> FsResult<Arc<dyn VNode>> {
        let guard = self.state.read();
        let state = guard.as_ref().ok_or(FsError::Invalid)?;
        Ok(Arc::new(Fat32VNode {
            fs: self.self_arc(),
            name: String::new(),
            first_cluster: RwLock::new(state.root_cluster),
            size: RwLock::new(0),
            is_dir: true,
            parent_cluster: state.root_cluster,
            entry_short_offset: 0,
            dirty: AtomicBool::new(false),
        }))
    }

    fn statfs(&self) -> FsResult<StatFs> {
        let guard = self.state.read();
        let state = guard.as_ref().ok_or(FsError::Invalid)?;
        Ok(StatFs {
            total_blocks: state.fat.len() as u64,
            free_blocks: state.fsinfo.free_count as u64,
            block_size: state.cluster_size() as u32,
        })
    }
}

impl Fat32Filesystem {
    /// Flush the dirty FAT mirror to FAT#1 always, and to FAT#2 unless
    /// the boot sector's `ext_flags` bit 7 says only one FAT is active.
    fn sync(&self) -> FsResult<()> {
        let mut guard = self.state.write();
        let state = match guard.as_mut() {
            Some(s) => s,
            None => return Ok(()),
        };
        if state.fat_dirty {
            let mut raw = Vec::with_capacity(state.fat.len() * 4);
            for entry in &state.fat {
                raw.extend_from_slice(&entry.to_le_bytes());
            }
            let fat_sectors = state.fat_size_32;
            self.device
                .write_sectors(
                    self.base_lba() + state.reserved_sectors as u64,
                    fat_sectors,
                    &raw,
                )
                .map_err(|_| FsError::Io)?;

            let single_fat = state.ext_flags & 0x80 != 0;
            if !single_fat && state.num_fats > 1 {
                let fat2_start =
                    self.base_lba() + state.reserved_sectors as u64 + fat_sectors as u64;
                self.device
                    .write_sectors(fat2_start, fat_sectors, &raw)
                    .map_err(|_| FsError::Io)?;
            }
            state.fat_dirty = false;
        }
        if state.fsinfo_dirty {
            let mut raw = vec![0u8; 512];
            state.fsinfo.serialize_into(&mut raw);
            self.write_sector(state.fs_info_sector as u64, &raw)?;
            state.fsinfo_dirty = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aos_block::RamDisk;

    const SPC: u8 = 1;
    const RESERVED: u16 = 2;
    const NUM_FATS: u8 = 1;
    const FAT_SIZE: u32 = 1;

    fn format(total_sectors: u64) -> Arc<Fat32Filesystem> {
        let disk = Arc::new(RamDisk::new(total_sectors));
        let mut boot = vec![0u8; 512];
        boot[11..13].copy_from_slice(&512u16.to_le_bytes());
        boot[13] = SPC;
        boot[14..16].copy_from_slice(&RESERVED.to_le_bytes());
        boot[16] = NUM_FATS;
        boot[36..40].copy_from_slice(&FAT_SIZE.to_le_bytes());
        boot[44..48].copy_from_slice(&2u32.to_le_bytes());
        boot[48..50].copy_from_slice(&1u16.to_le_bytes());
        boot[82..90].copy_from_slice(b"FAT32   ");
        disk.write_sectors(0, 1, &boot).unwrap();

        let mut fsinfo = vec![0u8; 512];
        fsinfo[0..4].copy_from_slice(&0x4161_5252u32.to_le_bytes());
        fsinfo[484..488].copy_from_slice(&0x6141_7272u32.to_le_bytes());
        fsinfo[492..496].copy_from_slice(&2u32.to_le_bytes());
        disk.write_sectors(1, 1, &fsinfo).unwrap();

        let fs = Fat32Filesystem::new(disk);
        fs.mount("").unwrap();
        // Root cluster 2 marked end-of-chain.
        {
            let mut guard = fs.state.write();
            let state = guard.as_mut().unwrap();
            state.set_next(2, FAT32_EOC).unwrap();
        }
        fs
    }

    #[test]
    fn mount_rejects_bad_magic() {
        let disk = Arc::new(RamDisk::new(64));
        let fs = Fat32Filesystem::new(disk);
        assert_eq!(fs.mount(""), Err(FsError::Invalid));
    }

    #[test]
    fn cluster_to_sector_matches_formula() {
        let fs = format(64);
        let guard = fs.state.read();
        let state = guard.as_ref().unwrap();
        // data_start = reserved(2) + num_fats(1)*fat_size(1) = 3
        assert_eq!(state.cluster_to_sector(2), 3);
        assert_eq!(state.cluster_to_sector(3), 4);
    }

    #[test]
    fn create_write_read_round_trips() {
        let fs = format(64);
        let root = fs.get_root().unwrap();
        let file = root.create("hello.txt").unwrap();
        let written = file.write(0, b"hi there").unwrap();
        assert_eq!(written, 8);
        let mut buf = [0u8; 8];
        let read = file.read(0, &mut buf).unwrap();
        assert_eq!(read, 8);
        assert_eq!(&buf, b"hi there");
    }

    #[test]
    fn duplicate_create_is_rejected() {
        let fs = format(64);
        let root = fs.get_root().unwrap();
        root.create("dup.txt").unwrap();
        assert_eq!(root.create("dup.txt"), Err(FsError::Exists));
    }

    #[test]
    fn mkdir_then_finddir_round_trips() {
        let fs = format(64);
        let root = fs.get_root().unwrap();
        root.mkdir("sub").unwrap();
        let found = root.finddir("SUB").unwrap();
        assert_eq!(found.file_type(), FileType::Directory);
    }

    #[test]
    fn rmdir_rejects_nonempty_directory() {
        let fs = format(64);
        let root = fs.get_root().unwrap();
        let sub = root.mkdir("sub").unwrap();
        sub.create("file.txt").unwrap();
        assert_eq!(root.rmdir("sub"), Err(FsError::NotEmpty));
    }

    #[test]
    fn unlink_frees_cluster_chain() {
        let fs = format(64);
        let root = fs.get_root().unwrap();
        let file = root.create("gone.txt").unwrap();
        file.write(0, &[0xAB; 600]).unwrap();
        root.unlink("gone.txt").unwrap();
        assert_eq!(root.finddir("gone.txt"), Err(FsError::NotFound));
    }

    #[test]
    fn long_filename_round_trips_through_lfn_entries() {
        let fs = format(64);
        let root = fs.get_root().unwrap();
        let long = "a-rather-long-file-name.txt";
        root.create(long).unwrap();
        let found = root.finddir(long).unwrap();
        assert_eq!(found.name(), long);
    }
}
