//! Per-process file descriptor table
//!
//! A fixed-size array of open-file records; `open` hands back the lowest
//! unused index, matching the allocation discipline every Unix-shaped
//! syscall interface assumes.

use alloc::sync::Arc;

use aos_lib::error::{FsError, FsResult};

use crate::vfs::{OpenFlags, VNode};

/// Maximum simultaneously open files per process.
pub const MAX_FDS: usize = 256;

/// One open-file record: the resolved vnode, the flags it was opened
/// with, and the cursor `read`/`write`/`lseek` advance.
pub struct OpenFile {
    pub vnode: Arc<dyn VNode>,
    pub offset: u64,
    pub flags: OpenFlags,
}

pub struct FdTable {
    files: [Option<OpenFile>; MAX_FDS],
}

impl FdTable {
    pub const fn new() -> Self {
        Self {
            files: [const { None }; MAX_FDS],
        }
    }

    /// Install `file` at the lowest free index.
    pub fn allocate(&mut self, file: OpenFile) -> FsResult<i32> {
        let slot = self
            .files
            .iter()
            .position(|f| f.is_none())
            .ok_or(FsError::NoSpace)?;
        self.files[slot] = Some(file);
        Ok(slot as i32)
    }

    pub fn get(&self, fd: i32) -> FsResult<&OpenFile> {
        usize::try_from(fd)
            .ok()
            .and_then(|i| self.files.get(i))
            .and_then(|f| f.as_ref())
            .ok_or(FsError::Invalid)
    }

    pub fn get_mut(&mut self, fd: i32) -> FsResult<&mut OpenFile> {
        usize::try_from(fd)
            .ok()
            .and_then(|i| self.files.get_mut(i))
            .and_then(|f| f.as_mut())
            .ok_or(FsError::Invalid)
    }

    pub fn close(&mut self, fd: i32) -> FsResult<()> {
        let slot = usize::try_from(fd)
            .ok()
            .and_then(|i| self.files.get_mut(i))
            .ok_or(FsError::Invalid)?;
        let file = slot.take().ok_or(FsError::Invalid)?;
        file.vnode.close()
    }
}

impl Default for FdTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::{AccessRecord, DirEntry, FileType};

    #[derive(Debug)]
    struct NullVNode;
    impl VNode for NullVNode {
        fn name(&self) -> alloc::string::String {
            alloc::string::String::new()
        }
        fn inode(&self) -> u64 {
            0
        }
        fn file_type(&self) -> FileType {
            FileType::File
        }
        fn size(&self) -> u64 {
            0
        }
        fn access(&self) -> AccessRecord {
            AccessRecord::owned_by(0)
        }
        fn read(&self, _offset: u64, _buf: &mut [u8]) -> FsResult<usize> {
            Ok(0)
        }
        fn write(&self, _offset: u64, _buf: &[u8]) -> FsResult<usize> {
            Ok(0)
        }
        fn finddir(&self, _name: &str) -> FsResult<Arc<dyn VNode>> {
            Err(FsError::NotFound)
        }
        fn readdir(&self, _index: usize) -> FsResult<DirEntry> {
            Err(FsError::NotFound)
        }
        fn create(&self, _name: &str) -> FsResult<Arc<dyn VNode>> {
            Err(FsError::Perm)
        }
        fn mkdir(&self, _name: &str) -> FsResult<Arc<dyn VNode>> {
            Err(FsError::Perm)
        }
        fn unlink(&self, _name: &str) -> FsResult<()> {
            Err(FsError::Perm)
        }
        fn rmdir(&self, _name: &str) -> FsResult<()> {
            Err(FsError::Perm)
        }
    }

    fn open_file() -> OpenFile {
        OpenFile {
            vnode: Arc::new(NullVNode),
            offset: 0,
            flags: OpenFlags::default(),
        }
    }

    #[test]
    fn allocate_picks_lowest_free_index() {
        let mut table = FdTable::new();
        assert_eq!(table.allocate(open_file()).unwrap(), 0);
        assert_eq!(table.allocate(open_file()).unwrap(), 1);
        table.close(0).unwrap();
        assert_eq!(table.allocate(open_file()).unwrap(), 0);
    }

    #[test]
    fn get_on_closed_fd_fails() {
        let mut table = FdTable::new();
        let fd = table.allocate(open_file()).unwrap();
        table.close(fd).unwrap();
        assert_eq!(table.get(fd).err(), Some(FsError::Invalid));
    }

    #[test]
    fn table_reports_full_once_exhausted() {
        let mut table = FdTable::new();
        for _ in 0..MAX_FDS {
            table.allocate(open_file()).unwrap();
        }
        assert_eq!(table.allocate(open_file()).err(), Some(FsError::NoSpace));
    }
}
