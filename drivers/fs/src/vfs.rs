//! Core VFS types: vnodes, filesystems, access control
//!
//! A backend implements [`VNode`] and [`Filesystem`]; everything above this
//! module (the dispatcher, the per-process file descriptor table) only ever
//! talks to a backend through these two trait objects.

use alloc::string::String;
use alloc::sync::Arc;

use aos_lib::error::{FsError, FsResult};

/// What kind of object a vnode names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    File,
    Directory,
    Device,
    Symlink,
}

/// `open()` flags a caller can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenFlags {
    pub create: bool,
    pub write: bool,
    pub append: bool,
    pub truncate: bool,
    pub directory: bool,
}

impl OpenFlags {
    pub const fn read_only() -> Self {
        Self {
            create: false,
            write: false,
            append: false,
            truncate: false,
            directory: false,
        }
    }
}

/// Whence argument for `lseek`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Set,
    Cur,
    End,
}

/// The owner classes an [`AccessRecord`] can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerClass {
    System,
    Root,
    Admin,
    Programs,
    User,
    Basic,
}

/// The permission bits a caller can be checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessBits {
    pub view: bool,
    pub modify: bool,
    pub run: bool,
    pub delete: bool,
}

impl AccessBits {
    pub const NONE: Self = Self {
        view: false,
        modify: false,
        run: false,
        delete: false,
    };

    pub const ALL: Self = Self {
        view: true,
        modify: true,
        run: true,
        delete: true,
    };
}

/// Per-vnode access control, consulted on every VFS entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessRecord {
    pub owner_id: u32,
    pub owner_class: OwnerClass,
    pub owner_bits: AccessBits,
    pub other_bits: AccessBits,
    pub system: bool,
    pub hidden: bool,
    pub locked: bool,
}

impl AccessRecord {
    /// The default record new files and directories are created with:
    /// the creating user has full access, everyone else can only view.
    pub const fn owned_by(owner_id: u32) -> Self {
        Self {
            owner_id,
            owner_class: OwnerClass::User,
            owner_bits: AccessBits::ALL,
            other_bits: AccessBits {
                view: true,
                modify: false,
                run: false,
                delete: false,
            },
            system: false,
            hidden: false,
            locked: false,
        }
    }

    /// True if `caller_id` may exercise `requested` against this record.
    pub fn permits(&self, caller_id: u32, requested: Access) -> bool {
        let bits = if caller_id == self.owner_id {
            self.owner_bits
        } else {
            self.other_bits
        };
        match requested {
            Access::View => bits.view,
            Access::Modify => bits.modify,
            Access::Run => bits.run,
            Access::Delete => bits.delete,
        }
    }
}

/// A single access right an operation can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    View,
    Modify,
    Run,
    Delete,
}

/// File attributes returned by `stat`.
#[derive(Debug, Clone)]
pub struct FileAttr {
    pub inode: u64,
    pub file_type: FileType,
    pub size: u64,
    pub access: AccessRecord,
}

/// One entry returned from `readdir`.
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: String,
    pub inode: u64,
    pub file_type: FileType,
}

/// Filesystem statistics, when a backend bothers to report them.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatFs {
    pub total_blocks: u64,
    pub free_blocks: u64,
    pub block_size: u32,
}

/// The in-memory handle for a filesystem object: the dispatcher's unit of
/// work. Backend-agnostic; `finddir`/`create`/`mkdir` hand back further
/// vnodes of the same trait, so path resolution never needs to know which
/// backend it is walking.
impl PartialEq for dyn VNode {
    fn eq(&self, other: &Self) -> bool {
        core::ptr::eq(self, other)
    }
}

pub trait VNode: Send + Sync + core::fmt::Debug {
    fn name(&self) -> String;
    fn inode(&self) -> u64;
    fn file_type(&self) -> FileType;
    fn size(&self) -> u64;
    fn access(&self) -> AccessRecord;

    fn read(&self, offset: u64, buf: &mut [u8]) -> FsResult<usize>;
    fn write(&self, offset: u64, buf: &[u8]) -> FsResult<usize>;

    /// Flush any write this vnode deferred until now. Most backends have
    /// nothing to do here; FAT32 uses it to patch the directory entry's
    /// cluster/size fields that `write` left stale.
    fn close(&self) -> FsResult<()> {
        Ok(())
    }

    /// Look up a direct child by name (case-insensitive per the spec's
    /// FAT32 and ramfs backends).
    fn finddir(&self, name: &str) -> FsResult<Arc<dyn VNode>>;

    /// Read the `index`-th directory entry; `NotFound` signals end of
    /// directory.
    fn readdir(&self, index: usize) -> FsResult<DirEntry>;

    fn create(&self, name: &str) -> FsResult<Arc<dyn VNode>>;
    fn mkdir(&self, name: &str) -> FsResult<Arc<dyn VNode>>;
    fn unlink(&self, name: &str) -> FsResult<()>;
    fn rmdir(&self, name: &str) -> FsResult<()>;

    /// Default `stat`: callers fall back to this when a backend has
    /// nothing extra to report.
    fn stat(&self) -> FsResult<FileAttr> {
        Ok(FileAttr {
            inode: self.inode(),
            file_type: self.file_type(),
            size: self.size(),
            access: self.access(),
        })
    }
}

/// One registered backend: `mount`/`unmount`/`get_root` plus a name used
/// both for registration and for the mount-source `fstype` argument.
pub trait Filesystem: Send + Sync {
    fn name(&self) -> &'static str;

    /// Prepare the backend to serve `source` (a FAT32 device descriptor,
    /// ignored by ramfs).
    fn mount(&self, source: &str) -> FsResult<()>;

    fn unmount(&self) -> FsResult<()>;

    fn get_root(&self) -> FsResult<Arc<dyn VNode>>;

    fn statfs(&self) -> FsResult<StatFs> {
        Err(FsError::Invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_gets_full_default_access() {
        let rec = AccessRecord::owned_by(7);
        assert!(rec.permits(7, Access::Modify));
        assert!(rec.permits(7, Access::Delete));
    }

    #[test]
    fn non_owner_is_view_only_by_default() {
        let rec = AccessRecord::owned_by(7);
        assert!(rec.permits(3, Access::View));
        assert!(!rec.permits(3, Access::Modify));
        assert!(!rec.permits(3, Access::Delete));
    }

    #[test]
    fn open_flags_default_to_read_only() {
        let flags = OpenFlags::default();
        assert!(!flags.write);
        assert!(!flags.create);
    }
}
