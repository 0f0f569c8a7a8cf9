//! Ramfs — bounded in-memory filesystem backend
//!
//! A fixed-capacity pool of file records, no dynamic allocation beyond
//! each file's own growable data buffer (itself capped). Mounting resets
//! the pool rather than reading anything from storage.

use alloc::string::{String, ToString};
use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;

use spin::RwLock;

use aos_lib::error::{FsError, FsResult};

use crate::vfs::{AccessRecord, DirEntry, FileType, Filesystem, StatFs, VNode};

/// Upper bound on live file/directory records.
pub const MAX_NODES: usize = 128;
/// Growth unit: writes extend a file's buffer in 4KiB steps.
const GROWTH_UNIT: usize = 4096;
/// Hard per-file size cap.
pub const MAX_FILE_SIZE: usize = 1 << 20;

struct Node {
    name: String,
    file_type: FileType,
    data: Vec<u8>,
    parent: usize,
    children: Vec<usize>,
    access: AccessRecord,
}

struct Pool {
    nodes: [Option<Node>; MAX_NODES],
}

impl Pool {
    fn reset(&mut self) {
        for slot in self.nodes.iter_mut() {
            *slot = None;
        }
        self.nodes[0] = Some(Node {
            name: String::new(),
            file_type: FileType::Directory,
            data: Vec::new(),
            parent: 0,
            children: Vec::new(),
            access: AccessRecord::owned_by(0),
        });
    }

    fn alloc(&mut self, node: Node) -> FsResult<usize> {
        let slot = self
            .nodes
            .iter()
            .position(|n| n.is_none())
            .ok_or(FsError::NoSpace)?;
        self.nodes[slot] = Some(node);
        Ok(slot)
    }

    fn get(&self, ino: usize) -> FsResult<&Node> {
        self.nodes.get(ino).and_then(|n| n.as_ref()).ok_or(FsError::NotFound)
    }

    fn get_mut(&mut self, ino: usize) -> FsResult<&mut Node> {
        self.nodes
            .get_mut(ino)
            .and_then(|n| n.as_mut())
            .ok_or(FsError::NotFound)
    }

    fn find_child(&self, parent: usize, name: &str) -> FsResult<usize> {
        let node = self.get(parent)?;
        node.children
            .iter()
            .copied()
            .find(|&c| {
                self.nodes[c]
                    .as_ref()
                    .map(|n| aos_lib::string::eq_ignore_ascii(&n.name, name))
                    .unwrap_or(false)
            })
            .ok_or(FsError::NotFound)
    }
}

/// The ramfs backend. `ino` 0 is always the root directory.
pub struct RamFs {
    pool: RwLock<Pool>,
    self_weak: Weak<RamFs>,
}

impl RamFs {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|weak| {
            let mut pool = Pool {
                nodes: [const { None }; MAX_NODES],
            };
            pool.reset();
            Self {
                pool: RwLock::new(pool),
                self_weak: weak.clone(),
            }
        })
    }

    fn self_arc(&self) -> Arc<RamFs> {
        self.self_weak.upgrade().expect("RamFs outlives its own Arc")
    }

    fn vnode(&self, ino: usize) -> Arc<dyn VNode> {
        Arc::new(RamVNode {
            fs: self.self_arc(),
            ino,
        })
    }
}

impl Filesystem for RamFs {
    fn name(&self) -> &'static str {
        "ramfs"
    }

    fn mount(&self, _source: &str) -> FsResult<()> {
        self.pool.write().reset();
        Ok(())
    }

    fn unmount(&self) -> FsResult<()> {
        self.pool.write().reset();
        Ok(())
    }

    fn get_root(&self) -> FsResult<Arc<dyn VNode>> {
        Ok(self.vnode(0))
    }

    fn statfs(&self) -> FsResult<StatFs> {
        let pool = self.pool.read();
        let used = pool.nodes.iter().flatten().count();
        Ok(StatFs {
            total_blocks: MAX_NODES as u64,
            free_blocks: (MAX_NODES - used) as u64,
            block_size: GROWTH_UNIT as u32,
        })
    }
}

/// A live ramfs file or directory: an index into the backend's pool.
pub struct RamVNode {
    fs: Arc<RamFs>,
    ino: usize,
}

impl core::fmt::Debug for RamVNode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RamVNode").field("ino", &self.ino).finish()
    }
}

impl VNode for RamVNode {
    fn name(&self) -> String {
        self.fs
            .pool
            .read()
            .get(self.ino)
            .map(|n| n.name.clone())
            .unwrap_or_default()
    }

    fn inode(&self) -> u64 {
        self.ino as u64
    }

    fn file_type(&self) -> FileType {
        self.fs
            .pool
            .read()
            .get(self.ino)
            .map(|n| n.file_type)
            .unwrap_or(FileType::File)
    }

    fn size(&self) -> u64 {
        self.fs
            .pool
            .read()
            .get(self.ino)
            .map(|n| n.data.len() as u64)
            .unwrap_or(0)
    }

    fn access(&self) -> AccessRecord {
        self.fs
            .pool
            .read()
            .get(self.ino)
            .map(|n| n.access)
            .unwrap_or(AccessRecord::owned_by(0))
    }

    fn read(&self, offset: u64, buf: &mut [u8]) -> FsResult<usize> {
        let pool = self.fs.pool.read();
        let node = pool.get(self.ino)?;
        if node.file_type != FileType::File {
            return Err(FsError::IsDir);
        }
        let offset = offset as usize;
        if offset >= node.data.len() {
            return Ok(0);
        }
        let n = buf.len().min(node.data.len() - offset);
        buf[..n].copy_from_slice(&node.data[offset..offset + n]);
        Ok(n)
    }

    fn write(&self, offset: u64, buf: &[u8]) -> FsResult<usize> {
        let mut pool = self.fs.pool.write();
        let node = pool.get_mut(self.ino)?;
        if node.file_type != FileType::File {
            return Err(FsError::IsDir);
        }
        let offset = offset as usize;
        let end = offset + buf.len();
        if end > MAX_FILE_SIZE {
            return Err(FsError::NoSpace);
        }
        if end > node.data.len() {
            let grown = end.div_ceil(GROWTH_UNIT) * GROWTH_UNIT;
            node.data.resize(grown.min(MAX_FILE_SIZE).max(end), 0);
        }
        node.data[offset..end].copy_from_slice(buf);
        Ok(buf.len())
    }

    fn finddir(&self, name: &str) -> FsResult<Arc<dyn VNode>> {
        let pool = self.fs.pool.read();
        let ino = pool.find_child(self.ino, name)?;
        Ok(self.fs.vnode(ino))
    }

    fn readdir(&self, index: usize) -> FsResult<DirEntry> {
        let pool = self.fs.pool.read();
        let node = pool.get(self.ino)?;
        if node.file_type != FileType::Directory {
            return Err(FsError::NotDir);
        }
        let child_ino = *node.children.get(index).ok_or(FsError::NotFound)?;
        let child = pool.get(child_ino)?;
        Ok(DirEntry {
            name: child.name.clone(),
            inode: child_ino as u64,
            file_type: child.file_type,
        })
    }

    fn create(&self, name: &str) -> FsResult<Arc<dyn VNode>> {
        let mut pool = self.fs.pool.write();
        {
            let node = pool.get(self.ino)?;
            if node.file_type != FileType::Directory {
                return Err(FsError::NotDir);
            }
        }
        if pool.find_child(self.ino, name).is_ok() {
            return Err(FsError::Exists);
        }
        let new_ino = pool.alloc(Node {
            name: name.to_string(),
            file_type: FileType::File,
            data: Vec::new(),
            parent: self.ino,
            children: Vec::new(),
            access: AccessRecord::owned_by(0),
        })?;
        pool.get_mut(self.ino)?.children.push(new_ino);
        Ok(self.fs.vnode(new_ino))
    }

    fn mkdir(&self, name: &str) -> FsResult<Arc<dyn VNode>> {
        let mut pool = self.fs.pool.write();
        {
            let node = pool.get(self.ino)?;
            if node.file_type != FileType::Directory {
                return Err(FsError::NotDir);
            }
        }
        if pool.find_child(self.ino, name).is_ok() {
            return Err(FsError::Exists);
        }
        let new_ino = pool.alloc(Node {
            name: name.to_string(),
            file_type: FileType::Directory,
            data: Vec::new(),
            parent: self.ino,
            children: Vec::new(),
            access: AccessRecord::owned_by(0),
        })?;
        pool.get_mut(self.ino)?.children.push(new_ino);
        Ok(self.fs.vnode(new_ino))
    }

    fn unlink(&self, name: &str) -> FsResult<()> {
        let mut pool = self.fs.pool.write();
        let child_ino = pool.find_child(self.ino, name)?;
        if pool.get(child_ino)?.file_type == FileType::Directory {
            return Err(FsError::IsDir);
        }
        pool.get_mut(self.ino)?.children.retain(|&c| c != child_ino);
        pool.nodes[child_ino] = None;
        Ok(())
    }

    fn rmdir(&self, name: &str) -> FsResult<()> {
        let mut pool = self.fs.pool.write();
        let child_ino = pool.find_child(self.ino, name)?;
        let child = pool.get(child_ino)?;
        if child.file_type != FileType::Directory {
            return Err(FsError::NotDir);
        }
        if !child.children.is_empty() {
            return Err(FsError::NotEmpty);
        }
        pool.get_mut(self.ino)?.children.retain(|&c| c != child_ino);
        pool.nodes[child_ino] = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_write_read_round_trips() {
        let fs = RamFs::new();
        fs.mount("").unwrap();
        let root = fs.get_root().unwrap();
        let file = root.create("note.txt").unwrap();
        file.write(0, b"hello").unwrap();
        let mut buf = [0u8; 5];
        file.read(0, &mut buf).unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn write_grows_in_4kib_steps() {
        let fs = RamFs::new();
        fs.mount("").unwrap();
        let root = fs.get_root().unwrap();
        let file = root.create("big.bin").unwrap();
        file.write(0, &[1u8]).unwrap();
        assert_eq!(file.size(), GROWTH_UNIT as u64);
    }

    #[test]
    fn write_past_cap_is_rejected() {
        let fs = RamFs::new();
        fs.mount("").unwrap();
        let root = fs.get_root().unwrap();
        let file = root.create("huge.bin").unwrap();
        assert_eq!(
            file.write(MAX_FILE_SIZE as u64, &[1u8]),
            Err(FsError::NoSpace)
        );
    }

    #[test]
    fn rmdir_rejects_nonempty() {
        let fs = RamFs::new();
        fs.mount("").unwrap();
        let root = fs.get_root().unwrap();
        let sub = root.mkdir("sub").unwrap();
        sub.create("f").unwrap();
        assert_eq!(root.rmdir("sub"), Err(FsError::NotEmpty));
    }

    #[test]
    fn unlink_on_directory_is_rejected() {
        let fs = RamFs::new();
        fs.mount("").unwrap();
        let root = fs.get_root().unwrap();
        root.mkdir("sub").unwrap();
        assert_eq!(root.unlink("sub"), Err(FsError::IsDir));
    }

    #[test]
    fn mount_resets_pool() {
        let fs = RamFs::new();
        fs.mount("").unwrap();
        let root = fs.get_root().unwrap();
        root.create("f").unwrap();
        fs.mount("").unwrap();
        assert_eq!(root.finddir("f"), Err(FsError::NotFound));
    }
}
