//! VFS dispatcher
//!
//! Path normalization and resolution, plus the per-process operation set
//! (`open`/`read`/`write`/`lseek`/`readdir`/`mkdir`/`rmdir`/`unlink`/
//! `stat`/`chdir`) that the syscall layer calls directly. Everything here
//! works in terms of [`vfs::VNode`] trait objects handed out by
//! [`mount::resolve_mount`] — it never knows which backend it is talking
//! to.

use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;

use aos_lib::error::{FsError, FsResult};

use crate::fd::{FdTable, OpenFile};
use crate::mount;
use crate::vfs::{Access, FileAttr, FileType, OpenFlags, VNode, Whence};

/// Longest path the dispatcher will normalize or resolve.
pub const MAX_PATH_LEN: usize = 512;
/// Deepest path that can survive normalization.
pub const MAX_COMPONENTS: usize = 64;

/// Join `path` onto `cwd` when relative, then collapse `.`/`..`/empty
/// components. Rejects paths longer than [`MAX_PATH_LEN`] or with more
/// than [`MAX_COMPONENTS`] components after collapsing.
pub fn normalize_path(cwd: &str, path: &str) -> FsResult<String> {
    if path.len() > MAX_PATH_LEN || cwd.len() > MAX_PATH_LEN {
        return Err(FsError::Invalid);
    }
    let mut combined = String::new();
    if path.starts_with('/') {
        combined.push_str(path);
    } else {
        combined.push_str(cwd);
        if !cwd.ends_with('/') {
            combined.push('/');
        }
        combined.push_str(path);
    }
    if combined.len() > MAX_PATH_LEN {
        return Err(FsError::Invalid);
    }

    let mut stack: Vec<&str> = Vec::new();
    for component in combined.split('/') {
        match component {
            "" | "." => continue,
            ".." => {
                stack.pop();
            }
            other => stack.push(other),
        }
    }
    if stack.len() > MAX_COMPONENTS {
        return Err(FsError::Invalid);
    }

    let mut result = String::from("/");
    result.push_str(&stack.join("/"));
    Ok(result)
}

/// Resolve an already-normalized absolute path to its vnode, walking the
/// deepest mount whose prefix matches and then descending component by
/// component from there.
pub fn resolve(path: &str) -> FsResult<Arc<dyn VNode>> {
    let (mut vnode, prefix_len) = mount::resolve_mount(path).ok_or(FsError::NotFound)?;
    let remainder = &path[prefix_len.min(path.len())..];
    for component in remainder.split('/').filter(|c| !c.is_empty()) {
        vnode = vnode.finddir(component)?;
    }
    Ok(vnode)
}

fn split_parent(path: &str) -> FsResult<(String, String)> {
    if path == "/" {
        return Err(FsError::Invalid);
    }
    let idx = path.rfind('/').ok_or(FsError::Invalid)?;
    let parent = if idx == 0 {
        "/".to_string()
    } else {
        path[..idx].to_string()
    };
    let leaf = path[idx + 1..].to_string();
    if leaf.is_empty() {
        return Err(FsError::Invalid);
    }
    Ok((parent, leaf))
}

/// Per-process view over the VFS: a file descriptor table, a working
/// directory, and the identity access checks are evaluated against.
pub struct ProcessFiles {
    pub fds: FdTable,
    pub cwd_path: String,
    pub cwd_vnode: Arc<dyn VNode>,
    pub owner_id: u32,
}

impl ProcessFiles {
    pub fn new(owner_id: u32) -> FsResult<Self> {
        let root = mount::root().ok_or(FsError::NotFound)?;
        Ok(Self {
            fds: FdTable::new(),
            cwd_path: "/".to_string(),
            cwd_vnode: root,
            owner_id,
        })
    }

    fn require(&self, vnode: &Arc<dyn VNode>, access: Access) -> FsResult<()> {
        if vnode.access().permits(self.owner_id, access) {
            Ok(())
        } else {
            Err(FsError::Perm)
        }
    }

    pub fn open(&mut self, path: &str, flags: OpenFlags) -> FsResult<i32> {
        let full = normalize_path(&self.cwd_path, path)?;
        let vnode = match resolve(&full) {
            Ok(v) => v,
            Err(FsError::NotFound) if flags.create => {
                let (parent_path, leaf) = split_parent(&full)?;
                let parent = resolve(&parent_path)?;
                self.require(&parent, Access::Modify)?;
                parent.create(&leaf)?
            }
            Err(e) => return Err(e),
        };

        if flags.directory && vnode.file_type() != FileType::Directory {
            return Err(FsError::NotDir);
        }
        if vnode.file_type() == FileType::Directory && flags.write {
            return Err(FsError::IsDir);
        }

        let needed = if flags.write {
            Access::Modify
        } else {
            Access::View
        };
        self.require(&vnode, needed)?;

        self.fds.allocate(OpenFile {
            vnode,
            offset: 0,
            flags,
        })
    }

    pub fn close(&mut self, fd: i32) -> FsResult<()> {
        self.fds.close(fd)
    }

    pub fn read(&mut self, fd: i32, buf: &mut [u8]) -> FsResult<usize> {
        let file = self.fds.get_mut(fd)?;
        if file.vnode.file_type() == FileType::Directory {
            return Err(FsError::IsDir);
        }
        let n = file.vnode.read(file.offset, buf)?;
        file.offset += n as u64;
        Ok(n)
    }

    pub fn write(&mut self, fd: i32, buf: &[u8]) -> FsResult<usize> {
        let file = self.fds.get_mut(fd)?;
        if file.vnode.file_type() == FileType::Directory {
            return Err(FsError::IsDir);
        }
        let n = file.vnode.write(file.offset, buf)?;
        file.offset += n as u64;
        Ok(n)
    }

    pub fn lseek(&mut self, fd: i32, offset: i64, whence: Whence) -> FsResult<u64> {
        let file = self.fds.get_mut(fd)?;
        let base: i64 = match whence {
            Whence::Set => 0,
            Whence::Cur => file.offset as i64,
            Whence::End => file.vnode.size() as i64,
        };
        let new_offset = base.checked_add(offset).ok_or(FsError::Invalid)?;
        if new_offset < 0 {
            return Err(FsError::Invalid);
        }
        file.offset = new_offset as u64;
        Ok(file.offset)
    }

    pub fn readdir(&self, fd: i32, index: usize) -> FsResult<crate::vfs::DirEntry> {
        let file = self.fds.get(fd)?;
        if file.vnode.file_type() != FileType::Directory {
            return Err(FsError::NotDir);
        }
        file.vnode.readdir(index)
    }

    pub fn mkdir(&mut self, path: &str) -> FsResult<()> {
        let full = normalize_path(&self.cwd_path, path)?;
        let (parent_path, leaf) = split_parent(&full)?;
        let parent = resolve(&parent_path)?;
        self.require(&parent, Access::Modify)?;
        parent.mkdir(&leaf)?;
        Ok(())
    }

    pub fn rmdir(&mut self, path: &str) -> FsResult<()> {
        let full = normalize_path(&self.cwd_path, path)?;
        if full == "/" {
            return Err(FsError::Perm);
        }
        let (parent_path, leaf) = split_parent(&full)?;
        let parent = resolve(&parent_path)?;
        self.require(&parent, Access::Modify)?;
        parent.rmdir(&leaf)?;
        Ok(())
    }

    pub fn unlink(&mut self, path: &str) -> FsResult<()> {
        let full = normalize_path(&self.cwd_path, path)?;
        let (parent_path, leaf) = split_parent(&full)?;
        let parent = resolve(&parent_path)?;
        let target = parent.finddir(&leaf)?;
        let via_parent = parent.access().permits(self.owner_id, Access::Modify);
        let via_own_delete = target.access().permits(self.owner_id, Access::Delete);
        if !via_parent && !via_own_delete {
            return Err(FsError::Perm);
        }
        parent.unlink(&leaf)?;
        Ok(())
    }

    pub fn stat(&self, path: &str) -> FsResult<FileAttr> {
        let full = normalize_path(&self.cwd_path, path)?;
        resolve(&full)?.stat()
    }

    pub fn chdir(&mut self, path: &str) -> FsResult<()> {
        let full = normalize_path(&self.cwd_path, path)?;
        let vnode = resolve(&full)?;
        if vnode.file_type() != FileType::Directory {
            return Err(FsError::NotDir);
        }
        self.cwd_vnode = vnode;
        self.cwd_path = full;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_dot_and_collapses_dotdot() {
        assert_eq!(normalize_path("/a/b", "../c").unwrap(), "/a/c");
        assert_eq!(normalize_path("/", "./x/./y").unwrap(), "/x/y");
    }

    #[test]
    fn normalize_rejects_oversize_path() {
        let long = "a".repeat(MAX_PATH_LEN + 1);
        assert_eq!(normalize_path("/", &long), Err(FsError::Invalid));
    }

    #[test]
    fn normalize_rejects_too_many_components() {
        let mut path = String::new();
        for i in 0..MAX_COMPONENTS + 1 {
            path.push('/');
            path.push_str(&i.to_string());
        }
        assert_eq!(normalize_path("/", &path), Err(FsError::Invalid));
    }

    #[test]
    fn dotdot_above_root_is_absorbed() {
        assert_eq!(normalize_path("/", "../../x").unwrap(), "/x");
    }
}
