//! Filesystem registry and mount table
//!
//! Two bounded tables: a registry mapping a backend name to a constructed
//! [`Filesystem`], and a mount table mapping a path prefix to whichever
//! backend currently serves it. Both are fixed-capacity — a kernel doesn't
//! get to mount filesystems without bound any more than it opens files
//! without bound.

use alloc::string::{String, ToString};
use alloc::sync::Arc;

use spin::RwLock;

use aos_lib::error::{FsError, FsResult};

use crate::vfs::{Filesystem, VNode};

/// Maximum number of backends that can be registered at once.
pub const MAX_REGISTRATIONS: usize = 8;
/// Maximum number of simultaneous mounts.
pub const MAX_MOUNTS: usize = 8;

struct Registration {
    name: &'static str,
    backend: Arc<dyn Filesystem>,
}

struct Mount {
    path: String,
    filesystem: Arc<dyn Filesystem>,
    root: Arc<dyn VNode>,
}

struct Tables {
    registry: [Option<Registration>; MAX_REGISTRATIONS],
    mounts: [Option<Mount>; MAX_MOUNTS],
    root: Option<Arc<dyn VNode>>,
}

impl Tables {
    const fn new() -> Self {
        Self {
            registry: [const { None }; MAX_REGISTRATIONS],
            mounts: [const { None }; MAX_MOUNTS],
            root: None,
        }
    }
}

static TABLES: RwLock<Tables> = RwLock::new(Tables::new());

/// Register a backend under `name`. Fails if the name is already taken or
/// the registration table is full.
pub fn register(name: &'static str, backend: Arc<dyn Filesystem>) -> FsResult<()> {
    let mut tables = TABLES.write();
    if tables.registry.iter().flatten().any(|r| r.name == name) {
        return Err(FsError::Exists);
    }
    let slot = tables
        .registry
        .iter_mut()
        .find(|r| r.is_none())
        .ok_or(FsError::NoSpace)?;
    *slot = Some(Registration { name, backend });
    Ok(())
}

fn find_backend(tables: &Tables, name: &str) -> FsResult<Arc<dyn Filesystem>> {
    tables
        .registry
        .iter()
        .flatten()
        .find(|r| r.name == name)
        .map(|r| r.backend.clone())
        .ok_or(FsError::NotFound)
}

/// Mount the backend registered as `fstype` at `target`, handing it
/// `source` to locate its backing storage (a device descriptor for FAT32,
/// ignored by ramfs). When `target` is `/`, the mounted root also becomes
/// the global root and the initial working directory.
pub fn mount(fstype: &str, source: &str, target: &str) -> FsResult<Arc<dyn VNode>> {
    let mut tables = TABLES.write();
    let backend = find_backend(&tables, fstype)?;

    if tables.mounts.iter().flatten().any(|m| m.path == target) {
        return Err(FsError::Exists);
    }
    let slot = tables
        .mounts
        .iter_mut()
        .find(|m| m.is_none())
        .ok_or(FsError::NoSpace)?;

    backend.mount(source)?;
    let root = backend.get_root()?;

    *slot = Some(Mount {
        path: target.to_string(),
        filesystem: backend,
        root: root.clone(),
    });

    if target == "/" {
        tables.root = Some(root.clone());
    }

    Ok(root)
}

/// Tear down whichever mount owns `target` exactly.
pub fn unmount(target: &str) -> FsResult<()> {
    let mut tables = TABLES.write();
    let index = tables
        .mounts
        .iter()
        .position(|m| matches!(m, Some(m) if m.path == target))
        .ok_or(FsError::NotFound)?;
    if let Some(mount) = tables.mounts[index].take() {
        mount.filesystem.unmount()?;
        if target == "/" {
            tables.root = None;
        }
    }
    Ok(())
}

/// Resolve a path to whichever mount's prefix matches longest, returning
/// the matched mount's root vnode and the prefix length consumed.
pub fn resolve_mount(path: &str) -> Option<(Arc<dyn VNode>, usize)> {
    let tables = TABLES.read();
    let mut best: Option<(Arc<dyn VNode>, usize)> = None;
    for mount in tables.mounts.iter().flatten() {
        if path.starts_with(mount.path.as_str()) {
            let len = mount.path.len();
            if best.as_ref().map(|(_, l)| len > *l).unwrap_or(true) {
                best = Some((mount.root.clone(), len));
            }
        }
    }
    best
}

/// The global root vnode, once a filesystem has been mounted at `/`.
pub fn root() -> Option<Arc<dyn VNode>> {
    TABLES.read().root.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::{AccessRecord, DirEntry, FileType, StatFs};
    use alloc::string::ToString;

    struct StubFs;
    #[derive(Debug)]
    struct StubVNode;

    impl VNode for StubVNode {
        fn name(&self) -> String {
            "/".to_string()
        }
        fn inode(&self) -> u64 {
            1
        }
        fn file_type(&self) -> FileType {
            FileType::Directory
        }
        fn size(&self) -> u64 {
            0
        }
        fn access(&self) -> AccessRecord {
            AccessRecord::owned_by(0)
        }
        fn read(&self, _offset: u64, _buf: &mut [u8]) -> FsResult<usize> {
            Err(FsError::IsDir)
        }
        fn write(&self, _offset: u64, _buf: &[u8]) -> FsResult<usize> {
            Err(FsError::IsDir)
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

    impl Filesystem for StubFs {
        fn name(&self) -> &'static str {
            "stub"
        }
        fn mount(&self, _source: &str) -> FsResult<()> {
            Ok(())
        }
        fn unmount(&self) -> FsResult<()> {
            Ok(())
        }
        fn get_root(&self) -> FsResult<Arc<dyn VNode>> {
            Ok(Arc::new(StubVNode))
        }
        fn statfs(&self) -> FsResult<StatFs> {
            Ok(StatFs::default())
        }
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let _ = register("stub-dup-test", Arc::new(StubFs));
        assert_eq!(
            register("stub-dup-test", Arc::new(StubFs)),
            Err(FsError::Exists)
        );
    }

    #[test]
    fn mounting_root_adopts_global_root() {
        register("stub-root-test", Arc::new(StubFs)).ok();
        let root = mount("stub-root-test", "", "/stub-root-test-target").unwrap();
        assert_eq!(root.inode(), 1);
        let (found, len) = resolve_mount("/stub-root-test-target/child").unwrap();
        assert_eq!(len, "/stub-root-test-target".len());
        assert_eq!(found.inode(), 1);
    }

    #[test]
    fn mounting_same_target_twice_fails() {
        register("stub-dbl-test", Arc::new(StubFs)).ok();
        mount("stub-dbl-test", "", "/stub-dbl-target").unwrap();
        assert_eq!(
            mount("stub-dbl-test", "", "/stub-dbl-target"),
            Err(FsError::Exists)
        );
    }
}
