//! Kernel-wide error taxonomy
//!
//! Every fallible VFS, FAT32, ramfs, and syscall-handler operation returns
//! `Result<T, FsError>`. The variants are stable negative codes so the trap
//! demux can flatten a `Result` straight into a syscall's raw return value.

use core::fmt;

/// A kernel operation outcome, stable across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum FsError {
    /// Argument violates preconditions (null pointer, oversize length, bad fd, bad whence).
    Invalid = -1,
    /// No such path, entry, or filesystem registration.
    NotFound = -2,
    /// Target already present where absence is required.
    Exists = -3,
    /// Expected a directory, found something else.
    NotDir = -4,
    /// Expected a non-directory, found a directory.
    IsDir = -5,
    /// No free FD / mount slot / cluster / memory.
    NoSpace = -6,
    /// Underlying sector read or write failed.
    Io = -7,
    /// Access check or sandbox filter rejected the caller.
    Perm = -8,
    /// Directory unlink attempted on a non-empty directory.
    NotEmpty = -9,
}

impl FsError {
    /// The raw negative errno value a syscall trap frame carries.
    pub const fn errno(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            FsError::Invalid => "invalid argument",
            FsError::NotFound => "no such file or directory",
            FsError::Exists => "already exists",
            FsError::NotDir => "not a directory",
            FsError::IsDir => "is a directory",
            FsError::NoSpace => "no space left",
            FsError::Io => "I/O error",
            FsError::Perm => "permission denied",
            FsError::NotEmpty => "directory not empty",
        };
        write!(f, "{}", msg)
    }
}

/// Convenience alias used throughout the VFS/FAT32/ramfs stack.
pub type FsResult<T> = Result<T, FsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_values_are_negative_and_stable() {
        assert_eq!(FsError::Invalid.errno(), -1);
        assert_eq!(FsError::NotFound.errno(), -2);
        assert_eq!(FsError::Exists.errno(), -3);
        assert_eq!(FsError::NotDir.errno(), -4);
        assert_eq!(FsError::IsDir.errno(), -5);
        assert_eq!(FsError::NoSpace.errno(), -6);
        assert_eq!(FsError::Io.errno(), -7);
        assert_eq!(FsError::Perm.errno(), -8);
        assert_eq!(FsError::NotEmpty.errno(), -9);
    }

    #[test]
    fn display_is_human_readable() {
        use core::fmt::Write;
        let mut buf = heapless_buf();
        write!(buf, "{}", FsError::NotEmpty).unwrap();
        assert_eq!(buf.as_str(), "directory not empty");
    }

    /// A fixed-capacity `fmt::Write` sink so this test needs no allocator.
    struct FixedBuf {
        data: [u8; 64],
        len: usize,
    }

    impl FixedBuf {
        fn as_str(&self) -> &str {
            core::str::from_utf8(&self.data[..self.len]).unwrap()
        }
    }

    impl core::fmt::Write for FixedBuf {
        fn write_str(&mut self, s: &str) -> core::fmt::Result {
            let bytes = s.as_bytes();
            self.data[self.len..self.len + bytes.len()].copy_from_slice(bytes);
            self.len += bytes.len();
            Ok(())
        }
    }

    fn heapless_buf() -> FixedBuf {
        FixedBuf {
            data: [0; 64],
            len: 0,
        }
    }
}
