//! System call dispatch
//!
//! Defines [`aos_trap_dispatch`], the single `extern "C"` entry point the
//! architecture crate's trap stubs call for both the syscall gate (vector
//! [`SYSCALL_VECTOR`]) and the preemption timer (vector [`TIMER_VECTOR`]).
//! Everything else in this module is the six-step contract the dispatcher
//! runs before a handler ever sees an argument: preempt-disable, bounds
//! check the syscall index, consult the sandbox filter, consult the CPU
//! budget, marshal five register-sourced arguments, write the result back.

use aos_fs::vfs::{OpenFlags, Whence};
use aos_lib::error::FsError;
use aos_lib::trap::TrapFrame;

use crate::process::sched;
use crate::sandbox::SyscallFilter;

/// Vector this core's trap-demux claims as the syscall gate.
pub const SYSCALL_VECTOR: u32 = 0x80;
/// Vector the preemption timer fires on.
pub const TIMER_VECTOR: u32 = 32;

/// Milliseconds between preemption timer ticks, for [`crate::time::tick`].
const TICK_MS: u64 = 10;

/// Syscall numbers. Stable across builds; callers encode these directly
/// into the first syscall argument register.
pub mod nr {
    pub const READ: u32 = 0;
    pub const WRITE: u32 = 1;
    pub const OPEN: u32 = 2;
    pub const CLOSE: u32 = 3;
    pub const LSEEK: u32 = 4;
    pub const STAT: u32 = 5;
    pub const READDIR: u32 = 6;
    pub const MKDIR: u32 = 7;
    pub const RMDIR: u32 = 8;
    pub const UNLINK: u32 = 9;
    pub const CHDIR: u32 = 10;
    pub const GETPID: u32 = 11;
    pub const SCHED_YIELD: u32 = 12;
    pub const GETCHAR: u32 = 13;
    pub const EXIT: u32 = 14;
    /// One past the last valid syscall number.
    pub const COUNT: u32 = 15;
}

/// `open()` flag bits, packed into a single argument register.
pub mod open_flags {
    pub const CREAT: u32 = 1 << 0;
    pub const WRITE: u32 = 1 << 1;
    pub const APPEND: u32 = 1 << 2;
    pub const TRUNC: u32 = 1 << 3;
    pub const DIRECTORY: u32 = 1 << 4;
}

/// The capability class a syscall is gated on. A handful of syscalls (the
/// ones that only ever read process state) require no class at all.
fn capability_class(syscall_nr: u32) -> SyscallFilter {
    use nr::*;
    match syscall_nr {
        READ | LSEEK | STAT | READDIR | CHDIR => SyscallFilter::IO_READ,
        WRITE | MKDIR | RMDIR | UNLINK => SyscallFilter::IO_WRITE,
        OPEN => SyscallFilter::IO_READ,
        CLOSE | GETPID | SCHED_YIELD | EXIT => SyscallFilter::PROCESS,
        GETCHAR => SyscallFilter::DEVICE,
        _ => SyscallFilter::empty(),
    }
}

/// Entry point the architecture crate's trap stubs call into for both the
/// syscall gate and the preemption timer. Mutates `frame.eax` to carry a
/// syscall's return value back to the interrupted task.
#[unsafe(no_mangle)]
pub extern "C" fn aos_trap_dispatch(frame: *mut TrapFrame) {
    let frame = unsafe { &mut *frame };

    if frame.vector == TIMER_VECTOR {
        crate::time::tick(TICK_MS);
        sched::schedule();
        return;
    }

    sched::preempt_disable();
    let args = frame.syscall_args();
    let result = dispatch(frame.eax, args);
    frame.eax = result as u32;
    sched::preempt_enable();
}

/// Run the six-step dispatch contract against one syscall invocation.
fn dispatch(syscall_nr: u32, args: [u32; 5]) -> i32 {
    if syscall_nr >= nr::COUNT {
        return FsError::Invalid.errno();
    }

    let class = capability_class(syscall_nr);
    let permitted =
        sched::with_current_task_mut(|task| task.sandbox.permits(class)).unwrap_or(true);
    if !permitted {
        crate::printk::printk("syscall denied: sandbox filter\n");
        return FsError::Perm.errno();
    }

    let over_budget =
        sched::with_current_task_mut(|task| task.sandbox.over_cpu_budget()).unwrap_or(false);
    if over_budget {
        if let Some(pid) = sched::current_pid() {
            sched::with_current_task_mut(|task| task.exit(-1));
            sched::remove_task(pid);
        }
        return FsError::Perm.errno();
    }

    match syscall_nr {
        nr::READ => sys_read(args),
        nr::WRITE => sys_write(args),
        nr::OPEN => sys_open(args),
        nr::CLOSE => sys_close(args),
        nr::LSEEK => sys_lseek(args),
        nr::STAT => sys_stat(args),
        nr::READDIR => sys_readdir(args),
        nr::MKDIR => sys_path_op(args, |files, path| files.mkdir(path)),
        nr::RMDIR => sys_path_op(args, |files, path| files.rmdir(path)),
        nr::UNLINK => sys_path_op(args, |files, path| files.unlink(path)),
        nr::CHDIR => sys_path_op(args, |files, path| files.chdir(path)),
        nr::GETPID => sched::current_pid().map(|pid| pid as i32).unwrap_or(0),
        nr::SCHED_YIELD => {
            sched::yield_now();
            0
        }
        nr::GETCHAR => sys_getchar(),
        nr::EXIT => sys_exit(args),
        _ => FsError::Invalid.errno(),
    }
}

/// Build a `&'static [u8]` over a user-provided pointer/length pair,
/// rejecting a null pointer. There is no paging-backed user/kernel
/// separation in this core yet, so "validate" is limited to the null and
/// the trivially out-of-range cases the spec calls out.
fn user_slice(ptr: u32, len: u32) -> Result<&'static [u8], i32> {
    if ptr == 0 {
        return Err(FsError::Invalid.errno());
    }
    Ok(unsafe { core::slice::from_raw_parts(ptr as *const u8, len as usize) })
}

fn user_slice_mut(ptr: u32, len: u32) -> Result<&'static mut [u8], i32> {
    if ptr == 0 {
        return Err(FsError::Invalid.errno());
    }
    Ok(unsafe { core::slice::from_raw_parts_mut(ptr as *mut u8, len as usize) })
}

fn user_str(ptr: u32, len: u32) -> Result<&'static str, i32> {
    let bytes = user_slice(ptr, len)?;
    core::str::from_utf8(bytes).map_err(|_| FsError::Invalid.errno())
}

fn sys_read(args: [u32; 5]) -> i32 {
    let fd = args[0] as i32;
    let buf = match user_slice_mut(args[1], args[2]) {
        Ok(buf) => buf,
        Err(e) => return e,
    };
    match sched::with_current_task_mut(|task| task.files.read(fd, buf)) {
        Some(Ok(n)) => n as i32,
        Some(Err(e)) => e.errno(),
        None => FsError::Invalid.errno(),
    }
}

fn sys_write(args: [u32; 5]) -> i32 {
    let fd = args[0] as i32;
    let buf = match user_slice(args[1], args[2]) {
        Ok(buf) => buf,
        Err(e) => return e,
    };
    match sched::with_current_task_mut(|task| task.files.write(fd, buf)) {
        Some(Ok(n)) => n as i32,
        Some(Err(e)) => e.errno(),
        None => FsError::Invalid.errno(),
    }
}

fn sys_open(args: [u32; 5]) -> i32 {
    let path = match user_str(args[0], args[1]) {
        Ok(p) => p,
        Err(e) => return e,
    };
    let bits = args[2];
    let flags = OpenFlags {
        create: bits & open_flags::CREAT != 0,
        write: bits & open_flags::WRITE != 0,
        append: bits & open_flags::APPEND != 0,
        truncate: bits & open_flags::TRUNC != 0,
        directory: bits & open_flags::DIRECTORY != 0,
    };
    match sched::with_current_task_mut(|task| task.files.open(path, flags)) {
        Some(Ok(fd)) => fd,
        Some(Err(e)) => e.errno(),
        None => FsError::Invalid.errno(),
    }
}

fn sys_close(args: [u32; 5]) -> i32 {
    let fd = args[0] as i32;
    match sched::with_current_task_mut(|task| task.files.close(fd)) {
        Some(Ok(())) => 0,
        Some(Err(e)) => e.errno(),
        None => FsError::Invalid.errno(),
    }
}

fn sys_lseek(args: [u32; 5]) -> i32 {
    let fd = args[0] as i32;
    let offset = args[1] as i32 as i64;
    let whence = match args[2] {
        0 => Whence::Set,
        1 => Whence::Cur,
        2 => Whence::End,
        _ => return FsError::Invalid.errno(),
    };
    match sched::with_current_task_mut(|task| task.files.lseek(fd, offset, whence)) {
        Some(Ok(pos)) => pos as i32,
        Some(Err(e)) => e.errno(),
        None => FsError::Invalid.errno(),
    }
}

/// Layout a user `stat` buffer must provide room for: inode, file type tag,
/// size. Matches the fields `aos_fs::vfs::FileAttr` exposes.
#[repr(C)]
struct RawStat {
    inode: u64,
    file_type: u32,
    size: u64,
}

fn sys_stat(args: [u32; 5]) -> i32 {
    let path = match user_str(args[0], args[1]) {
        Ok(p) => p,
        Err(e) => return e,
    };
    if args[2] == 0 {
        return FsError::Invalid.errno();
    }
    let attr = match sched::with_current_task_mut(|task| task.files.stat(path)) {
        Some(Ok(attr)) => attr,
        Some(Err(e)) => return e.errno(),
        None => return FsError::Invalid.errno(),
    };
    let raw = RawStat {
        inode: attr.inode,
        file_type: attr.file_type as u32,
        size: attr.size,
    };
    unsafe { core::ptr::write(args[2] as *mut RawStat, raw) };
    0
}

fn sys_readdir(args: [u32; 5]) -> i32 {
    let fd = args[0] as i32;
    let index = args[1] as usize;
    let entry = match sched::with_current_task_mut(|task| task.files.readdir(fd, index)) {
        Some(Ok(entry)) => entry,
        Some(Err(e)) => return e.errno(),
        None => return FsError::Invalid.errno(),
    };
    let out = match user_slice_mut(args[2], args[3]) {
        Ok(out) => out,
        Err(e) => return e,
    };
    let bytes = entry.name.as_bytes();
    if bytes.len() >= out.len() {
        return FsError::Invalid.errno();
    }
    out[..bytes.len()].copy_from_slice(bytes);
    out[bytes.len()] = 0;
    bytes.len() as i32
}

/// `mkdir`/`rmdir`/`unlink`/`chdir` share a path-in, status-out shape.
fn sys_path_op(
    args: [u32; 5],
    op: impl FnOnce(&mut aos_fs::dispatcher::ProcessFiles, &str) -> aos_lib::error::FsResult<()>,
) -> i32 {
    let path = match user_str(args[0], args[1]) {
        Ok(p) => p,
        Err(e) => return e,
    };
    match sched::with_current_task_mut(|task| op(&mut task.files, path)) {
        Some(Ok(())) => 0,
        Some(Err(e)) => e.errno(),
        None => FsError::Invalid.errno(),
    }
}

/// The one blocking handler: re-enable interrupts, poll the keyboard (and
/// any queued mouse-scroll event) between `hlt`s, return the character
/// with modifier bits packed into the high byte.
fn sys_getchar() -> i32 {
    aos_arch_x86::enable_interrupts();
    loop {
        if let Some(key) = aos_drivers::keyboard::read_key() {
            return key as i32;
        }
        aos_arch_x86::hlt_once();
    }
}

fn sys_exit(args: [u32; 5]) -> i32 {
    let code = args[0] as i32;
    if let Some(pid) = sched::current_pid() {
        sched::with_current_task_mut(|task| task.exit(code));
        sched::remove_task(pid);
    }
    sched::yield_now();
    0
}

/// Initialize the syscall interface. The IDT entries for the syscall gate
/// and the timer are installed by [`aos_arch_x86::init`]; this just
/// announces readiness once the scheduler and filesystem are both up.
pub fn init() {
    crate::printk::printk("  System call interface initialized\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_syscall_is_invalid() {
        assert_eq!(dispatch(nr::COUNT, [0; 5]), FsError::Invalid.errno());
        assert_eq!(dispatch(9999, [0; 5]), FsError::Invalid.errno());
    }

    #[test]
    fn getpid_with_no_current_task_returns_zero() {
        assert_eq!(dispatch(nr::GETPID, [0; 5]), 0);
    }

    #[test]
    fn read_with_null_buffer_is_rejected_before_touching_the_task() {
        assert_eq!(dispatch(nr::READ, [0, 0, 8, 0, 0]), FsError::Invalid.errno());
    }

    #[test]
    fn capability_class_write_requires_io_write() {
        assert_eq!(capability_class(nr::WRITE), SyscallFilter::IO_WRITE);
        assert_eq!(capability_class(nr::GETCHAR), SyscallFilter::DEVICE);
    }
}
