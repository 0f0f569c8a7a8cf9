//! Task structure
//!
//! One entry in the scheduler's bounded task table: identity, scheduling
//! state, the sandbox restriction bundle every syscall is checked against,
//! and the per-process view over the filesystem.

use aos_arch_x86::context::Context;
use aos_fs::dispatcher::ProcessFiles;
use aos_lib::error::FsResult;

use crate::sandbox::SandboxDescriptor;
use crate::types::{Gid, Pid, Uid};

/// Task state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Task is running
    Running,
    /// Task is sleeping/waiting
    Sleeping,
    /// Task is stopped
    Stopped,
    /// Task has exited but not reaped
    Zombie,
}

/// Task priority (lower number = higher priority)
pub type Priority = u8;

/// Default task priority
pub const DEFAULT_PRIORITY: Priority = 120;

/// Process/thread task structure.
pub struct Task {
    /// Process ID
    pub pid: Pid,
    /// User ID
    pub uid: Uid,
    /// Group ID
    pub gid: Gid,
    /// Task state
    pub state: TaskState,
    /// Priority (0-255, lower is higher priority)
    pub priority: Priority,
    /// Parent process ID
    pub parent_pid: Option<Pid>,
    /// Exit code (if zombie)
    pub exit_code: Option<i32>,
    /// Restriction bundle consulted on every syscall this task issues.
    pub sandbox: SandboxDescriptor,
    /// This task's view over the filesystem: FD table, cwd, and owner id
    /// for access checks.
    pub files: ProcessFiles,
    /// Saved callee-saved registers + return address for the next
    /// `switch_context` into or out of this task.
    pub context: Context,
}

impl Task {
    /// Create a new task with default values, rooted at the global VFS
    /// root. Fails only if nothing is mounted at `/` yet — callers are
    /// expected to bring up the filesystem stack before the scheduler.
    pub fn new(pid: Pid, uid: Uid) -> FsResult<Self> {
        Self::with_parent(pid, uid, None)
    }

    /// Create a new task with parent
    pub fn with_parent(pid: Pid, uid: Uid, parent_pid: Option<Pid>) -> FsResult<Self> {
        Ok(Task {
            pid,
            uid,
            gid: 0,
            state: TaskState::Running,
            priority: DEFAULT_PRIORITY,
            parent_pid,
            exit_code: None,
            sandbox: SandboxDescriptor::unrestricted(),
            files: ProcessFiles::new(uid)?,
            context: Context::new(),
        })
    }

    /// Set task state
    pub fn set_state(&mut self, state: TaskState) {
        self.state = state;
    }

    /// Set priority
    pub fn set_priority(&mut self, priority: Priority) {
        self.priority = priority;
    }

    /// Mark task as exited
    pub fn exit(&mut self, code: i32) {
        self.state = TaskState::Zombie;
        self.exit_code = Some(code);
    }

    /// Check if task is runnable
    pub fn is_runnable(&self) -> bool {
        self.state == TaskState::Running
    }
}
