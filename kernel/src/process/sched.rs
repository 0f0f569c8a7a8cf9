//! Scheduler
//!
//! A ready queue (FIFO) over a bounded task table, round-robin
//! `schedule_next`, a "current" pointer — this is the only component
//! allowed to invoke [`aos_arch_x86::context::switch_context`] outside of
//! the initial bootstrap jump into task 0.

use super::task::{Task, TaskState};
use crate::types::Pid;
use alloc::collections::VecDeque;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use spin::Mutex;

/// Upper bound on simultaneously live tasks. PID 0 (idle) is always one of
/// them.
pub const MAX_TASKS: usize = 256;

/// Global scheduler state
static SCHEDULER: Mutex<Scheduler> = Mutex::new(Scheduler::new());

/// Scheduler initialization flag
static SCHEDULER_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Nesting counter for `preempt_disable`/`preempt_enable`. The syscall
/// dispatcher raises this for the duration of a single call; the timer
/// interrupt's `schedule()` call is a no-op while it is above zero.
static PREEMPT_DISABLE_COUNT: AtomicUsize = AtomicUsize::new(0);

/// Raise the preempt-disable count. Pairs with [`preempt_enable`].
pub fn preempt_disable() {
    PREEMPT_DISABLE_COUNT.fetch_add(1, Ordering::AcqRel);
}

/// Lower the preempt-disable count.
pub fn preempt_enable() {
    PREEMPT_DISABLE_COUNT.fetch_sub(1, Ordering::AcqRel);
}

/// True when nothing currently holds preemption disabled.
pub fn preempt_enabled() -> bool {
    PREEMPT_DISABLE_COUNT.load(Ordering::Acquire) == 0
}

/// Scheduler structure
pub struct Scheduler {
    /// Ready queue for runnable tasks
    ready_queue: VecDeque<Pid>,
    /// All tasks indexed by PID, a fixed-capacity arena
    tasks: [Option<Task>; MAX_TASKS],
    /// Current running task
    current: Option<Pid>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// Create a new scheduler
    pub const fn new() -> Self {
        Self {
            ready_queue: VecDeque::new(),
            tasks: [const { None }; MAX_TASKS],
            current: None,
        }
    }

    /// Add a task to the scheduler. Fails if the task table is full or the
    /// PID is out of range for it.
    pub fn add_task(&mut self, task: Task) -> Result<(), Task> {
        let pid = task.pid;
        match self.tasks.get_mut(pid as usize) {
            Some(slot @ None) => {
                *slot = Some(task);
                self.ready_queue.push_back(pid);
                Ok(())
            }
            _ => Err(task),
        }
    }

    /// Remove a task from the scheduler
    pub fn remove_task(&mut self, pid: Pid) {
        if let Some(task_slot) = self.tasks.get_mut(pid as usize) {
            *task_slot = None;
        }
        self.ready_queue.retain(|&p| p != pid);
        if self.current == Some(pid) {
            self.current = None;
        }
    }

    /// Get a task by PID
    pub fn get_task(&self, pid: Pid) -> Option<&Task> {
        self.tasks.get(pid as usize).and_then(|t| t.as_ref())
    }

    /// Get a mutable task by PID
    pub fn get_task_mut(&mut self, pid: Pid) -> Option<&mut Task> {
        self.tasks.get_mut(pid as usize).and_then(|t| t.as_mut())
    }

    /// Schedule next task (round-robin)
    pub fn schedule_next(&mut self) -> Option<Pid> {
        // Move current task back to ready queue if it's still running
        if let Some(current_pid) = self.current {
            if let Some(task) = self.get_task(current_pid) {
                if task.state == TaskState::Running {
                    self.ready_queue.push_back(current_pid);
                }
            }
        }

        // Get next task from ready queue
        while let Some(pid) = self.ready_queue.pop_front() {
            if let Some(task) = self.get_task_mut(pid) {
                if task.state == TaskState::Running {
                    self.current = Some(pid);
                    return Some(pid);
                }
            }
        }

        self.current = None;
        None
    }

    /// Get current task PID
    pub fn current_pid(&self) -> Option<Pid> {
        self.current
    }

    /// Mark current task as yielding
    pub fn yield_current(&mut self) {
        if let Some(current_pid) = self.current {
            // Move current task to back of ready queue
            self.ready_queue.push_back(current_pid);
            self.current = None;
        }
    }

    /// Get number of tasks
    pub fn task_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.is_some()).count()
    }

    /// Get number of ready tasks
    pub fn ready_count(&self) -> usize {
        self.ready_queue.len()
    }
}

/// Initialize the scheduler
pub fn init() {
    if SCHEDULER_INITIALIZED.load(Ordering::Acquire) {
        return;
    }

    let idle_task = match Task::new(0, 0) {
        Ok(task) => task,
        Err(_) => {
            crate::printk::printk("  Scheduler init: no root filesystem mounted yet\n");
            return;
        }
    };

    let mut sched = SCHEDULER.lock();
    sched
        .add_task(idle_task)
        .ok()
        .expect("idle task is the first entry in an empty table");

    SCHEDULER_INITIALIZED.store(true, Ordering::Release);

    crate::printk::printk("  Scheduler initialized (round-robin)\n");
}

/// Schedule the next runnable task, context-switching into it if it
/// differs from the one currently running. Returns without switching when
/// the ready queue has nothing else to offer.
pub fn schedule() {
    if !preempt_enabled() {
        return;
    }

    let (old_ctx, new_ctx) = {
        let mut sched = SCHEDULER.lock();
        let old_pid = sched.current_pid();
        let next_pid = match sched.schedule_next() {
            Some(pid) => pid,
            None => return,
        };
        if Some(next_pid) == old_pid {
            return;
        }
        let old_ctx = old_pid
            .and_then(|pid| sched.get_task_mut(pid))
            .map(|task| &mut task.context as *mut aos_arch_x86::context::Context)
            .unwrap_or(core::ptr::null_mut());
        let new_ctx = sched
            .get_task(next_pid)
            .map(|task| &task.context as *const aos_arch_x86::context::Context)
            .expect("schedule_next only returns a pid present in the table");
        (old_ctx, new_ctx)
    };

    // A null `old_ctx` means there is no previously running task to save
    // into (the very first `schedule()` call after boot) — the new task's
    // saved context, seeded by `Context::init`, becomes current without an
    // actual register swap.
    if !old_ctx.is_null() {
        unsafe {
            aos_arch_x86::context::switch_context(old_ctx, new_ctx);
        }
    }
}

/// Yield CPU to another task
pub fn yield_now() {
    let mut sched = SCHEDULER.lock();
    sched.yield_current();
    drop(sched);
    schedule();
}

/// Add a task to the scheduler. Fails if the task table is full.
pub fn add_task(task: Task) -> Result<(), Task> {
    let mut sched = SCHEDULER.lock();
    sched.add_task(task)
}

/// Allocate a fresh PID, build a task owned by `uid` rooted under the
/// calling task, and enter it into the ready queue.
pub fn spawn(uid: crate::types::Uid) -> aos_lib::error::FsResult<Pid> {
    let pid = super::pid::allocate_pid();
    let parent = current_pid();
    let task = Task::with_parent(pid, uid, parent)?;
    add_task(task).map_err(|_| aos_lib::error::FsError::NoSpace)?;
    Ok(pid)
}

/// Remove a task from the scheduler, returning its PID to the allocator.
pub fn remove_task(pid: Pid) {
    let mut sched = SCHEDULER.lock();
    sched.remove_task(pid);
    drop(sched);
    super::pid::free_pid(pid);
}

/// Get current task PID
pub fn current_pid() -> Option<Pid> {
    let sched = SCHEDULER.lock();
    sched.current_pid()
}

/// Run `f` against the currently running task, if there is one. The
/// syscall dispatcher's only way to reach a task's files or sandbox.
pub fn with_current_task_mut<R>(f: impl FnOnce(&mut Task) -> R) -> Option<R> {
    let mut sched = SCHEDULER.lock();
    let pid = sched.current_pid()?;
    sched.get_task_mut(pid).map(f)
}

/// Get task count
pub fn task_count() -> usize {
    let sched = SCHEDULER.lock();
    sched.task_count()
}

/// Get ready task count
pub fn ready_count() -> usize {
    let sched = SCHEDULER.lock();
    sched.ready_count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mounted_root() {
        aos_fs::init();
        let _ = aos_fs::mount::mount("ramfs", "", "/");
    }

    #[test]
    fn add_task_rejects_duplicate_pid() {
        mounted_root();
        let mut scheduler = Scheduler::new();
        scheduler.add_task(Task::new(1, 0).unwrap()).unwrap();
        assert!(scheduler.add_task(Task::new(1, 0).unwrap()).is_err());
    }

    #[test]
    fn add_task_rejects_out_of_range_pid() {
        mounted_root();
        let mut scheduler = Scheduler::new();
        assert!(scheduler
            .add_task(Task::new(MAX_TASKS as Pid, 0).unwrap())
            .is_err());
    }

    #[test]
    fn schedule_next_round_robins_between_two_tasks() {
        mounted_root();
        let mut scheduler = Scheduler::new();
        scheduler.add_task(Task::new(1, 0).unwrap()).unwrap();
        scheduler.add_task(Task::new(2, 0).unwrap()).unwrap();
        assert_eq!(scheduler.schedule_next(), Some(1));
        assert_eq!(scheduler.schedule_next(), Some(2));
        assert_eq!(scheduler.schedule_next(), Some(1));
    }

    #[test]
    fn remove_task_clears_current_pointer() {
        mounted_root();
        let mut scheduler = Scheduler::new();
        scheduler.add_task(Task::new(1, 0).unwrap()).unwrap();
        scheduler.schedule_next();
        scheduler.remove_task(1);
        assert_eq!(scheduler.current_pid(), None);
    }

    #[test]
    fn nested_preempt_disable_requires_matching_enables() {
        assert!(preempt_enabled());
        preempt_disable();
        preempt_disable();
        assert!(!preempt_enabled());
        preempt_enable();
        assert!(!preempt_enabled());
        preempt_enable();
        assert!(preempt_enabled());
    }
}
