//! Per-process sandbox descriptor
//!
//! Consulted by the trap demux on every syscall before a handler runs.
//! Nothing here enforces itself — `syscall::dispatch` is the only caller.

use alloc::string::String;

use bitflags::bitflags;

/// How tightly a process's access to the rest of the system is restricted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CageLevel {
    #[default]
    None,
    Light,
    Standard,
    Strict,
    Locked,
}

bitflags! {
    /// Capability classes a syscall can be gated on. One syscall may
    /// require more than one bit (e.g. `write` to a device needs both
    /// `IO_WRITE` and `DEVICE`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SyscallFilter: u32 {
        const IO_READ  = 1 << 0;
        const IO_WRITE = 1 << 1;
        const IO_EXEC  = 1 << 2;
        const PROCESS  = 1 << 3;
        const MEMORY   = 1 << 4;
        const DEVICE   = 1 << 5;
        const TIME     = 1 << 6;
        const IPC      = 1 << 7;
    }

    /// Coarse process-wide restriction flags, independent of the syscall
    /// filter bitmap.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SandboxFlags: u32 {
        const READONLY  = 1 << 0;
        const NOEXEC    = 1 << 1;
        const NONET     = 1 << 2;
        const IMMUTABLE = 1 << 3;
    }
}

impl Default for SyscallFilter {
    fn default() -> Self {
        Self::all()
    }
}

/// Hard ceilings a process may not exceed. `0` means "no limit" for the
/// count-style fields; `max_cpu_ticks` of `0` means unlimited too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResourceLimits {
    pub max_memory_bytes: u64,
    pub max_open_files: u32,
    pub max_child_processes: u32,
    pub max_cpu_ticks: u64,
}

/// The restriction bundle attached to a task. The unrestricted default
/// (`CageLevel::None`, all syscall classes allowed, no limits) is what a
/// freshly forked task inherits until something narrows it.
#[derive(Debug, Clone, Default)]
pub struct SandboxDescriptor {
    pub cage_level: CageLevel,
    pub cage_root: Option<String>,
    pub syscall_filter: SyscallFilter,
    pub limits: ResourceLimits,
    pub flags: SandboxFlags,
    pub cpu_ticks_used: u64,
}

impl SandboxDescriptor {
    pub fn unrestricted() -> Self {
        Self::default()
    }

    /// True if every bit in `required` is set in this descriptor's filter.
    pub fn permits(&self, required: SyscallFilter) -> bool {
        self.syscall_filter.contains(required)
    }

    /// True once the running task has burned through its CPU-time budget.
    /// A limit of zero means unlimited.
    pub fn over_cpu_budget(&self) -> bool {
        self.limits.max_cpu_ticks != 0 && self.cpu_ticks_used >= self.limits.max_cpu_ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrestricted_permits_everything() {
        let sandbox = SandboxDescriptor::unrestricted();
        assert!(sandbox.permits(SyscallFilter::IO_WRITE | SyscallFilter::DEVICE));
    }

    #[test]
    fn clearing_a_bit_denies_that_class_only() {
        let mut sandbox = SandboxDescriptor::unrestricted();
        sandbox.syscall_filter.remove(SyscallFilter::IO_WRITE);
        assert!(!sandbox.permits(SyscallFilter::IO_WRITE));
        assert!(sandbox.permits(SyscallFilter::IO_READ));
    }

    #[test]
    fn zero_cpu_limit_never_trips_the_budget() {
        let mut sandbox = SandboxDescriptor::unrestricted();
        sandbox.cpu_ticks_used = u64::MAX;
        assert!(!sandbox.over_cpu_budget());
    }

    #[test]
    fn nonzero_cpu_limit_trips_once_reached() {
        let mut sandbox = SandboxDescriptor::unrestricted();
        sandbox.limits.max_cpu_ticks = 10;
        sandbox.cpu_ticks_used = 10;
        assert!(sandbox.over_cpu_budget());
    }
}
