//! # Task Control Blocks
//!
//! Every task owns exactly one kernel page. Its control block sits at the
//! bottom of that page and the kernel stack grows down towards it from the
//! top:
//!
//! ```text
//!  page + 4096 ┌──────────────────────────┐ ◄── initial stack top
//!              │ kernel stack             │
//!              │   │                      │
//!              │   ▼                      │
//!              │                          │
//!              ├──────────────────────────┤
//!              │ stack_guard = 0x77777777 │ ◄── overwritten on overflow
//!              │ ...                      │
//!              │ kernel_stack (saved esp) │
//!  page        └──────────────────────────┘
//! ```
//!
//! The tick handler checks the guard word of the running task on every
//! tick; a clobbered guard means the stack ran into the control block.

use core::ptr::NonNull;
use kernel_alloc::UserSpace;
use kernel_collections::Link;
use kernel_info::scheduling::{STACK_GUARD, TASK_NAME_LEN};
use kernel_memory_addresses::{PhysicalFrame, VirtualPage};

/// Lifecycle state of a task.
///
/// A task is on the ready queue exactly when it is `Ready`, and exactly one
/// task is `Running`.
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TaskStatus {
    Running,
    Ready,
    Blocked,
    Waiting,
    /// Parked after its entry function returned.
    Hanging,
    /// Never entered; reaping finished tasks is not implemented.
    Dead,
}

impl TaskStatus {
    /// Whether a task may block itself with this status.
    #[must_use]
    pub const fn is_blocking(self) -> bool {
        matches!(self, Self::Blocked | Self::Waiting | Self::Hanging)
    }
}

/// Task identifier. The boot thread gets 1.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Pid(pub u32);

/// Entry point of a kernel thread, called with the thread's argument.
pub type TaskEntry = fn(usize);

/// The address space half a process owns.
pub struct Process {
    pub(crate) directory: PhysicalFrame,
    pub(crate) directory_page: VirtualPage,
    pub(crate) user: UserSpace,
}

impl Process {
    /// Frame of the process's page directory.
    #[inline]
    #[must_use]
    pub const fn directory(&self) -> PhysicalFrame {
        self.directory
    }

    /// Kernel page the directory is reachable through.
    #[inline]
    #[must_use]
    pub const fn directory_page(&self) -> VirtualPage {
        self.directory_page
    }

    #[inline]
    #[must_use]
    pub const fn user(&self) -> &UserSpace {
        &self.user
    }
}

#[repr(C)]
pub struct TaskControlBlock {
    /// Saved stack pointer while switched out. Must stay the first field.
    pub(crate) kernel_stack: usize,
    pub(crate) pid: Pid,
    pub(crate) status: TaskStatus,
    pub(crate) priority: u8,
    pub(crate) remaining_ticks: u8,
    name: [u8; TASK_NAME_LEN],
    pub(crate) elapsed_ticks: u32,
    pub(crate) ready_link: Link,
    pub(crate) all_link: Link,
    pub(crate) process: Option<Process>,
    pub(crate) stack_guard: u32,
}

const _: () = assert!(core::mem::offset_of!(TaskControlBlock, kernel_stack) == 0);

impl TaskControlBlock {
    /// A `Ready` task with a full time slice. `name` is cut to
    /// [`TASK_NAME_LEN`] bytes on a character boundary.
    #[must_use]
    pub fn new(name: &str, priority: u8, pid: Pid, kernel_stack: usize) -> Self {
        let mut end = name.len().min(TASK_NAME_LEN);
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        let mut buf = [0; TASK_NAME_LEN];
        buf[..end].copy_from_slice(&name.as_bytes()[..end]);

        Self {
            kernel_stack,
            pid,
            status: TaskStatus::Ready,
            priority,
            remaining_ticks: priority,
            name: buf,
            elapsed_ticks: 0,
            ready_link: Link::new(),
            all_link: Link::new(),
            process: None,
            stack_guard: STACK_GUARD,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        let len = self.name.iter().position(|&b| b == 0).unwrap_or(TASK_NAME_LEN);
        core::str::from_utf8(&self.name[..len]).unwrap_or("?")
    }

    #[inline]
    #[must_use]
    pub const fn pid(&self) -> Pid {
        self.pid
    }

    #[inline]
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    #[inline]
    #[must_use]
    pub const fn priority(&self) -> u8 {
        self.priority
    }

    #[inline]
    #[must_use]
    pub const fn remaining_ticks(&self) -> u8 {
        self.remaining_ticks
    }

    #[inline]
    #[must_use]
    pub const fn elapsed_ticks(&self) -> u32 {
        self.elapsed_ticks
    }

    #[inline]
    #[must_use]
    pub const fn process(&self) -> Option<&Process> {
        self.process.as_ref()
    }

    /// Whether the stack guard is intact.
    #[inline]
    #[must_use]
    pub const fn guard_intact(&self) -> bool {
        self.stack_guard == STACK_GUARD
    }
}

impl core::fmt::Debug for TaskControlBlock {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TaskControlBlock")
            .field("pid", &self.pid)
            .field("name", &self.name())
            .field("status", &self.status)
            .field("priority", &self.priority)
            .field("remaining_ticks", &self.remaining_ticks)
            .field("elapsed_ticks", &self.elapsed_ticks)
            .field("process", &self.process.is_some())
            .finish_non_exhaustive()
    }
}

/// Handle to a task control block.
///
/// Control blocks are never freed, so handles stay valid. Reading through a
/// handle is only meaningful from the task itself or with interrupts
/// disabled.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct TaskRef(NonNull<TaskControlBlock>);

impl TaskRef {
    /// # Safety
    /// `tcb` must point to an initialized control block that is never freed.
    #[must_use]
    pub const unsafe fn from_raw(tcb: NonNull<TaskControlBlock>) -> Self {
        Self(tcb)
    }

    #[inline]
    #[must_use]
    pub const fn as_ptr(self) -> NonNull<TaskControlBlock> {
        self.0
    }

    /// Shared view of the control block.
    #[inline]
    #[must_use]
    pub const fn get(&self) -> &TaskControlBlock {
        // SAFETY: control blocks live forever; see the type docs.
        unsafe { self.0.as_ref() }
    }

    /// # Safety
    /// No other reference to the control block may be alive.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub(crate) const unsafe fn get_mut(&self) -> &mut TaskControlBlock {
        unsafe { &mut *self.0.as_ptr() }
    }

    #[must_use]
    pub fn pid(self) -> Pid {
        self.get().pid
    }

    #[must_use]
    pub fn status(self) -> TaskStatus {
        self.get().status
    }
}

impl core::fmt::Debug for TaskRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Task({}, {:?})", self.get().pid.0, self.get().name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_task_is_ready_with_a_full_slice() {
        let tcb = TaskControlBlock::new("worker", 8, Pid(3), 0x1000);
        assert_eq!(tcb.status(), TaskStatus::Ready);
        assert_eq!(tcb.remaining_ticks(), 8);
        assert_eq!(tcb.name(), "worker");
        assert!(tcb.guard_intact());
        assert!(tcb.process().is_none());
    }

    #[test]
    fn long_names_are_cut_on_a_char_boundary() {
        let tcb = TaskControlBlock::new("a-very-long-task-name", 1, Pid(1), 0);
        assert_eq!(tcb.name(), "a-very-long-task");

        let tcb = TaskControlBlock::new("ääääääääää", 1, Pid(1), 0);
        assert_eq!(tcb.name(), "ääääääää");
    }

    #[test]
    fn blocking_states() {
        assert!(TaskStatus::Blocked.is_blocking());
        assert!(TaskStatus::Waiting.is_blocking());
        assert!(TaskStatus::Hanging.is_blocking());
        assert!(!TaskStatus::Ready.is_blocking());
        assert!(!TaskStatus::Running.is_blocking());
        assert!(!TaskStatus::Dead.is_blocking());
    }
}
