//! # Kernel Threads and Scheduling
//!
//! Task control blocks, the round-robin scheduler and the [`System`] that
//! ties them to the memory manager.
//!
//! ```text
//!   timer interrupt ─► System::on_tick ─► Scheduler::tick ──┐ slice used up
//!                                                           ▼
//!   block / yield_now ──────────────────────────► System::schedule
//!                                                  │  Scheduler::switch_next
//!                                                  │  MemoryManager::activate
//!                                                  ▼
//!                                              ContextSwitch::switch
//! ```
//!
//! Scheduling runs with interrupts disabled from start to finish. The
//! scheduler's queues sit in an `IrqCell` and are released before the
//! actual stack switch, so a task switched away never "holds" them.
//!
//! Each task is a single kernel page: control block at the bottom, kernel
//! stack above it (see [`tcb`]). A task that owns a [`Process`] also has
//! its own page directory, user virtual space and heap; `malloc` and `free`
//! pick the space of whichever task is running.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod cpu;
pub mod scheduler;
pub mod switch;
mod system;
pub mod tcb;

pub use scheduler::Scheduler;
pub use switch::{ContextSwitch, InitialFrame, X86Switch, task_trampoline};
pub use system::System;
pub use tcb::{Pid, Process, TaskControlBlock, TaskEntry, TaskRef, TaskStatus};

use kernel_alloc::PageAllocError;

/// Errors of task creation.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum TaskError {
    #[error("out of memory for a new task")]
    OutOfMemory,
}

impl From<PageAllocError> for TaskError {
    fn from(_: PageAllocError) -> Self {
        Self::OutOfMemory
    }
}
