//! # System Call Table
//!
//! A fixed table of [`SYSCALL_SLOTS`] handlers, indexed by the number user
//! code passes in `eax`. The trap stub (not part of this crate) collects
//! the number and up to three arguments and calls [`SyscallTable::dispatch`];
//! whatever the handler returns goes back in `eax`.
//!
//! Handlers receive a context `C` (the kernel's `System`) by reference, so
//! the table itself needs no global state.

#![cfg_attr(not(any(test, doctest)), no_std)]

use kernel_info::scheduling::SYSCALL_SLOTS;
use log::warn;

/// Returned for numbers without a handler.
pub const ENOSYS: usize = usize::MAX;

/// Numbers of the registered system calls.
#[repr(usize)]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Sysno {
    /// Pid of the calling task.
    GetPid = 0,
    /// Allocate `a0` bytes on the caller's heap; returns the address or 0.
    Malloc = 1,
    /// Free the block at `a0`.
    Free = 2,
}

/// Arguments of a system call, in `ebx`, `ecx`, `edx` order.
pub type SyscallArgs = [usize; 3];

/// A system call handler.
pub type Handler<C> = fn(&C, SyscallArgs) -> usize;

pub struct SyscallTable<C> {
    slots: [Option<Handler<C>>; SYSCALL_SLOTS],
}

impl<C> Default for SyscallTable<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> SyscallTable<C> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: [None; SYSCALL_SLOTS],
        }
    }

    /// Installs `handler` for `sysno`, replacing any previous one.
    pub const fn register(&mut self, sysno: Sysno, handler: Handler<C>) {
        self.slots[sysno as usize] = Some(handler);
    }

    /// Whether `number` has a handler.
    #[must_use]
    pub fn is_registered(&self, number: usize) -> bool {
        self.slots.get(number).is_some_and(Option::is_some)
    }

    /// Runs the handler for `number`.
    ///
    /// Returns [`ENOSYS`] if the number is out of range or unassigned.
    pub fn dispatch(&self, ctx: &C, number: usize, args: SyscallArgs) -> usize {
        match self.slots.get(number).copied().flatten() {
            Some(handler) => handler(ctx, args),
            None => {
                warn!("Unknown system call {number}");
                ENOSYS
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter(core::cell::Cell<usize>);

    fn add(ctx: &Counter, args: SyscallArgs) -> usize {
        ctx.0.set(ctx.0.get() + args[0]);
        ctx.0.get()
    }

    fn pid(_: &Counter, _: SyscallArgs) -> usize {
        7
    }

    #[test]
    fn dispatches_registered_handlers() {
        let mut table = SyscallTable::new();
        table.register(Sysno::GetPid, pid);
        table.register(Sysno::Malloc, add);
        let ctx = Counter(core::cell::Cell::new(0));

        assert_eq!(table.dispatch(&ctx, 0, [0; 3]), 7);
        assert_eq!(table.dispatch(&ctx, 1, [5, 0, 0]), 5);
        assert_eq!(table.dispatch(&ctx, 1, [3, 0, 0]), 8);
    }

    #[test]
    fn unknown_numbers_return_enosys() {
        let table = SyscallTable::<Counter>::new();
        let ctx = Counter(core::cell::Cell::new(0));
        assert_eq!(table.dispatch(&ctx, 2, [0; 3]), ENOSYS);
        assert_eq!(table.dispatch(&ctx, SYSCALL_SLOTS, [0; 3]), ENOSYS);
        assert_eq!(table.dispatch(&ctx, usize::MAX, [0; 3]), ENOSYS);
        assert!(!table.is_registered(0));
    }
}
