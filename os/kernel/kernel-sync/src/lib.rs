//! # Kernel synchronization primitives
//!
//! The kernel runs on a single CPU, so exclusion comes from two sources:
//! spin locks against other threads of control, and the interrupt flag
//! against the timer interrupt. Both are combined in [`IrqMutex`], which
//! every pool and heap lock in the memory manager is taken through.
//!
//! State that is only ever touched with interrupts disabled (the scheduler's
//! queues) lives in an [`IrqCell`] instead of a lock, because the owning
//! thread may be switched away while "holding" it.
//!
//! On bare-metal `x86` the interrupt flag is the real `EFLAGS.IF`. On every
//! other target the flag is emulated per host thread, which lets the kernel
//! crates run their interrupt discipline under `cargo test`.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod irq;
mod irq_cell;
mod mutex;
mod raw_spin;
mod sync_once_cell;

pub use irq::{IrqGuard, IrqMutex, interrupts_enabled};
pub use irq_cell::IrqCell;
pub use mutex::{Mutex, MutexGuard};
pub use raw_spin::RawSpin;
pub use sync_once_cell::SyncOnceCell;

pub type SpinMutex<T> = Mutex<T, RawSpin>;

impl<T> SpinMutex<T> {
    pub const fn new(value: T) -> Self {
        Self::from_raw(RawSpin::new(), value)
    }
}

pub trait RawLock {
    fn raw_lock(&self);
    fn raw_try_lock(&self) -> bool;
}

pub trait RawUnlock {
    unsafe fn raw_unlock(&self);
}
