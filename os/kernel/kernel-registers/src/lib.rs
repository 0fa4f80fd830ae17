//! # Typed `x86` (IA-32) Registers
//!
//! The two registers the kernel reads or writes as values:
//!
//! | Register | Used by | Access |
//! |----------|---------|--------|
//! | [`Eflags`] | `kernel-sync` (interrupt flag) | `pushfd` |
//! | [`Cr3`] | `kernel-vmem` (address space switch) | `mov cr3` |
//!
//! The instructions are only emitted with the `asm` feature on 32-bit `x86`.
//! Elsewhere the types are plain bitfields, which is how the host build
//! emulates the interrupt flag.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod cr3;
pub mod eflags;

pub use cr3::Cr3;
pub use eflags::Eflags;

/// A register that can be read at any privilege level.
pub trait LoadRegister {
    fn load() -> Self;
}

/// A register whose write changes how the CPU executes from here on.
pub trait StoreRegisterUnsafe {
    /// # Safety
    /// Needs ring 0, and the new value must keep the running code valid
    /// (for CR3: the kernel stays mapped at the same addresses).
    unsafe fn store_unsafe(self);
}
