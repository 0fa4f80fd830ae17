//! # Kernel Entry Point
//!
//! The boot loader enters [`boot::_start`] in 32-bit protected mode with
//! paging on, the kernel half mapped and interrupts off. From there:
//!
//! ```text
//! _start ─► kernel_main
//!            ├─ console logger
//!            ├─ MemoryLayout from the detected memory size
//!            ├─ MemoryManager (pools, kernel space, heap)
//!            ├─ System: boot thread adopted, idle task, demo tasks
//!            ├─ IDT, PIC, PIT at 1 kHz
//!            └─ sti, then the boot thread idles in `hlt`
//! ```
//!
//! Only the bare-metal `x86` build is a kernel; on any other target this
//! binary is empty so the workspace still builds and tests on the host.

#![cfg_attr(all(target_arch = "x86", target_os = "none"), no_std, no_main)]
#![cfg_attr(not(all(target_arch = "x86", target_os = "none")), allow(dead_code))]
#![allow(unsafe_code)]

#[cfg(all(target_arch = "x86", target_os = "none"))]
mod boot;
mod idt;
#[cfg(all(target_arch = "x86", target_os = "none"))]
mod interrupts;
mod pic;
mod pit;
#[cfg(all(target_arch = "x86", target_os = "none"))]
mod ports;

#[cfg(not(all(target_arch = "x86", target_os = "none")))]
fn main() {}
