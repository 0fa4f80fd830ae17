//! # Kernel Configuration and Boot Interface
//!
//! The authoritative source for the kernel's memory layout, its timing and
//! scheduling constants, and the information handed over by the loader.
//!
//! ## Architecture
//!
//! ### Boot Information ([`boot`])
//! * [`BootInfo`](boot::BootInfo): what the loader tells the kernel (the
//!   amount of installed memory).
//! * [`MemoryLayout`](boot::MemoryLayout): the pool split derived from it.
//!
//! ### Memory Layout ([`memory`])
//! Fixed addresses shared between the loader, the paging code and the
//! memory manager.
//!
//! ### Scheduling ([`scheduling`])
//! Timer frequency, default priorities and the stack sentinel.
//!
//! ## Virtual Memory Architecture
//!
//! ```text
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │   unmapped                      │
//! 0x0804_8000 ├─────────────────────────────────┤ USER_VADDR_START
//!             │   user space (per process)      │
//! 0xBFFF_F000 ├─────────────────────────────────┤ USER_STACK_PAGE
//!             │   initial user stack page       │
//! 0xC000_0000 ├─────────────────────────────────┤ KERNEL_VIRTUAL_BASE
//!             │   low 1 MiB, kernel image       │
//! 0xC009_A000 ├─────────────────────────────────┤ MEM_BITMAP_BASE
//!             │   pool and heap bitmaps         │
//! 0xC009_E000 ├─────────────────────────────────┤ MAIN_THREAD_TCB
//!             │   boot thread control block     │
//! 0xC010_0000 ├─────────────────────────────────┤ KERNEL_HEAP_START
//!             │   kernel heap (page allocator)  │
//! 0xFFC0_0000 ├─────────────────────────────────┤ PAGE_TABLES_BASE
//!             │   page tables (recursive slot)  │
//! 0xFFFF_F000 ├─────────────────────────────────┤ PAGE_DIRECTORY_ADDR
//!             │   page directory                │
//!             └─────────────────────────────────┘
//! ```
//!
//! ## Physical Memory Layout
//!
//! ```text
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │   low memory, kernel image      │
//! 0x0010_0000 ├─────────────────────────────────┤ DEFAULT_PAGE_DIRECTORY
//!             │   page directory + 255 tables   │
//! 0x0020_0000 ├─────────────────────────────────┤ kernel pool base
//!             │   kernel pool (half of free)    │
//!             ├─────────────────────────────────┤ user pool base
//!             │   user pool (the rest)          │
//!             └─────────────────────────────────┘
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod boot;
pub mod memory;
pub mod scheduling;
