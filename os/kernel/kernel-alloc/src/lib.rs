//! # Kernel Memory Allocation
//!
//! Physical pools, virtual address spaces, the page allocator and the block
//! heap, composed into one [`MemoryManager`].
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                Block Heap (heap)                    │
//! │    • malloc / free, 7 size classes 16..1024 B       │
//! │    • one set per kernel, one per process            │
//! └─────────────────┬───────────────────────────────────┘
//!                   │ whole pages
//! ┌─────────────────▼───────────────────────────────────┐
//! │            Page Allocator (manager)                 │
//! │    • alloc_pages / free_pages / alloc_page_at       │
//! │    • rolls back partially backed requests           │
//! └──────┬──────────────────┬───────────────────────────┘
//!        │                  │
//! ┌──────▼───────┐   ┌──────▼───────────┐   ┌──────────────────┐
//! │ Virtual      │   │ Physical pools   │   │ Page mapper      │
//! │ spaces       │   │ kernel │ user    │   │ (kernel-vmem)    │
//! │ (vspace)     │   │ (frame_alloc)    │   │                  │
//! └──────────────┘   └──────────────────┘   └──────────────────┘
//! ```
//!
//! ## Physical Memory Layout
//!
//! ```text
//! 0x0000_0000 ┌──────────────────────────────┐
//!             │ low memory, loader, kernel   │
//! 0x0010_0000 ├──────────────────────────────┤
//!             │ boot page directory + tables │
//! 0x0020_0000 ├──────────────────────────────┤
//!             │ kernel pool (half)           │
//!             ├──────────────────────────────┤
//!             │ user pool (rest)             │
//! total       └──────────────────────────────┘
//! ```
//!
//! [`Space`] selects the kernel or a process side of every operation; the
//! caller (the scheduler's `System`) decides based on whether the running
//! task owns a page directory.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod frame_alloc;
pub mod heap;
pub mod manager;
pub mod vspace;

pub use frame_alloc::{MemoryPool, PoolError};
pub use heap::{AllocError, BlockDescriptors};
pub use manager::{BitmapStorage, MemoryManager, PageAllocError, Space, UserSpace};
pub use vspace::{VirtualAddressSpace, VirtualSpaceError};
