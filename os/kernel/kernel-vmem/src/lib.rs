//! # Virtual Memory Support
//!
//! Two-level x86 (IA-32, non-PAE) paging: page directory and page table
//! structures, the [`PageMapper`] that installs and removes 4 KiB mappings,
//! and the two seams it is built on ([`FrameAlloc`], [`PhysMapper`]).
//!
//! ## Virtual Address → Physical Address Walk
//!
//! ```text
//! | 31‒22 | 21‒12 | 11‒0   |
//! |  PD   |  PT   | Offset |
//! ```
//!
//! ```text
//!  CR3 → PD  →  PT  →  Physical Page
//!         │      │
//!         │      └───► PTE (Page Table Entry)     → maps a 4 KiB frame
//!         └──────────► PDE (Page Directory Entry) → points to a page table
//! ```
//!
//! Each table holds 1024 entries of 4 bytes. Only 4 KiB pages are used; the
//! kernel never sets the PS bit.
//!
//! ## Reaching the tables
//!
//! Page tables live in physical frames. How the kernel obtains a pointer to
//! them is the business of the [`PhysMapper`]:
//!
//! - [`RecursiveMapper`](recursive::RecursiveMapper): the last directory slot
//!   points back at the directory, making the active directory visible at
//!   `0xFFFF_F000` and table `i` at `0xFFC0_0000 + i * 4096`.
//! - [`SimulatedMemory`](sim::SimulatedMemory) (feature `sim`): host-side
//!   frames for tests.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code, clippy::inline_always)]

mod mapper;
mod page_entry_bits;
pub mod page_table;
pub mod recursive;
#[cfg(any(test, feature = "sim"))]
pub mod sim;

use kernel_memory_addresses::{DirectoryIndex, PhysicalFrame, VirtualPage};

pub use crate::mapper::{MapError, PageMapper};
pub use crate::page_entry_bits::PageEntryBits;
pub use crate::page_table::pd::{PageDirectory, PdEntry};
pub use crate::page_table::pt::{PageTable, PtEntry};

/// Supplies physical 4 KiB frames for page tables.
///
/// Returns `None` on out-of-memory.
pub trait FrameAlloc {
    /// Allocate one *physical* frame for a page table.
    fn alloc_frame(&mut self) -> Option<PhysicalFrame>;
}

/// Makes paging structures and mapped pages reachable by the CPU.
///
/// This is the only place that knows how a physical frame turns into
/// something the kernel can dereference, and the only place that talks to
/// the MMU (TLB invalidation, CR3).
///
/// # Safety
/// Implementations hand out `&mut` views of memory they do not own. Callers
/// must not hold two views of the same frame at once; [`PageMapper`] takes
/// `&mut self` for every mutating walk to uphold this.
pub trait PhysMapper {
    /// The active page directory.
    ///
    /// # Safety
    /// No other reference to the directory may be alive.
    unsafe fn directory<'a>(&self) -> &'a mut PageDirectory;

    /// The page table linked at `index` of the active directory, stored in
    /// `frame`.
    ///
    /// # Safety
    /// `frame` must be the table the directory entry at `index` points to,
    /// and no other reference to it may be alive.
    unsafe fn table<'a>(&self, index: DirectoryIndex, frame: PhysicalFrame) -> &'a mut PageTable;

    /// Pointer to the first byte of `page`, which is mapped to `frame`.
    fn page_ptr(&self, page: VirtualPage, frame: PhysicalFrame) -> *mut u8;

    /// The page a pointer previously returned by [`page_ptr`](Self::page_ptr)
    /// points into. Never dereferences `ptr`.
    ///
    /// The answer is only a candidate; callers confirm it by mapping the page
    /// back through [`page_ptr`](Self::page_ptr).
    fn page_containing(&self, ptr: *const u8) -> Option<VirtualPage>;

    /// Drops any cached translation of `page`.
    fn invalidate(&self, page: VirtualPage);

    /// Switches to the page directory in `directory`.
    ///
    /// # Safety
    /// The directory must map the kernel half exactly like the current one.
    unsafe fn activate(&self, directory: PhysicalFrame);
}

impl<T: FrameAlloc + ?Sized> FrameAlloc for &mut T {
    fn alloc_frame(&mut self) -> Option<PhysicalFrame> {
        (**self).alloc_frame()
    }
}
