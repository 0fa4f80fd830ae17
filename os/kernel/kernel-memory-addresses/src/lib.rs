//! # Virtual and Physical Memory Address Types
//!
//! Strongly typed wrappers for raw 32-bit addresses, page bases and frame
//! bases used by the two-level x86 paging code.
//!
//! ## Overview
//!
//! | Concept | Description |
//! |----------|-------------|
//! | [`MemoryAddress`] | A raw 32-bit address, either physical or virtual. |
//! | [`PageOffset`] | The low 12 bits of an address, i.e. the byte within a 4 KiB page. |
//! | [`VirtualAddress`] / [`VirtualPage`] | Virtual (page-table translated) memory. |
//! | [`PhysicalAddress`] / [`PhysicalFrame`] | Physical memory. |
//! | [`DirectoryIndex`] / [`TableIndex`] | The two 10-bit indices a virtual address selects. |
//!
//! ## Address split
//!
//! ```text
//!  31          22 21          12 11            0
//! +--------------+--------------+---------------+
//! |  directory   |    table     |    offset     |
//! +--------------+--------------+---------------+
//! ```
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let va = VirtualAddress::new(0xC010_1234);
//! let (page, off) = va.split();
//! assert_eq!(page.base().as_u32(), 0xC010_1000);
//! assert_eq!(off.as_u32(), 0x234);
//! assert_eq!(page.directory_index().as_usize(), 0x300);
//! assert_eq!(page.table_index().as_usize(), 0x101);
//! assert_eq!(page.join(off), va);
//! ```
//!
//! All types are `#[repr(transparent)]`, `Copy`, ordered and hashable. All
//! alignment and index calculations are `const fn`.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(clippy::inline_always)]

mod memory_address;
mod page_offset;
mod physical_address;
mod physical_frame;
mod table_index;
mod virtual_address;
mod virtual_page;

pub use memory_address::MemoryAddress;
pub use page_offset::PageOffset;
pub use physical_address::PhysicalAddress;
pub use physical_frame::PhysicalFrame;
pub use table_index::{DirectoryIndex, TableIndex};
pub use virtual_address::VirtualAddress;
pub use virtual_page::VirtualPage;

/// Size of a page (and of a physical frame) in bytes.
pub const PAGE_SIZE: u32 = 4096;

/// `log2(PAGE_SIZE)`, i.e. the number of offset bits in an address.
pub const PAGE_SHIFT: u32 = 12;

/// Number of entries in a page directory or a page table.
pub const ENTRIES_PER_TABLE: usize = 1024;

/// Number of pages needed to hold `bytes` bytes.
///
/// ```rust
/// # use kernel_memory_addresses::pages_for;
/// assert_eq!(pages_for(0), 0);
/// assert_eq!(pages_for(1), 1);
/// assert_eq!(pages_for(4096), 1);
/// assert_eq!(pages_for(4097), 2);
/// ```
#[inline]
#[must_use]
pub const fn pages_for(bytes: u32) -> u32 {
    bytes.div_ceil(PAGE_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_and_join_roundtrip() {
        let va = VirtualAddress::new(0x0804_8ABC);
        let (page, off) = va.split();
        assert_eq!(page.base(), VirtualAddress::new(0x0804_8000));
        assert_eq!(off.as_u32(), 0xABC);
        assert_eq!(page.join(off), va);

        let pa = PhysicalAddress::new(0x0020_3004);
        let (frame, off) = pa.split();
        assert_eq!(frame.base(), PhysicalAddress::new(0x0020_3000));
        assert_eq!(frame.join(off), pa);
    }

    #[test]
    fn indices_of_recursive_slot() {
        let page = VirtualPage::containing(VirtualAddress::new(0xFFFF_F000));
        assert_eq!(page.directory_index().as_usize(), 1023);
        assert_eq!(page.table_index().as_usize(), 1023);

        let page = VirtualPage::from_indices(DirectoryIndex::new(768), TableIndex::new(0));
        assert_eq!(page.base().as_u32(), 0xC000_0000);
    }

    #[test]
    fn page_numbers_and_steps() {
        let page = VirtualPage::containing(VirtualAddress::new(0xC010_0000));
        assert_eq!(page.number(), 0xC0100);
        assert_eq!(page.add_pages(3).base().as_u32(), 0xC010_3000);
        assert_eq!(page.pages_since(VirtualPage::from_number(0xC00FE)), 2);

        let frame = PhysicalFrame::from_number(0x200);
        assert_eq!(frame.base().as_u32(), 0x0020_0000);
        assert_eq!(frame.add_frames(1).number(), 0x201);
    }

    #[test]
    fn unaligned_addresses_are_rejected_as_pages() {
        assert!(VirtualPage::try_from(VirtualAddress::new(0x1001)).is_err());
        assert!(PhysicalFrame::try_from(PhysicalAddress::new(0x2000)).is_ok());
    }

    #[test]
    fn debug_formatting() {
        assert_eq!(
            format!("{:?}", VirtualAddress::new(0xC000_0000)),
            "VA(0xC0000000)"
        );
        assert_eq!(
            format!("{:?}", PhysicalFrame::from_number(0x101)),
            "PhysicalFrame(0x00101000)"
        );
    }
}
