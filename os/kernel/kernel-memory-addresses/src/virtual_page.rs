use crate::memory_address::page_of;
use crate::{DirectoryIndex, MemoryAddress, TableIndex, VirtualAddress};

/// A 4 KiB page of virtual memory, identified by its base.
///
/// The directory and table index are the two halves of the page number:
///
/// ```rust
/// # use kernel_memory_addresses::*;
/// let page = VirtualPage::containing(VirtualAddress::new(0xFFC0_0123));
/// assert_eq!(page.base().as_u32(), 0xFFC0_0000);
/// assert_eq!(page.directory_index().as_usize(), 1023);
/// assert_eq!(page.table_index().as_usize(), 0);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualPage(MemoryAddress);

page_of!(VirtualPage, VirtualAddress, "VirtualPage");

impl VirtualPage {
    #[inline]
    #[must_use]
    pub const fn from_indices(directory: DirectoryIndex, table: TableIndex) -> Self {
        Self::from_number((directory.as_u32() << 10) | table.as_u32())
    }

    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn directory_index(self) -> DirectoryIndex {
        DirectoryIndex::new((self.number() >> 10) as u16)
    }

    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn table_index(self) -> TableIndex {
        TableIndex::new((self.number() & 0x3FF) as u16)
    }

    #[inline]
    #[must_use]
    pub const fn add_pages(self, count: u32) -> Self {
        Self::from_number(self.number() + count)
    }

    /// Number of pages from `origin` up to this page.
    ///
    /// # Panics
    /// If `origin` lies above this page.
    #[inline]
    #[must_use]
    pub const fn pages_since(self, origin: Self) -> u32 {
        assert!(origin.number() <= self.number(), "origin above page");
        self.number() - origin.number()
    }
}
