//! The page directory: the root of an address space, loaded into CR3.

use super::entry_common;
use crate::PageEntryBits;
use core::ops::Range;
use kernel_memory_addresses::{DirectoryIndex, ENTRIES_PER_TABLE, PhysicalFrame};

/// A page directory entry. When present it links one page table; the
/// kernel never uses 4 MiB pages.
#[doc(alias = "PDE")]
#[repr(transparent)]
#[derive(Copy, Clone, Debug)]
pub struct PdEntry(PageEntryBits);

entry_common!(PdEntry, table);

impl PdEntry {
    /// Links the page table in `frame`, present and with `PS` clear.
    #[inline]
    #[must_use]
    pub const fn make_table(frame: PhysicalFrame, flags: PageEntryBits) -> Self {
        Self(flags.with_present(true).with_large_page(false).with_frame(frame))
    }
}

#[doc(alias = "PD")]
#[repr(C, align(4096))]
pub struct PageDirectory {
    entries: [PdEntry; ENTRIES_PER_TABLE],
}

impl PageDirectory {
    #[inline]
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            entries: [PdEntry::zero(); ENTRIES_PER_TABLE],
        }
    }

    #[inline]
    #[must_use]
    pub const fn get(&self, index: DirectoryIndex) -> PdEntry {
        self.entries[index.as_usize()]
    }

    #[inline]
    pub const fn set(&mut self, index: DirectoryIndex, entry: PdEntry) {
        self.entries[index.as_usize()] = entry;
    }

    /// Takes over `other`'s entries in `slots`, so both directories share
    /// those page tables.
    pub fn copy_from(&mut self, other: &Self, slots: Range<usize>) {
        self.entries[slots.clone()].copy_from_slice(&other.entries[slots]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_link() {
        let e = PdEntry::make_table(PhysicalFrame::from_number(0x101), PageEntryBits::user_rw());
        assert_eq!(e.raw(), 0x0010_1007);
        assert_eq!(e.table(), Some(PhysicalFrame::from_number(0x101)));
        assert_eq!(PdEntry::zero().table(), None);
    }

    #[test]
    fn copy_shares_kernel_half() {
        let mut kernel = Box::new(PageDirectory::zeroed());
        let slot = DirectoryIndex::new(800);
        kernel.set(
            slot,
            PdEntry::make_table(PhysicalFrame::from_number(0x120), PageEntryBits::user_rw()),
        );
        let mut process = Box::new(PageDirectory::zeroed());
        process.copy_from(&kernel, 768..1023);
        assert_eq!(process.get(slot).raw(), kernel.get(slot).raw());
        assert!(!process.get(DirectoryIndex::new(1023)).is_present());
    }
}
