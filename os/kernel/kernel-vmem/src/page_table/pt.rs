//! Page tables: each maps 1024 pages of 4 KiB.

use super::entry_common;
use crate::PageEntryBits;
use kernel_memory_addresses::{ENTRIES_PER_TABLE, PhysicalFrame, TableIndex};

#[doc(alias = "PTE")]
#[repr(transparent)]
#[derive(Copy, Clone, Debug)]
pub struct PtEntry(PageEntryBits);

entry_common!(PtEntry, frame);

impl PtEntry {
    #[inline]
    #[must_use]
    pub const fn make_4k(frame: PhysicalFrame, flags: PageEntryBits) -> Self {
        Self(flags.with_present(true).with_frame(frame))
    }

    /// Clears only the present bit; the stale frame number is ignored by
    /// the MMU.
    #[inline]
    #[must_use]
    pub const fn not_present(self) -> Self {
        Self(self.0.with_present(false))
    }
}

#[doc(alias = "PT")]
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [PtEntry; ENTRIES_PER_TABLE],
}

impl PageTable {
    #[inline]
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            entries: [PtEntry::zero(); ENTRIES_PER_TABLE],
        }
    }

    /// Unmaps everything. Used on freshly allocated table frames, which
    /// hold whatever the previous owner left.
    #[inline]
    pub fn clear(&mut self) {
        self.entries.fill(PtEntry::zero());
    }

    #[inline]
    #[must_use]
    pub const fn get(&self, index: TableIndex) -> PtEntry {
        self.entries[index.as_usize()]
    }

    #[inline]
    pub const fn set(&mut self, index: TableIndex, entry: PtEntry) {
        self.entries[index.as_usize()] = entry;
    }

    #[must_use]
    pub fn present_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_present()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_mapping() {
        let e = PtEntry::make_4k(PhysicalFrame::from_number(0x5555), PageEntryBits::user_rw());
        assert_eq!(e.frame(), Some(PhysicalFrame::from_number(0x5555)));
        assert!(e.flags().user_access() && e.flags().writable());

        let gone = e.not_present();
        assert!(!gone.is_present());
        assert_eq!(gone.frame(), None);
    }

    #[test]
    fn clear_unmaps_all() {
        let mut table = Box::new(PageTable::zeroed());
        let e = PtEntry::make_4k(PhysicalFrame::from_number(1), PageEntryBits::user_rw());
        table.set(TableIndex::new(0), e);
        table.set(TableIndex::new(1023), e);
        assert_eq!(table.present_count(), 2);
        table.clear();
        assert_eq!(table.present_count(), 0);
    }
}
