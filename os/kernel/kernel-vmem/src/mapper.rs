//! # Page Mapper
//!
//! Installs, removes and looks up single 4 KiB mappings in the **active**
//! page directory.
//!
//! - [`PageMapper::map`] walks the directory, creates the page table on
//!   first use (taking a frame from the supplied [`FrameAlloc`] and zeroing
//!   it) and writes the leaf entry.
//! - [`PageMapper::unmap`] clears the present bit of a leaf and drops its
//!   TLB entry. Page tables are never reclaimed.
//! - [`PageMapper::translate`] resolves a virtual address.
//!
//! Every new link and leaf is created present, writable and user
//! accessible. What user code may actually reach is decided by which
//! directory is active and which virtual ranges a process reserves.

use crate::{FrameAlloc, PageEntryBits, PageTable, PdEntry, PhysMapper, PtEntry};
use core::ptr::NonNull;
use kernel_memory_addresses::{PhysicalAddress, PhysicalFrame, VirtualAddress, VirtualPage};
use log::trace;

/// Errors of [`PageMapper::map`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum MapError {
    #[error("no frame left for a page table")]
    OutOfMemory,
}

/// Page table walker over a [`PhysMapper`].
pub struct PageMapper<M: PhysMapper> {
    phys: M,
}

impl<M: PhysMapper> PageMapper<M> {
    pub const fn new(phys: M) -> Self {
        Self { phys }
    }

    /// The underlying physical mapper.
    #[inline]
    pub const fn phys(&self) -> &M {
        &self.phys
    }

    /// Map `page → frame` in the active directory.
    ///
    /// # Errors
    /// [`MapError::OutOfMemory`] if a page table is needed and `alloc` has no
    /// frame left. Nothing is modified in that case.
    ///
    /// # Panics
    /// If `page` is already mapped.
    pub fn map<A: FrameAlloc>(
        &mut self,
        alloc: &mut A,
        page: VirtualPage,
        frame: PhysicalFrame,
    ) -> Result<(), MapError> {
        let (di, ti) = (page.directory_index(), page.table_index());

        // SAFETY: `&mut self` serializes all walks through this mapper.
        let directory = unsafe { self.phys.directory() };
        let table_frame = if let Some(table) = directory.get(di).table() {
            table
        } else {
            let table = alloc.alloc_frame().ok_or(MapError::OutOfMemory)?;
            directory.set(di, PdEntry::make_table(table, PageEntryBits::user_rw()));
            unsafe { self.phys.table(di, table) }.clear();
            trace!("New page table {table:?} for {di:?}");
            table
        };

        let table = unsafe { self.phys.table(di, table_frame) };
        let existing = table.get(ti);
        assert!(
            !existing.is_present(),
            "{page:?} is already mapped to {:?}",
            existing.frame()
        );
        table.set(ti, PtEntry::make_4k(frame, PageEntryBits::user_rw()));
        Ok(())
    }

    /// Remove the mapping of `page` and invalidate its TLB entry.
    ///
    /// Returns the frame that was mapped. The frame itself is not freed.
    ///
    /// # Panics
    /// If `page` is not mapped.
    pub fn unmap(&mut self, page: VirtualPage) -> PhysicalFrame {
        let table = self
            .table_mut(page)
            .unwrap_or_else(|| panic!("{page:?} has no page table"));
        let ti = page.table_index();
        let entry = table.get(ti);
        let Some(frame) = entry.frame() else {
            panic!("{page:?} is not mapped");
        };
        table.set(ti, entry.not_present());
        self.phys.invalidate(page);
        frame
    }

    /// The frame `page` is mapped to, if any.
    #[must_use]
    pub fn frame_of(&self, page: VirtualPage) -> Option<PhysicalFrame> {
        // SAFETY: read-only walk; the references do not escape.
        let directory = unsafe { self.phys.directory() };
        let di = page.directory_index();
        let table_frame = directory.get(di).table()?;
        let table = unsafe { self.phys.table(di, table_frame) };
        table.get(page.table_index()).frame()
    }

    /// Translate `va` to the physical address it is mapped to.
    #[must_use]
    pub fn translate(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        let (page, offset) = va.split();
        self.frame_of(page).map(|frame| frame.join(offset))
    }

    /// Pointer to the start of `page`, if mapped.
    #[must_use]
    pub fn page_ptr(&self, page: VirtualPage) -> Option<NonNull<u8>> {
        let frame = self.frame_of(page)?;
        NonNull::new(self.phys.page_ptr(page, frame))
    }

    /// Switch to the page directory in `directory`.
    ///
    /// # Safety
    /// See [`PhysMapper::activate`].
    pub unsafe fn activate(&self, directory: PhysicalFrame) {
        unsafe { self.phys.activate(directory) };
    }

    fn table_mut(&mut self, page: VirtualPage) -> Option<&mut PageTable> {
        let directory = unsafe { self.phys.directory() };
        let di = page.directory_index();
        let table_frame = directory.get(di).table()?;
        Some(unsafe { self.phys.table(di, table_frame) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedMemory;
    use kernel_memory_addresses::DirectoryIndex;

    /// A trivial **bump** allocator: always hands out the next frame.
    struct BumpAlloc {
        next: PhysicalFrame,
        end: PhysicalFrame,
    }

    impl FrameAlloc for BumpAlloc {
        fn alloc_frame(&mut self) -> Option<PhysicalFrame> {
            if self.next >= self.end {
                return None;
            }
            let f = self.next;
            self.next = f.add_frames(1);
            Some(f)
        }
    }

    fn setup() -> (PageMapper<SimulatedMemory>, BumpAlloc) {
        let mem = SimulatedMemory::boot(0x40_0000);
        let alloc = BumpAlloc {
            next: PhysicalFrame::from_number(0x200),
            end: PhysicalFrame::from_number(0x210),
        };
        (PageMapper::new(mem), alloc)
    }

    fn page(addr: u32) -> VirtualPage {
        VirtualPage::containing(VirtualAddress::new(addr))
    }

    #[test]
    fn map_in_kernel_half_uses_boot_tables() {
        let (mut m, mut alloc) = setup();
        let frame = PhysicalFrame::from_number(0x300);
        m.map(&mut alloc, page(0xC010_0000), frame).unwrap();

        // no new table was needed
        assert_eq!(alloc.next, PhysicalFrame::from_number(0x200));
        assert_eq!(
            m.translate(VirtualAddress::new(0xC010_0123)),
            Some(PhysicalAddress::new(0x0030_0123))
        );
    }

    #[test]
    fn map_creates_zeroed_table_on_demand() {
        let (mut m, mut alloc) = setup();
        m.map(&mut alloc, page(0x0804_8000), PhysicalFrame::from_number(0x300))
            .unwrap();
        m.map(&mut alloc, page(0x0804_9000), PhysicalFrame::from_number(0x301))
            .unwrap();

        // one table for both pages
        assert_eq!(alloc.next, PhysicalFrame::from_number(0x201));
        let pde = unsafe { m.phys().directory() }.get(DirectoryIndex::new(0x20));
        assert_eq!(pde.table(), Some(PhysicalFrame::from_number(0x200)));
        assert!(pde.flags().user_access() && pde.flags().writable());

        // the fresh table was zeroed apart from the two leaves
        let table = unsafe { m.phys().table(DirectoryIndex::new(0x20), PhysicalFrame::from_number(0x200)) };
        assert_eq!(table.present_count(), 2);
    }

    #[test]
    fn map_fails_cleanly_without_table_frame() {
        let (mut m, _) = setup();
        let mut empty = BumpAlloc {
            next: PhysicalFrame::from_number(0x200),
            end: PhysicalFrame::from_number(0x200),
        };
        assert_eq!(
            m.map(&mut empty, page(0x0804_8000), PhysicalFrame::from_number(0x300)),
            Err(MapError::OutOfMemory)
        );
        assert_eq!(m.translate(VirtualAddress::new(0x0804_8000)), None);
    }

    #[test]
    #[should_panic(expected = "already mapped")]
    fn double_map_is_fatal() {
        let (mut m, mut alloc) = setup();
        let p = page(0xC010_0000);
        m.map(&mut alloc, p, PhysicalFrame::from_number(0x300)).unwrap();
        let _ = m.map(&mut alloc, p, PhysicalFrame::from_number(0x301));
    }

    #[test]
    fn unmap_clears_and_invalidates() {
        let (mut m, mut alloc) = setup();
        let p = page(0xC010_1000);
        m.map(&mut alloc, p, PhysicalFrame::from_number(0x302)).unwrap();
        assert_eq!(m.unmap(p), PhysicalFrame::from_number(0x302));
        assert_eq!(m.frame_of(p), None);
        assert_eq!(m.phys().invalidations(), [p]);

        // the page can be mapped again
        m.map(&mut alloc, p, PhysicalFrame::from_number(0x303)).unwrap();
        assert_eq!(m.frame_of(p), Some(PhysicalFrame::from_number(0x303)));
    }

    #[test]
    fn page_ptr_reaches_the_frame() {
        let (mut m, mut alloc) = setup();
        let p = page(0xC010_2000);
        m.map(&mut alloc, p, PhysicalFrame::from_number(0x304)).unwrap();
        let ptr = m.page_ptr(p).expect("mapped");
        unsafe { ptr.as_ptr().write(0x5A) };
        assert_eq!(m.phys().read_byte(PhysicalAddress::new(0x0030_4000)), 0x5A);
        assert!(m.page_ptr(page(0xC010_3000)).is_none());
    }
}
