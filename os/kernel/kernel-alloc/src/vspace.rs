//! # Virtual Address Spaces
//!
//! A [`VirtualAddressSpace`] tracks which pages of a virtual range are
//! reserved, one bit per page. Reserving a page says nothing about whether
//! it is mapped; the page allocator does both.
//!
//! The kernel has one space starting at the kernel heap. Every process has
//! its own, covering user memory from [`USER_VADDR_START`] up to the kernel
//! half.

use kernel_collections::Bitmap;
use kernel_info::boot::PageRange;
use kernel_info::memory::{KERNEL_VIRTUAL_BASE, USER_VADDR_START};
use kernel_memory_addresses::{PAGE_SIZE, VirtualAddress, VirtualPage};
use log::trace;

/// Errors of [`VirtualAddressSpace`] reservations.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum VirtualSpaceError {
    #[error("no run of free virtual pages is long enough")]
    OutOfMemory,
    #[error("virtual page is already reserved")]
    Occupied,
}

/// Bitmap-tracked range of virtual pages.
pub struct VirtualAddressSpace {
    bitmap: Bitmap,
    base: VirtualPage,
}

impl VirtualAddressSpace {
    /// A space over `range` with the bitmap in `storage`, taken as is.
    ///
    /// # Panics
    /// If `storage` is too small for `range.pages` bits.
    pub fn new(storage: &'static mut [u8], range: PageRange) -> Self {
        Self {
            bitmap: Bitmap::new(storage, range.pages as usize),
            base: range.base,
        }
    }

    /// Like [`new`](Self::new) but with every page free.
    pub fn new_cleared(storage: &'static mut [u8], range: PageRange) -> Self {
        let mut space = Self::new(storage, range);
        space.bitmap.init();
        space
    }

    /// The range every user space covers.
    #[must_use]
    pub const fn user_range() -> PageRange {
        PageRange {
            base: VirtualPage::containing(VirtualAddress::new(USER_VADDR_START)),
            pages: (KERNEL_VIRTUAL_BASE - USER_VADDR_START) / PAGE_SIZE,
        }
    }

    /// Bitmap bytes of a user space.
    #[must_use]
    pub const fn user_bitmap_bytes() -> usize {
        Self::user_range().pages.div_ceil(8) as usize
    }

    /// Reserves the first run of `count` free pages.
    ///
    /// # Errors
    /// [`VirtualSpaceError::OutOfMemory`] if no run is long enough.
    pub fn reserve(&mut self, count: u32) -> Result<VirtualPage, VirtualSpaceError> {
        let index = self
            .bitmap
            .scan(count as usize)
            .ok_or(VirtualSpaceError::OutOfMemory)?;
        self.bitmap.set_range(index, count as usize, true);
        let page = self.page_at(index);
        trace!("Reserved {count} page(s) at {page:?}");
        Ok(page)
    }

    /// Reserves exactly `page`.
    ///
    /// # Errors
    /// [`VirtualSpaceError::Occupied`] if `page` is already reserved.
    ///
    /// # Panics
    /// If `page` lies outside the space.
    pub fn reserve_at(&mut self, page: VirtualPage) -> Result<(), VirtualSpaceError> {
        let index = self.index_of(page);
        if self.bitmap.test(index) {
            return Err(VirtualSpaceError::Occupied);
        }
        self.bitmap.set(index, true);
        trace!("Reserved {page:?}");
        Ok(())
    }

    /// Releases `count` pages from `page` on.
    ///
    /// # Panics
    /// If any of the pages lies outside the space or is not reserved.
    pub fn release(&mut self, page: VirtualPage, count: u32) {
        let start = self.index_of(page);
        for index in start..start + count as usize {
            assert!(
                self.bitmap.test(index),
                "{:?} released but not reserved",
                self.page_at(index)
            );
        }
        self.bitmap.set_range(start, count as usize, false);
        trace!("Released {count} page(s) at {page:?}");
    }

    /// Whether `page` lies inside the space and is reserved.
    #[must_use]
    pub fn is_reserved(&self, page: VirtualPage) -> bool {
        self.contains(page) && self.bitmap.test(self.index_of(page))
    }

    /// Whether `page` lies inside the space.
    #[must_use]
    pub fn contains(&self, page: VirtualPage) -> bool {
        page >= self.base && ((page.pages_since(self.base)) as usize) < self.bitmap.len()
    }

    #[inline]
    #[must_use]
    pub const fn base(&self) -> VirtualPage {
        self.base
    }

    #[must_use]
    pub fn pages(&self) -> usize {
        self.bitmap.len()
    }

    #[must_use]
    pub fn reserved_pages(&self) -> usize {
        self.bitmap.count_used()
    }

    fn index_of(&self, page: VirtualPage) -> usize {
        assert!(
            page >= self.base,
            "{page:?} lies below the space at {:?}",
            self.base
        );
        page.pages_since(self.base) as usize
    }

    #[allow(clippy::cast_possible_truncation)]
    const fn page_at(&self, index: usize) -> VirtualPage {
        self.base.add_pages(index as u32)
    }
}

impl core::fmt::Debug for VirtualAddressSpace {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("VirtualAddressSpace")
            .field("base", &self.base)
            .field("pages", &self.pages())
            .field("reserved", &self.reserved_pages())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_info::memory::{KERNEL_HEAP_START, USER_STACK_PAGE};

    fn page(addr: u32) -> VirtualPage {
        VirtualPage::containing(VirtualAddress::new(addr))
    }

    fn space(pages: u32) -> VirtualAddressSpace {
        let storage = vec![0xFF_u8; pages.div_ceil(8) as usize].leak();
        VirtualAddressSpace::new_cleared(
            storage,
            PageRange {
                base: page(KERNEL_HEAP_START),
                pages,
            },
        )
    }

    #[test]
    fn reserve_is_first_fit() {
        let mut space = space(16);
        let a = space.reserve(3).unwrap();
        let b = space.reserve(2).unwrap();
        assert_eq!(a, page(0xC010_0000));
        assert_eq!(b, page(0xC010_3000));

        space.release(a, 3);
        assert_eq!(space.reserve(2).unwrap(), a);
        assert_eq!(space.reserve(4).unwrap(), page(0xC010_5000));
        assert_eq!(space.reserved_pages(), 8);
    }

    #[test]
    fn exhaustion() {
        let mut space = space(4);
        assert_eq!(space.reserve(5), Err(VirtualSpaceError::OutOfMemory));
        space.reserve(4).unwrap();
        assert_eq!(space.reserve(1), Err(VirtualSpaceError::OutOfMemory));
    }

    #[test]
    fn reserve_at_claims_one_page() {
        let mut space = space(8);
        let target = page(0xC010_2000);
        space.reserve_at(target).unwrap();
        assert!(space.is_reserved(target));
        assert_eq!(space.reserve_at(target), Err(VirtualSpaceError::Occupied));
        assert_eq!(space.reserve(3).unwrap(), page(0xC010_3000));
    }

    #[test]
    fn is_reserved_outside_the_space() {
        let space = space(8);
        assert!(!space.is_reserved(page(0xC000_0000)));
        assert!(!space.is_reserved(page(0xC010_8000)));
    }

    #[test]
    #[should_panic(expected = "released but not reserved")]
    fn releasing_free_pages_panics() {
        let mut space = space(8);
        let a = space.reserve(1).unwrap();
        space.release(a, 2);
    }

    #[test]
    fn user_range_ends_below_the_kernel() {
        let range = VirtualAddressSpace::user_range();
        assert_eq!(range.base, page(USER_VADDR_START));
        assert_eq!(range.base.add_pages(range.pages - 1), page(USER_STACK_PAGE));
        assert_eq!(VirtualAddressSpace::user_bitmap_bytes(), 94_199);
    }
}
