use crate::memory_address::tagged_address;
use crate::{MemoryAddress, VirtualPage};

/// An address as the running code sees it, translated by the page tables.
///
/// ```rust
/// # use kernel_memory_addresses::*;
/// let va = VirtualAddress::new(0xC009_A123);
/// let (page, offset) = va.split();
/// assert_eq!(page.base().as_u32(), 0xC009_A000);
/// assert_eq!(page.join(offset), va);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualAddress(pub(crate) MemoryAddress);

tagged_address!(VirtualAddress, VirtualPage, "VA");

impl VirtualAddress {
    #[inline]
    #[must_use]
    pub const fn page(self) -> VirtualPage {
        VirtualPage::containing(self)
    }

    #[inline]
    #[must_use]
    pub const fn is_page_aligned(self) -> bool {
        self.0.is_page_aligned()
    }
}
