use crate::memory_address::tagged_address;
use crate::{MemoryAddress, PhysicalFrame};

/// An address on the memory bus. Page table entries and CR3 hold these.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalAddress(pub(crate) MemoryAddress);

tagged_address!(PhysicalAddress, PhysicalFrame, "PA");

impl PhysicalAddress {
    #[inline]
    #[must_use]
    pub const fn frame(self) -> PhysicalFrame {
        PhysicalFrame::containing(self)
    }
}
