use crate::memory_address::page_of;
use crate::{MemoryAddress, PhysicalAddress};

/// A 4 KiB frame of physical memory, identified by its base.
///
/// The base is always frame aligned.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalFrame(MemoryAddress);

page_of!(PhysicalFrame, PhysicalAddress, "PhysicalFrame");

impl PhysicalFrame {
    #[inline]
    #[must_use]
    pub const fn add_frames(self, count: u32) -> Self {
        Self::from_number(self.number() + count)
    }
}
