use bitfield_struct::bitfield;
use kernel_memory_addresses::PhysicalFrame;

/// Page directory base register, for 32-bit paging without PAE.
///
/// Loading it switches the address space and drops every TLB entry that is
/// not global.
#[bitfield(u32)]
pub struct Cr3 {
    #[bits(3)]
    _reserved: u8,

    /// Write-through walks of the directory.
    pub pwt: bool,

    /// Uncached walks of the directory.
    pub pcd: bool,

    #[bits(7)]
    _ignored: u8,

    #[bits(20)]
    directory_frame: u32,
}

impl Cr3 {
    #[must_use]
    pub const fn from_directory(directory: PhysicalFrame) -> Self {
        Self::new().with_directory_frame(directory.number())
    }

    #[must_use]
    pub const fn directory(&self) -> PhysicalFrame {
        PhysicalFrame::from_number(self.directory_frame())
    }
}

#[cfg(all(feature = "asm", target_arch = "x86"))]
impl crate::StoreRegisterUnsafe for Cr3 {
    #[inline]
    unsafe fn store_unsafe(self) {
        let bits = self.into_bits();
        unsafe {
            core::arch::asm!("mov cr3, {}", in(reg) bits, options(nostack, preserves_flags));
        }
    }
}
