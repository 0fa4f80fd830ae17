use bitfield_struct::bitfield;
use kernel_memory_addresses::PhysicalFrame;

/// A single 32-bit page directory or page table entry in its raw bitfield form.
///
/// ### Bit layout
///
/// | Bits  | Name / Mnemonic | Meaning |
/// |-------|-----------------|---------|
/// | 0     | `P` (present)   | Valid entry if set |
/// | 1     | `RW`            | Writable if set |
/// | 2     | `US`            | User-mode accessible if set |
/// | 3     | `PWT`           | Write-through caching |
/// | 4     | `PCD`           | Disable caching |
/// | 5     | `A`             | Accessed |
/// | 6     | `D`             | Dirty (PTE only) |
/// | 7     | `PS` / `PAT`    | 4 MiB page (PDE) or PAT (PTE); always 0 here |
/// | 8     | `G`             | Global (PTE only) |
/// | 9–11  | OS avail        | Reserved for OS use |
/// | 12–31 | `frame`         | Physical frame number |
///
/// ### Example
/// ```rust
/// # use kernel_memory_addresses::PhysicalFrame;
/// # use kernel_vmem::PageEntryBits;
/// let e = PageEntryBits::user_rw().with_frame_number(0x123);
/// assert!(e.present());
/// assert_eq!(e.frame(), PhysicalFrame::from_number(0x123));
/// assert_eq!(e.into_bits(), 0x0012_3007);
/// ```
#[bitfield(u32)]
pub struct PageEntryBits {
    pub present: bool,
    pub writable: bool,
    /// Ring 3 may access the page. Must be set on both levels.
    pub user_access: bool,
    pub write_through: bool,
    pub cache_disabled: bool,
    /// Set by the CPU.
    pub accessed: bool,
    /// Set by the CPU on write, PTE only.
    pub dirty: bool,
    /// `PS` in a PDE, `PAT` in a PTE.
    pub large_page: bool,
    pub global_translation: bool,
    #[bits(3)]
    pub os_available: u8,
    #[bits(20)]
    pub frame_number: u32,
}

impl PageEntryBits {
    /// Present, writable, user-accessible: what every mapping and every page
    /// table link is created with.
    #[inline]
    #[must_use]
    pub const fn user_rw() -> Self {
        Self::new()
            .with_present(true)
            .with_writable(true)
            .with_user_access(true)
    }

    #[inline]
    #[must_use]
    pub const fn frame(&self) -> PhysicalFrame {
        PhysicalFrame::from_number(self.frame_number())
    }

    #[inline]
    #[must_use]
    pub const fn with_frame(self, frame: PhysicalFrame) -> Self {
        self.with_frame_number(frame.number())
    }
}
