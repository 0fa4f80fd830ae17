//! # Page Directory and Page Table
//!
//! ```text
//!  PageDirectory (1 per space)        PageTable (1 per 4 MiB in use)
//! +-----------------------+          +-----------------------+
//! | PdEntry 0    ---------+--------> | PtEntry 0   -> frame  |
//! | ...                   |          | ...                   |
//! | PdEntry 1023 (self)   |          | PtEntry 1023 -> frame |
//! +-----------------------+          +-----------------------+
//! ```
//!
//! Both are 4 KiB-aligned arrays of 1024 four-byte entries. Changing an
//! entry of the active space leaves TLB maintenance to the caller.

pub mod pd;
pub mod pt;

const _: () = {
    assert!(size_of::<pd::PageDirectory>() == 4096);
    assert!(size_of::<pt::PageTable>() == 4096);
    assert!(align_of::<pd::PageDirectory>() == 4096);
};

/// Entry accessors shared by PDEs and PTEs. `$target` names what a present
/// entry points at.
macro_rules! entry_common {
    ($entry:ident, $target:ident) => {
        impl $entry {
            #[inline]
            #[must_use]
            pub const fn zero() -> Self {
                Self($crate::PageEntryBits::new())
            }

            #[inline]
            #[must_use]
            pub const fn is_present(self) -> bool {
                self.0.present()
            }

            #[inline]
            #[must_use]
            pub const fn flags(self) -> $crate::PageEntryBits {
                self.0
            }

            #[inline]
            #[must_use]
            pub const fn raw(self) -> u32 {
                self.0.into_bits()
            }

            #[inline]
            #[must_use]
            pub const fn $target(self) -> Option<kernel_memory_addresses::PhysicalFrame> {
                if self.is_present() {
                    Some(self.0.frame())
                } else {
                    None
                }
            }
        }
    };
}

pub(crate) use entry_common;
