use crate::ENTRIES_PER_TABLE;
use core::fmt;

/// Index into the page directory (bits 31..22 of a virtual address).
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DirectoryIndex(u16);

/// Index into a page table (bits 21..12 of a virtual address).
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TableIndex(u16);

macro_rules! table_index {
    ($ty:ident, $label:literal) => {
        impl $ty {
            /// Creates a new index.
            ///
            /// # Panics
            /// If `index` is not below 1024.
            #[inline]
            #[must_use]
            pub const fn new(index: u16) -> Self {
                assert!((index as usize) < ENTRIES_PER_TABLE, "table index out of range");
                Self(index)
            }

            #[inline]
            #[must_use]
            pub const fn as_usize(self) -> usize {
                self.0 as usize
            }

            #[inline]
            #[must_use]
            pub const fn as_u32(self) -> u32 {
                self.0 as u32
            }
        }

        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "({})"), self.0)
            }
        }

        impl From<$ty> for usize {
            #[inline]
            fn from(value: $ty) -> Self {
                value.as_usize()
            }
        }
    };
}

table_index!(DirectoryIndex, "PDE");
table_index!(TableIndex, "PTE");
