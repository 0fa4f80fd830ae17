use crate::{PAGE_SIZE, PageOffset};
use core::fmt;

/// A raw 32-bit address that has not been tagged virtual or physical.
///
/// Both address kinds and both page kinds are built on it.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct MemoryAddress(u32);

impl MemoryAddress {
    #[inline]
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn offset(self) -> PageOffset {
        PageOffset::new(self.0)
    }

    #[inline]
    #[must_use]
    pub const fn align_down(self) -> Self {
        Self(self.0 & !(PAGE_SIZE - 1))
    }

    #[inline]
    #[must_use]
    pub const fn is_page_aligned(self) -> bool {
        self.offset().as_u32() == 0
    }
}

impl fmt::Debug for MemoryAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Implements the common surface of a tagged address type: construction,
/// the page split, and formatting with `$tag` as the `Debug` prefix.
macro_rules! tagged_address {
    ($addr:ident, $page:ident, $tag:literal) => {
        impl $addr {
            #[inline]
            #[must_use]
            pub const fn new(value: u32) -> Self {
                Self($crate::MemoryAddress::new(value))
            }

            #[inline]
            #[must_use]
            pub const fn as_u32(self) -> u32 {
                self.0.as_u32()
            }

            #[inline]
            #[must_use]
            pub const fn offset(self) -> $crate::PageOffset {
                self.0.offset()
            }

            /// The containing page and the byte offset within it.
            #[inline]
            #[must_use]
            pub const fn split(self) -> ($page, $crate::PageOffset) {
                ($page::containing(self), self.offset())
            }
        }

        impl core::fmt::Debug for $addr {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, concat!($tag, "(0x{:08X})"), self.as_u32())
            }
        }

        impl core::fmt::Display for $addr {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "0x{:08X}", self.as_u32())
            }
        }

        impl From<$page> for $addr {
            #[inline]
            fn from(page: $page) -> Self {
                page.base()
            }
        }
    };
}

/// Implements a 4 KiB page type over the tagged address `$addr`.
macro_rules! page_of {
    ($page:ident, $addr:ident, $name:literal) => {
        impl $page {
            /// The page `addr` lies in.
            #[inline]
            #[must_use]
            pub const fn containing(addr: $addr) -> Self {
                Self(addr.0.align_down())
            }

            /// The page starting at `number * PAGE_SIZE`.
            #[inline]
            #[must_use]
            pub const fn from_number(number: u32) -> Self {
                Self($crate::MemoryAddress::new(number << $crate::PAGE_SHIFT))
            }

            #[inline]
            #[must_use]
            pub const fn number(self) -> u32 {
                self.0.as_u32() >> $crate::PAGE_SHIFT
            }

            #[inline]
            #[must_use]
            pub const fn base(self) -> $addr {
                $addr(self.0)
            }

            #[inline]
            #[must_use]
            pub const fn join(self, offset: $crate::PageOffset) -> $addr {
                $addr::new(self.0.as_u32() | offset.as_u32())
            }
        }

        impl core::fmt::Debug for $page {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, concat!($name, "(0x{:08X})"), self.0.as_u32())
            }
        }

        impl core::fmt::Display for $page {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.base(), f)
            }
        }

        /// Fails unless the address is page aligned.
        impl TryFrom<$addr> for $page {
            type Error = $addr;

            #[inline]
            fn try_from(addr: $addr) -> Result<Self, $addr> {
                if addr.0.is_page_aligned() {
                    Ok(Self(addr.0))
                } else {
                    Err(addr)
                }
            }
        }
    };
}

pub(crate) use {page_of, tagged_address};
