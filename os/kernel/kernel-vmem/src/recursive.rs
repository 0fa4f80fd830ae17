//! # Recursive page directory mapping
//!
//! The loader points the last directory slot at the directory itself. The
//! MMU then treats the directory as a page table for the top 4 MiB, so:
//!
//! ```text
//! 0xFFFF_F000                 → the active page directory
//! 0xFFC0_0000 + i * 0x1000    → the page table linked in slot i
//! ```
//!
//! Every mapped page is reachable at its own virtual address, so no
//! separate window onto physical memory is needed.

use kernel_info::memory::{PAGE_DIRECTORY_ADDR, PAGE_TABLES_BASE};
use kernel_memory_addresses::{DirectoryIndex, PAGE_SIZE, VirtualAddress};

/// Virtual address of the active page directory.
#[inline]
#[must_use]
pub const fn directory_address() -> VirtualAddress {
    VirtualAddress::new(PAGE_DIRECTORY_ADDR)
}

/// Virtual address of the page table linked at `index`.
///
/// ```rust
/// # use kernel_memory_addresses::DirectoryIndex;
/// # use kernel_vmem::recursive::table_address;
/// assert_eq!(table_address(DirectoryIndex::new(0)).as_u32(), 0xFFC0_0000);
/// assert_eq!(table_address(DirectoryIndex::new(768)).as_u32(), 0xFFF0_0000);
/// assert_eq!(table_address(DirectoryIndex::new(1023)).as_u32(), 0xFFFF_F000);
/// ```
#[inline]
#[must_use]
pub const fn table_address(index: DirectoryIndex) -> VirtualAddress {
    VirtualAddress::new(PAGE_TABLES_BASE + index.as_u32() * PAGE_SIZE)
}

/// [`PhysMapper`](crate::PhysMapper) for the running kernel, relying on the
/// recursive directory slot.
#[derive(Debug, Default, Copy, Clone)]
pub struct RecursiveMapper;

#[cfg(all(target_arch = "x86", target_os = "none"))]
mod hardware {
    use super::{RecursiveMapper, directory_address, table_address};
    use crate::{PageDirectory, PageTable, PhysMapper};
    use kernel_memory_addresses::{DirectoryIndex, PhysicalFrame, VirtualAddress, VirtualPage};
    use kernel_registers::{Cr3, StoreRegisterUnsafe};

    #[inline]
    fn ptr<T>(va: VirtualAddress) -> *mut T {
        va.as_u32() as usize as *mut T
    }

    impl PhysMapper for RecursiveMapper {
        unsafe fn directory<'a>(&self) -> &'a mut PageDirectory {
            unsafe { &mut *ptr(directory_address()) }
        }

        unsafe fn table<'a>(&self, index: DirectoryIndex, _frame: PhysicalFrame) -> &'a mut PageTable {
            unsafe { &mut *ptr(table_address(index)) }
        }

        fn page_ptr(&self, page: VirtualPage, _frame: PhysicalFrame) -> *mut u8 {
            ptr(page.base())
        }

        fn page_containing(&self, ptr: *const u8) -> Option<VirtualPage> {
            let va = u32::try_from(ptr.addr()).ok()?;
            Some(VirtualPage::containing(VirtualAddress::new(va)))
        }

        fn invalidate(&self, page: VirtualPage) {
            let va = page.base().as_u32();
            unsafe {
                core::arch::asm!("invlpg [{}]", in(reg) va, options(nostack, preserves_flags));
            }
        }

        unsafe fn activate(&self, directory: PhysicalFrame) {
            unsafe { Cr3::from_directory(directory).store_unsafe() };
        }
    }
}
