//! # Memory Layout

use kernel_memory_addresses::PAGE_SIZE;

/// Start of the kernel's half of every address space.
pub const KERNEL_VIRTUAL_BASE: u32 = 0xC000_0000;

/// Bytes of low physical memory holding the BIOS area and the kernel image.
pub const LOW_MEMORY_BYTES: u32 = 0x0010_0000;

/// Physical address of the page directory built by the loader.
pub const DEFAULT_PAGE_DIRECTORY: u32 = 0x0010_0000;

/// Frames reserved right after low memory: the page directory and the
/// kernel page tables pre-allocated by the loader.
pub const BOOT_PAGE_TABLE_FRAMES: u32 = 256;

/// Physical memory not handed to any pool.
pub const RESERVED_PHYSICAL_BYTES: u32 = LOW_MEMORY_BYTES + BOOT_PAGE_TABLE_FRAMES * PAGE_SIZE;

/// First page-directory slot of the kernel half.
pub const KERNEL_DIRECTORY_START: u16 = 768;

/// Page-directory slot that maps the directory onto itself.
pub const RECURSIVE_DIRECTORY_SLOT: u16 = 1023;

/// Virtual address at which the active page directory is visible.
pub const PAGE_DIRECTORY_ADDR: u32 = 0xFFFF_F000;

/// Virtual address at which page table `0` is visible; table `i` follows at
/// `PAGE_TABLES_BASE + i * PAGE_SIZE`.
pub const PAGE_TABLES_BASE: u32 = 0xFFC0_0000;

/// Where the pool and kernel virtual-space bitmaps are stored.
pub const MEM_BITMAP_BASE: u32 = 0xC009_A000;

/// Bytes available for bitmaps before the boot thread's control block.
pub const MEM_BITMAP_BYTES: u32 = 4 * PAGE_SIZE;

/// Control block (and stack) of the boot thread.
pub const MAIN_THREAD_TCB: u32 = MEM_BITMAP_BASE + MEM_BITMAP_BYTES;

/// First virtual address handed out by the kernel page allocator.
pub const KERNEL_HEAP_START: u32 = 0xC010_0000;

/// First virtual address of a user process image.
pub const USER_VADDR_START: u32 = 0x0804_8000;

/// The page right below the kernel half, reserved for the initial user stack.
pub const USER_STACK_PAGE: u32 = KERNEL_VIRTUAL_BASE - PAGE_SIZE;

/// Upper bound (exclusive) on the page count of a single page allocation.
pub const MAX_PAGES_PER_REQUEST: u32 = 3840;

/// Virtual address the loader places the kernel image at.
pub const KERNEL_IMAGE_BASE: u32 = 0xC000_1500;

/// Where the loader stores the detected amount of memory, in bytes.
pub const TOTAL_MEMORY_ADDR: u32 = 0x0000_0B00;

const _: () = {
    assert!(RESERVED_PHYSICAL_BYTES == 0x0020_0000);
    assert!(KERNEL_IMAGE_BASE < MEM_BITMAP_BASE);
    assert!(KERNEL_HEAP_START > MAIN_THREAD_TCB);
    assert!(KERNEL_HEAP_START < PAGE_TABLES_BASE);
    assert!(USER_STACK_PAGE > USER_VADDR_START);
    assert!(PAGE_TABLES_BASE == (RECURSIVE_DIRECTORY_SLOT as u32) << 22);
    assert!(KERNEL_VIRTUAL_BASE == (KERNEL_DIRECTORY_START as u32) << 22);
};
