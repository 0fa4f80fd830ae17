//! # Block Heap
//!
//! Sub-page allocations served from seven size classes of 16 to 1024 bytes.
//! Each class carves whole pages ("arenas") into equal blocks and keeps the
//! free ones on an intrusive list. Requests above 1024 bytes get their own
//! run of pages.
//!
//! ```text
//!  small arena (one page)                   large arena (n pages)
//! ┌──────────────┐                         ┌──────────────┐
//! │ ArenaHeader  │ class = Some(k)         │ ArenaHeader  │ large, count = n
//! ├──────────────┤ count = free blocks     ├──────────────┤
//! │ block 0      │ ◄── free list           │              │
//! │ block 1      │                         │ payload      │ ◄── returned pointer
//! │ ...          │                         │              │
//! └──────────────┘                         └──────────────┘
//! ```
//!
//! Every pointer handed out lies in the first page of its arena, so the
//! header is found by rounding the pointer down to a page boundary. The
//! header carries a magic value and its own virtual page; [`free`] checks
//! both, plus that the page is still reserved and still maps to the memory
//! the pointer points into, before trusting anything else in it.
//!
//! The kernel has one set of size classes, every process another.
//!
//! [`free`]: MemoryManager::free

use crate::manager::{MemoryManager, PageAllocError, Space};
use core::mem::size_of;
use core::ptr::NonNull;
use kernel_collections::{Link, List};
use kernel_memory_addresses::{PAGE_SIZE, VirtualPage};
use kernel_sync::SpinMutex;
use kernel_vmem::PhysMapper;
use log::trace;

/// Block sizes of the seven size classes.
pub const BLOCK_SIZES: [usize; BLOCK_CLASSES] = [16, 32, 64, 128, 256, 512, 1024];

pub const BLOCK_CLASSES: usize = 7;

/// Largest request served from a size class.
pub const MAX_BLOCK_SIZE: usize = BLOCK_SIZES[BLOCK_CLASSES - 1];

const ARENA_MAGIC: u32 = 0x19A7_E4A0;

/// Bytes taken by the header at the start of every arena.
pub const ARENA_HEADER_SIZE: usize = size_of::<ArenaHeader>();

/// Errors of [`MemoryManager::malloc`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum AllocError {
    #[error("out of memory")]
    OutOfMemory,
    #[error("invalid allocation size")]
    InvalidSize,
}

impl From<PageAllocError> for AllocError {
    fn from(e: PageAllocError) -> Self {
        match e {
            PageAllocError::InvalidPageCount => Self::InvalidSize,
            PageAllocError::OutOfPhysicalMemory | PageAllocError::OutOfVirtualSpace => {
                Self::OutOfMemory
            }
        }
    }
}

#[repr(C, align(16))]
struct ArenaHeader {
    magic: u32,
    page: VirtualPage,
    /// Free blocks of a small arena, pages of a large one.
    count: u32,
    class: Option<u8>,
    large: bool,
}

const _: () = assert!(ARENA_HEADER_SIZE == 16);

/// One size class: its block geometry and the free blocks of all its
/// arenas.
pub struct BlockClass {
    block_size: usize,
    blocks_per_arena: usize,
    free_list: List,
}

impl BlockClass {
    const fn new(block_size: usize) -> Self {
        Self {
            block_size,
            blocks_per_arena: (PAGE_SIZE as usize - ARENA_HEADER_SIZE) / block_size,
            free_list: List::new(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn block_size(&self) -> usize {
        self.block_size
    }

    #[inline]
    #[must_use]
    pub const fn blocks_per_arena(&self) -> usize {
        self.blocks_per_arena
    }

    #[inline]
    #[must_use]
    pub const fn free_blocks(&self) -> usize {
        self.free_list.len()
    }
}

/// The seven size classes of one address space.
pub struct BlockDescriptors {
    classes: [BlockClass; BLOCK_CLASSES],
}

impl Default for BlockDescriptors {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockDescriptors {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            classes: [
                BlockClass::new(BLOCK_SIZES[0]),
                BlockClass::new(BLOCK_SIZES[1]),
                BlockClass::new(BLOCK_SIZES[2]),
                BlockClass::new(BLOCK_SIZES[3]),
                BlockClass::new(BLOCK_SIZES[4]),
                BlockClass::new(BLOCK_SIZES[5]),
                BlockClass::new(BLOCK_SIZES[6]),
            ],
        }
    }

    #[must_use]
    pub const fn class(&self, index: usize) -> &BlockClass {
        &self.classes[index]
    }

    /// Index of the smallest class whose blocks hold `size` bytes.
    #[must_use]
    pub fn class_for(size: usize) -> Option<usize> {
        BLOCK_SIZES.iter().position(|&block| block >= size)
    }
}

impl<M: PhysMapper> MemoryManager<M> {
    /// Allocates `size` zeroed bytes in `space`.
    ///
    /// # Errors
    /// - [`AllocError::InvalidSize`] if `size` is zero or not smaller than
    ///   the pool backing `space`. No lock is taken in that case.
    /// - [`AllocError::OutOfMemory`] if no page could be allocated.
    pub fn malloc(&self, space: Space<'_>, size: usize) -> Result<NonNull<u8>, AllocError> {
        if size == 0 || size >= self.pool_size(space) {
            return Err(AllocError::InvalidSize);
        }

        let Some(class) = BlockDescriptors::class_for(size) else {
            return self.alloc_large(space, size);
        };

        let mut heap = self.heap(space).lock_irq();
        let descriptor = &mut heap.classes[class];
        if descriptor.free_list.is_empty() {
            self.new_arena(space, class, descriptor)?;
        }
        let Some(link) = descriptor.free_list.pop_front() else {
            unreachable!("a fresh arena has free blocks");
        };

        let block = link.cast::<u8>();
        // SAFETY: blocks on a free list lie in live arenas of this space.
        unsafe {
            (*arena_of(block).as_ptr()).count -= 1;
            block.as_ptr().write_bytes(0, descriptor.block_size);
        }
        trace!("malloc({space:?}, {size}) = {block:p}");
        Ok(block)
    }

    /// Returns memory obtained from [`malloc`](Self::malloc).
    ///
    /// # Safety
    /// `ptr` must come from `malloc` on the same `space` and must not have
    /// been freed since.
    ///
    /// # Panics
    /// If `ptr` does not lead back to a valid arena of `space`.
    pub unsafe fn free(&self, space: Space<'_>, ptr: NonNull<u8>) {
        let mut heap = self.heap(space).lock_irq();
        let arena = self.validated_arena(space, ptr);
        // SAFETY: validated above; the heap lock serializes header access.
        let header = unsafe { &mut *arena.as_ptr() };

        if header.large {
            let (page, count) = (header.page, header.count);
            header.magic = 0;
            drop(heap);
            self.free_pages(space, page, count);
            trace!("free({space:?}, {ptr:p}): {count} page(s)");
            return;
        }

        let Some(class) = header.class else {
            panic!("small arena of {ptr:p} has no size class");
        };
        let descriptor = &mut heap.classes[usize::from(class)];
        let offset = (ptr.as_ptr().addr() - arena.as_ptr().addr()).checked_sub(ARENA_HEADER_SIZE);
        assert!(
            offset.is_some_and(|o| {
                o % descriptor.block_size == 0 && o / descriptor.block_size < descriptor.blocks_per_arena
            }),
            "{ptr:p} is not the start of a block"
        );

        let link = ptr.cast::<Link>();
        assert!(!descriptor.free_list.contains(link), "{ptr:p} freed twice");
        // SAFETY: the block is ours again and large enough for a link.
        unsafe {
            link.write(Link::new());
            descriptor.free_list.push_back(link);
        }
        header.count += 1;
        trace!("free({space:?}, {ptr:p})");

        if header.count as usize == descriptor.blocks_per_arena {
            for i in 0..descriptor.blocks_per_arena {
                // SAFETY: every block of the arena is free, hence linked.
                unsafe {
                    descriptor
                        .free_list
                        .remove(block_at(arena, i, descriptor.block_size).cast::<Link>());
                }
            }
            let page = header.page;
            header.magic = 0;
            drop(heap);
            self.free_pages(space, page, 1);
            trace!("Released arena {page:?}");
        }
    }

    /// Free blocks currently listed for size class `class` of `space`.
    #[must_use]
    pub fn free_blocks(&self, space: Space<'_>, class: usize) -> usize {
        self.heap(space).lock_irq().class(class).free_blocks()
    }

    fn heap<'a>(&'a self, space: Space<'a>) -> &'a SpinMutex<BlockDescriptors> {
        match space {
            Space::Kernel => &self.kernel_heap,
            Space::User(user) => &user.heap,
        }
    }

    fn alloc_large(&self, space: Space<'_>, size: usize) -> Result<NonNull<u8>, AllocError> {
        let pages = u32::try_from((size + ARENA_HEADER_SIZE).div_ceil(PAGE_SIZE as usize))
            .map_err(|_| AllocError::InvalidSize)?;
        let page = self.alloc_zeroed_pages(space, pages)?;
        let arena = self.mapped_ptr(page).cast::<ArenaHeader>();
        // SAFETY: fresh pages owned by this allocation.
        unsafe {
            arena.write(ArenaHeader {
                magic: ARENA_MAGIC,
                page,
                count: pages,
                class: None,
                large: true,
            });
        }
        let ptr = block_at(arena, 0, 0);
        trace!("malloc({space:?}, {size}) = {ptr:p}, {pages} page(s)");
        Ok(ptr)
    }

    /// Turns one new page into an arena of `class` and lists its blocks.
    fn new_arena(
        &self,
        space: Space<'_>,
        class: usize,
        descriptor: &mut BlockClass,
    ) -> Result<(), AllocError> {
        let page = self.alloc_pages(space, 1)?;
        let arena = self.mapped_ptr(page).cast::<ArenaHeader>();
        #[allow(clippy::cast_possible_truncation)]
        let header = ArenaHeader {
            magic: ARENA_MAGIC,
            page,
            count: descriptor.blocks_per_arena as u32,
            class: Some(class as u8),
            large: false,
        };
        // SAFETY: fresh page owned by the heap; blocks are 16-byte aligned
        // and at least as large as a link.
        unsafe {
            arena.write(header);
            for i in 0..descriptor.blocks_per_arena {
                let link = block_at(arena, i, descriptor.block_size).cast::<Link>();
                link.write(Link::new());
                descriptor.free_list.push_back(link);
            }
        }
        trace!(
            "New {}-byte arena at {page:?} with {} blocks",
            descriptor.block_size, descriptor.blocks_per_arena
        );
        Ok(())
    }

    /// The header of the arena `ptr` points into, after checking that it
    /// really is one of `space`. Nothing is read through `ptr` before its
    /// page is known to be a mapped, reserved page of `space`.
    fn validated_arena(&self, space: Space<'_>, ptr: NonNull<u8>) -> NonNull<ArenaHeader> {
        let arena = arena_of(ptr);
        let Some(page) = self.page_containing(ptr) else {
            panic!("{ptr:p} does not point into mapped memory");
        };
        assert!(
            self.vspace(space).lock_irq().is_reserved(page),
            "{page:?} of {ptr:p} is not reserved in the {space:?} space"
        );
        assert_eq!(
            self.page_ptr(page),
            Some(arena.cast::<u8>()),
            "{page:?} of {ptr:p} maps elsewhere"
        );
        // SAFETY: the page is mapped and reserved; the fields are plain data.
        let (magic, named) = unsafe { ((*arena.as_ptr()).magic, (*arena.as_ptr()).page) };
        assert_eq!(magic, ARENA_MAGIC, "{ptr:p} is not a heap block");
        assert_eq!(named, page, "arena header of {ptr:p} names {named:?}");
        arena
    }
}

/// The arena header `block` belongs to: its page start.
fn arena_of(block: NonNull<u8>) -> NonNull<ArenaHeader> {
    let base = block
        .as_ptr()
        .map_addr(|addr| addr & !(PAGE_SIZE as usize - 1));
    let Some(base) = NonNull::new(base) else {
        panic!("{block:p} lies in the null page");
    };
    base.cast()
}

/// Block `index` of `block_size` bytes behind the header of `arena`.
fn block_at(arena: NonNull<ArenaHeader>, index: usize, block_size: usize) -> NonNull<u8> {
    // SAFETY: stays within the arena's first page for every valid index.
    unsafe {
        arena
            .cast::<u8>()
            .add(ARENA_HEADER_SIZE + index * block_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_vmem::sim::SimulatedMemory;

    const MEMORY: u32 = 0x80_0000;

    fn manager() -> MemoryManager<SimulatedMemory> {
        MemoryManager::simulated(MEMORY)
    }

    fn class_of(ptr: NonNull<u8>) -> &'static ArenaHeader {
        unsafe { &*arena_of(ptr).as_ptr() }
    }

    #[test]
    fn class_geometry() {
        let heap = BlockDescriptors::new();
        let per_arena: Vec<_> = (0..BLOCK_CLASSES)
            .map(|i| heap.class(i).blocks_per_arena())
            .collect();
        assert_eq!(per_arena, [255, 127, 63, 31, 15, 7, 3]);
        assert_eq!(BlockDescriptors::class_for(1), Some(0));
        assert_eq!(BlockDescriptors::class_for(16), Some(0));
        assert_eq!(BlockDescriptors::class_for(17), Some(1));
        assert_eq!(BlockDescriptors::class_for(1024), Some(6));
        assert_eq!(BlockDescriptors::class_for(1025), None);
    }

    #[test]
    fn three_small_allocations_share_a_64_byte_arena() {
        let mm = manager();
        let frames = mm.kernel_free_frames();

        let ptrs: Vec<_> = (0..3).map(|_| mm.malloc(Space::Kernel, 40).unwrap()).collect();
        assert_eq!(mm.kernel_free_frames(), frames - 1);
        assert_eq!(mm.free_blocks(Space::Kernel, 2), 60);

        let base = arena_of(ptrs[0]).as_ptr().addr();
        for (i, ptr) in ptrs.iter().enumerate() {
            assert_eq!(arena_of(*ptr).as_ptr().addr(), base);
            assert_eq!(ptr.as_ptr().addr(), base + ARENA_HEADER_SIZE + i * 64);
        }
        assert_eq!(class_of(ptrs[0]).count, 60);

        for ptr in ptrs {
            unsafe { mm.free(Space::Kernel, ptr) };
        }
        assert_eq!(mm.free_blocks(Space::Kernel, 2), 0);
        assert_eq!(mm.kernel_free_frames(), frames);
        assert_eq!(mm.kernel_reserved_pages(), 0);
    }

    #[test]
    fn pointers_lead_to_a_covering_class() {
        let mm = manager();
        for size in [1, 16, 17, 100, 255, 600, 1000, 1024] {
            let ptr = mm.malloc(Space::Kernel, size).unwrap();
            let header = class_of(ptr);
            assert_eq!(header.magic, ARENA_MAGIC);
            assert!(!header.large);
            let class = usize::from(header.class.unwrap());
            assert!(BLOCK_SIZES[class] >= size);
            if class > 0 {
                assert!(BLOCK_SIZES[class - 1] < size);
            }
            assert_eq!(mm.page_ptr(header.page), Some(arena_of(ptr).cast()));
        }
    }

    #[test]
    fn alloc_then_free_restores_the_free_list() {
        let mm = manager();
        let keep = mm.malloc(Space::Kernel, 100).unwrap();
        let before = mm.free_blocks(Space::Kernel, 3);

        let ptr = mm.malloc(Space::Kernel, 100).unwrap();
        assert_eq!(mm.free_blocks(Space::Kernel, 3), before - 1);
        unsafe { mm.free(Space::Kernel, ptr) };
        assert_eq!(mm.free_blocks(Space::Kernel, 3), before);

        unsafe { mm.free(Space::Kernel, keep) };
    }

    #[test]
    fn arena_is_released_after_all_blocks_return() {
        let mm = manager();
        let frames = mm.kernel_free_frames();
        let per_arena = BlockDescriptors::new().class(2).blocks_per_arena();

        let first: Vec<_> = (0..per_arena)
            .map(|_| mm.malloc(Space::Kernel, 40).unwrap())
            .collect();
        assert_eq!(mm.free_blocks(Space::Kernel, 2), 0);
        assert_eq!(mm.kernel_free_frames(), frames - 1);

        let spill = mm.malloc(Space::Kernel, 40).unwrap();
        assert_ne!(arena_of(spill), arena_of(first[0]));
        assert_eq!(mm.kernel_free_frames(), frames - 2);

        for ptr in first {
            unsafe { mm.free(Space::Kernel, ptr) };
        }
        assert_eq!(mm.kernel_free_frames(), frames - 1);
        assert_eq!(mm.free_blocks(Space::Kernel, 2), per_arena - 1);

        unsafe { mm.free(Space::Kernel, spill) };
        assert_eq!(mm.kernel_free_frames(), frames);
        assert_eq!(mm.free_blocks(Space::Kernel, 2), 0);
    }

    #[test]
    fn blocks_come_back_zeroed() {
        let mm = manager();
        let keep = mm.malloc(Space::Kernel, 32).unwrap();
        let ptr = mm.malloc(Space::Kernel, 32).unwrap();
        unsafe { ptr.as_ptr().write_bytes(0xEE, 32) };
        unsafe { mm.free(Space::Kernel, ptr) };

        let again = mm.malloc(Space::Kernel, 32).unwrap();
        let bytes = unsafe { core::slice::from_raw_parts(again.as_ptr(), 32) };
        assert!(bytes.iter().all(|&b| b == 0));

        unsafe {
            mm.free(Space::Kernel, again);
            mm.free(Space::Kernel, keep);
        }
    }

    #[test]
    fn large_allocations_take_whole_pages() {
        let mm = manager();
        let frames = mm.kernel_free_frames();

        let ptr = mm.malloc(Space::Kernel, 5000).unwrap();
        let header = class_of(ptr);
        assert!(header.large);
        assert_eq!(header.count, 2);
        assert_eq!(ptr.as_ptr().addr() % PAGE_SIZE as usize, ARENA_HEADER_SIZE);
        assert_eq!(mm.kernel_free_frames(), frames - 2);

        let first_page = unsafe { core::slice::from_raw_parts(ptr.as_ptr(), 64) };
        assert!(first_page.iter().all(|&b| b == 0));

        unsafe { mm.free(Space::Kernel, ptr) };
        assert_eq!(mm.kernel_free_frames(), frames);
        assert_eq!(mm.kernel_reserved_pages(), 0);
    }

    #[test]
    fn invalid_sizes_take_no_lock() {
        let mm = manager();
        let pool = mm.pool_size(Space::Kernel);

        let _held = mm.kernel_heap.lock();
        assert_eq!(mm.malloc(Space::Kernel, 0), Err(AllocError::InvalidSize));
        assert_eq!(mm.malloc(Space::Kernel, pool), Err(AllocError::InvalidSize));
        assert_eq!(
            mm.malloc(Space::Kernel, pool + 1),
            Err(AllocError::InvalidSize)
        );
    }

    #[test]
    fn user_heap_draws_from_the_user_pool() {
        let mm = manager();
        let user = mm.create_user_space().unwrap();
        let kernel_frames = mm.kernel_free_frames();
        let user_frames = mm.user_free_frames();

        let ptr = mm.malloc(Space::User(&user), 200).unwrap();
        assert_eq!(mm.user_free_frames(), user_frames - 1);
        // the page table covering the user range
        assert_eq!(mm.kernel_free_frames(), kernel_frames - 1);
        assert_eq!(mm.free_blocks(Space::User(&user), 4), 14);
        assert_eq!(mm.free_blocks(Space::Kernel, 4), 0);
        assert_eq!(user.reserved_pages(), 1);

        unsafe { mm.free(Space::User(&user), ptr) };
        assert_eq!(mm.user_free_frames(), user_frames);
        assert_eq!(user.reserved_pages(), 0);
    }

    #[test]
    #[should_panic(expected = "is not a heap block")]
    fn freeing_a_foreign_pointer_panics() {
        let mm = manager();
        let page = mm.alloc_zeroed_pages(Space::Kernel, 1).unwrap();
        let ptr = unsafe { mm.mapped_ptr(page).add(ARENA_HEADER_SIZE) };
        unsafe { mm.free(Space::Kernel, ptr) };
    }

    #[test]
    #[should_panic(expected = "not reserved in the User space")]
    fn freeing_into_the_wrong_space_panics() {
        let mm = manager();
        let user = mm.create_user_space().unwrap();
        let ptr = mm.malloc(Space::Kernel, 64).unwrap();
        unsafe { mm.free(Space::User(&user), ptr) };
    }

    #[test]
    #[should_panic(expected = "does not point into mapped memory")]
    fn freeing_an_unmapped_address_panics() {
        let mm = manager();
        let stray = NonNull::new(core::ptr::with_exposed_provenance_mut::<u8>(0x1010)).unwrap();
        unsafe { mm.free(Space::Kernel, stray) };
    }

    #[test]
    #[should_panic(expected = "freed twice")]
    fn freeing_a_block_twice_panics() {
        let mm = manager();
        // A second block keeps the arena alive after the first free.
        let keep = mm.malloc(Space::Kernel, 64).unwrap();
        let ptr = mm.malloc(Space::Kernel, 64).unwrap();
        unsafe {
            mm.free(Space::Kernel, ptr);
            mm.free(Space::Kernel, ptr);
        }
        let _ = keep;
    }

    #[test]
    #[should_panic(expected = "not the start of a block")]
    fn freeing_an_interior_pointer_panics() {
        let mm = manager();
        let ptr = mm.malloc(Space::Kernel, 64).unwrap();
        unsafe { mm.free(Space::Kernel, ptr.add(8)) };
    }
}
