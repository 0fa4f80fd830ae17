//! # Memory Manager and Page Allocator
//!
//! [`MemoryManager`] owns the page mapper, both physical pools, the kernel
//! virtual space and the kernel heap, each behind its own lock. Every page
//! allocation goes through it:
//!
//! ```text
//!  alloc_pages(space, n)
//!   │
//!   ├─► virtual space (kernel or the task's)  reserve n pages
//!   │
//!   └─► for each page
//!         ├─► pool (kernel or user)  alloc_frame
//!         └─► page mapper            map page → frame
//!                                     (page tables from the kernel pool)
//! ```
//!
//! ## Locking
//!
//! All locks are taken with interrupts disabled (`lock_irq`). The mapper
//! lock may be held while taking the kernel pool lock (for a new page
//! table); no pool or space lock is ever held while taking the mapper lock.
//! The heap locks in [`heap`](crate::heap) are outermost.

use crate::frame_alloc::{MemoryPool, PoolError};
use crate::heap::BlockDescriptors;
use crate::vspace::{VirtualAddressSpace, VirtualSpaceError};
use core::ptr::NonNull;
use kernel_info::boot::MemoryLayout;
use kernel_info::memory::{
    KERNEL_DIRECTORY_START, MAX_PAGES_PER_REQUEST, RECURSIVE_DIRECTORY_SLOT,
};
use kernel_memory_addresses::{
    DirectoryIndex, PAGE_SIZE, PhysicalAddress, PhysicalFrame, VirtualAddress, VirtualPage,
};
use kernel_sync::SpinMutex;
use kernel_vmem::{
    FrameAlloc, MapError, PageDirectory, PageEntryBits, PageMapper, PdEntry, PhysMapper,
};
use log::{debug, info};

/// Errors of the page allocator.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum PageAllocError {
    #[error("out of physical memory")]
    OutOfPhysicalMemory,
    #[error("out of virtual address space")]
    OutOfVirtualSpace,
    #[error("page count out of range")]
    InvalidPageCount,
}

impl From<PoolError> for PageAllocError {
    fn from(_: PoolError) -> Self {
        Self::OutOfPhysicalMemory
    }
}

impl From<MapError> for PageAllocError {
    fn from(_: MapError) -> Self {
        Self::OutOfPhysicalMemory
    }
}

impl From<VirtualSpaceError> for PageAllocError {
    fn from(_: VirtualSpaceError) -> Self {
        Self::OutOfVirtualSpace
    }
}

/// The per-process half of the allocator state: a user virtual space and
/// the process's own heap size classes.
pub struct UserSpace {
    pub(crate) vspace: SpinMutex<VirtualAddressSpace>,
    pub(crate) heap: SpinMutex<BlockDescriptors>,
}

impl UserSpace {
    /// A user space whose page bitmap lives in `storage`, taken as is.
    pub fn new(storage: &'static mut [u8]) -> Self {
        Self {
            vspace: SpinMutex::new(VirtualAddressSpace::new(
                storage,
                VirtualAddressSpace::user_range(),
            )),
            heap: SpinMutex::new(BlockDescriptors::new()),
        }
    }

    /// Number of reserved user pages.
    #[must_use]
    pub fn reserved_pages(&self) -> usize {
        self.vspace.lock_irq().reserved_pages()
    }
}

/// Which address space an allocation is made in.
///
/// Kernel requests draw frames from the kernel pool, user requests from the
/// user pool. Page tables always come from the kernel pool.
#[derive(Copy, Clone)]
pub enum Space<'a> {
    Kernel,
    User(&'a UserSpace),
}

impl core::fmt::Debug for Space<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Kernel => f.write_str("Kernel"),
            Self::User(_) => f.write_str("User"),
        }
    }
}

/// Storage for the three boot bitmaps.
pub struct BitmapStorage {
    pub kernel_pool: &'static mut [u8],
    pub user_pool: &'static mut [u8],
    pub kernel_space: &'static mut [u8],
}

impl BitmapStorage {
    /// The bitmaps at the addresses `layout` places them.
    ///
    /// # Safety
    /// The bitmap area must be mapped, writable and otherwise unused.
    #[must_use]
    pub unsafe fn from_layout(layout: &MemoryLayout) -> Self {
        let [kernel, user, space] = layout.bitmap_addresses();
        unsafe {
            Self {
                kernel_pool: slice_at(kernel, layout.kernel_pool_bitmap_bytes()),
                user_pool: slice_at(user, layout.user_pool_bitmap_bytes()),
                kernel_space: slice_at(space, layout.kernel_space_bitmap_bytes()),
            }
        }
    }
}

unsafe fn slice_at(va: VirtualAddress, len: u32) -> &'static mut [u8] {
    let ptr = core::ptr::with_exposed_provenance_mut::<u8>(va.as_u32() as usize);
    unsafe { core::slice::from_raw_parts_mut(ptr, len as usize) }
}

/// Physical pools, page mapper, kernel space and kernel heap.
pub struct MemoryManager<M: PhysMapper> {
    layout: MemoryLayout,
    pub(crate) mapper: SpinMutex<PageMapper<M>>,
    kernel_pool: SpinMutex<MemoryPool>,
    user_pool: SpinMutex<MemoryPool>,
    kernel_space: SpinMutex<VirtualAddressSpace>,
    pub(crate) kernel_heap: SpinMutex<BlockDescriptors>,
}

/// Feeds page-table frames from the kernel pool to the mapper.
struct LockedPool<'a>(&'a SpinMutex<MemoryPool>);

impl FrameAlloc for LockedPool<'_> {
    fn alloc_frame(&mut self) -> Option<PhysicalFrame> {
        self.0.lock_irq().alloc_frame().ok()
    }
}

impl<M: PhysMapper> MemoryManager<M> {
    /// Sets up both pools and the kernel space per `layout`. All bitmaps
    /// are cleared.
    pub fn new(layout: MemoryLayout, phys: M, bitmaps: BitmapStorage) -> Self {
        info!(
            "Kernel pool: {:?}, {} frames, bitmap at {:p}",
            layout.kernel_pool.base,
            layout.kernel_pool.frames,
            bitmaps.kernel_pool.as_ptr()
        );
        info!(
            "User pool: {:?}, {} frames, bitmap at {:p}",
            layout.user_pool.base,
            layout.user_pool.frames,
            bitmaps.user_pool.as_ptr()
        );
        info!(
            "Kernel space: {:?}, {} pages, bitmap at {:p}",
            layout.kernel_space.base,
            layout.kernel_space.pages,
            bitmaps.kernel_space.as_ptr()
        );

        Self {
            layout,
            mapper: SpinMutex::new(PageMapper::new(phys)),
            kernel_pool: SpinMutex::new(MemoryPool::new(
                "kernel",
                bitmaps.kernel_pool,
                layout.kernel_pool,
            )),
            user_pool: SpinMutex::new(MemoryPool::new("user", bitmaps.user_pool, layout.user_pool)),
            kernel_space: SpinMutex::new(VirtualAddressSpace::new_cleared(
                bitmaps.kernel_space,
                layout.kernel_space,
            )),
            kernel_heap: SpinMutex::new(BlockDescriptors::new()),
        }
    }

    #[inline]
    #[must_use]
    pub const fn layout(&self) -> &MemoryLayout {
        &self.layout
    }

    /// Reserves `count` contiguous virtual pages in `space` and backs each
    /// with a fresh frame from the matching pool.
    ///
    /// The memory is not cleared; see [`alloc_zeroed_pages`](Self::alloc_zeroed_pages).
    /// If any page cannot be backed, every page mapped so far is unmapped,
    /// its frame returned and the virtual range released.
    ///
    /// # Errors
    /// - [`PageAllocError::InvalidPageCount`] unless `0 < count < 3840`.
    /// - [`PageAllocError::OutOfVirtualSpace`] if no virtual run is free.
    /// - [`PageAllocError::OutOfPhysicalMemory`] if a frame or page table
    ///   could not be allocated.
    pub fn alloc_pages(&self, space: Space<'_>, count: u32) -> Result<VirtualPage, PageAllocError> {
        if count == 0 || count >= MAX_PAGES_PER_REQUEST {
            return Err(PageAllocError::InvalidPageCount);
        }

        let start = self.vspace(space).lock_irq().reserve(count)?;
        for i in 0..count {
            if let Err(e) = self.back_page(space, start.add_pages(i)) {
                self.unmap_and_free(space, start, i);
                self.vspace(space).lock_irq().release(start, count);
                debug!("alloc_pages({space:?}, {count}) rolled back after {i} page(s): {e}");
                return Err(e);
            }
        }
        debug!("alloc_pages({space:?}, {count}) = {start:?}");
        Ok(start)
    }

    /// [`alloc_pages`](Self::alloc_pages) with the memory zeroed.
    ///
    /// # Errors
    /// As [`alloc_pages`](Self::alloc_pages).
    pub fn alloc_zeroed_pages(
        &self,
        space: Space<'_>,
        count: u32,
    ) -> Result<VirtualPage, PageAllocError> {
        let start = self.alloc_pages(space, count)?;
        self.zero_pages(start, count);
        Ok(start)
    }

    /// Maps one fresh frame at exactly `page` in `space`.
    ///
    /// # Errors
    /// [`PageAllocError::OutOfVirtualSpace`] if `page` is already reserved,
    /// [`PageAllocError::OutOfPhysicalMemory`] if no frame is left.
    ///
    /// # Panics
    /// If `page` lies outside `space`.
    pub fn alloc_page_at(&self, space: Space<'_>, page: VirtualPage) -> Result<(), PageAllocError> {
        self.vspace(space).lock_irq().reserve_at(page)?;
        if let Err(e) = self.back_page(space, page) {
            self.vspace(space).lock_irq().release(page, 1);
            return Err(e);
        }
        debug!("alloc_page_at({space:?}, {page:?})");
        Ok(())
    }

    /// Unmaps `count` pages from `page` on, returns their frames to the
    /// pool of `space` and releases the virtual range.
    ///
    /// # Panics
    /// If a page is not mapped, a frame lies in the reserved low region or
    /// in the other pool, or the range was not reserved in `space`.
    pub fn free_pages(&self, space: Space<'_>, page: VirtualPage, count: u32) {
        assert!(count > 0, "freeing zero pages");
        self.unmap_and_free(space, page, count);
        self.vspace(space).lock_irq().release(page, count);
        debug!("free_pages({space:?}, {page:?}, {count})");
    }

    /// Physical address `va` is mapped to in the active directory.
    #[must_use]
    pub fn translate(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        self.mapper.lock_irq().translate(va)
    }

    /// Pointer through which mapped `page` is accessed.
    #[must_use]
    pub fn page_ptr(&self, page: VirtualPage) -> Option<NonNull<u8>> {
        self.mapper.lock_irq().page_ptr(page)
    }

    /// The page `ptr` was handed out for, if any. `ptr` is not dereferenced.
    pub(crate) fn page_containing(&self, ptr: NonNull<u8>) -> Option<VirtualPage> {
        self.mapper.lock_irq().phys().page_containing(ptr.as_ptr())
    }

    /// A fresh, zeroed user space with its bitmap in kernel pages.
    ///
    /// # Errors
    /// As [`alloc_pages`](Self::alloc_pages).
    pub fn create_user_space(&self) -> Result<UserSpace, PageAllocError> {
        let bytes = VirtualAddressSpace::user_bitmap_bytes();
        let pages = u32::try_from(bytes.div_ceil(PAGE_SIZE as usize))
            .map_err(|_| PageAllocError::InvalidPageCount)?;
        let start = self.alloc_zeroed_pages(Space::Kernel, pages)?;
        let ptr = self.mapped_ptr(start);
        // SAFETY: `pages` freshly mapped, contiguous kernel pages owned by the
        // new space from here on.
        let storage = unsafe { core::slice::from_raw_parts_mut(ptr.as_ptr(), bytes) };
        Ok(UserSpace::new(storage))
    }

    /// A page directory for a new process, in one kernel page.
    ///
    /// The kernel half is copied from the active directory so every process
    /// shares the kernel's page tables; the last slot maps the directory
    /// itself.
    ///
    /// Returns the directory's virtual page and physical frame.
    ///
    /// # Errors
    /// As [`alloc_pages`](Self::alloc_pages).
    pub fn create_page_directory(&self) -> Result<(VirtualPage, PhysicalFrame), PageAllocError> {
        let page = self.alloc_zeroed_pages(Space::Kernel, 1)?;
        let mapper = self.mapper.lock_irq();
        let frame = mapper
            .frame_of(page)
            .unwrap_or_else(|| panic!("{page:?} not mapped after allocation"));
        let Some(ptr) = mapper.page_ptr(page) else {
            panic!("{page:?} not mapped after allocation");
        };

        // SAFETY: the page was just allocated and is zeroed; the active
        // directory is only read, under the mapper lock.
        let directory = unsafe { &mut *ptr.as_ptr().cast::<PageDirectory>() };
        let active = unsafe { mapper.phys().directory() };
        directory.copy_from(
            active,
            KERNEL_DIRECTORY_START as usize..RECURSIVE_DIRECTORY_SLOT as usize,
        );
        directory.set(
            DirectoryIndex::new(RECURSIVE_DIRECTORY_SLOT),
            PdEntry::make_table(frame, PageEntryBits::user_rw()),
        );
        debug!("New page directory {frame:?} at {page:?}");
        Ok((page, frame))
    }

    /// Makes `directory` the active page directory.
    ///
    /// # Safety
    /// `directory` must be the kernel's boot directory or one created by
    /// [`create_page_directory`](Self::create_page_directory).
    pub unsafe fn activate(&self, directory: PhysicalFrame) {
        unsafe { self.mapper.lock_irq().activate(directory) };
    }

    /// Runs `f` on the physical mapper, under the mapper lock.
    pub fn with_phys<R>(&self, f: impl FnOnce(&M) -> R) -> R {
        f(self.mapper.lock_irq().phys())
    }

    /// Free frames in the kernel pool.
    #[must_use]
    pub fn kernel_free_frames(&self) -> usize {
        self.kernel_pool.lock_irq().free_frames()
    }

    /// Free frames in the user pool.
    #[must_use]
    pub fn user_free_frames(&self) -> usize {
        self.user_pool.lock_irq().free_frames()
    }

    /// Reserved pages in the kernel space.
    #[must_use]
    pub fn kernel_reserved_pages(&self) -> usize {
        self.kernel_space.lock_irq().reserved_pages()
    }

    /// Size in bytes of the pool that backs `space`.
    #[must_use]
    pub const fn pool_size(&self, space: Space<'_>) -> usize {
        match space {
            Space::Kernel => self.layout.kernel_pool.size_bytes() as usize,
            Space::User(_) => self.layout.user_pool.size_bytes() as usize,
        }
    }

    pub(crate) fn vspace<'a>(&'a self, space: Space<'a>) -> &'a SpinMutex<VirtualAddressSpace> {
        match space {
            Space::Kernel => &self.kernel_space,
            Space::User(user) => &user.vspace,
        }
    }

    fn pool(&self, space: Space<'_>) -> &SpinMutex<MemoryPool> {
        match space {
            Space::Kernel => &self.kernel_pool,
            Space::User(_) => &self.user_pool,
        }
    }

    /// Pointer to `page`, which the caller knows to be mapped.
    ///
    /// # Panics
    /// If `page` is not mapped.
    #[must_use]
    pub fn mapped_ptr(&self, page: VirtualPage) -> NonNull<u8> {
        self.page_ptr(page)
            .unwrap_or_else(|| panic!("{page:?} is not mapped"))
    }

    pub(crate) fn zero_pages(&self, start: VirtualPage, count: u32) {
        for i in 0..count {
            let ptr = self.mapped_ptr(start.add_pages(i));
            // SAFETY: the page is mapped and owned by the caller.
            unsafe { ptr.as_ptr().write_bytes(0, PAGE_SIZE as usize) };
        }
    }

    fn back_page(&self, space: Space<'_>, page: VirtualPage) -> Result<(), PageAllocError> {
        let pool = self.pool(space);
        let frame = pool.lock_irq().alloc_frame()?;
        let mapped = self
            .mapper
            .lock_irq()
            .map(&mut LockedPool(&self.kernel_pool), page, frame);
        if let Err(e) = mapped {
            pool.lock_irq().free_frame(frame);
            return Err(e.into());
        }
        Ok(())
    }

    fn unmap_and_free(&self, space: Space<'_>, start: VirtualPage, count: u32) {
        let reserved_end = self.layout.kernel_pool.base;
        let pool = self.pool(space);
        for i in 0..count {
            let page = start.add_pages(i);
            let frame = self.mapper.lock_irq().unmap(page);
            assert!(
                frame >= reserved_end,
                "{page:?} maps reserved low memory {frame:?}"
            );
            let mut pool = pool.lock_irq();
            assert!(
                pool.contains(frame),
                "{page:?} maps {frame:?} outside the {space:?} pool"
            );
            pool.free_frame(frame);
        }
    }
}

#[cfg(any(test, feature = "sim"))]
impl MemoryManager<kernel_vmem::sim::SimulatedMemory> {
    /// A manager over freshly booted simulated memory of `total_memory`
    /// bytes, with leaked host buffers for the bitmaps.
    ///
    /// # Panics
    /// If `total_memory` is too small for a layout.
    #[must_use]
    pub fn simulated(total_memory: u32) -> Self {
        extern crate std;
        use std::vec;

        let layout = MemoryLayout::from_total_memory(total_memory)
            .unwrap_or_else(|e| panic!("no layout for {total_memory:#x} bytes: {e}"));
        let bitmaps = BitmapStorage {
            kernel_pool: vec![0; layout.kernel_pool_bitmap_bytes() as usize].leak(),
            user_pool: vec![0; layout.user_pool_bitmap_bytes() as usize].leak(),
            kernel_space: vec![0; layout.kernel_space_bitmap_bytes() as usize].leak(),
        };
        Self::new(
            layout,
            kernel_vmem::sim::SimulatedMemory::boot(total_memory),
            bitmaps,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_info::memory::{USER_STACK_PAGE, USER_VADDR_START};
    use kernel_vmem::sim::SimulatedMemory;
    use std::collections::BTreeSet;

    const MEMORY: u32 = 0x80_0000;

    fn manager() -> MemoryManager<SimulatedMemory> {
        MemoryManager::simulated(MEMORY)
    }

    fn frame_of(mm: &MemoryManager<SimulatedMemory>, page: VirtualPage) -> PhysicalFrame {
        mm.mapper.lock().frame_of(page).unwrap()
    }

    #[test]
    fn live_allocations_never_share_frames() {
        let mm = manager();
        let user = mm.create_user_space().unwrap();
        let kernel_frames = mm.kernel_free_frames();
        let user_frames = mm.user_free_frames();

        let requests = [
            (Space::Kernel, 3),
            (Space::User(&user), 2),
            (Space::Kernel, 1),
            (Space::User(&user), 5),
        ];
        let allocated: Vec<_> = requests
            .iter()
            .map(|&(space, count)| (space, mm.alloc_pages(space, count).unwrap(), count))
            .collect();

        let mut seen = BTreeSet::new();
        for &(space, start, count) in &allocated {
            for i in 0..count {
                let frame = frame_of(&mm, start.add_pages(i));
                assert!(seen.insert(frame.number()), "{frame:?} handed out twice");
                let pool = match space {
                    Space::Kernel => mm.layout().kernel_pool,
                    Space::User(_) => mm.layout().user_pool,
                };
                assert!(frame >= pool.base && frame < pool.end());
            }
        }

        for (space, start, count) in allocated {
            mm.free_pages(space, start, count);
        }
        // one page table for the user range stays behind
        assert_eq!(mm.kernel_free_frames(), kernel_frames - 1);
        assert_eq!(mm.user_free_frames(), user_frames);
        assert_eq!(user.reserved_pages(), 0);
    }

    #[test]
    fn kernel_pages_are_contiguous_from_the_heap_start() {
        let mm = manager();
        let a = mm.alloc_pages(Space::Kernel, 2).unwrap();
        let b = mm.alloc_pages(Space::Kernel, 1).unwrap();
        assert_eq!(a, mm.layout().kernel_space.base);
        assert_eq!(b, a.add_pages(2));
        let va = VirtualAddress::new(a.add_pages(1).base().as_u32() + 0x123);
        let frame = frame_of(&mm, a.add_pages(1));
        assert_eq!(
            mm.translate(va),
            Some(PhysicalAddress::new(frame.base().as_u32() + 0x123))
        );
    }

    #[test]
    fn user_pages_start_at_the_user_base() {
        let mm = manager();
        let user = mm.create_user_space().unwrap();
        let page = mm.alloc_pages(Space::User(&user), 1).unwrap();
        assert_eq!(page.base().as_u32(), USER_VADDR_START);
    }

    #[test]
    fn invalid_page_counts() {
        let mm = manager();
        assert_eq!(
            mm.alloc_pages(Space::Kernel, 0),
            Err(PageAllocError::InvalidPageCount)
        );
        assert_eq!(
            mm.alloc_pages(Space::Kernel, MAX_PAGES_PER_REQUEST),
            Err(PageAllocError::InvalidPageCount)
        );
    }

    #[test]
    fn partial_failure_rolls_back() {
        let mm = manager();
        let user = mm.create_user_space().unwrap();
        let user_frames = mm.user_free_frames();
        let count = u32::try_from(user_frames).unwrap() + 1;

        assert_eq!(
            mm.alloc_pages(Space::User(&user), count),
            Err(PageAllocError::OutOfPhysicalMemory)
        );
        assert_eq!(mm.user_free_frames(), user_frames);
        assert_eq!(user.reserved_pages(), 0);

        let page = mm.alloc_pages(Space::User(&user), 1).unwrap();
        assert_eq!(page.base().as_u32(), USER_VADDR_START);
    }

    #[test]
    fn kernel_space_exhaustion() {
        let mm = manager();
        let pages = mm.layout().kernel_space.pages;
        mm.alloc_pages(Space::Kernel, pages - 1).unwrap();
        assert_eq!(
            mm.alloc_pages(Space::Kernel, 2),
            Err(PageAllocError::OutOfVirtualSpace)
        );
    }

    #[test]
    fn zeroed_pages_are_zero() {
        let mm = manager();
        let page = mm.alloc_zeroed_pages(Space::Kernel, 2).unwrap();
        for i in 0..2 {
            let frame = frame_of(&mm, page.add_pages(i));
            assert!(mm.with_phys(|mem| mem.is_zeroed(frame)));
        }
    }

    #[test]
    fn user_stack_page_is_placed_exactly() {
        let mm = manager();
        let user = mm.create_user_space().unwrap();
        let stack = VirtualPage::containing(VirtualAddress::new(USER_STACK_PAGE));

        mm.alloc_page_at(Space::User(&user), stack).unwrap();
        let frame = frame_of(&mm, stack);
        assert!(frame >= mm.layout().user_pool.base);
        assert_eq!(
            mm.alloc_page_at(Space::User(&user), stack),
            Err(PageAllocError::OutOfVirtualSpace)
        );

        mm.free_pages(Space::User(&user), stack, 1);
        assert_eq!(user.reserved_pages(), 0);
        assert_eq!(mm.translate(stack.base()), None);
    }

    #[test]
    fn free_invalidates_the_tlb() {
        let mm = manager();
        let page = mm.alloc_pages(Space::Kernel, 1).unwrap();
        mm.free_pages(Space::Kernel, page, 1);
        assert_eq!(mm.mapper.lock().phys().invalidations(), [page]);
    }

    #[test]
    #[should_panic(expected = "outside the User pool")]
    fn freeing_kernel_pages_as_user_pages_panics() {
        let mm = manager();
        let user = mm.create_user_space().unwrap();
        let page = mm.alloc_pages(Space::Kernel, 1).unwrap();
        mm.free_pages(Space::User(&user), page, 1);
    }

    #[test]
    fn process_directory_shares_the_kernel_half() {
        let mm = manager();
        let (page, frame) = mm.create_page_directory().unwrap();
        let ptr = mm.page_ptr(page).unwrap();
        let directory = unsafe { &*ptr.as_ptr().cast::<PageDirectory>() };
        let mapper = mm.mapper.lock();
        let active = unsafe { mapper.phys().directory() };

        for slot in 0..KERNEL_DIRECTORY_START {
            assert!(!directory.get(DirectoryIndex::new(slot)).is_present());
        }
        for slot in KERNEL_DIRECTORY_START..RECURSIVE_DIRECTORY_SLOT {
            let i = DirectoryIndex::new(slot);
            assert_eq!(directory.get(i).raw(), active.get(i).raw());
        }
        assert_eq!(
            directory.get(DirectoryIndex::new(RECURSIVE_DIRECTORY_SLOT)).table(),
            Some(frame)
        );
    }

    #[test]
    fn activate_switches_directories() {
        let mm = manager();
        let boot = mm.mapper.lock().phys().active_directory();
        let (_, frame) = mm.create_page_directory().unwrap();
        unsafe { mm.activate(frame) };
        unsafe { mm.activate(boot) };
        assert_eq!(mm.mapper.lock().phys().activations(), [frame, boot]);
    }
}
