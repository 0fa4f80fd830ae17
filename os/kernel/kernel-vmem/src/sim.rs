//! # Simulated physical memory
//!
//! A host-side stand-in for RAM and the MMU, used by the tests of every
//! crate above this one (enable the `sim` feature).
//!
//! - Physical memory is one contiguous, 4 KiB-aligned host buffer, so
//!   consecutive frames are adjacent on the host just like in RAM. It starts
//!   out filled with `0xA5` so that code relying on zeroed memory has to zero
//!   it itself.
//! - [`SimulatedMemory::boot`] lays out what the loader leaves behind: the
//!   page directory at `0x0010_0000`, one zeroed page table for every kernel
//!   slot (768..1023) right after it, and the last slot pointing back at the
//!   directory.
//! - Directory switches and TLB invalidations are recorded for inspection.
//! - Host pointers are not virtual addresses, so every frame remembers the
//!   page it was last reached through.

extern crate std;

use crate::{PageDirectory, PageEntryBits, PageTable, PdEntry, PhysMapper};
use core::cell::{Cell, RefCell, UnsafeCell};
use kernel_info::memory::{
    BOOT_PAGE_TABLE_FRAMES, DEFAULT_PAGE_DIRECTORY, KERNEL_DIRECTORY_START,
    RECURSIVE_DIRECTORY_SLOT,
};
use kernel_memory_addresses::{
    DirectoryIndex, PAGE_SIZE, PhysicalAddress, PhysicalFrame, VirtualPage,
};
use std::boxed::Box;
use std::vec;
use std::vec::Vec;

/// Byte pattern of frames nobody has written yet.
pub const FILLER: u8 = 0xA5;

#[repr(C, align(4096))]
#[derive(Clone)]
struct Frame([u8; PAGE_SIZE as usize]);

/// Simulated RAM plus MMU state.
pub struct SimulatedMemory {
    frames: UnsafeCell<Box<[Frame]>>,
    end: PhysicalFrame,
    reached_via: RefCell<Vec<Option<VirtualPage>>>,
    active: Cell<PhysicalFrame>,
    invalidations: RefCell<Vec<VirtualPage>>,
    activations: RefCell<Vec<PhysicalFrame>>,
}

impl SimulatedMemory {
    /// Memory of `total_memory` bytes with the loader's paging layout in
    /// place and its directory active.
    ///
    /// # Panics
    /// If `total_memory` does not cover the loader's page tables.
    #[must_use]
    pub fn boot(total_memory: u32) -> Self {
        let end = PhysicalFrame::from_number(total_memory / PAGE_SIZE);
        let directory_frame = PhysicalFrame::from_number(DEFAULT_PAGE_DIRECTORY / PAGE_SIZE);
        assert!(
            directory_frame.add_frames(BOOT_PAGE_TABLE_FRAMES) <= end,
            "not enough memory for the boot page tables"
        );

        let mem = Self {
            frames: UnsafeCell::new(
                vec![Frame([FILLER; PAGE_SIZE as usize]); end.number() as usize].into_boxed_slice(),
            ),
            end,
            reached_via: RefCell::new(vec![None; end.number() as usize]),
            active: Cell::new(directory_frame),
            invalidations: RefCell::new(Vec::new()),
            activations: RefCell::new(Vec::new()),
        };

        let directory = unsafe { mem.frame_mut::<PageDirectory>(directory_frame) };
        *directory = PageDirectory::zeroed();
        for (n, slot) in (1_u32..).zip(KERNEL_DIRECTORY_START..RECURSIVE_DIRECTORY_SLOT) {
            let table_frame = directory_frame.add_frames(n);
            unsafe { mem.frame_mut::<PageTable>(table_frame) }.clear();
            directory.set(
                DirectoryIndex::new(slot),
                PdEntry::make_table(table_frame, PageEntryBits::user_rw()),
            );
        }
        directory.set(
            DirectoryIndex::new(RECURSIVE_DIRECTORY_SLOT),
            PdEntry::make_table(directory_frame, PageEntryBits::user_rw()),
        );
        mem
    }

    /// The frame of the active page directory.
    #[must_use]
    pub fn active_directory(&self) -> PhysicalFrame {
        self.active.get()
    }

    /// Pages invalidated so far, in order.
    #[must_use]
    pub fn invalidations(&self) -> Vec<VirtualPage> {
        self.invalidations.borrow().clone()
    }

    /// Directories activated so far, in order.
    #[must_use]
    pub fn activations(&self) -> Vec<PhysicalFrame> {
        self.activations.borrow().clone()
    }

    /// Reads one byte of physical memory.
    #[must_use]
    pub fn read_byte(&self, pa: PhysicalAddress) -> u8 {
        let (frame, offset) = pa.split();
        unsafe { self.frame_ptr(frame).add(offset.as_usize()).read() }
    }

    /// Whether every byte of `frame` is zero.
    #[must_use]
    pub fn is_zeroed(&self, frame: PhysicalFrame) -> bool {
        let bytes = unsafe { &*self.frame_ptr(frame).cast::<[u8; PAGE_SIZE as usize]>() };
        bytes.iter().all(|&b| b == 0)
    }

    fn frame_ptr(&self, frame: PhysicalFrame) -> *mut u8 {
        assert!(
            frame < self.end,
            "{frame:?} lies beyond the end of memory at {:?}",
            self.end
        );
        // SAFETY: the buffer is never resized; only raw pointers escape.
        let frames = unsafe { &mut *self.frames.get() };
        frames[frame.number() as usize].0.as_mut_ptr()
    }

    unsafe fn frame_mut<'a, T>(&self, frame: PhysicalFrame) -> &'a mut T {
        unsafe { &mut *self.frame_ptr(frame).cast::<T>() }
    }
}

impl PhysMapper for SimulatedMemory {
    unsafe fn directory<'a>(&self) -> &'a mut PageDirectory {
        unsafe { self.frame_mut(self.active.get()) }
    }

    unsafe fn table<'a>(&self, _index: DirectoryIndex, frame: PhysicalFrame) -> &'a mut PageTable {
        unsafe { self.frame_mut(frame) }
    }

    fn page_ptr(&self, page: VirtualPage, frame: PhysicalFrame) -> *mut u8 {
        let ptr = self.frame_ptr(frame);
        self.reached_via.borrow_mut()[frame.number() as usize] = Some(page);
        ptr
    }

    fn page_containing(&self, ptr: *const u8) -> Option<VirtualPage> {
        // SAFETY: only the address of the buffer is taken.
        let base = unsafe { (*self.frames.get()).as_ptr() }.addr();
        let frame = ptr.addr().checked_sub(base)? / PAGE_SIZE as usize;
        self.reached_via.borrow().get(frame).copied().flatten()
    }

    fn invalidate(&self, page: VirtualPage) {
        self.invalidations.borrow_mut().push(page);
    }

    unsafe fn activate(&self, directory: PhysicalFrame) {
        self.active.set(directory);
        self.activations.borrow_mut().push(directory);
    }
}
