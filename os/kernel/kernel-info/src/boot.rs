//! # Boot Information
//!
//! The loader detects the amount of installed memory, stores it at
//! [`TOTAL_MEMORY_ADDR`](crate::memory::TOTAL_MEMORY_ADDR), builds the
//! page directory at [`DEFAULT_PAGE_DIRECTORY`](crate::memory::DEFAULT_PAGE_DIRECTORY)
//! and jumps to the kernel. Everything else the memory manager needs is
//! derived from that single number by [`MemoryLayout::from_total_memory`].

use crate::memory::{
    KERNEL_HEAP_START, MEM_BITMAP_BASE, MEM_BITMAP_BYTES, RESERVED_PHYSICAL_BYTES,
};
use kernel_memory_addresses::{PAGE_SIZE, PhysicalFrame, VirtualAddress, VirtualPage};

/// What the loader hands over.
#[repr(C)]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct BootInfo {
    /// Installed memory in bytes.
    pub total_memory: u32,
}

impl BootInfo {
    #[must_use]
    pub const fn new(total_memory: u32) -> Self {
        Self { total_memory }
    }
}

/// A run of physical frames managed by one pool.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct FrameRange {
    pub base: PhysicalFrame,
    pub frames: u32,
}

impl FrameRange {
    /// Bytes covered by the range.
    #[must_use]
    pub const fn size_bytes(&self) -> u32 {
        self.frames * PAGE_SIZE
    }

    /// First frame past the range.
    #[must_use]
    pub const fn end(&self) -> PhysicalFrame {
        self.base.add_frames(self.frames)
    }
}

/// A run of virtual pages managed by one address-space bitmap.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PageRange {
    pub base: VirtualPage,
    pub pages: u32,
}

/// Errors detected while deriving the memory layout.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum LayoutError {
    #[error("{total:#x} bytes of memory leave no frames for the pools")]
    TooLittleMemory { total: u32 },
    #[error("bitmaps need {needed} bytes, more than the reserved bitmap area")]
    BitmapsTooLarge { needed: u32 },
}

/// Pool split and bitmap placement derived from the installed memory.
///
/// Free frames above [`RESERVED_PHYSICAL_BYTES`] are split in half; the
/// kernel pool takes the lower half, the user pool the rest (it receives the
/// odd frame). The kernel virtual space covers as many pages as the kernel
/// pool has frames, starting at [`KERNEL_HEAP_START`].
///
/// ```rust
/// # use kernel_info::boot::MemoryLayout;
/// let layout = MemoryLayout::from_total_memory(32 * 1024 * 1024).unwrap();
/// assert_eq!(layout.kernel_pool.base.base().as_u32(), 0x0020_0000);
/// assert_eq!(layout.kernel_pool.frames, 3840);
/// assert_eq!(layout.user_pool.frames, 3840);
/// assert_eq!(layout.user_pool.base.base().as_u32(), 0x0110_0000);
/// ```
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MemoryLayout {
    pub total_memory: u32,
    pub kernel_pool: FrameRange,
    pub user_pool: FrameRange,
    pub kernel_space: PageRange,
}

impl MemoryLayout {
    /// Derives the layout for `total_memory` bytes of installed memory.
    ///
    /// # Errors
    /// [`LayoutError::TooLittleMemory`] if fewer than two frames are free,
    /// [`LayoutError::BitmapsTooLarge`] if the three bitmaps do not fit into
    /// the reserved bitmap area.
    pub const fn from_total_memory(total_memory: u32) -> Result<Self, LayoutError> {
        if total_memory < RESERVED_PHYSICAL_BYTES + 2 * PAGE_SIZE {
            return Err(LayoutError::TooLittleMemory {
                total: total_memory,
            });
        }

        let free_frames = (total_memory - RESERVED_PHYSICAL_BYTES) / PAGE_SIZE;
        let kernel_frames = free_frames / 2;
        let user_frames = free_frames - kernel_frames;

        let kernel_base = PhysicalFrame::from_number(RESERVED_PHYSICAL_BYTES / PAGE_SIZE);
        let layout = Self {
            total_memory,
            kernel_pool: FrameRange {
                base: kernel_base,
                frames: kernel_frames,
            },
            user_pool: FrameRange {
                base: kernel_base.add_frames(kernel_frames),
                frames: user_frames,
            },
            kernel_space: PageRange {
                base: VirtualPage::containing(VirtualAddress::new(KERNEL_HEAP_START)),
                pages: kernel_frames,
            },
        };

        let needed = layout.bitmap_bytes();
        if needed > MEM_BITMAP_BYTES {
            return Err(LayoutError::BitmapsTooLarge { needed });
        }
        Ok(layout)
    }

    /// Bytes of the kernel pool bitmap.
    #[must_use]
    pub const fn kernel_pool_bitmap_bytes(&self) -> u32 {
        self.kernel_pool.frames.div_ceil(8)
    }

    /// Bytes of the user pool bitmap.
    #[must_use]
    pub const fn user_pool_bitmap_bytes(&self) -> u32 {
        self.user_pool.frames.div_ceil(8)
    }

    /// Bytes of the kernel virtual-space bitmap.
    #[must_use]
    pub const fn kernel_space_bitmap_bytes(&self) -> u32 {
        self.kernel_space.pages.div_ceil(8)
    }

    /// Total bytes of all three bitmaps.
    #[must_use]
    pub const fn bitmap_bytes(&self) -> u32 {
        self.kernel_pool_bitmap_bytes()
            + self.user_pool_bitmap_bytes()
            + self.kernel_space_bitmap_bytes()
    }

    /// Virtual addresses of the kernel pool, user pool and kernel space
    /// bitmaps, packed back to back from [`MEM_BITMAP_BASE`].
    #[must_use]
    pub const fn bitmap_addresses(&self) -> [VirtualAddress; 3] {
        let kernel = MEM_BITMAP_BASE;
        let user = kernel + self.kernel_pool_bitmap_bytes();
        let space = user + self.user_pool_bitmap_bytes();
        [
            VirtualAddress::new(kernel),
            VirtualAddress::new(user),
            VirtualAddress::new(space),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn odd_frame_goes_to_user_pool() {
        let layout = MemoryLayout::from_total_memory(RESERVED_PHYSICAL_BYTES + 9 * PAGE_SIZE)
            .expect("layout");
        assert_eq!(layout.kernel_pool.frames, 4);
        assert_eq!(layout.user_pool.frames, 5);
        assert_eq!(layout.kernel_pool.end(), layout.user_pool.base);
        assert_eq!(layout.kernel_space.pages, 4);
        assert_eq!(layout.bitmap_bytes(), 3);
    }

    #[test]
    fn bitmaps_are_packed() {
        let layout = MemoryLayout::from_total_memory(32 * 1024 * 1024).expect("layout");
        let [k, u, s] = layout.bitmap_addresses();
        assert_eq!(k.as_u32(), MEM_BITMAP_BASE);
        assert_eq!(u.as_u32(), MEM_BITMAP_BASE + 480);
        assert_eq!(s.as_u32(), MEM_BITMAP_BASE + 960);
    }

    #[test]
    fn rejects_tiny_and_huge_memory() {
        assert_eq!(
            MemoryLayout::from_total_memory(RESERVED_PHYSICAL_BYTES),
            Err(LayoutError::TooLittleMemory {
                total: RESERVED_PHYSICAL_BYTES
            })
        );
        assert!(matches!(
            MemoryLayout::from_total_memory(0xF000_0000),
            Err(LayoutError::BitmapsTooLarge { .. })
        ));
    }
}
